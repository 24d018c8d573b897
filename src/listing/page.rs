use serde::{Deserialize, Serialize};

use super::ParseError;

/// Rows per page offered by the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum PageSize {
    #[default]
    Ten,
    TwentyFive,
    Fifty,
}

impl PageSize {
    pub const ALL: [PageSize; 3] = [PageSize::Ten, PageSize::TwentyFive, PageSize::Fifty];

    pub fn get(self) -> usize {
        match self {
            PageSize::Ten => 10,
            PageSize::TwentyFive => 25,
            PageSize::Fifty => 50,
        }
    }
}

impl TryFrom<u32> for PageSize {
    type Error = ParseError;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        match n {
            10 => Ok(PageSize::Ten),
            25 => Ok(PageSize::TwentyFive),
            50 => Ok(PageSize::Fifty),
            other => Err(ParseError::new("page size", other.to_string())),
        }
    }
}

impl From<PageSize> for u32 {
    fn from(size: PageSize) -> Self {
        size.get() as u32
    }
}

/// One page of an already filtered and sorted slice.
#[derive(Debug)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    /// 1-based page number after clamping.
    pub number: usize,
    /// Always at least 1, so an empty set still has one (empty) page.
    pub total_pages: usize,
    pub total_items: usize,
    pub size: PageSize,
}

impl<T> Page<'_, T> {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }

    /// 1-based index of the first item on this page, 0 when empty.
    pub fn first_item(&self) -> usize {
        if self.items.is_empty() {
            0
        } else {
            (self.number - 1) * self.size.get() + 1
        }
    }

    pub fn last_item(&self) -> usize {
        if self.items.is_empty() {
            0
        } else {
            self.first_item() + self.items.len() - 1
        }
    }
}

/// Slice out page `number` (1-based). Out-of-range numbers are clamped to the
/// first/last page.
pub fn paginate<T>(items: &[T], number: usize, size: PageSize) -> Page<'_, T> {
    let per_page = size.get();
    let total_items = items.len();
    let total_pages = total_items.div_ceil(per_page).max(1);
    let number = number.clamp(1, total_pages);

    let start = ((number - 1) * per_page).min(total_items);
    let end = (start + per_page).min(total_items);

    Page {
        items: &items[start..end],
        number,
        total_pages,
        total_items,
        size,
    }
}
