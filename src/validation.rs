//! Server-side checks for the login and sign-up forms. A form that fails
//! validation never reaches the auth provider.

use std::fmt;

use serde::Deserialize;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// Validated sign-in input.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Validated sign-up input.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUp {
    pub credentials: Credentials,
    /// Trimmed; `None` when left blank.
    pub full_name: Option<String>,
}

/// Field name → message, in form order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors(Vec<(&'static str, String)>);

impl ValidationErrors {
    fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push((field, message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First message recorded for `field`.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, m)| m.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(f, m)| (*f, m.as_str()))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(field, m)| format!("{field}: {m}")).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl LoginForm {
    pub fn validate(&self) -> Result<Credentials, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let email = check_email(&self.email, &mut errors);
        check_password(&self.password, &mut errors);

        if errors.is_empty() {
            Ok(Credentials {
                email,
                password: self.password.clone(),
            })
        } else {
            Err(errors)
        }
    }
}

impl RegisterForm {
    pub fn validate(&self) -> Result<SignUp, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let email = check_email(&self.email, &mut errors);
        check_password(&self.password, &mut errors);
        if self.confirm_password != self.password {
            errors.add("confirm_password", "Passwords do not match");
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let full_name = Some(self.full_name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_owned);

        Ok(SignUp {
            credentials: Credentials {
                email,
                password: self.password.clone(),
            },
            full_name,
        })
    }
}

/// Returns the trimmed address.
fn check_email(raw: &str, errors: &mut ValidationErrors) -> String {
    let email = raw.trim();
    if email.is_empty() {
        errors.add("email", "Email is required");
    } else if !looks_like_email(email) {
        errors.add("email", "Enter a valid email address");
    }
    email.to_owned()
}

fn check_password(password: &str, errors: &mut ValidationErrors) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        );
    }
}

/// `local@domain.tld` with no whitespace and a single `@`.
fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((name, tld)) => !name.is_empty() && !tld.is_empty(),
        None => false,
    }
}
