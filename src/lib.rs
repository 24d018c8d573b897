pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod export;
pub mod listing;
pub mod session;
pub mod state;
pub mod validation;
pub mod web;
