pub mod auth;
pub mod fetch;
pub mod pages;
