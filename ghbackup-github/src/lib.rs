//! gh-backup GitHub - repository listing and credential exchange
//!
//! This crate talks to the GitHub REST API: it pages through an account's
//! repository listing and can exchange a username and password for an access
//! token.

mod auth;
mod client;
mod error;
mod pager;

pub use auth::{authorization_note, Credentials};
pub use client::GitHubClient;
pub use error::{Error, Result};
pub use pager::Pager;
