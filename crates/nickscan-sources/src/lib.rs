//! Nickscan Sources - Concrete data sources for username scanning.
//!
//! This crate provides the adapters the scanner fans out to, plus the pieces
//! a front end needs around them:
//!
//! - [`GithubSource`]: GitHub REST API, scanned in parallel
//! - [`VkSource`]: VK `users.get`, one bulk call per batch
//! - [`TelegramSource`]: `t.me` preview pages, strictly paced
//! - [`SourceRegistry`]: builds adapters from configuration and runs their
//!   lifecycle hooks
//! - [`variations`]: username variation generator

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod common;
pub mod error;
pub mod github;
pub mod registry;
pub mod telegram;
pub mod variations;
pub mod vk;

pub use error::{Result, SourceError};
pub use github::GithubSource;
pub use registry::{SourceRegistry, KNOWN_SOURCES};
pub use telegram::TelegramSource;
pub use vk::VkSource;
