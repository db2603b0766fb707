//! coursekit Core
//!
//! Course player and course search building blocks.
//! Handles transcript lookup for the video player, paged faceted course
//! search, and persisted settings.

pub mod captions;
pub mod search;
pub mod settings;

mod error;
pub use error::*;
