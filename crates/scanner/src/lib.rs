#![allow(clippy::collapsible_if)]
pub mod browse;
pub mod extensions;
pub mod resolve;

use thiserror::Error;

pub use browse::{BrowseEntry, Listing, list};
pub use resolve::MediaRoot;

#[derive(Error, Debug)]
pub enum BrowseError {
    #[error("path escapes the media root: {0}")]
    PathTraversal(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
