#![allow(clippy::collapsible_if)]
pub mod config;
pub mod error;
pub mod page;
pub mod routes;
pub mod session;
pub mod state;
pub mod streaming;
