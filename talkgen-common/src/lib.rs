//! # talkgen Common Library
//!
//! Shared code for the talkgen workspace:
//! - Error and Result types
//! - Bootstrap TOML configuration and config file resolution

pub mod config;
pub mod error;

pub use error::{Error, Result};
