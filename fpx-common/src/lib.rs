//! # FPX Common Library
//!
//! Shared code for the FPX fiber-photometry services:
//! - Error and result types
//! - Bootstrap configuration loading and root folder resolution
//! - Job event types (FpxEvent enum) and the EventBus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
