//! Client side of the remote template generation service.

pub mod client;
pub mod error;
pub mod service;
pub mod types;

pub use client::{ClientConfig, GenerationClient};
pub use error::{ClientError, Result};
pub use service::GenerationService;
pub use types::*;
