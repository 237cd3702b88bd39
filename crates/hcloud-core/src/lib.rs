//! # hcloud-core
//!
//! Core types and utilities for working with the Hetzner Cloud API.
//!
//! This crate provides the shared error taxonomy, client configuration, typed
//! resource identifiers and the authenticated HTTP transport used by
//! `hcloud-api`.
//!
//! ## Modules
//!
//! - [`error`] - Error types and provider error classification
//! - [`ids`] - Strongly-typed numeric identifiers for Hetzner resources
//! - [`config`] - Connection configuration (endpoint, token, paging)
//! - [`client`] - HTTP client configuration and request execution
//! - [`query`] - Query parameter builder and list parameters

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod ids;
pub mod query;

// Re-export commonly used types
pub use error::{Error, Result};
