//! # moveglobe-infra
//!
//! Idempotent setup of the MoveGlobe server's deploy key and firewall on
//! Hetzner Cloud.
//!
//! ## Modules
//!
//! - [`config`] - Declared infrastructure, loaded from TOML with production defaults
//! - [`provider`] - The cloud capabilities the reconciler depends on
//! - [`reconcile`] - Find-or-create steps and their orchestration
//! - [`report`] - Human-readable step reports

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod provider;
pub mod reconcile;
pub mod report;

pub use config::InfraConfig;
pub use provider::CloudApi;
pub use reconcile::{DesiredState, Reconciler};
