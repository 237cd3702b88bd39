//! Hetzner Cloud API client and data models.
//!
//! Provides typed structures and an asynchronous client for the SSH key,
//! firewall and server endpoints of the Hetzner Cloud API.

#![deny(missing_docs)]

pub mod client;
pub mod models;

pub use client::{HcloudClient, HcloudClientBuilder};
pub use models::{
    Action, ActionStatus, CreateFirewallRequest, CreateFirewallResponse, CreateSshKeyRequest,
    Direction, Firewall, FirewallResource, FirewallRule, Protocol, ResourceEncoding, ResourceRef,
    Server, ServerStatus, SshKey,
};

/// Convenient result alias that reuses the shared error type.
pub type Result<T> = hcloud_core::Result<T>;
