//! Idempotent reconciliation of the deploy key, the firewall and its
//! attachment to the server.
//!
//! Each step looks at current remote state and issues at most one create (or,
//! for the attachment, one apply plus one alternative). Provider rejections
//! stay inside the step that caused them; transport, authentication and
//! configuration failures end the run.

use hcloud_api::{Firewall, FirewallRule, ResourceEncoding, ResourceRef, Server, SshKey};
use hcloud_core::ids::ServerId;
use hcloud_core::{Error, Result};
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::provider::CloudApi;

/// Fully resolved configuration for one setup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredState {
    /// Server the firewall must be attached to.
    pub server_id: ServerId,
    /// Name for the SSH key if it has to be created.
    pub ssh_key_name: String,
    /// Public key material, trimmed.
    pub public_key: String,
    /// Firewall name.
    pub firewall_name: String,
    /// Rules used only when the firewall has to be created.
    pub firewall_rules: Vec<FirewallRule>,
}

/// Whether a resource already existed or was created by this run.
#[derive(Debug, Clone, PartialEq)]
pub enum Provision<T> {
    /// Already present; left untouched.
    Found(T),
    /// Created by this run.
    Created(T),
}

impl<T> Provision<T> {
    /// Borrow the resource.
    pub const fn resource(&self) -> &T {
        match self {
            Self::Found(resource) | Self::Created(resource) => resource,
        }
    }

    /// Take the resource.
    pub fn into_resource(self) -> T {
        match self {
            Self::Found(resource) | Self::Created(resource) => resource,
        }
    }

    /// True when this run created the resource.
    pub const fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    /// `found` or `created`.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Found(_) => "found",
            Self::Created(_) => "created",
        }
    }
}

/// Outcome of the attach step within a setup run.
#[derive(Debug, Clone, PartialEq)]
pub enum AttachStatus {
    /// Applied using the given encoding.
    Applied(ResourceEncoding),
    /// Not attempted because no firewall was available.
    Skipped,
    /// Both encodings were rejected.
    Failed(Error),
}

/// A server together with the names of firewalls applied to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSummary {
    pub server: Server,
    pub firewalls: BTreeSet<String>,
}

/// Outcome of every step of a setup run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileReport {
    /// State of the server before any change.
    pub server: ServerSummary,
    pub ssh_key: Result<Provision<SshKey>>,
    pub firewall: Result<Provision<Firewall>>,
    pub attachment: AttachStatus,
}

impl ReconcileReport {
    /// True when every step succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.ssh_key.is_ok()
            && self.firewall.is_ok()
            && matches!(self.attachment, AttachStatus::Applied(_))
    }
}

/// Outcome of attaching an existing firewall to the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyReport {
    pub firewall: Firewall,
    pub server: Server,
    pub attachment: Result<ResourceEncoding>,
}

/// Names of firewalls directly applied to `server`.
#[must_use]
pub fn firewalls_applied_to(firewalls: &[Firewall], server: ServerId) -> BTreeSet<String> {
    firewalls
        .iter()
        .filter(|firewall| firewall.is_applied_to_server(server))
        .map(|firewall| firewall.name.clone())
        .collect()
}

/// Keep fatal errors fatal; hand everything else back as the step's result.
fn contain<T>(result: Result<T>) -> Result<Result<T>> {
    match result {
        Err(err) if err.is_fatal() => Err(err),
        other => Ok(other),
    }
}

/// Converges remote state toward a [`DesiredState`] through a [`CloudApi`].
#[derive(Debug)]
pub struct Reconciler<A> {
    api: A,
}

impl<A: CloudApi> Reconciler<A> {
    /// Create a reconciler over the given provider.
    pub const fn new(api: A) -> Self {
        Self { api }
    }

    /// Borrow the provider.
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Reuse the key carrying `public_key`, or create it as `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CreationFailed`] when the provider rejects the
    /// creation, and fatal errors unchanged.
    pub async fn ensure_ssh_key(&self, public_key: &str, name: &str) -> Result<Provision<SshKey>> {
        let public_key = public_key.trim();
        let keys = self.api.list_ssh_keys().await?;
        if let Some(key) = keys.into_iter().find(|key| key.matches_public_key(public_key)) {
            info!(key = %key.name, id = %key.id, "SSH key already exists");
            return Ok(Provision::Found(key));
        }

        match self.api.create_ssh_key(name, public_key).await {
            Ok(key) => {
                info!(key = %key.name, id = %key.id, "created SSH key");
                Ok(Provision::Created(key))
            }
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!(key_name = name, code = err.error_code(), error = %err, "SSH key creation rejected");
                Err(Error::CreationFailed {
                    resource: "SSH key".into(),
                    message: err.to_string(),
                })
            }
        }
    }

    /// Find a firewall by exact, case-sensitive name.
    ///
    /// # Errors
    ///
    /// Returns any error from listing firewalls.
    pub async fn find_firewall(&self, name: &str) -> Result<Option<Firewall>> {
        let firewalls = self.api.list_firewalls().await?;
        Ok(firewalls.into_iter().find(|firewall| firewall.name == name))
    }

    /// Reuse the firewall called `name` as-is, or create it with `rules`.
    ///
    /// An existing firewall's rules are never compared or updated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CreationFailed`] when the provider rejects the
    /// creation, and fatal errors unchanged.
    pub async fn ensure_firewall(
        &self,
        name: &str,
        rules: &[FirewallRule],
    ) -> Result<Provision<Firewall>> {
        if let Some(firewall) = self.find_firewall(name).await? {
            info!(firewall = %firewall.name, id = %firewall.id, "firewall already exists");
            return Ok(Provision::Found(firewall));
        }

        match self.api.create_firewall(name, rules).await {
            Ok(firewall) => {
                info!(
                    firewall = %firewall.name,
                    id = %firewall.id,
                    rules = firewall.rules.len(),
                    "created firewall"
                );
                Ok(Provision::Created(firewall))
            }
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!(firewall = name, code = err.error_code(), error = %err, "firewall creation rejected");
                Err(Error::CreationFailed {
                    resource: "firewall".into(),
                    message: err.to_string(),
                })
            }
        }
    }

    /// Fetch the server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the provider has no such server.
    pub async fn get_server(&self, id: ServerId) -> Result<Server> {
        let server = self.api.get_server(id).await?;
        info!(id = %server.id, server = %server.name, status = %server.status, "found server");
        Ok(server)
    }

    /// Apply `firewall` to `server`, trying the alternative resource
    /// encoding once if the primary one is rejected.
    ///
    /// Attachment is not pre-checked; applying an already attached firewall
    /// is left to the provider.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttachFailed`] carrying both messages when both
    /// encodings fail.
    pub async fn attach_firewall_to_server(
        &self,
        firewall: &Firewall,
        server: &Server,
    ) -> Result<ResourceEncoding> {
        let primary = ResourceRef::server(server.id, ResourceEncoding::Nested);
        let primary_err = match self
            .api
            .apply_firewall_to_resources(firewall.id, &[primary])
            .await
        {
            Ok(actions) => {
                info!(firewall = %firewall.name, server = %server.name, actions = actions.len(), "firewall applied");
                return Ok(primary.encoding);
            }
            Err(err) => err,
        };
        warn!(
            firewall = %firewall.name,
            code = primary_err.error_code(),
            error = %primary_err,
            "apply rejected, trying alternative encoding"
        );

        let fallback = ResourceRef::server(server.id, ResourceEncoding::Flat);
        match self
            .api
            .apply_firewall_to_resources(firewall.id, &[fallback])
            .await
        {
            Ok(actions) => {
                info!(firewall = %firewall.name, server = %server.name, actions = actions.len(), "firewall applied using alternative encoding");
                Ok(fallback.encoding)
            }
            Err(fallback_err) => {
                warn!(firewall = %firewall.name, error = %fallback_err, "alternative encoding also rejected");
                Err(Error::AttachFailed {
                    primary: primary_err.to_string(),
                    fallback: fallback_err.to_string(),
                })
            }
        }
    }

    /// Names of all firewalls currently applied to `server`.
    ///
    /// # Errors
    ///
    /// Returns any error from listing firewalls.
    pub async fn describe_server_firewalls(&self, server: &Server) -> Result<BTreeSet<String>> {
        let firewalls = self.api.list_firewalls().await?;
        Ok(firewalls_applied_to(&firewalls, server.id))
    }

    /// Fetch the server and the firewalls applied to it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for a missing server and any list error.
    pub async fn describe(&self, id: ServerId) -> Result<ServerSummary> {
        let server = self.get_server(id).await?;
        let firewalls = self.describe_server_firewalls(&server).await?;
        Ok(ServerSummary { server, firewalls })
    }

    /// Run the full setup: describe the server, then ensure the SSH key,
    /// ensure the firewall, and attach it if one is available.
    ///
    /// # Errors
    ///
    /// Fails only when the server cannot be described or a fatal error
    /// occurs. Step failures are recorded in the report.
    pub async fn setup(&self, desired: &DesiredState) -> Result<ReconcileReport> {
        let server = self.describe(desired.server_id).await?;

        let ssh_key =
            contain(self.ensure_ssh_key(&desired.public_key, &desired.ssh_key_name).await)?;
        let firewall = contain(
            self.ensure_firewall(&desired.firewall_name, &desired.firewall_rules)
                .await,
        )?;

        let attachment = match &firewall {
            Ok(provision) => {
                match self
                    .attach_firewall_to_server(provision.resource(), &server.server)
                    .await
                {
                    Ok(encoding) => AttachStatus::Applied(encoding),
                    Err(err) => AttachStatus::Failed(err),
                }
            }
            Err(_) => {
                info!("skipping attachment, no firewall available");
                AttachStatus::Skipped
            }
        };

        Ok(ReconcileReport {
            server,
            ssh_key,
            firewall,
            attachment,
        })
    }

    /// Attach the existing firewall `firewall_name` to the server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if either the firewall or the server is
    /// missing. Attach failures are recorded in the report.
    pub async fn apply_firewall(
        &self,
        firewall_name: &str,
        server_id: ServerId,
    ) -> Result<ApplyReport> {
        let firewall = self
            .find_firewall(firewall_name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("firewall {firewall_name}")))?;
        let server = self.get_server(server_id).await?;
        let attachment = self.attach_firewall_to_server(&firewall, &server).await;

        Ok(ApplyReport {
            firewall,
            server,
            attachment,
        })
    }
}
