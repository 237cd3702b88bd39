//! The provider capabilities the reconciler depends on.

use async_trait::async_trait;
use hcloud_api::{
    Action, CreateFirewallRequest, CreateSshKeyRequest, Firewall, FirewallRule, HcloudClient,
    ResourceRef, Server, SshKey,
};
use hcloud_core::ids::{FirewallId, ServerId};
use hcloud_core::Result;

/// Remote operations needed to reconcile SSH keys, firewalls and attachments.
///
/// List operations return every resource of their type, across all pages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// All SSH keys in the project.
    async fn list_ssh_keys(&self) -> Result<Vec<SshKey>>;

    /// Create one SSH key.
    async fn create_ssh_key(&self, name: &str, public_key: &str) -> Result<SshKey>;

    /// All firewalls with their rules and applied-to lists.
    async fn list_firewalls(&self) -> Result<Vec<Firewall>>;

    /// Create one firewall with exactly the given rules.
    async fn create_firewall(&self, name: &str, rules: &[FirewallRule]) -> Result<Firewall>;

    /// Attach a firewall to the given resources.
    async fn apply_firewall_to_resources(
        &self,
        firewall: FirewallId,
        resources: &[ResourceRef],
    ) -> Result<Vec<Action>>;

    /// Fetch a server, or [`hcloud_core::Error::NotFound`].
    async fn get_server(&self, id: ServerId) -> Result<Server>;
}

#[async_trait]
impl CloudApi for HcloudClient {
    async fn list_ssh_keys(&self) -> Result<Vec<SshKey>> {
        self.list_all_ssh_keys().await
    }

    async fn create_ssh_key(&self, name: &str, public_key: &str) -> Result<SshKey> {
        let request = CreateSshKeyRequest {
            name: name.to_string(),
            public_key: public_key.to_string(),
            labels: None,
        };
        HcloudClient::create_ssh_key(self, &request).await
    }

    async fn list_firewalls(&self) -> Result<Vec<Firewall>> {
        self.list_all_firewalls().await
    }

    async fn create_firewall(&self, name: &str, rules: &[FirewallRule]) -> Result<Firewall> {
        let request = CreateFirewallRequest {
            name: name.to_string(),
            rules: rules.to_vec(),
            labels: None,
            apply_to: Vec::new(),
        };
        HcloudClient::create_firewall(self, &request)
            .await
            .map(|response| response.firewall)
    }

    async fn apply_firewall_to_resources(
        &self,
        firewall: FirewallId,
        resources: &[ResourceRef],
    ) -> Result<Vec<Action>> {
        HcloudClient::apply_firewall_to_resources(self, firewall, resources).await
    }

    async fn get_server(&self, id: ServerId) -> Result<Server> {
        HcloudClient::get_server(self, id).await
    }
}
