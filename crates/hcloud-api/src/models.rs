//! Hetzner Cloud API models.

use chrono::{DateTime, Utc};
use hcloud_core::ids::{ActionId, FirewallId, ServerId, SshKeyId};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Paging metadata attached to list responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListMeta {
    /// Pagination block, absent on unpaginated responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl ListMeta {
    /// Page to request next, if any.
    #[must_use]
    pub fn next_page(&self) -> Option<u32> {
        self.pagination.as_ref().and_then(|p| p.next_page)
    }
}

/// Pagination details.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    /// Current page.
    pub page: u32,
    /// Entries per page.
    pub per_page: u32,
    /// Previous page, if any.
    #[serde(default)]
    pub previous_page: Option<u32>,
    /// Next page, if any.
    #[serde(default)]
    pub next_page: Option<u32>,
    /// Last page, if known.
    #[serde(default)]
    pub last_page: Option<u32>,
    /// Total entries, if known.
    #[serde(default)]
    pub total_entries: Option<u32>,
}

/// Error body returned with non-success responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    /// Error details.
    pub error: ApiError,
}

/// Provider error code and message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    /// Machine readable code such as `not_found` or `uniqueness_error`.
    pub code: String,
    /// Human readable message.
    pub message: String,
}

// --- SSH keys -------------------------------------------------------------

/// An SSH key stored in the project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SshKey {
    /// Key id.
    pub id: SshKeyId,
    /// Key name, unique per project.
    pub name: String,
    /// MD5 fingerprint.
    #[serde(default)]
    pub fingerprint: String,
    /// Public key in OpenSSH format.
    pub public_key: String,
    /// User labels.
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl SshKey {
    /// Whether this key carries the given public key material.
    ///
    /// Surrounding whitespace is ignored on both sides.
    #[must_use]
    pub fn matches_public_key(&self, public_key: &str) -> bool {
        self.public_key.trim() == public_key.trim()
    }
}

/// Request payload for creating an SSH key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateSshKeyRequest {
    /// Key name.
    pub name: String,
    /// Public key in OpenSSH format.
    pub public_key: String,
    /// User labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// One page of SSH keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SshKeyList {
    /// Keys on this page.
    pub ssh_keys: Vec<SshKey>,
    /// Paging metadata.
    #[serde(default)]
    pub meta: ListMeta,
}

/// Single SSH key response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SshKeyEnvelope {
    /// The key.
    pub ssh_key: SshKey,
}

// --- Firewalls ------------------------------------------------------------

/// Traffic direction of a rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Inbound traffic.
    In,
    /// Outbound traffic.
    Out,
}

/// Protocol matched by a rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP
    Tcp,
    /// UDP
    Udp,
    /// ICMP
    Icmp,
    /// ESP
    Esp,
    /// GRE
    Gre,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::In => "in",
            Self::Out => "out",
        })
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Icmp => "icmp",
            Self::Esp => "esp",
            Self::Gre => "gre",
        })
    }
}

/// A firewall rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FirewallRule {
    /// Traffic direction.
    pub direction: Direction,
    /// Matched protocol.
    pub protocol: Protocol,
    /// Port or range such as `80` or `1024-2048`; only for TCP and UDP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Allowed source CIDRs for inbound rules.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_ips: Vec<String>,
    /// Allowed destination CIDRs for outbound rules.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destination_ips: Vec<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FirewallRule {
    /// Inbound TCP rule for one port or range.
    #[must_use]
    pub fn inbound_tcp(port: impl Into<String>, source_ips: &[&str]) -> Self {
        Self {
            direction: Direction::In,
            protocol: Protocol::Tcp,
            port: Some(port.into()),
            source_ips: source_ips.iter().map(|ip| (*ip).to_string()).collect(),
            destination_ips: Vec::new(),
            description: None,
        }
    }
}

/// Server reference inside an applied-to entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerRef {
    /// Server id.
    pub id: ServerId,
}

/// Label selector inside an applied-to entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabelSelector {
    /// Selector expression.
    pub selector: String,
}

/// Resource matched through a label selector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppliedResource {
    /// Resource type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Server reference when `kind` is `server`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerRef>,
}

/// A resource a firewall is applied to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FirewallResource {
    /// Directly attached server.
    Server {
        /// The server.
        server: ServerRef,
    },
    /// Every resource matching a label selector.
    LabelSelector {
        /// The selector.
        label_selector: LabelSelector,
        /// Resources currently matched.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        applied_to_resources: Vec<AppliedResource>,
    },
    /// A resource type this crate does not model.
    #[serde(other)]
    Unknown,
}

impl FirewallResource {
    /// Whether this entry attaches the given server directly.
    #[must_use]
    pub fn is_server(&self, id: ServerId) -> bool {
        matches!(self, Self::Server { server } if server.id == id)
    }
}

/// A firewall.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Firewall {
    /// Firewall id.
    pub id: FirewallId,
    /// Firewall name, unique per project.
    pub name: String,
    /// Rules in evaluation order.
    #[serde(default)]
    pub rules: Vec<FirewallRule>,
    /// Resources this firewall is applied to.
    #[serde(default)]
    pub applied_to: Vec<FirewallResource>,
    /// User labels.
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl Firewall {
    /// Whether the firewall is applied directly to the given server.
    #[must_use]
    pub fn is_applied_to_server(&self, id: ServerId) -> bool {
        self.applied_to.iter().any(|resource| resource.is_server(id))
    }
}

/// How a server is referenced in an apply request.
///
/// The provider has accepted two shapes for the same reference over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceEncoding {
    /// `{"type":"server","server":{"id":N}}`
    Nested,
    /// `{"type":"server","id":N}`
    Flat,
}

impl fmt::Display for ResourceEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nested => "nested",
            Self::Flat => "flat",
        })
    }
}

/// A server reference in an apply request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRef {
    /// Target server.
    pub server: ServerId,
    /// Wire shape.
    pub encoding: ResourceEncoding,
}

impl ResourceRef {
    /// Reference a server with the given encoding.
    #[must_use]
    pub const fn server(server: ServerId, encoding: ResourceEncoding) -> Self {
        Self { server, encoding }
    }
}

impl Serialize for ResourceRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ResourceRef", 2)?;
        state.serialize_field("type", "server")?;
        match self.encoding {
            ResourceEncoding::Nested => {
                state.serialize_field("server", &ServerRef { id: self.server })?;
            }
            ResourceEncoding::Flat => state.serialize_field("id", &self.server)?,
        }
        state.end()
    }
}

/// Request payload for creating a firewall.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreateFirewallRequest {
    /// Firewall name.
    pub name: String,
    /// Rules.
    pub rules: Vec<FirewallRule>,
    /// User labels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
    /// Resources to apply to on creation.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub apply_to: Vec<ResourceRef>,
}

/// Response to a firewall creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateFirewallResponse {
    /// The new firewall.
    pub firewall: Firewall,
    /// Actions started by the creation.
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// One page of firewalls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FirewallList {
    /// Firewalls on this page.
    pub firewalls: Vec<Firewall>,
    /// Paging metadata.
    #[serde(default)]
    pub meta: ListMeta,
}

/// Request payload for `apply_to_resources`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ApplyToResourcesRequest {
    /// Target resources.
    pub apply_to: Vec<ResourceRef>,
}

// --- Servers --------------------------------------------------------------

/// Server lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// Running
    Running,
    /// Initializing
    Initializing,
    /// Starting
    Starting,
    /// Stopping
    Stopping,
    /// Powered off
    Off,
    /// Deleting
    Deleting,
    /// Migrating
    Migrating,
    /// Rebuilding
    Rebuilding,
    /// Any other status
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Running => "running",
            Self::Initializing => "initializing",
            Self::Starting => "starting",
            Self::Stopping => "stopping",
            Self::Off => "off",
            Self::Deleting => "deleting",
            Self::Migrating => "migrating",
            Self::Rebuilding => "rebuilding",
            Self::Unknown => "unknown",
        })
    }
}

/// Public IPv4 assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ipv4 {
    /// Address.
    pub ip: String,
    /// Whether the address is blocked.
    #[serde(default)]
    pub blocked: bool,
    /// Reverse DNS entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_ptr: Option<String>,
}

/// Public IPv6 assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ipv6 {
    /// Network.
    pub ip: String,
    /// Whether the network is blocked.
    #[serde(default)]
    pub blocked: bool,
}

/// Public network configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicNet {
    /// IPv4, if assigned.
    #[serde(default)]
    pub ipv4: Option<Ipv4>,
    /// IPv6, if assigned.
    #[serde(default)]
    pub ipv6: Option<Ipv6>,
}

/// Server type (plan).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerType {
    /// Name such as `cx22`.
    pub name: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// CPU cores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cores: Option<u32>,
    /// Memory in GB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<f64>,
    /// Disk in GB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<u64>,
}

/// Location of a datacenter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Location {
    /// Name such as `nbg1`.
    pub name: String,
    /// City.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// ISO country code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Datacenter hosting a server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Datacenter {
    /// Name such as `nbg1-dc3`.
    pub name: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// A server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Server {
    /// Server id.
    pub id: ServerId,
    /// Server name.
    pub name: String,
    /// Status.
    pub status: ServerStatus,
    /// Public network.
    #[serde(default)]
    pub public_net: PublicNet,
    /// Server type.
    pub server_type: ServerType,
    /// Datacenter.
    pub datacenter: Datacenter,
    /// User labels.
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl Server {
    /// Public IPv4 address, if any.
    #[must_use]
    pub fn ipv4(&self) -> Option<&str> {
        self.public_net.ipv4.as_ref().map(|v4| v4.ip.as_str())
    }
}

/// Single server response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerEnvelope {
    /// The server.
    pub server: Server,
}

// --- Actions --------------------------------------------------------------

/// Action status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    /// In progress
    Running,
    /// Finished successfully
    Success,
    /// Finished with an error
    Error,
    /// Any other status
    #[serde(other)]
    Unknown,
}

/// Resource affected by an action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionResource {
    /// Resource id.
    pub id: u64,
    /// Resource type.
    #[serde(rename = "type")]
    pub kind: String,
}

/// An asynchronous provider action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Action {
    /// Action id.
    pub id: ActionId,
    /// Command such as `apply_firewall`.
    pub command: String,
    /// Status.
    pub status: ActionStatus,
    /// Progress in percent.
    #[serde(default)]
    pub progress: u8,
    /// Start time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<DateTime<Utc>>,
    /// Finish time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<DateTime<Utc>>,
    /// Affected resources.
    #[serde(default)]
    pub resources: Vec<ActionResource>,
    /// Failure details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

/// List of actions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionList {
    /// Actions.
    pub actions: Vec<Action>,
}
