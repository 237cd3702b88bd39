//! Human-readable progress reports for the CLI.

use hcloud_api::{Firewall, ResourceEncoding, SshKey};
use hcloud_core::Result;

use crate::config::SshKeyConfig;
use crate::reconcile::{ApplyReport, AttachStatus, Provision, ReconcileReport, ServerSummary};

const SETUP_BANNER: &str = "=== MoveGlobe Infrastructure Setup ===";

/// Server details and attached firewalls.
#[must_use]
pub fn render_server(summary: &ServerSummary) -> String {
    let server = &summary.server;
    let firewalls = if summary.firewalls.is_empty() {
        "None".to_string()
    } else {
        summary
            .firewalls
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };

    [
        format!("Server: {}", server.name),
        format!("  ID: {}", server.id),
        format!("  Status: {}", server.status),
        format!("  IP: {}", server.ipv4().unwrap_or("No IPv4")),
        format!("  Type: {}", server.server_type.name),
        format!("  Datacenter: {}", server.datacenter.name),
        format!("  Firewalls: {firewalls}"),
    ]
    .join("\n")
}

fn ssh_key_line(outcome: &Result<Provision<SshKey>>) -> String {
    match outcome {
        Ok(provision) => {
            let key = provision.resource();
            format!("SSH key: {} {} (ID: {})", provision.label(), key.name, key.id)
        }
        Err(err) => format!("SSH key: failed: {err}"),
    }
}

fn firewall_line(outcome: &Result<Provision<Firewall>>) -> String {
    match outcome {
        Ok(provision) => {
            let firewall = provision.resource();
            format!(
                "Firewall: {} {} (ID: {}, {} rules)",
                provision.label(),
                firewall.name,
                firewall.id,
                firewall.rules.len()
            )
        }
        Err(err) => format!("Firewall: failed: {err}"),
    }
}

fn applied_line(encoding: ResourceEncoding, firewall: &str, server: &str) -> String {
    match encoding {
        ResourceEncoding::Nested => format!("Attachment: applied {firewall} to {server}"),
        ResourceEncoding::Flat => {
            format!("Attachment: applied {firewall} to {server} using alternative encoding")
        }
    }
}

/// Full setup report, ending with next steps when every step succeeded.
#[must_use]
pub fn render_setup(report: &ReconcileReport, ssh_key: &SshKeyConfig) -> String {
    let server = &report.server.server;
    let mut lines = vec![
        SETUP_BANNER.to_string(),
        String::new(),
        render_server(&report.server),
        String::new(),
        ssh_key_line(&report.ssh_key),
        firewall_line(&report.firewall),
    ];

    lines.push(match (&report.attachment, &report.firewall) {
        (AttachStatus::Applied(encoding), Ok(firewall)) => {
            applied_line(*encoding, &firewall.resource().name, &server.name)
        }
        (AttachStatus::Applied(_), Err(_)) => "Attachment: applied".to_string(),
        (AttachStatus::Skipped, _) => "Attachment: skipped (no firewall available)".to_string(),
        (AttachStatus::Failed(err), _) => format!("Attachment: failed: {err}"),
    });
    lines.push(String::new());

    if report.is_complete() {
        let ip = server.ipv4().unwrap_or("<server-ip>");
        lines.push("=== Infrastructure Setup Complete ===".to_string());
        lines.push(String::new());
        lines.push("Next steps:".to_string());
        lines.push(format!(
            "1. SSH into the server: ssh -i {} root@{ip}",
            ssh_key.identity_path().display()
        ));
        lines.push("2. Run the deployment script on the server".to_string());
        lines.push(format!("3. Configure your domain to point to {ip}"));
    } else {
        lines.push("=== Infrastructure Setup Finished With Errors ===".to_string());
    }

    lines.join("\n")
}

/// Report for attaching an existing firewall.
#[must_use]
pub fn render_apply(report: &ApplyReport) -> String {
    match &report.attachment {
        Ok(encoding) => applied_line(*encoding, &report.firewall.name, &report.server.name),
        Err(err) => format!("Attachment: failed: {err}"),
    }
}
