//! End-to-end setup runs against a mock Hetzner Cloud API.

use hcloud_api::{HcloudClient, HcloudClientBuilder, ResourceEncoding};
use hcloud_core::ids::ServerId;
use hcloud_core::Error;
use moveglobe_infra::config::{default_rules, InfraConfig};
use moveglobe_infra::reconcile::{AttachStatus, DesiredState};
use moveglobe_infra::Reconciler;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SERVER_ID: u64 = 66_631_999;
const PUBLIC_KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5 deploy@moveglobe";

fn client(server: &MockServer) -> HcloudClient {
    HcloudClientBuilder::new(server.uri())
        .unwrap()
        .with_token("test-token")
        .build()
        .unwrap()
}

fn desired() -> DesiredState {
    let config = InfraConfig::default();
    DesiredState {
        server_id: config.server_id,
        ssh_key_name: config.ssh_key.name,
        public_key: PUBLIC_KEY.to_string(),
        firewall_name: config.firewall.name,
        firewall_rules: config.firewall.rules,
    }
}

fn server_json() -> Value {
    json!({
        "server": {
            "id": SERVER_ID,
            "name": "moveglobe-web",
            "status": "running",
            "created": "2024-05-01T10:00:00+00:00",
            "public_net": {
                "ipv4": {"ip": "116.203.87.132", "blocked": false, "dns_ptr": "static.example"},
                "ipv6": {"ip": "2a01:4f8::/64", "blocked": false}
            },
            "server_type": {"name": "cx22", "cores": 2, "memory": 4.0, "disk": 40},
            "datacenter": {"name": "nbg1-dc3", "location": {"name": "nbg1"}},
            "labels": {}
        }
    })
}

fn expected_rules() -> Value {
    let ports = ["22", "80", "443", "2222", "5000"];
    Value::Array(
        ports
            .iter()
            .map(|port| {
                json!({
                    "direction": "in",
                    "protocol": "tcp",
                    "port": port,
                    "source_ips": ["0.0.0.0/0", "::/0"]
                })
            })
            .collect(),
    )
}

fn empty_page(key: &str) -> Value {
    json!({
        key: [],
        "meta": {"pagination": {"page": 1, "per_page": 50, "next_page": null}}
    })
}

async fn mount_server(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/servers/{SERVER_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(server_json()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn fresh_account_creates_key_and_firewall_and_attaches() {
    let server = MockServer::start().await;
    mount_server(&server).await;

    Mock::given(method("GET"))
        .and(path("/ssh_keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_page("ssh_keys")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/firewalls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_page("firewalls")))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ssh_keys"))
        .and(body_json(json!({"name": "moveglobe-deploy", "public_key": PUBLIC_KEY})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "ssh_key": {
                "id": 2323,
                "name": "moveglobe-deploy",
                "fingerprint": "b7:2f:30:a0:2f:6c:58:6c:21:04:58:61:ba:06:3b:2f",
                "public_key": PUBLIC_KEY,
                "labels": {}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/firewalls"))
        .and(body_json(json!({"name": "moveglobe-firewall", "rules": expected_rules()})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "firewall": {
                "id": 38,
                "name": "moveglobe-firewall",
                "rules": expected_rules(),
                "applied_to": [],
                "labels": {}
            },
            "actions": []
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/firewalls/38/actions/apply_to_resources"))
        .and(body_json(json!({
            "apply_to": [{"type": "server", "server": {"id": SERVER_ID}}]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "actions": [{
                "id": 13,
                "command": "apply_firewall",
                "status": "running",
                "progress": 0,
                "resources": [{"id": SERVER_ID, "type": "server"}, {"id": 38, "type": "firewall"}],
                "error": null
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let report = Reconciler::new(client(&server))
        .setup(&desired())
        .await
        .unwrap();

    assert!(report.server.firewalls.is_empty());
    assert!(report.ssh_key.as_ref().unwrap().was_created());
    let firewall = report.firewall.as_ref().unwrap();
    assert!(firewall.was_created());
    assert_eq!(firewall.resource().rules, default_rules());
    assert_eq!(report.attachment, AttachStatus::Applied(ResourceEncoding::Nested));
    assert!(report.is_complete());
}

#[tokio::test]
async fn rerun_reuses_everything_and_reapplies() {
    let server = MockServer::start().await;
    mount_server(&server).await;

    Mock::given(method("GET"))
        .and(path("/ssh_keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ssh_keys": [{"id": 2323, "name": "renamed-by-hand", "public_key": format!("{PUBLIC_KEY}\n")}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/firewalls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "firewalls": [{
                "id": 38,
                "name": "moveglobe-firewall",
                "rules": [{"direction": "in", "protocol": "tcp", "port": "22", "source_ips": ["10.0.0.0/8"]}],
                "applied_to": [{"type": "server", "server": {"id": SERVER_ID}}]
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ssh_keys"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/firewalls"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/firewalls/38/actions/apply_to_resources"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"actions": []})))
        .expect(1)
        .mount(&server)
        .await;

    let report = Reconciler::new(client(&server))
        .setup(&desired())
        .await
        .unwrap();

    assert!(report.server.firewalls.contains("moveglobe-firewall"));
    assert_eq!(report.ssh_key.as_ref().unwrap().label(), "found");
    let firewall = report.firewall.as_ref().unwrap();
    assert_eq!(firewall.label(), "found");
    assert_eq!(firewall.resource().rules.len(), 1);
    assert!(report.is_complete());
}

#[tokio::test]
async fn missing_server_stops_before_any_change() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/servers/{SERVER_ID}")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": "not_found", "message": "server not found", "details": null}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ssh_keys"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let err = Reconciler::new(client(&server))
        .setup(&desired())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn apply_firewall_falls_back_to_alternative_encoding() {
    let server = MockServer::start().await;
    mount_server(&server).await;

    Mock::given(method("GET"))
        .and(path("/firewalls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "firewalls": [{"id": 38, "name": "moveglobe-firewall", "rules": [], "applied_to": []}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/firewalls/38/actions/apply_to_resources"))
        .and(body_json(json!({
            "apply_to": [{"type": "server", "server": {"id": SERVER_ID}}]
        })))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": "invalid_input", "message": "invalid input in field 'apply_to'"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/firewalls/38/actions/apply_to_resources"))
        .and(body_json(json!({
            "apply_to": [{"type": "server", "id": SERVER_ID}]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"actions": []})))
        .expect(1)
        .mount(&server)
        .await;

    let report = Reconciler::new(client(&server))
        .apply_firewall("moveglobe-firewall", ServerId::new(SERVER_ID))
        .await
        .unwrap();
    assert_eq!(report.attachment, Ok(ResourceEncoding::Flat));
}

#[tokio::test]
async fn unavailable_firewall_is_recorded_not_fatal() {
    let server = MockServer::start().await;
    mount_server(&server).await;

    Mock::given(method("GET"))
        .and(path("/ssh_keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_page("ssh_keys")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/firewalls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_page("firewalls")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ssh_keys"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "ssh_key": {"id": 2323, "name": "moveglobe-deploy", "public_key": PUBLIC_KEY}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/firewalls"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": "resource_unavailable", "message": "firewalls currently unavailable"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let report = Reconciler::new(client(&server))
        .setup(&desired())
        .await
        .unwrap();

    assert!(report.ssh_key.as_ref().unwrap().was_created());
    match &report.firewall {
        Err(Error::CreationFailed { resource, message }) => {
            assert_eq!(resource, "firewall");
            assert!(message.contains("resource_unavailable"));
        }
        other => panic!("expected CreationFailed, got {other:?}"),
    }
    assert_eq!(report.attachment, AttachStatus::Skipped);
    assert!(!report.is_complete());
}
