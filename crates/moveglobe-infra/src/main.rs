use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hcloud_api::HcloudClientBuilder;
use hcloud_core::config::{HcloudConfig, DEFAULT_API_URL, TOKEN_ENV_VAR};
use hcloud_core::ids::ServerId;
use moveglobe_infra::report::{render_apply, render_server, render_setup};
use moveglobe_infra::{InfraConfig, Reconciler};

#[derive(Parser, Debug)]
#[command(name = "moveglobe-infra")]
#[command(author, version, about = "Idempotent SSH key and firewall setup on Hetzner Cloud", long_about = None)]
struct Cli {
    /// Hetzner Cloud API token
    #[arg(long, env = TOKEN_ENV_VAR, hide_env_values = true)]
    token: String,

    /// API base URL
    #[arg(long, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Path to a TOML file describing the server, key and firewall
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the target server id
    #[arg(long, env = "MOVEGLOBE_SERVER_ID")]
    server_id: Option<ServerId>,

    /// Log level when RUST_LOG is unset
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ensure the SSH key and firewall exist and attach the firewall to the server
    Setup,
    /// Attach the existing firewall to the server
    ApplyFirewall,
    /// Show the server and the firewalls applied to it
    Describe,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut infra = match &cli.config {
        Some(path) => InfraConfig::load(path)?,
        None => InfraConfig::default(),
    };
    if let Some(server_id) = cli.server_id {
        infra.server_id = server_id;
    }

    let hcloud = HcloudConfig::new(cli.token)?.with_api_url(cli.api_url);
    let client = HcloudClientBuilder::from_config(&hcloud)?.build()?;
    let reconciler = Reconciler::new(client);

    match cli.command {
        Command::Setup => {
            let desired = infra
                .desired_state()
                .context("Could not load the deploy public key")?;
            let report = reconciler
                .setup(&desired)
                .await
                .context("Infrastructure setup aborted")?;
            println!("{}", render_setup(&report, &infra.ssh_key));
        }
        Command::ApplyFirewall => {
            let report = reconciler
                .apply_firewall(&infra.firewall.name, infra.server_id)
                .await
                .context("Could not apply firewall")?;
            println!("{}", render_apply(&report));
        }
        Command::Describe => {
            let summary = reconciler
                .describe(infra.server_id)
                .await
                .context("Could not get server information")?;
            println!("{}", render_server(&summary));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn token_is_required_and_read_from_env() {
        Cli::command().debug_assert();

        let command = Cli::command();
        let token = command
            .get_arguments()
            .find(|arg| arg.get_id() == "token")
            .unwrap();
        assert!(token.is_required_set());
        assert_eq!(token.get_env(), Some(std::ffi::OsStr::new(TOKEN_ENV_VAR)));
    }
}
