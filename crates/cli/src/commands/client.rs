//! Client Commands

use anyhow::Result;
use clap::Subcommand;
use peerwarden_core::{ClientArtifact, ClientManager, DriftReport, ProvisionedClient, RevokedClient};
use serde::Serialize;

use crate::output::{
    print_config_text, print_notice, print_record, print_records, print_refusal, Notice, OutputFormat,
    Refusal, TableDisplay,
};

#[derive(Subcommand)]
pub enum ClientCommands {
    /// Provision a new client
    New {
        /// Client name (used as the config file name)
        name: String,
    },

    /// Revoke a client and delete its files
    Revoke {
        /// Client name
        name: String,
    },

    /// Show a client's config
    Show {
        /// Client name
        name: String,

        /// Print the config text instead of the summary
        #[arg(long)]
        contents: bool,
    },

    /// List provisioned clients
    List,

    /// Compare daemon peers with client configs
    Audit,
}

impl TableDisplay for ProvisionedClient {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Address", "Public Key", "Config", "QR"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.address.clone(),
            self.public_key.clone(),
            self.config_path.display().to_string(),
            self.artifact_path.display().to_string(),
        ]
    }
}

impl TableDisplay for RevokedClient {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Public Key", "Peer Removed"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.public_key.clone().unwrap_or_else(|| "-".to_string()),
            self.peer_removed.to_string(),
        ]
    }
}

impl TableDisplay for ClientArtifact {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Address", "Config", "QR"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.address.clone().unwrap_or_else(|| "-".to_string()),
            self.config_path.display().to_string(),
            self.artifact_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]
    }
}

/// Client name row for `list`
#[derive(Serialize)]
pub struct ClientName {
    pub name: String,
}

impl TableDisplay for ClientName {
    fn headers() -> Vec<&'static str> {
        vec!["Name"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.name.clone()]
    }
}

/// One drift finding for `audit`
#[derive(Serialize)]
pub struct DriftEntry {
    pub kind: &'static str,
    pub subject: String,
}

impl TableDisplay for DriftEntry {
    fn headers() -> Vec<&'static str> {
        vec!["Finding", "Subject"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.kind.to_string(), self.subject.clone()]
    }
}

fn drift_entries(report: DriftReport) -> Vec<DriftEntry> {
    let tagged = |kind: &'static str, items: Vec<String>| {
        items
            .into_iter()
            .map(move |subject| DriftEntry { kind, subject })
    };
    tagged("config without peer", report.unregistered_clients)
        .chain(tagged("peer without config", report.orphaned_peers))
        .chain(tagged("config without key", report.unreadable_clients))
        .collect()
}

pub async fn execute(cmd: ClientCommands, manager: &ClientManager, format: OutputFormat) -> Result<()> {
    match cmd {
        ClientCommands::New { name } => {
            let client = manager.create(&name).await?;
            print_notice(Notice::Done, &format!("Client {} created at {}", client.name, client.address), format);
            print_record(&client, format);
        }

        ClientCommands::Revoke { name } => match manager.revoke(&name).await? {
            Some(revoked) => {
                if !revoked.peer_removed {
                    print_notice(
                        Notice::Caution,
                        "No private key in config; daemon peer left untouched",
                        format,
                    );
                }
                print_notice(Notice::Done, &format!("Client {} removed", revoked.name), format);
                print_record(&revoked, format);
            }
            None => print_refusal(Refusal::NotFound, Some(&name), format),
        },

        ClientCommands::Show { name, contents } => match manager.fetch(&name).await? {
            Some(artifact) if contents => print_config_text(&artifact.contents),
            Some(artifact) => print_record(&artifact, format),
            None => print_refusal(Refusal::NotFound, Some(&name), format),
        },

        ClientCommands::List => {
            let names: Vec<ClientName> = manager
                .list()
                .await?
                .into_iter()
                .map(|name| ClientName { name })
                .collect();
            print_records(&names, "No clients provisioned", format);
        }

        ClientCommands::Audit => {
            let entries = drift_entries(manager.audit().await?);
            print_records(&entries, "Daemon peers and client configs agree", format);
        }
    }

    Ok(())
}
