//! AMQ Tool
//!
//! Command line helper for inspecting envelopes and queue names.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use amq_client::{Config, Engine, Processor, ProviderRegistry};
use amq_protocol::{
    BoxError, DuplexMessage, Envelope, Message, MsgBody, MsgId, Node, QueueName, Signer,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

/// AMQ Tool - sign, verify and route AMQ envelopes.
#[derive(Parser, Debug)]
#[command(name = "amq-tool")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Recompute the signature of an envelope JSON file
    Sign {
        /// Envelope JSON file
        file: PathBuf,

        /// Signing secret (defaults to security.signing_secret)
        #[arg(long)]
        secret: Option<String>,
    },

    /// Check the signature of an envelope JSON file
    Verify {
        /// Envelope JSON file
        file: PathBuf,

        /// Signing secret (defaults to security.signing_secret)
        #[arg(long)]
        secret: Option<String>,
    },

    /// Build a queue name
    QueueName {
        /// Four-digit system id
        #[arg(long)]
        system_id: String,

        /// Node (biz, fund, opt)
        #[arg(long)]
        node: Node,

        /// Partition index for partitioned nodes
        #[arg(long)]
        partition: Option<u32>,
    },

    /// Validate a queue name against a partition layout
    CheckQueue {
        /// Queue name to check
        name: String,

        /// Number of partitions on the node
        #[arg(long, default_value = "1")]
        partitions: u32,
    },

    /// Run a duplex round trip between two systems over the in-memory transport
    Demo {
        /// Seconds to wait for the handshake to finish
        #[arg(long, default_value = "5")]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };
    config.apply_env_overrides();

    let filter = if cli.verbose {
        "debug".to_string()
    } else {
        config.client.log_level.clone()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Sign { file, secret } => {
            let signer = resolve_signer(secret, &config)?;
            let envelope = read_envelope(&file)?.signed_with(&signer);
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        Commands::Verify { file, secret } => {
            let signer = resolve_signer(secret, &config)?;
            let envelope = read_envelope(&file)?;
            signer.verify(&envelope)?;
            println!(
                "Signature OK: {} {} message {} at {}",
                envelope.category(),
                envelope.genre(),
                envelope.msg_id(),
                envelope.phase()
            );
        }
        Commands::QueueName {
            system_id,
            node,
            partition,
        } => {
            let name = match partition {
                Some(index) => QueueName::partitioned(&system_id, node, index)?,
                None => QueueName::new(&system_id, node)?,
            };
            println!("{}", name);
        }
        Commands::CheckQueue { name, partitions } => {
            let parsed = QueueName::validate(&name, partitions)?;
            println!("System ID: {}", parsed.system_id());
            println!("Node:      {}", parsed.node());
            match parsed.partition() {
                Some(index) => println!("Partition: {}", index),
                None => println!("Partition: none"),
            }
        }
        Commands::Demo { timeout } => {
            run_demo(Duration::from_secs(timeout)).await?;
        }
    }

    Ok(())
}

fn resolve_signer(secret: Option<String>, config: &Config) -> anyhow::Result<Signer> {
    let secret = secret.unwrap_or_else(|| config.security.signing_secret.clone());
    if secret.is_empty() {
        anyhow::bail!("No signing secret: pass --secret or set security.signing_secret");
    }
    Ok(Signer::new(secret))
}

fn read_envelope(path: &Path) -> anyhow::Result<Envelope> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read envelope file: {}", path.display()))?;
    Envelope::from_json(&contents)
        .with_context(|| format!("Failed to decode envelope: {}", path.display()))
}

/// Recipient side of the demo transfer.
struct Ledger;

impl Processor for Ledger {
    fn genre(&self) -> &str {
        "transfer"
    }

    fn on_received(&self, message: &Message) -> Result<Option<MsgBody>, BoxError> {
        let amount = message.body().get_i64("amount")?;
        tracing::info!(msg_id = %message.msg_id(), amount, "Ledger reserved funds");
        Ok(Some(MsgBody::new().with("reserved", amount)))
    }

    fn on_sender_ack_received(&self, msg_id: &MsgId, body: &MsgBody) -> Result<(), BoxError> {
        tracing::info!(msg_id = %msg_id, confirmed = ?body.get("confirmed"), "Ledger committed transfer");
        Ok(())
    }
}

/// Sender side of the demo transfer.
struct Teller {
    done: mpsc::UnboundedSender<MsgId>,
}

impl Processor for Teller {
    fn genre(&self) -> &str {
        "transfer"
    }

    fn on_received(&self, _message: &Message) -> Result<Option<MsgBody>, BoxError> {
        Ok(None)
    }

    fn on_recipient_ack_received(
        &self,
        msg_id: &MsgId,
        body: &MsgBody,
    ) -> Result<Option<MsgBody>, BoxError> {
        let reserved = body.get_i64("reserved")?;
        tracing::info!(msg_id = %msg_id, reserved, "Teller received reservation");
        let _ = self.done.send(msg_id.clone());
        Ok(Some(MsgBody::new().with("confirmed", true)))
    }
}

fn demo_config(system_id: &str) -> Config {
    let mut config = Config::default();
    config.client.system_id = system_id.to_string();
    config.security.signing_secret = "amq-demo-secret".to_string();
    config
}

async fn run_demo(timeout: Duration) -> anyhow::Result<()> {
    let registry = Arc::new(ProviderRegistry::with_defaults());
    let sender = Engine::new(demo_config("0001"), Arc::clone(&registry))?;
    let recipient = Engine::new(demo_config("0002"), registry)?;

    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let teller = sender.client(Node::Biz)?;
    teller.add_processor(Arc::new(Teller { done: done_tx }))?;
    teller.start().await?;

    let ledger = recipient.client(Node::Biz)?;
    ledger.add_processor(Arc::new(Ledger))?;
    ledger.start().await?;

    let destination = teller.queue_name("0002")?;
    let message = DuplexMessage::new(
        "transfer",
        teller.queue_name("0001")?,
        destination.clone(),
        destination,
    )
    .with_body(MsgBody::new().with("amount", 250));
    let envelope = teller.send(message.into()).await?;
    println!("Sent duplex transfer {}", envelope.msg_id());

    let acked = tokio::time::timeout(timeout, done_rx.recv())
        .await
        .context("Timed out waiting for the recipient acknowledgment")?
        .context("Sender processor went away")?;
    println!("Recipient acknowledged {}", acked);

    // Give the final SENDER_ACK a moment to reach the ledger before closing.
    tokio::time::sleep(Duration::from_millis(100)).await;

    sender.shutdown().await?;
    recipient.shutdown().await?;
    println!("Demo complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_command() {
        let cli = Cli::try_parse_from(["amq-tool", "sign", "envelope.json", "--secret", "k"])
            .unwrap();
        match cli.command {
            Commands::Sign { file, secret } => {
                assert_eq!(file, PathBuf::from("envelope.json"));
                assert_eq!(secret.as_deref(), Some("k"));
            }
            _ => panic!("Expected Sign command"),
        }
    }

    #[test]
    fn test_queue_name_command() {
        let cli = Cli::try_parse_from([
            "amq-tool",
            "queue-name",
            "--system-id",
            "0001",
            "--node",
            "fund",
            "--partition",
            "2",
        ])
        .unwrap();
        match cli.command {
            Commands::QueueName {
                system_id,
                node,
                partition,
            } => {
                assert_eq!(system_id, "0001");
                assert_eq!(node, Node::Fund);
                assert_eq!(partition, Some(2));
            }
            _ => panic!("Expected QueueName command"),
        }
    }

    #[test]
    fn test_queue_name_rejects_unknown_node() {
        let result = Cli::try_parse_from([
            "amq-tool",
            "queue-name",
            "--system-id",
            "0001",
            "--node",
            "payments",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_check_queue_default_partitions() {
        let cli = Cli::try_parse_from(["amq-tool", "check-queue", "sys_amq_0001_biz"]).unwrap();
        match cli.command {
            Commands::CheckQueue { name, partitions } => {
                assert_eq!(name, "sys_amq_0001_biz");
                assert_eq!(partitions, 1);
            }
            _ => panic!("Expected CheckQueue command"),
        }
    }

    #[test]
    fn test_global_flags_after_command() {
        let cli = Cli::try_parse_from([
            "amq-tool",
            "demo",
            "--verbose",
            "--config",
            "/path/to/config.toml",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.toml")));
    }

    #[test]
    fn test_resolve_signer_requires_secret() {
        let config = Config::default();
        assert!(resolve_signer(None, &config).is_err());
        assert!(resolve_signer(Some("k".to_string()), &config).is_ok());
    }
}
