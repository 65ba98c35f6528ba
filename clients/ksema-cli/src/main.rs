//! ksema - KSEMA appliance command line interface

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use clap::{Parser, Subcommand};
use colored::Colorize;
use ksema::{ClientConfig, Credentials, KsemaClient, KsemaError, TrustPolicy};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Appliance address (host:port)
    #[arg(short, long, env = "KSEMA_SERVER")]
    server: String,

    /// Pass key used for the handshake
    #[arg(long, env = "KSEMA_PASSKEY", hide_env_values = true)]
    passkey: String,

    /// API key used for the handshake
    #[arg(long, env = "KSEMA_API_KEY", hide_env_values = true)]
    api_key: String,

    /// PIN used for the handshake
    #[arg(long, env = "KSEMA_PIN", hide_env_values = true)]
    pin: String,

    /// Request timeout in seconds
    #[arg(long, env = "KSEMA_TIMEOUT_SECS", default_value_t = ksema::config::DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// PEM bundle of CA certificates to trust instead of the bundled roots
    #[arg(long, env = "KSEMA_CA_CERT")]
    ca_cert: Option<PathBuf>,

    /// Skip server certificate verification
    #[arg(long, env = "KSEMA_INSECURE")]
    insecure: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check that the session is alive
    Ping,

    /// Encrypt data, printing base64 ciphertext
    Encrypt {
        /// Plaintext (UTF-8, or base64 with --b64)
        data: String,
        #[arg(long, default_value = "")]
        label: String,
        /// Treat the input as base64
        #[arg(long)]
        b64: bool,
    },

    /// Decrypt base64 ciphertext
    Decrypt {
        /// Ciphertext (base64)
        data: String,
        #[arg(long, default_value = "")]
        label: String,
        /// Print the plaintext as UTF-8 instead of base64
        #[arg(long)]
        text: bool,
    },

    /// Sign data, printing a base64 signature
    Sign {
        /// Data (UTF-8, or base64 with --b64)
        data: String,
        #[arg(long, default_value = "")]
        label: String,
        #[arg(long)]
        b64: bool,
    },

    /// Verify a base64 signature
    Verify {
        /// Data (UTF-8, or base64 with --b64)
        data: String,
        /// Signature (base64)
        signature: String,
        #[arg(long, default_value = "")]
        label: String,
        #[arg(long)]
        b64: bool,
    },

    /// Generate random bytes, printing base64
    Random {
        /// Number of bytes (server default when omitted)
        #[arg(long)]
        length: Option<u16>,
    },

    /// Export a key to a backup file
    Backup {
        /// Backup file path
        path: PathBuf,
        #[arg(long, default_value = "")]
        label: String,
    },

    /// Import a key from a backup file
    Restore {
        /// Backup file path
        path: PathBuf,
    },

    /// Delete a key
    Delete {
        #[arg(long, default_value = "")]
        label: String,
    },

    /// Generate a symmetric key, or a key pair when --private-label is given
    GenKey {
        /// Key label (public label for key pairs)
        label: String,
        #[arg(long)]
        private_label: Option<String>,
    },

    /// Override the IV for this session (16 characters)
    SetIv { iv: String },
}

fn client_config(cli: &Cli) -> ClientConfig {
    let trust_policy = if cli.insecure {
        TrustPolicy::AcceptInvalid
    } else if let Some(ref path) = cli.ca_cert {
        TrustPolicy::CustomCa(path.clone())
    } else {
        TrustPolicy::WebPki
    };

    ClientConfig::new(
        &cli.server,
        Credentials::new(&cli.passkey, &cli.api_key, &cli.pin),
    )
    .with_timeout(Duration::from_secs(cli.timeout_secs))
    .with_trust_policy(trust_policy)
}

fn decode_input(data: &str, b64: bool) -> Result<Vec<u8>> {
    if b64 {
        BASE64.decode(data).context("Input is not valid base64")
    } else {
        Ok(data.as_bytes().to_vec())
    }
}

fn report(err: KsemaError) -> anyhow::Error {
    if err.should_rehandshake() {
        eprintln!("{}", "Session is no longer valid; run the command again.".yellow());
    }
    err.into()
}

async fn run(cli: &Cli) -> Result<()> {
    tracing::debug!("Connecting to {}", cli.server);
    let client = KsemaClient::connect(&client_config(cli))
        .await
        .context("Handshake failed")?;

    match &cli.command {
        Commands::Ping => {
            client.ping().await.map_err(report)?;
            println!("{}", "Pong".green().bold());
        }
        Commands::Encrypt { data, label, b64 } => {
            let ciphertext = client
                .encrypt(&decode_input(data, *b64)?, label)
                .await
                .map_err(report)?;
            println!("{}", BASE64.encode(ciphertext));
        }
        Commands::Decrypt { data, label, text } => {
            let ciphertext = decode_input(data, true)?;
            let plaintext = client.decrypt(&ciphertext, label).await.map_err(report)?;
            if *text {
                println!("{}", String::from_utf8_lossy(&plaintext));
            } else {
                println!("{}", BASE64.encode(plaintext));
            }
        }
        Commands::Sign { data, label, b64 } => {
            let signature = client
                .sign(&decode_input(data, *b64)?, label)
                .await
                .map_err(report)?;
            println!("{}", BASE64.encode(signature));
        }
        Commands::Verify {
            data,
            signature,
            label,
            b64,
        } => {
            let signature = decode_input(signature, true)?;
            client
                .verify(&decode_input(data, *b64)?, &signature, label)
                .await
                .map_err(report)?;
            println!("{}", "Signature valid".green().bold());
        }
        Commands::Random { length } => {
            let bytes = client.random(*length).await.map_err(report)?;
            println!("{}", BASE64.encode(bytes));
        }
        Commands::Backup { path, label } => {
            let written = client.backup(path, label).await.map_err(report)?;
            println!("{}", "Backup complete".green().bold());
            for file in written {
                println!("  {}", file.display().to_string().cyan());
            }
        }
        Commands::Restore { path } => {
            client.restore(path).await.map_err(report)?;
            println!("{}", "Restore complete".green().bold());
        }
        Commands::Delete { label } => {
            client.delete(label).await.map_err(report)?;
            println!("{} {}", "Deleted".green().bold(), label);
        }
        Commands::GenKey {
            label,
            private_label,
        } => {
            client
                .gen_key(label, private_label.as_deref())
                .await
                .map_err(report)?;
            match private_label {
                Some(private_label) => println!(
                    "{} {} / {}",
                    "Generated key pair".green().bold(),
                    label.cyan(),
                    private_label.cyan()
                ),
                None => println!("{} {}", "Generated key".green().bold(), label.cyan()),
            }
        }
        Commands::SetIv { iv } => {
            client.set_iv(iv.as_bytes()).await.map_err(report)?;
            println!("{}", "IV overridden for this session".green());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ksema=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    run(&cli).await
}
