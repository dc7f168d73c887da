//! Command-line interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::auth::CredentialStore;
use crate::config::Config;
use crate::error::{LabelerError, Result};
use crate::models::RunSummary;
use crate::server::{self, AppState};
use crate::workflow::{GmailLabelingRun, LabelingRun};

#[derive(Parser, Debug)]
#[command(name = "gmail-labeler")]
#[command(version)]
#[command(about = "Labels unread Gmail messages with AI-suggested label names", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "labeler.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 client credential file (overrides config)
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Path to cached token file (overrides config)
    #[arg(long)]
    pub token: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the HTTP endpoint that triggers a labeling run
    Serve {
        /// Listen host (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Listen port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run the labeling workflow once and print a summary
    Run,

    /// Authenticate with Gmail and cache the credential
    Auth {
        /// Force re-authentication even if a token exists
        #[arg(long)]
        force: bool,
    },

    /// Write an example configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    /// Load the config file and apply command-line overrides
    pub async fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(&self.config).await?;
        if let Some(credentials) = &self.credentials {
            config.auth.credentials_path = credentials.clone();
        }
        if let Some(token) = &self.token {
            config.auth.token_path = token.clone();
        }
        if let Commands::Serve { host, port } = &self.command {
            if let Some(host) = host {
                config.server.host = host.clone();
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
        }
        config.validate()?;
        Ok(config)
    }
}

/// Execute the parsed command
pub async fn execute(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::InitConfig { force } => {
            if cli.config.exists() && !force {
                return Err(LabelerError::ConfigError(format!(
                    "{:?} already exists, pass --force to overwrite",
                    cli.config
                )));
            }
            Config::create_example(&cli.config).await?;
            println!("Wrote example configuration to {:?}", cli.config);
            Ok(())
        }

        Commands::Auth { force } => {
            let config = cli.load_config().await?;
            let store = CredentialStore::from_config(&config.auth);

            if *force && store.forget().await? {
                info!("Removed existing token cache");
            }

            let hub = store.authorize().await?;

            // Must specify scope to avoid triggering an additional OAuth flow
            let (_, profile) = hub
                .users()
                .get_profile("me")
                .add_scope(crate::auth::GMAIL_MODIFY_SCOPE)
                .doit()
                .await?;

            println!("Successfully authenticated with Gmail API");
            println!("Token cached at: {:?}", store.token_path());
            println!(
                "Connected to account: {}",
                profile.email_address.unwrap_or_default()
            );
            Ok(())
        }

        Commands::Run => {
            let config = cli.load_config().await?;
            let runner = GmailLabelingRun::new(config)?;
            let summary = runner.run_once().await?;
            print_summary(&summary);
            Ok(())
        }

        Commands::Serve { .. } => {
            let config = cli.load_config().await?;
            // Fails closed before binding when the API key is missing
            let runner = GmailLabelingRun::new(config.clone())?;
            let state = AppState::new(Arc::new(runner));
            server::serve(&config.server, state).await
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!("Run {}", summary.run_id);
    println!("  Messages listed:  {}", summary.messages_listed);
    println!("  Messages labeled: {}", summary.messages_labeled);
    println!("  Messages skipped: {}", summary.messages_skipped);
    println!("  Messages failed:  {}", summary.messages_failed);
    println!("  Labels created:   {}", summary.labels_created);
    if let Some(finished_at) = summary.finished_at {
        let elapsed = finished_at - summary.started_at;
        println!("  Duration:         {}ms", elapsed.num_milliseconds());
    }
}
