//! Gmail Labeler
//!
//! Fetches unread Gmail messages, asks a generative-text model for label
//! names, creates any labels that do not exist yet and re-tags the messages.
//!
//! # Overview
//!
//! - **Authentication**: OAuth2 with a cached `authorized_user` token file
//! - **Label Directory**: per-run name -> id mapping with create-on-miss
//! - **Suggestions**: Gemini completion with validated, comma-separated output
//! - **Workflow**: strictly sequential, best-effort per message
//! - **HTTP**: a single route that triggers one run
//!
//! # Example Usage
//!
//! ```no_run
//! use gmail_labeler::{config::Config, workflow::{GmailLabelingRun, LabelingRun}};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("labeler.toml".as_ref()).await?;
//!
//!     // Requires GENERATIVE_AI_API_KEY in the environment
//!     let runner = GmailLabelingRun::new(config)?;
//!     let summary = runner.run_once().await?;
//!     println!("labeled {} messages", summary.messages_labeled);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - OAuth2 credential store and Gmail hub construction
//! - [`client`] - Gmail API client trait and production implementation
//! - [`cli`] - Command-line interface
//! - [`config`] - Configuration management
//! - [`error`] - Error types and result aliases
//! - [`label_directory`] - Label name -> id mapping for one run
//! - [`models`] - Core data structures
//! - [`server`] - HTTP entry point
//! - [`suggester`] - Label suggestions from the generative-text model
//! - [`workflow`] - Labeling run orchestration

pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod label_directory;
pub mod models;
pub mod server;
pub mod suggester;
pub mod workflow;

// Re-export commonly used types for convenience
pub use error::{LabelerError, Result};

pub use models::{LabelInfo, MessageSnapshot, RunPhase, RunSummary};

pub use config::{Config, DirectoryErrorPolicy, RemovePolicy};

pub use auth::CredentialStore;
pub use client::{GmailClient, ProductionGmailClient};
pub use label_directory::LabelDirectory;
pub use suggester::{GeminiSuggester, LabelSuggester};
pub use workflow::{GmailLabelingRun, LabelingRun, LabelingWorkflow, MessageOutcome};

pub use server::AppState;
