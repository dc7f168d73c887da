//! Labeling run: list unread mail, ask for label names, apply them
//!
//! Every remote call is awaited before the next one is issued, both across
//! messages and within a message. Failures inside one message are logged and
//! counted; the run moves on to the next message without rollback or retry.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::auth::CredentialStore;
use crate::client::{GmailClient, ProductionGmailClient};
use crate::config::{Config, DirectoryErrorPolicy, RemovePolicy};
use crate::error::{LabelerError, Result};
use crate::label_directory::LabelDirectory;
use crate::models::{RunPhase, RunSummary};
use crate::suggester::{GeminiSuggester, LabelSuggester};

/// System labels removed under [`RemovePolicy::InboxAndUnread`]
const INBOX_AND_UNREAD: &[&str] = &["INBOX", "UNREAD"];

/// Knobs the workflow reads from configuration
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    pub query: String,
    pub max_messages: u32,
    pub on_directory_error: DirectoryErrorPolicy,
    pub remove_policy: RemovePolicy,
}

impl WorkflowOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            query: config.mail.query.clone(),
            max_messages: config.mail.max_messages,
            on_directory_error: config.labels.on_directory_error,
            remove_policy: config.labels.remove_policy,
        }
    }
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What happened to a single message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Labels were applied
    Labeled { added: Vec<String>, removed: Vec<String> },
    /// Nothing usable was suggested, message left untouched
    Skipped,
}

/// Label ids to strip from a message that is about to receive `adding`.
///
/// Ids that are being added are never removed in the same call.
pub fn removal_set(policy: RemovePolicy, existing: &[String], adding: &[String]) -> Vec<String> {
    existing
        .iter()
        .filter(|id| !adding.contains(id))
        .filter(|id| match policy {
            RemovePolicy::AllExisting => true,
            RemovePolicy::InboxAndUnread => INBOX_AND_UNREAD.contains(&id.as_str()),
            RemovePolicy::Keep => false,
        })
        .cloned()
        .collect()
}

/// One labeling run over an already-authorized mailbox
pub struct LabelingWorkflow<'a> {
    client: &'a dyn GmailClient,
    suggester: &'a dyn LabelSuggester,
    options: WorkflowOptions,
}

impl<'a> LabelingWorkflow<'a> {
    pub fn new(
        client: &'a dyn GmailClient,
        suggester: &'a dyn LabelSuggester,
        options: WorkflowOptions,
    ) -> Self {
        Self {
            client,
            suggester,
            options,
        }
    }

    /// Run the workflow once with a fresh label directory
    pub async fn run(&self) -> Result<RunSummary> {
        self.run_with_summary(RunSummary::start()).await
    }

    async fn run_with_summary(&self, mut summary: RunSummary) -> Result<RunSummary> {
        let mut directory = self.load_directory().await?;
        summary.phase = RunPhase::DirectoryLoaded;
        debug!("Run {} phase: {}", summary.run_id, summary.phase);

        summary.phase = RunPhase::ListingMessages;
        let message_ids = self
            .client
            .list_message_ids(&self.options.query, self.options.max_messages)
            .await
            .map_err(|e| LabelerError::ListMessagesError(e.to_string()))?;
        summary.messages_listed = message_ids.len();

        if message_ids.is_empty() {
            info!("No messages match '{}', nothing to do", self.options.query);
            return Ok(summary.finish());
        }
        info!("Processing {} messages", message_ids.len());

        summary.phase = RunPhase::PerMessage;
        for message_id in &message_ids {
            match self.process_message(&mut directory, message_id).await {
                Ok(MessageOutcome::Labeled { added, removed }) => {
                    info!(
                        "Labeled message {}: added {:?}, removed {:?}",
                        message_id, added, removed
                    );
                    summary.messages_labeled += 1;
                }
                Ok(MessageOutcome::Skipped) => {
                    warn!("No usable label suggestion for message {}, skipping", message_id);
                    summary.messages_skipped += 1;
                }
                Err(e) => {
                    error!("Error processing message {}: {}", message_id, e);
                    summary.messages_failed += 1;
                }
            }
        }

        summary.labels_created = directory.created().len();
        let summary = summary.finish();
        info!(
            "Run {} done: {} listed, {} labeled, {} skipped, {} failed, {} labels created",
            summary.run_id,
            summary.messages_listed,
            summary.messages_labeled,
            summary.messages_skipped,
            summary.messages_failed,
            summary.labels_created
        );
        Ok(summary)
    }

    async fn load_directory(&self) -> Result<LabelDirectory> {
        let mut directory = LabelDirectory::new();
        if let Err(e) = directory.refresh(self.client).await {
            match self.options.on_directory_error {
                DirectoryErrorPolicy::Abort => return Err(e),
                DirectoryErrorPolicy::ProceedEmpty => {
                    warn!("{}; continuing with an empty label directory", e);
                }
            }
        }
        Ok(directory)
    }

    /// Fetch, suggest, resolve and apply for a single message
    pub async fn process_message(
        &self,
        directory: &mut LabelDirectory,
        message_id: &str,
    ) -> Result<MessageOutcome> {
        let message = self
            .client
            .get_message(message_id)
            .await
            .map_err(|e| match e {
                LabelerError::MessageFetchError { .. } => e,
                other => LabelerError::MessageFetchError {
                    message_id: message_id.to_string(),
                    message: other.to_string(),
                },
            })?;

        let suggestions = self.suggester.suggest(&message.snippet).await?;
        debug!("Suggested labels for {}: {:?}", message_id, suggestions);
        if suggestions.is_empty() {
            return Ok(MessageOutcome::Skipped);
        }

        let mut added = Vec::with_capacity(suggestions.len());
        let mut last_create_error = None;
        for name in &suggestions {
            match directory.resolve(self.client, name).await {
                Ok(label_id) => {
                    if !added.contains(&label_id) {
                        added.push(label_id);
                    }
                }
                Err(e @ LabelerError::LabelCreateError { .. }) => {
                    warn!("Skipping label '{}' for message {}: {}", name, message_id, e);
                    last_create_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        // Nothing resolved, so there is nothing to apply
        if added.is_empty() {
            if let Some(e) = last_create_error {
                return Err(e);
            }
            return Ok(MessageOutcome::Skipped);
        }

        let removed = removal_set(self.options.remove_policy, &message.label_ids, &added);
        self.client
            .modify_labels(&message.id, &added, &removed)
            .await
            .map_err(|e| LabelerError::LabelApplyError {
                message_id: message.id.clone(),
                message: e.to_string(),
            })?;

        Ok(MessageOutcome::Labeled { added, removed })
    }
}

/// A complete, self-contained labeling run, as triggered by the HTTP handler
/// or the `run` subcommand.
#[async_trait]
pub trait LabelingRun: Send + Sync {
    async fn run_once(&self) -> Result<RunSummary>;
}

/// Authorizes against Gmail, then runs [`LabelingWorkflow`] with the Gemini
/// suggester.
pub struct GmailLabelingRun {
    config: Config,
    api_key: String,
}

impl GmailLabelingRun {
    /// Fails when the generative-text API key is not configured
    pub fn new(config: Config) -> Result<Self> {
        let api_key = config.api_key()?;
        Ok(Self { config, api_key })
    }
}

#[async_trait]
impl LabelingRun for GmailLabelingRun {
    async fn run_once(&self) -> Result<RunSummary> {
        let summary = RunSummary::start();
        debug!("Run {} phase: {}", summary.run_id, summary.phase);

        let hub = CredentialStore::from_config(&self.config.auth)
            .authorize()
            .await?;
        let client = ProductionGmailClient::new(hub);
        let suggester = GeminiSuggester::new(self.api_key.clone(), &self.config.suggestion);

        LabelingWorkflow::new(&client, &suggester, WorkflowOptions::from_config(&self.config))
            .run_with_summary(summary)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_removal_set_all_existing() {
        let removed = removal_set(
            RemovePolicy::AllExisting,
            &ids(&["INBOX", "UNREAD", "CATEGORY_UPDATES"]),
            &ids(&["L1"]),
        );
        assert_eq!(removed, ids(&["INBOX", "UNREAD", "CATEGORY_UPDATES"]));
    }

    #[test]
    fn test_removal_set_never_removes_added_ids() {
        let removed = removal_set(
            RemovePolicy::AllExisting,
            &ids(&["INBOX", "L1"]),
            &ids(&["L1", "L2"]),
        );
        assert_eq!(removed, ids(&["INBOX"]));
    }

    #[test]
    fn test_removal_set_inbox_and_unread() {
        let removed = removal_set(
            RemovePolicy::InboxAndUnread,
            &ids(&["INBOX", "UNREAD", "IMPORTANT", "Label_7"]),
            &ids(&["L1"]),
        );
        assert_eq!(removed, ids(&["INBOX", "UNREAD"]));
    }

    #[test]
    fn test_removal_set_keep() {
        let removed = removal_set(RemovePolicy::Keep, &ids(&["INBOX", "UNREAD"]), &ids(&["L1"]));
        assert!(removed.is_empty());
    }

    #[test]
    fn test_options_from_default_config() {
        let options = WorkflowOptions::default();
        assert_eq!(options.query, "is:unread");
        assert_eq!(options.max_messages, 5);
        assert_eq!(options.on_directory_error, DirectoryErrorPolicy::ProceedEmpty);
        assert_eq!(options.remove_policy, RemovePolicy::AllExisting);
    }
}
