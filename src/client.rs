//! Gmail API client used by the labeling workflow

use async_trait::async_trait;
use google_gmail1::api::{Label, Message, ModifyMessageRequest};
use std::sync::Arc;
use tracing::debug;

use crate::auth::{GmailHub, GMAIL_MODIFY_SCOPE};
use crate::error::{LabelerError, Result};
use crate::models::{LabelInfo, MessageSnapshot};

/// Trait defining Gmail client operations for easier testing
#[async_trait]
pub trait GmailClient: Send + Sync {
    /// List ids of messages matching a query, provider order, at most `max_results`
    async fn list_message_ids(&self, query: &str, max_results: u32) -> Result<Vec<String>>;

    /// Fetch a message's snippet and current label ids
    async fn get_message(&self, id: &str) -> Result<MessageSnapshot>;

    /// List all labels in the account
    async fn list_labels(&self) -> Result<Vec<LabelInfo>>;

    /// Create a new label with default visibility, returning its id
    async fn create_label(&self, name: &str) -> Result<String>;

    /// Add and remove label ids on a single message
    async fn modify_labels(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()>;
}

/// Gmail client backed by the google-gmail1 hub.
///
/// Every call is issued once and awaited; there is no retry or rate limiting.
pub struct ProductionGmailClient {
    hub: GmailHub,
}

impl ProductionGmailClient {
    pub fn new(hub: GmailHub) -> Self {
        Self { hub }
    }
}

/// Convert a full Gmail message into the snapshot the workflow needs
fn parse_message_snapshot(requested_id: &str, msg: Message) -> Result<MessageSnapshot> {
    let id = msg.id.ok_or_else(|| LabelerError::MessageFetchError {
        message_id: requested_id.to_string(),
        message: "Missing message ID".to_string(),
    })?;

    Ok(MessageSnapshot {
        id,
        snippet: msg.snippet.unwrap_or_default(),
        label_ids: msg.label_ids.unwrap_or_default(),
    })
}

fn optional_ids(ids: &[String]) -> Option<Vec<String>> {
    if ids.is_empty() {
        None
    } else {
        Some(ids.to_vec())
    }
}

#[async_trait]
impl GmailClient for ProductionGmailClient {
    async fn list_message_ids(&self, query: &str, max_results: u32) -> Result<Vec<String>> {
        debug!("Listing messages for query '{}' (max {})", query, max_results);
        let (_, response) = self
            .hub
            .users()
            .messages_list("me")
            .q(query)
            .max_results(max_results)
            .add_scope(GMAIL_MODIFY_SCOPE)
            .doit()
            .await?;

        let ids: Vec<String> = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg_ref| msg_ref.id)
            .collect();

        debug!("Listed {} messages", ids.len());
        Ok(ids)
    }

    async fn get_message(&self, id: &str) -> Result<MessageSnapshot> {
        debug!("Fetching message {}", id);
        let (_, msg) = self
            .hub
            .users()
            .messages_get("me", id)
            .format("full")
            .add_scope(GMAIL_MODIFY_SCOPE)
            .doit()
            .await?;

        parse_message_snapshot(id, msg)
    }

    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        debug!("Calling Gmail API to list labels...");
        let (_, response) = self
            .hub
            .users()
            .labels_list("me")
            .add_scope(GMAIL_MODIFY_SCOPE)
            .doit()
            .await?;

        let labels: Vec<LabelInfo> = response
            .labels
            .unwrap_or_default()
            .into_iter()
            .filter_map(|label| match (label.id, label.name) {
                (Some(id), Some(name)) => Some(LabelInfo { id, name }),
                _ => None,
            })
            .collect();

        debug!("Successfully parsed {} labels", labels.len());
        Ok(labels)
    }

    async fn create_label(&self, name: &str) -> Result<String> {
        let label = Label {
            name: Some(name.to_string()),
            message_list_visibility: Some("show".to_string()),
            label_list_visibility: Some("labelShow".to_string()),
            ..Default::default()
        };

        let (_, created_label) = self
            .hub
            .users()
            .labels_create(label, "me")
            .add_scope(GMAIL_MODIFY_SCOPE)
            .doit()
            .await?;

        created_label.id.ok_or_else(|| LabelerError::LabelCreateError {
            name: name.to_string(),
            message: "Created label has no ID".to_string(),
        })
    }

    async fn modify_labels(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()> {
        let modify_request = ModifyMessageRequest {
            add_label_ids: optional_ids(add_label_ids),
            remove_label_ids: optional_ids(remove_label_ids),
        };

        self.hub
            .users()
            .messages_modify(modify_request, "me", message_id)
            .add_scope(GMAIL_MODIFY_SCOPE)
            .doit()
            .await?;

        Ok(())
    }
}

// Implement GmailClient for Arc<T> to allow shared ownership
#[async_trait]
impl<T: GmailClient + ?Sized> GmailClient for Arc<T> {
    async fn list_message_ids(&self, query: &str, max_results: u32) -> Result<Vec<String>> {
        self.as_ref().list_message_ids(query, max_results).await
    }

    async fn get_message(&self, id: &str) -> Result<MessageSnapshot> {
        self.as_ref().get_message(id).await
    }

    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        self.as_ref().list_labels().await
    }

    async fn create_label(&self, name: &str) -> Result<String> {
        self.as_ref().create_label(name).await
    }

    async fn modify_labels(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()> {
        self.as_ref()
            .modify_labels(message_id, add_label_ids, remove_label_ids)
            .await
    }
}
