//! Per-run mapping from label name to label id
use crate::client::GmailClient;
use crate::error::{LabelerError, Result};
use crate::models::LabelInfo;
use std::collections::HashMap;
use tracing::{debug, info};

/// Name -> id mapping of the account's labels.
///
/// Built fresh for every labeling run and owned by it. Lookups are exact and
/// case-sensitive; each name appears at most once.
#[derive(Debug, Default, Clone)]
pub struct LabelDirectory {
    labels: HashMap<String, String>,
    created: Vec<LabelInfo>,
}

impl LabelDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole mapping with the provider's current label list.
    ///
    /// On failure the directory is left empty and `DirectoryLoadError` is
    /// returned; the caller decides whether to continue.
    pub async fn refresh(&mut self, client: &dyn GmailClient) -> Result<usize> {
        self.labels.clear();
        self.created.clear();

        let labels = client
            .list_labels()
            .await
            .map_err(|e| LabelerError::DirectoryLoadError(e.to_string()))?;

        if labels.is_empty() {
            info!("No labels found");
        }
        for label in labels {
            debug!("{}: {}", label.name, label.id);
            self.labels.insert(label.name, label.id);
        }

        info!("Loaded {} existing labels into directory", self.labels.len());
        Ok(self.labels.len())
    }

    /// Exact, case-sensitive lookup
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    /// Create the label remotely and record it, returning the new id
    pub async fn create(&mut self, client: &dyn GmailClient, name: &str) -> Result<String> {
        info!("Creating label: {}", name);

        let label_id = client.create_label(name).await.map_err(|e| match e {
            LabelerError::LabelCreateError { .. } => e,
            other => LabelerError::LabelCreateError {
                name: name.to_string(),
                message: other.to_string(),
            },
        })?;

        self.labels.insert(name.to_string(), label_id.clone());
        self.created.push(LabelInfo {
            id: label_id.clone(),
            name: name.to_string(),
        });

        info!("Created label '{}' with ID: {}", name, label_id);
        Ok(label_id)
    }

    /// Lookup, falling back to creation for unknown names
    pub async fn resolve(&mut self, client: &dyn GmailClient, name: &str) -> Result<String> {
        if let Some(id) = self.lookup(name) {
            debug!("Label '{}' already exists as {}", name, id);
            return Ok(id.to_string());
        }
        self.create(client, name).await
    }

    /// Labels created through this directory, in creation order
    pub fn created(&self) -> &[LabelInfo] {
        &self.created
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl FromIterator<LabelInfo> for LabelDirectory {
    fn from_iter<I: IntoIterator<Item = LabelInfo>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().map(|l| (l.name, l.id)).collect(),
            created: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageSnapshot;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records create calls and hands out sequential ids
    #[derive(Default)]
    struct FakeClient {
        existing: Vec<LabelInfo>,
        fail_list: bool,
        fail_create: bool,
        create_calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GmailClient for FakeClient {
        async fn list_message_ids(&self, _query: &str, _max: u32) -> Result<Vec<String>> {
            Ok(vec![])
        }

        async fn get_message(&self, id: &str) -> Result<MessageSnapshot> {
            Err(LabelerError::MessageFetchError {
                message_id: id.to_string(),
                message: "not used".to_string(),
            })
        }

        async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
            if self.fail_list {
                return Err(LabelerError::ApiError {
                    status: Some(503),
                    message: "Service Unavailable".to_string(),
                });
            }
            Ok(self.existing.clone())
        }

        async fn create_label(&self, name: &str) -> Result<String> {
            if self.fail_create {
                return Err(LabelerError::ApiError {
                    status: Some(409),
                    message: "Label name exists or conflicts".to_string(),
                });
            }
            let mut calls = self.create_calls.lock().unwrap();
            calls.push(name.to_string());
            Ok(format!("Label_{}", calls.len()))
        }

        async fn modify_labels(&self, _id: &str, _add: &[String], _remove: &[String]) -> Result<()> {
            Ok(())
        }
    }

    fn label(id: &str, name: &str) -> LabelInfo {
        LabelInfo {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_refresh_replaces_mapping() {
        let client = FakeClient {
            existing: vec![label("INBOX", "INBOX"), label("L1", "Work")],
            ..Default::default()
        };
        let mut directory: LabelDirectory = vec![label("OLD", "Stale")].into_iter().collect();

        let count = directory.refresh(&client).await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(directory.lookup("Work"), Some("L1"));
        assert_eq!(directory.lookup("Stale"), None);
    }

    #[tokio::test]
    async fn test_refresh_failure_leaves_empty_directory() {
        let client = FakeClient {
            fail_list: true,
            ..Default::default()
        };
        let mut directory: LabelDirectory = vec![label("L1", "Work")].into_iter().collect();

        let result = directory.refresh(&client).await;

        assert!(matches!(result, Err(LabelerError::DirectoryLoadError(_))));
        assert!(directory.is_empty());
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let directory: LabelDirectory = vec![label("L1", "Work")].into_iter().collect();
        assert_eq!(directory.lookup("Work"), Some("L1"));
        assert_eq!(directory.lookup("work"), None);
        assert_eq!(directory.lookup("Work "), None);
    }

    #[tokio::test]
    async fn test_resolve_known_label_issues_no_create() {
        let client = FakeClient::default();
        let mut directory: LabelDirectory = vec![label("L1", "Work")].into_iter().collect();

        let id = directory.resolve(&client, "Work").await.unwrap();

        assert_eq!(id, "L1");
        assert!(client.create_calls.lock().unwrap().is_empty());
        assert!(directory.created().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_unknown_label_creates_once() {
        let client = FakeClient::default();
        let mut directory = LabelDirectory::new();

        let first = directory.resolve(&client, "Travel").await.unwrap();
        let second = directory.resolve(&client, "Travel").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(*client.create_calls.lock().unwrap(), vec!["Travel".to_string()]);
        assert_eq!(directory.len(), 1);
        assert_eq!(directory.created(), &[label(&first, "Travel")]);
    }

    #[tokio::test]
    async fn test_create_then_lookup_returns_same_id() {
        let client = FakeClient::default();
        let mut directory = LabelDirectory::new();

        let id = directory.create(&client, "Receipts").await.unwrap();

        assert_eq!(directory.lookup("Receipts"), Some(id.as_str()));
    }

    #[tokio::test]
    async fn test_create_rejection_is_label_create_error() {
        let client = FakeClient {
            fail_create: true,
            ..Default::default()
        };
        let mut directory = LabelDirectory::new();

        let result = directory.create(&client, "Travel").await;

        match result {
            Err(LabelerError::LabelCreateError { name, message }) => {
                assert_eq!(name, "Travel");
                assert!(message.contains("409"));
            }
            other => panic!("expected LabelCreateError, got {:?}", other),
        }
        assert_eq!(directory.lookup("Travel"), None);
    }
}
