//! Common test utilities and fixtures

use gmail_labeler::client::GmailClient;
use gmail_labeler::error::Result;
use gmail_labeler::models::{LabelInfo, MessageSnapshot};
use gmail_labeler::suggester::LabelSuggester;
use mockall::mock;

/// Create a test label
pub fn create_test_label_info(id: &str, name: &str) -> LabelInfo {
    LabelInfo {
        id: id.to_string(),
        name: name.to_string(),
    }
}

/// Create an unread inbox message with the given snippet
pub fn create_unread_message(id: &str, snippet: &str) -> MessageSnapshot {
    MessageSnapshot {
        id: id.to_string(),
        snippet: snippet.to_string(),
        label_ids: vec!["INBOX".to_string(), "UNREAD".to_string()],
    }
}

/// Owned string vector from literals
pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

// Mock implementation of GmailClient for testing
mock! {
    pub GmailClient {}

    #[async_trait::async_trait]
    impl GmailClient for GmailClient {
        async fn list_message_ids(&self, query: &str, max_results: u32) -> Result<Vec<String>>;
        async fn get_message(&self, id: &str) -> Result<MessageSnapshot>;
        async fn list_labels(&self) -> Result<Vec<LabelInfo>>;
        async fn create_label(&self, name: &str) -> Result<String>;
        async fn modify_labels(
            &self,
            message_id: &str,
            add_label_ids: &[String],
            remove_label_ids: &[String],
        ) -> Result<()>;
    }
}

// Mock implementation of LabelSuggester for testing
mock! {
    pub LabelSuggester {}

    #[async_trait::async_trait]
    impl LabelSuggester for LabelSuggester {
        async fn suggest(&self, snippet: &str) -> Result<Vec<String>>;
    }
}
