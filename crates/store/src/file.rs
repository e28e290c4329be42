//! File-backed chat host — one pretty-printed JSON document per chat.
//!
//! The document is loaded when the chat is opened and written back on every
//! mutation (message overwrite, variable replace), so a crash loses at most
//! the write in flight.

use async_trait::async_trait;
use serde_json::Value;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use sam_core::{ChatMessage, ConversationId, HostError, MessageStore, VariableStore};

use crate::transcript::Transcript;

/// A chat stored in a JSON file.
pub struct FileChat {
    path: PathBuf,
    chat: Arc<RwLock<Transcript>>,
}

impl FileChat {
    /// Open the chat at `path`.
    ///
    /// A missing file starts an empty chat named after the file stem (the
    /// file is created on first write). A file that does not decode is an
    /// error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, HostError> {
        let path = path.into();
        let transcript = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<Transcript>(&content).map_err(|e| {
                HostError::Storage(format!("Failed to parse chat file {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "chat".into());
                Transcript::new(ConversationId(stem))
            }
            Err(e) => {
                return Err(HostError::Storage(format!(
                    "Failed to read chat file {}: {e}",
                    path.display()
                )));
            }
        };

        debug!(
            path = %path.display(),
            chat = %transcript.id,
            messages = transcript.messages.len(),
            "Chat file loaded"
        );
        Ok(Self {
            path,
            chat: Arc::new(RwLock::new(transcript)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A copy of the whole chat.
    pub async fn snapshot(&self) -> Transcript {
        self.chat.read().await.clone()
    }

    /// Apply a frontend-style mutation and persist the result.
    pub async fn update<T>(
        &self,
        mutate: impl FnOnce(&mut Transcript) -> Result<T, HostError> + Send,
    ) -> Result<T, HostError> {
        let out = mutate(&mut *self.chat.write().await)?;
        self.flush().await?;
        Ok(out)
    }

    /// Write the whole document to disk.
    async fn flush(&self) -> Result<(), HostError> {
        let chat = self.chat.read().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                HostError::Storage(format!("Failed to create chat directory: {e}"))
            })?;
        }

        let content = serde_json::to_string_pretty(&*chat)
            .map_err(|e| HostError::Storage(format!("Failed to serialize chat: {e}")))?;
        std::fs::write(&self.path, content)
            .map_err(|e| HostError::Storage(format!("Failed to write chat file: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl MessageStore for FileChat {
    fn name(&self) -> &str {
        "file"
    }

    async fn conversation_id(&self) -> Result<ConversationId, HostError> {
        Ok(self.chat.read().await.id.clone())
    }

    async fn len(&self) -> Result<usize, HostError> {
        Ok(self.chat.read().await.messages.len())
    }

    async fn message(&self, index: usize) -> Result<ChatMessage, HostError> {
        self.chat.read().await.message(index).cloned()
    }

    async fn messages(&self, range: Range<usize>) -> Result<Vec<ChatMessage>, HostError> {
        Ok(self.chat.read().await.slice(range))
    }

    async fn set_message(&self, index: usize, text: String) -> Result<(), HostError> {
        self.chat.write().await.message_mut(index)?.set_text(text);
        self.flush().await
    }
}

#[async_trait]
impl VariableStore for FileChat {
    async fn variables(&self) -> Result<Value, HostError> {
        Ok(self.chat.read().await.variables())
    }

    async fn replace_variables(&self, variables: Value) -> Result<(), HostError> {
        self.chat.write().await.variables = variables;
        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sam_core::Role;
    use serde_json::json;

    #[tokio::test]
    async fn writes_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chats").join("tavern.json");

        let chat = FileChat::open(&path).unwrap();
        assert_eq!(chat.conversation_id().await.unwrap(), ConversationId::from("tavern"));
        chat.update(|t| {
            t.push(Role::User, "hi");
            Ok(t.push(Role::Assistant, "hello"))
        })
        .await
        .unwrap();
        chat.set_message(1, "hello again".into()).await.unwrap();
        chat.replace_variables(json!({"static": {"hp": 3}})).await.unwrap();

        let reopened = FileChat::open(&path).unwrap();
        assert_eq!(reopened.len().await.unwrap(), 2);
        assert_eq!(reopened.message(1).await.unwrap().message, "hello again");
        assert_eq!(reopened.variables().await.unwrap(), json!({"static": {"hp": 3}}));
        assert_eq!(reopened.name(), "file");
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_chat() {
        let dir = tempfile::tempdir().unwrap();
        let chat = FileChat::open(dir.path().join("new.json")).unwrap();
        assert!(chat.is_empty().await.unwrap());
        assert!(!chat.path().exists());
    }

    #[tokio::test]
    async fn corrupted_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(FileChat::open(&path), Err(HostError::Storage(_))));
    }

    #[tokio::test]
    async fn failed_update_is_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.json");
        let chat = FileChat::open(&path).unwrap();
        let result = chat.update(|t| t.message_mut(3).map(|_| ())).await;
        assert!(result.is_err());
        assert!(!path.exists());
    }
}
