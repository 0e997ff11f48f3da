//! In-memory backends for tests

use crate::backend::{
    BackupDescriptor, BackupRequest, CheckIn, CheckInReceipt, CollabServer, ServerSnapshot,
    VersionStore,
};
use crate::collab::{OperationMessage, SequencedOperation, Sequencer};
use crate::error::{EditorError, Result};
use crate::versions::{diff, FileVersion, VersionComparison};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct MemoryStore {
    versions: Mutex<Vec<FileVersion>>,
    contents: Mutex<HashMap<String, String>>,
    failures: AtomicU32,
    attempts: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next `n` check-ins
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn check_in_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn versions(&self) -> Vec<FileVersion> {
        self.versions.lock().clone()
    }

    /// Add a version committed by someone else
    pub fn seed(&self, number: u32, content: &str, created_by: &str) -> String {
        let id = format!("server-v{}", number);
        let mut versions = self.versions.lock();
        for v in versions.iter_mut() {
            v.is_current_version = false;
        }
        versions.push(FileVersion {
            id: id.clone(),
            version_number: number,
            created_by: created_by.to_string(),
            created: Utc::now(),
            size: content.len(),
            comment: None,
            check_in_comment: None,
            is_minor_version: false,
            is_current_version: true,
            tags: Vec::new(),
            diff: None,
        });
        self.contents.lock().insert(id.clone(), content.to_string());
        id
    }

    fn content(&self, version_id: &str) -> Result<String> {
        self.contents
            .lock()
            .get(version_id)
            .cloned()
            .ok_or_else(|| EditorError::VersionNotFound(version_id.to_string()))
    }
}

#[async_trait]
impl VersionStore for MemoryStore {
    async fn detailed_versions(&self, _file_id: &str) -> Result<Vec<FileVersion>> {
        Ok(self.versions())
    }

    async fn check_in(&self, _file_id: &str, request: &CheckIn) -> Result<CheckInReceipt> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(EditorError::Persistence("503 Service Unavailable".into()));
        }

        let receipt = CheckInReceipt {
            version_id: format!("v{}", request.version_number),
            created: Utc::now(),
        };
        let mut versions = self.versions.lock();
        for v in versions.iter_mut() {
            v.is_current_version = false;
        }
        versions.push(FileVersion {
            id: receipt.version_id.clone(),
            version_number: request.version_number,
            created_by: request.created_by.clone(),
            created: receipt.created,
            size: request.content.len(),
            comment: request.comment.clone(),
            check_in_comment: request.comment.clone(),
            is_minor_version: request.is_minor_version,
            is_current_version: true,
            tags: Vec::new(),
            diff: None,
        });
        self.contents
            .lock()
            .insert(receipt.version_id.clone(), request.content.clone());
        Ok(receipt)
    }

    async fn add_tag(&self, _file_id: &str, version_id: &str, tag: &str) -> Result<()> {
        let mut versions = self.versions.lock();
        let version = versions
            .iter_mut()
            .find(|v| v.id == version_id)
            .ok_or_else(|| EditorError::VersionNotFound(version_id.to_string()))?;
        version.tags.push(tag.to_string());
        Ok(())
    }

    async fn compare(
        &self,
        _file_id: &str,
        version1_id: &str,
        version2_id: &str,
    ) -> Result<VersionComparison> {
        Ok(diff::compare(
            &self.content(version1_id)?,
            &self.content(version2_id)?,
        ))
    }

    async fn backup(&self, _file_id: &str, request: &BackupRequest) -> Result<BackupDescriptor> {
        let version_count = if request.include_version_history {
            self.versions.lock().len()
        } else {
            1
        };
        Ok(BackupDescriptor {
            backup_id: uuid::Uuid::new_v4().to_string(),
            created: Utc::now(),
            version_count,
        })
    }

    async fn version_content(&self, _file_id: &str, version_id: &str) -> Result<String> {
        self.content(version_id)
    }
}

pub struct MemoryServer {
    sequencer: Mutex<Sequencer>,
}

impl MemoryServer {
    pub fn new(content: &str, history_limit: usize) -> Arc<Self> {
        Arc::new(Self {
            sequencer: Mutex::new(Sequencer::new(content, history_limit)),
        })
    }

    pub fn submit(&self, message: &OperationMessage) -> Result<SequencedOperation> {
        self.sequencer.lock().submit(message)
    }

    pub fn content(&self) -> String {
        self.sequencer.lock().content()
    }
}

#[async_trait]
impl CollabServer for MemoryServer {
    async fn operations_since(&self, _file_id: &str, seq: u64) -> Result<Vec<SequencedOperation>> {
        self.sequencer.lock().operations_since(seq)
    }

    async fn snapshot(&self, _file_id: &str) -> Result<ServerSnapshot> {
        Ok(self.sequencer.lock().snapshot())
    }
}
