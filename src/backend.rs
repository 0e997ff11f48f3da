//! Remote collaborators consumed by the editing core
//!
//! The core never talks HTTP or WebSocket itself. Storage and the
//! collaboration channel are reached through these traits; the host
//! application supplies implementations over its transport of choice.

use crate::collab::messages::SequencedOperation;
use crate::error::Result;
use crate::versions::{FileVersion, VersionComparison};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Body of a check-in request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
    pub version_number: u32,
    pub comment: Option<String>,
    pub is_minor_version: bool,
    pub content: String,
    pub created_by: String,
}

/// Store's answer to an accepted check-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInReceipt {
    pub version_id: String,
    pub created: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRequest {
    pub include_version_history: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDescriptor {
    pub backup_id: String,
    pub created: chrono::DateTime<chrono::Utc>,
    pub version_count: usize,
}

/// Server copy of a document at a sequence number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSnapshot {
    pub seq: u64,
    pub content: String,
}

/// File version persistence (`/files/{id}/...` REST surface)
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// `GET /files/{id}/versions/detailed`
    async fn detailed_versions(&self, file_id: &str) -> Result<Vec<FileVersion>>;

    /// `POST /files/{id}/checkin`
    async fn check_in(&self, file_id: &str, request: &CheckIn) -> Result<CheckInReceipt>;

    /// `POST /files/{id}/versions/{versionId}/tags`
    async fn add_tag(&self, file_id: &str, version_id: &str, tag: &str) -> Result<()>;

    /// `POST /files/{id}/compare`
    async fn compare(
        &self,
        file_id: &str,
        version1_id: &str,
        version2_id: &str,
    ) -> Result<VersionComparison>;

    /// `POST /files/{id}/backup`
    async fn backup(&self, file_id: &str, request: &BackupRequest) -> Result<BackupDescriptor>;

    /// Full content of one version
    async fn version_content(&self, file_id: &str, version_id: &str) -> Result<String>;
}

/// Catch-up side of the collaboration channel
///
/// Live traffic flows as [`crate::collab::ServerMessage`]s; these calls are
/// only used to recover after a gap.
#[async_trait]
pub trait CollabServer: Send + Sync {
    /// Sequenced operations after `seq`, in order
    ///
    /// Fails with `HistoryTruncated` when the server no longer has them.
    async fn operations_since(&self, file_id: &str, seq: u64) -> Result<Vec<SequencedOperation>>;

    async fn snapshot(&self, file_id: &str) -> Result<ServerSnapshot>;
}
