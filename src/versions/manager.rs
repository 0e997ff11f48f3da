//! VersionManager: the append-only version log of one file
//!
//! Saving is two-phase. `draft` computes the next version (number, diff,
//! size) without touching the log; `commit` appends it once the store has
//! accepted it. A failed save therefore never consumes a version number.

use super::diff::{compare, DiffStats, VersionComparison};
use crate::error::{EditorError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A numbered snapshot of the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileVersion {
    pub id: String,
    pub version_number: u32,
    pub created_by: String,
    pub created: DateTime<Utc>,
    /// Content size in bytes
    pub size: usize,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub check_in_comment: Option<String>,
    pub is_minor_version: bool,
    pub is_current_version: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub diff: Option<DiffStats>,
}

/// A version computed but not yet persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDraft {
    pub version_number: u32,
    pub content: String,
    pub comment: Option<String>,
    pub is_minor_version: bool,
    pub created_by: String,
    /// `None` when the current version's content is not cached locally
    pub diff: Option<DiffStats>,
}

/// Append-only version log with content snapshots
#[derive(Debug, Clone)]
pub struct VersionManager {
    file_id: String,
    /// Ordered by version number
    versions: Vec<FileVersion>,
    /// Content by version id, for versions this client has seen the content of
    snapshots: HashMap<String, String>,
}

impl VersionManager {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            versions: Vec::new(),
            snapshots: HashMap::new(),
        }
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    /// All versions, oldest first
    pub fn versions(&self) -> &[FileVersion] {
        &self.versions
    }

    pub fn current(&self) -> Option<&FileVersion> {
        self.versions.iter().find(|v| v.is_current_version)
    }

    pub fn get(&self, version_id: &str) -> Option<&FileVersion> {
        self.versions.iter().find(|v| v.id == version_id)
    }

    /// Content of a version, if known locally
    pub fn snapshot(&self, version_id: &str) -> Option<&str> {
        self.snapshots.get(version_id).map(String::as_str)
    }

    /// Remember fetched content for a version
    pub fn cache_snapshot(&mut self, version_id: &str, content: String) {
        if self.get(version_id).is_some() {
            self.snapshots.insert(version_id.to_string(), content);
        }
    }

    pub fn next_version_number(&self) -> u32 {
        self.versions
            .iter()
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Compute the next version for `content` without changing the log
    pub fn draft(
        &self,
        content: &str,
        comment: Option<String>,
        is_minor_version: bool,
        created_by: &str,
    ) -> VersionDraft {
        let diff = match self.current() {
            None => Some(compare("", content).stats()),
            Some(current) => self
                .snapshot(&current.id)
                .map(|previous| compare(previous, content).stats()),
        };

        VersionDraft {
            version_number: self.next_version_number(),
            content: content.to_string(),
            comment,
            is_minor_version,
            created_by: created_by.to_string(),
            diff,
        }
    }

    /// Append a persisted draft as the new current version
    ///
    /// # Errors
    ///
    /// `EditorError::Persistence` if another version with the draft's number
    /// was committed in the meantime.
    pub fn commit(
        &mut self,
        draft: VersionDraft,
        id: String,
        created: DateTime<Utc>,
    ) -> Result<&FileVersion> {
        if draft.version_number != self.next_version_number() {
            return Err(EditorError::Persistence(format!(
                "version {} already exists for {}",
                draft.version_number, self.file_id
            )));
        }

        for version in &mut self.versions {
            version.is_current_version = false;
        }

        let version = FileVersion {
            id: id.clone(),
            version_number: draft.version_number,
            created_by: draft.created_by,
            created,
            size: draft.content.len(),
            check_in_comment: draft.comment.clone(),
            comment: draft.comment,
            is_minor_version: draft.is_minor_version,
            is_current_version: true,
            tags: Vec::new(),
            diff: draft.diff,
        };

        tracing::info!(
            file = %self.file_id,
            version = version.version_number,
            minor = version.is_minor_version,
            "version committed"
        );

        self.snapshots.insert(id, draft.content);
        self.versions.push(version);
        Ok(&self.versions[self.versions.len() - 1])
    }

    /// Draft and commit in one step with a locally generated id
    pub fn save_file(
        &mut self,
        content: &str,
        comment: Option<String>,
        is_minor_version: bool,
        created_by: &str,
    ) -> Result<&FileVersion> {
        let draft = self.draft(content, comment, is_minor_version, created_by);
        self.commit(draft, uuid::Uuid::new_v4().to_string(), Utc::now())
    }

    /// Attach a tag to an existing version (metadata only)
    pub fn add_tag(&mut self, version_id: &str, tag: &str) -> Result<&FileVersion> {
        let version = self
            .versions
            .iter_mut()
            .find(|v| v.id == version_id)
            .ok_or_else(|| EditorError::VersionNotFound(version_id.to_string()))?;

        if !version.tags.iter().any(|t| t == tag) {
            version.tags.push(tag.to_string());
        }
        Ok(version)
    }

    /// Line diff between two locally known snapshots
    pub fn compare(&self, older_id: &str, newer_id: &str) -> Result<VersionComparison> {
        let older = self
            .snapshot(older_id)
            .ok_or_else(|| EditorError::VersionNotFound(older_id.to_string()))?;
        let newer = self
            .snapshot(newer_id)
            .ok_or_else(|| EditorError::VersionNotFound(newer_id.to_string()))?;
        Ok(compare(older, newer))
    }

    /// Fold a server listing into the log
    ///
    /// Unknown versions are appended; known ones keep local snapshots and
    /// take the server's tags. The highest-numbered version becomes current.
    pub fn merge_remote(&mut self, listing: Vec<FileVersion>) {
        for remote in listing {
            match self.versions.iter_mut().find(|v| v.id == remote.id) {
                Some(local) => {
                    for tag in remote.tags {
                        if !local.tags.contains(&tag) {
                            local.tags.push(tag);
                        }
                    }
                }
                None => {
                    if self
                        .versions
                        .iter()
                        .any(|v| v.version_number == remote.version_number)
                    {
                        tracing::warn!(
                            file = %self.file_id,
                            version = remote.version_number,
                            "conflicting version number in listing, skipped"
                        );
                        continue;
                    }
                    self.versions.push(remote);
                }
            }
        }

        self.versions.sort_by_key(|v| v.version_number);
        let latest = self.versions.len().saturating_sub(1);
        for (i, version) in self.versions.iter_mut().enumerate() {
            version.is_current_version = i == latest;
        }
    }
}
