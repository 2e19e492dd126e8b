use bson::oid::ObjectId;
use bson::DateTime;
use chrono::{DateTime as UtcDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::FileDescriptor;

/// Metadata sub-document of a stored file.
///
/// All fields are optional at the type level: records damaged out-of-band
/// may lack any of them, and `markedAsDeleted` is only present once a file
/// has entered the deletion lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,

    #[serde(
        rename = "markedAsDeleted",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub marked_as_deleted: Option<DateTime>,
}

/// One stored artifact as persisted in the files collection.
///
/// Field names mirror the persisted document (`uploadDate`, `chunkSize`,
/// `markedAsDeleted`). `filename` and `metadata` are optional because a
/// record that lost either of them is corrupt, not unrepresentable; see
/// [`FileStorageItem::is_corrupt`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStorageItem {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    #[serde(rename = "uploadDate")]
    pub upload_date: DateTime,

    pub length: i64,

    #[serde(rename = "chunkSize")]
    pub chunk_size: i32,

    #[serde(rename = "contentType", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FileMetadata>,
}

impl FileStorageItem {
    /// Build the record for a freshly stored file.
    pub fn new(
        id: ObjectId,
        descriptor: &FileDescriptor,
        length: i64,
        chunk_size: i32,
        content_type: &str,
        md5: String,
        upload_date: DateTime,
    ) -> Self {
        FileStorageItem {
            id,
            filename: Some(descriptor.path()),
            upload_date,
            length,
            chunk_size,
            content_type: Some(content_type.to_string()),
            md5: Some(md5),
            metadata: Some(FileMetadata {
                repo: Some(descriptor.repo().to_string()),
                arch: Some(descriptor.arch().to_string()),
                marked_as_deleted: None,
            }),
        }
    }

    pub fn repo(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.repo.as_deref())
    }

    pub fn arch(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.arch.as_deref())
    }

    pub fn upload_date_utc(&self) -> UtcDateTime<Utc> {
        self.upload_date.to_chrono()
    }

    /// Timestamp of the first (and only) deletion mark, if any.
    pub fn marked_as_deleted(&self) -> Option<UtcDateTime<Utc>> {
        self.metadata
            .as_ref()
            .and_then(|m| m.marked_as_deleted)
            .map(|d| d.to_chrono())
    }

    /// A record is corrupt when its filename or its metadata sub-document
    /// was lost. Corrupt records never surface from ordinary lookups.
    pub fn is_corrupt(&self) -> bool {
        self.filename.is_none() || self.metadata.is_none()
    }

    /// Live means present and not yet marked for deletion.
    pub fn is_live(&self) -> bool {
        !self.is_corrupt() && self.marked_as_deleted().is_none()
    }
}
