//! Persisted layout of the files collection and its chunk sibling.
//!
//! Field names and filter shapes live here so both backends (and the
//! tests) agree on a single source of truth for the document schema.

use bson::{doc, Bson, DateTime, Document};

pub const FILES_COLLECTION: &str = "fs.files";
pub const CHUNKS_COLLECTION: &str = "fs.chunks";

pub const ID_KEY: &str = "_id";
pub const FILENAME_KEY: &str = "filename";
pub const UPLOAD_DATE_KEY: &str = "uploadDate";
pub const METADATA_KEY: &str = "metadata";

/// Field names inside the `metadata` sub-document.
pub const REPO_FIELD: &str = "repo";
pub const ARCH_FIELD: &str = "arch";
pub const MARKED_AS_DELETED_FIELD: &str = "markedAsDeleted";

/// Dotted paths for queries against the `metadata` sub-document.
pub const REPO_KEY: &str = "metadata.repo";
pub const ARCH_KEY: &str = "metadata.arch";
pub const MARKED_AS_DELETED_KEY: &str = "metadata.markedAsDeleted";

pub const CHUNK_FILES_ID_KEY: &str = "files_id";
pub const CHUNK_N_KEY: &str = "n";
pub const CHUNK_DATA_KEY: &str = "data";

/// GridFS default chunk size, 255 KiB.
pub const CHUNK_SIZE_BYTES: i32 = 255 * 1024;

/// Architecture directory holding generated repository metadata rather
/// than packages.
pub const REPODATA_ARCH: &str = "repodata";

pub const RPM_SUFFIX: &str = ".rpm";

/// Filter matching the live records at `path`: metadata intact and no
/// deletion mark. Doubles as the condition of the monotonic mark update —
/// a record that already carries a mark never matches, so the first mark
/// is preserved verbatim.
pub fn live_filter(path: &str) -> Document {
    doc! {
        FILENAME_KEY: path,
        METADATA_KEY: { "$exists": true, "$ne": Bson::Null },
        MARKED_AS_DELETED_KEY: { "$exists": false },
    }
}

/// Filter matching records whose structural invariants were violated:
/// `filename` or `metadata` null or absent.
pub fn corrupt_filter() -> Document {
    doc! {
        "$or": [
            { FILENAME_KEY: Bson::Null },
            { METADATA_KEY: Bson::Null },
        ],
    }
}

/// All non-corrupt records whose filename starts with `prefix`. A filename
/// that is null or absent cannot match the anchored regex, so only the
/// metadata presence needs to be stated.
pub fn prefix_filter(prefix: &str) -> Document {
    doc! {
        FILENAME_KEY: { "$regex": format!("^{}", regex::escape(prefix)) },
        METADATA_KEY: { "$exists": true, "$ne": Bson::Null },
    }
}

/// Packages of `repo`: filename ends with `.rpm`, case-sensitive.
pub fn rpm_filter(repo: &str) -> Document {
    doc! {
        REPO_KEY: repo,
        FILENAME_KEY: { "$regex": format!("{}$", regex::escape(RPM_SUFFIX)) },
    }
}

/// Records whose deletion mark is strictly older than `cutoff`.
pub fn marked_before_filter(cutoff: DateTime) -> Document {
    doc! { MARKED_AS_DELETED_KEY: { "$lt": cutoff } }
}

// Document accessors shared by the in-memory backend and the tests. They
// read raw documents the way the store evaluates the filters above:
// a field that is Bson::Null counts as absent.

pub fn doc_filename(document: &Document) -> Option<&str> {
    match document.get(FILENAME_KEY) {
        Some(Bson::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

pub fn doc_metadata(document: &Document) -> Option<&Document> {
    match document.get(METADATA_KEY) {
        Some(Bson::Document(d)) => Some(d),
        _ => None,
    }
}

pub fn doc_repo(document: &Document) -> Option<&str> {
    match doc_metadata(document)?.get(REPO_FIELD) {
        Some(Bson::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

pub fn doc_arch(document: &Document) -> Option<&str> {
    match doc_metadata(document)?.get(ARCH_FIELD) {
        Some(Bson::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

pub fn doc_upload_date(document: &Document) -> Option<DateTime> {
    match document.get(UPLOAD_DATE_KEY) {
        Some(Bson::DateTime(d)) => Some(*d),
        _ => None,
    }
}

pub fn doc_marked_as_deleted(document: &Document) -> Option<DateTime> {
    match doc_metadata(document)?.get(MARKED_AS_DELETED_FIELD) {
        Some(Bson::DateTime(d)) => Some(*d),
        _ => None,
    }
}

pub fn doc_is_corrupt(document: &Document) -> bool {
    doc_filename(document).is_none() || doc_metadata(document).is_none()
}

/// Live at `path`: filename matches, metadata intact, no deletion mark.
pub fn doc_is_live_at(document: &Document, path: &str) -> bool {
    doc_filename(document) == Some(path)
        && doc_metadata(document).is_some()
        && doc_marked_as_deleted(document).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;

    #[test]
    fn prefix_filter_escapes_regex_metacharacters() {
        let filter = prefix_filter("repo/noarch/c++-1.0");
        let regex = filter
            .get_document(FILENAME_KEY)
            .unwrap()
            .get_str("$regex")
            .unwrap();
        assert!(regex.starts_with('^'));
        assert!(regex.contains(r"c\+\+"));
    }

    #[test]
    fn null_fields_count_as_absent() {
        let document = doc! {
            ID_KEY: ObjectId::new(),
            FILENAME_KEY: Bson::Null,
            METADATA_KEY: { REPO_FIELD: "r" },
        };
        assert_eq!(doc_filename(&document), None);
        assert!(doc_is_corrupt(&document));

        let document = doc! {
            ID_KEY: ObjectId::new(),
            FILENAME_KEY: "r/noarch/f.rpm",
            METADATA_KEY: Bson::Null,
        };
        assert_eq!(doc_metadata(&document), None);
        assert!(doc_is_corrupt(&document));
    }

    #[test]
    fn live_check_requires_unmarked_metadata() {
        let path = "r/noarch/f.rpm";
        let mut document = doc! {
            ID_KEY: ObjectId::new(),
            FILENAME_KEY: path,
            METADATA_KEY: { REPO_FIELD: "r", ARCH_FIELD: "noarch" },
        };
        assert!(doc_is_live_at(&document, path));

        document
            .get_document_mut(METADATA_KEY)
            .unwrap()
            .insert(MARKED_AS_DELETED_FIELD, DateTime::now());
        assert!(!doc_is_live_at(&document, path));
    }
}
