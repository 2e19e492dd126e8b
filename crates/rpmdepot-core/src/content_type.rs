//! Content-type inference for stored artifacts.
//!
//! The blob layer records a content type on every stored file. Callers hand
//! us a repository path, so the type is derived from the filename extension.

const OCTET_STREAM: &str = "application/octet-stream";

/// Map a filename to the content type recorded on its storage item.
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = filename.rsplit_once('.').map(|(_, ext)| ext);

    match extension {
        Some("rpm") => "application/x-rpm",
        Some("xml") => "application/xml",
        Some("gz") => "application/x-gzip",
        Some("bz2") => "application/x-bzip2",
        Some("sqlite") => "application/x-sqlite3",
        _ => OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_extensions() {
        assert_eq!(content_type_for("pkg/noarch/foo-1.0.rpm"), "application/x-rpm");
        assert_eq!(content_type_for("repo/repodata/repomd.xml"), "application/xml");
        assert_eq!(content_type_for("repo/repodata/primary.xml.gz"), "application/x-gzip");
    }

    #[test]
    fn falls_back_to_octet_stream() {
        assert_eq!(content_type_for("mystery"), OCTET_STREAM);
        assert_eq!(content_type_for("archive.zip"), OCTET_STREAM);
    }
}
