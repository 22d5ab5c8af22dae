//! Shared URL path generation for store requests.
//!
//! Document ids and attachment names are user- or store-supplied strings, so every path
//! segment is percent-encoded here rather than at each call site.

/// Path of an attachment relative to the database URL: `{doc_id}/{name}`.
pub fn attachment_path(doc_id: &str, name: &str) -> String {
    format!(
        "{}/{}",
        urlencoding::encode(doc_id),
        urlencoding::encode(name)
    )
}

/// Path of the all-documents listing relative to the database URL.
pub const ALL_DOCS_PATH: &str = "_all_docs";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_path_plain() {
        assert_eq!(attachment_path("doc1", "a.mov"), "doc1/a.mov");
        assert_eq!(
            attachment_path("doc1", "compressed_video.mp4"),
            "doc1/compressed_video.mp4"
        );
    }

    #[test]
    fn test_attachment_path_encodes_segments() {
        assert_eq!(
            attachment_path("doc1", "take one.mov"),
            "doc1/take%20one.mov"
        );
        assert_eq!(attachment_path("a/b", "x?y#z"), "a%2Fb/x%3Fy%23z");
    }
}
