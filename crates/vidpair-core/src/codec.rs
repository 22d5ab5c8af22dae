//! Document codec
//!
//! Converts a [`PairDocument`] to and from the JSON body stored in the database:
//!
//! ```json
//! { "_id": "...", "_rev": "...", "video1": { ... }, "video2": { ... }, "_attachments": { ... } }
//! ```
//!
//! `_id`, `_rev` and `_attachments` are only written when present, so a freshly built
//! document encodes to exactly `{video1, video2}` for the create call. Decoding ignores
//! unknown fields the store or other clients may have added.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::CodecError;
use crate::models::{AttachmentStub, PairDocument, VideoRecord};

#[derive(Serialize)]
struct WireDocumentRef<'a> {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    rev: Option<&'a str>,
    video1: &'a VideoRecord,
    video2: &'a VideoRecord,
    #[serde(rename = "_attachments", skip_serializing_if = "BTreeMap::is_empty")]
    attachments: BTreeMap<&'a str, WireStubRef<'a>>,
}

#[derive(Serialize)]
struct WireStubRef<'a> {
    content_type: &'a str,
    length: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    digest: Option<&'a str>,
    // Tells the store to keep the existing attachment data on update
    stub: bool,
}

#[derive(Deserialize)]
struct WireDocument {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(rename = "_rev", default)]
    rev: Option<String>,
    video1: VideoRecord,
    video2: VideoRecord,
    #[serde(rename = "_attachments", default)]
    attachments: BTreeMap<String, AttachmentStub>,
}

impl From<WireDocument> for PairDocument {
    fn from(wire: WireDocument) -> Self {
        PairDocument {
            id: wire.id,
            rev: wire.rev,
            video_a: wire.video1,
            video_b: wire.video2,
            attachments: wire.attachments,
        }
    }
}

fn to_wire(doc: &PairDocument) -> WireDocumentRef<'_> {
    WireDocumentRef {
        id: doc.id.as_deref(),
        rev: doc.rev.as_deref(),
        video1: &doc.video_a,
        video2: &doc.video_b,
        attachments: doc
            .attachments
            .iter()
            .map(|(name, stub)| {
                (
                    name.as_str(),
                    WireStubRef {
                        content_type: &stub.content_type,
                        length: stub.length,
                        digest: stub.digest.as_deref(),
                        stub: true,
                    },
                )
            })
            .collect(),
    }
}

/// Serialize a document to its JSON wire form.
pub fn encode(doc: &PairDocument) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(&to_wire(doc)).map_err(|e| CodecError::Encoding(e.to_string()))
}

/// Parse a document body as returned by the store.
pub fn decode(bytes: &[u8]) -> Result<PairDocument, CodecError> {
    serde_json::from_slice::<WireDocument>(bytes)
        .map(PairDocument::from)
        .map_err(|e| CodecError::Decoding(e.to_string()))
}

/// Parse an already-deserialized document (e.g. one row of an `_all_docs` listing).
pub fn decode_value(value: serde_json::Value) -> Result<PairDocument, CodecError> {
    serde_json::from_value::<WireDocument>(value)
        .map(PairDocument::from)
        .map_err(|e| CodecError::Decoding(e.to_string()))
}
