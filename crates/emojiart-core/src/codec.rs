//! Persisted form of an [`EmojiArt`] document.
//!
//! Documents are stored as JSON:
//!
//! ```json
//! { "background": "https://example.com/bg.png",
//!   "glyphs": [ { "text": "😀", "x": 10, "y": -4, "size": 40, "id": 1 } ] }
//! ```
//!
//! Decoding validates the whole buffer before building a document, so a
//! failure never leaves a partially populated value behind.

use crate::model::{EmojiArt, Glyph, GlyphId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Errors produced when persisted bytes cannot be turned into a document.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Glyph {0} has empty text")]
    EmptyText(GlyphId),
    #[error("Glyph {0} has zero size")]
    ZeroSize(GlyphId),
    #[error("Duplicate glyph id: {0}")]
    DuplicateId(GlyphId),
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    background: Option<&'a Url>,
    glyphs: &'a [Glyph],
}

#[derive(Deserialize)]
struct DocumentRecord {
    #[serde(default)]
    background: Option<Url>,
    #[serde(default)]
    glyphs: Vec<Glyph>,
}

/// Serialize a document to bytes.
pub fn encode(document: &EmojiArt) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&DocumentRef {
        background: document.background(),
        glyphs: document.glyphs(),
    })
}

/// Deserialize a document from bytes.
pub fn decode(bytes: &[u8]) -> Result<EmojiArt, DecodeError> {
    let record: DocumentRecord = serde_json::from_slice(bytes)?;

    let mut seen = HashSet::with_capacity(record.glyphs.len());
    for glyph in &record.glyphs {
        if glyph.text().is_empty() {
            return Err(DecodeError::EmptyText(glyph.id()));
        }
        if glyph.size() == 0 {
            return Err(DecodeError::ZeroSize(glyph.id()));
        }
        if !seen.insert(glyph.id()) {
            return Err(DecodeError::DuplicateId(glyph.id()));
        }
    }

    Ok(EmojiArt::from_parts(record.background, record.glyphs))
}

/// Decode `bytes`, falling back to an empty document when they are malformed.
pub fn decode_or_default(bytes: &[u8]) -> EmojiArt {
    match decode(bytes) {
        Ok(document) => document,
        Err(e) => {
            log::warn!("Discarding unreadable document: {}", e);
            EmojiArt::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EmojiArt {
        let mut doc = EmojiArt::new();
        doc.set_background(Some(Url::parse("https://example.com/bg.png").unwrap()));
        doc.add_glyph("😀", 10, -4, 40);
        doc.add_glyph("🍎", -120, 33, 64);
        doc
    }

    #[test]
    fn test_roundtrip() {
        let doc = sample();
        let bytes = encode(&doc).unwrap();
        assert_eq!(decode(&bytes).unwrap(), doc);
    }

    #[test]
    fn test_roundtrip_empty() {
        let doc = EmojiArt::new();
        let bytes = encode(&doc).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, doc);
        assert!(decoded.background().is_none());
    }

    #[test]
    fn test_roundtrip_after_removal() {
        let mut doc = sample();
        doc.remove_all_glyphs();
        doc.add_glyph("🐶", 1, 2, 3);

        let decoded = decode(&encode(&doc).unwrap()).unwrap();
        assert_eq!(decoded, doc);
        assert_eq!(decoded.glyphs()[0].id(), 3);
    }

    #[test]
    fn test_wire_format() {
        let json: serde_json::Value = serde_json::from_slice(&encode(&sample()).unwrap()).unwrap();
        assert_eq!(json["background"], "https://example.com/bg.png");
        assert_eq!(json["glyphs"][0]["text"], "😀");
        assert_eq!(json["glyphs"][0]["x"], 10);
        assert_eq!(json["glyphs"][0]["y"], -4);
        assert_eq!(json["glyphs"][0]["size"], 40);
        assert_eq!(json["glyphs"][1]["id"], 2);
    }

    #[test]
    fn test_missing_fields_default() {
        let doc = decode(b"{}").unwrap();
        assert!(doc.is_empty());
        assert!(doc.background().is_none());
    }

    #[test]
    fn test_decode_resumes_after_max_id() {
        let json = br#"{"background":null,"glyphs":[{"text":"X","x":0,"y":0,"size":40,"id":7}]}"#;
        let mut doc = decode(json).unwrap();
        assert_eq!(doc.add_glyph("Y", 0, 0, 40), Some(8));
    }

    #[test]
    fn test_malformed_bytes() {
        assert!(matches!(decode(b"not json"), Err(DecodeError::Json(_))));
        assert!(matches!(
            decode(br#"{"glyphs":[{"text":"X","x":0,"y":0,"size":-3,"id":1}]}"#),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            decode(br#"{"background":"not a url"}"#),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn test_invalid_glyphs() {
        assert!(matches!(
            decode(br#"{"glyphs":[{"text":"","x":0,"y":0,"size":4,"id":1}]}"#),
            Err(DecodeError::EmptyText(1))
        ));
        assert!(matches!(
            decode(br#"{"glyphs":[{"text":"X","x":0,"y":0,"size":0,"id":2}]}"#),
            Err(DecodeError::ZeroSize(2))
        ));
        assert!(matches!(
            decode(
                br#"{"glyphs":[{"text":"X","x":0,"y":0,"size":4,"id":3},
                               {"text":"Y","x":1,"y":1,"size":4,"id":3}]}"#
            ),
            Err(DecodeError::DuplicateId(3))
        ));
    }

    #[test]
    fn test_decode_or_default() {
        assert!(decode_or_default(b"\xff\xfe").is_empty());
        assert_eq!(decode_or_default(&encode(&sample()).unwrap()), sample());
    }
}
