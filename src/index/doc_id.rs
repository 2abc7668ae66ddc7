//! Stable document identifiers.
//!
//! Ids are part of the storage contract: re-indexing a page must produce the
//! same id on any machine so the collection overwrites instead of
//! duplicating.

use url::Url;

const PREFIX: &str = "doc_";
const HEX_DIGITS: usize = 32;

/// Canonical form of a page URL used for hashing
///
/// Parsed URLs are serialized without their fragment. Strings that do not
/// parse are hashed as given.
fn canonical(url: &str) -> String {
    match Url::parse(url.trim()) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.trim().to_string(),
    }
}

/// Identifier of the document stored for `url`
pub fn document_id(url: &str) -> String {
    let hash = blake3::hash(canonical(url).as_bytes());
    let hex = hash.to_hex();
    format!("{}{}", PREFIX, &hex[..HEX_DIGITS])
}
