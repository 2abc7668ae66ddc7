//! Turning response bytes into text.
//!
//! The order is fixed: strict UTF-8, the charset the server declared, a
//! sniffed guess, a list of fallback candidates, and finally lossy UTF-8.
//! Every step except the last must decode without a single error to be
//! accepted. The policy is a plain value passed to the fetcher; nothing
//! here reads or changes process-wide locale state.

use std::borrow::Cow;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use tracing::debug;

/// Candidate labels tried after sniffing, in order.
pub const DEFAULT_CANDIDATES: &[&str] = &["utf-8", "latin1", "iso-8859-1", "windows-1252"];

/// Which step of the fallback chain produced the text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeSource {
    /// The bytes were valid UTF-8
    Utf8,
    /// The charset from the Content-Type header
    Declared,
    /// The encoding detector's guess
    Sniffed,
    /// One of the fallback candidates
    Candidate,
    /// Lossy UTF-8, invalid sequences replaced with U+FFFD
    Lossy,
}

/// Decoded text with the encoding that produced it
#[derive(Debug, Clone)]
pub struct Decoded {
    /// The decoded text
    pub text: String,
    /// Encoding used
    pub encoding: &'static Encoding,
    /// Step of the chain that succeeded
    pub source: DecodeSource,
}

/// Explicit decoding parameters for fetched pages
#[derive(Debug, Clone)]
pub struct DecodePolicy {
    /// Trust the charset parameter of the Content-Type header
    pub use_declared_charset: bool,
    /// Run the encoding detector over the raw bytes
    pub sniff: bool,
    /// Encodings tried, strictly, after sniffing
    pub candidates: Vec<&'static Encoding>,
}

impl Default for DecodePolicy {
    fn default() -> Self {
        Self::with_candidate_labels(DEFAULT_CANDIDATES)
    }
}

impl DecodePolicy {
    /// Build a policy from encoding labels; unknown labels and repeats are skipped
    pub fn with_candidate_labels(labels: &[&str]) -> Self {
        let mut candidates: Vec<&'static Encoding> = Vec::new();
        for label in labels {
            if let Some(encoding) = Encoding::for_label(label.as_bytes()) {
                if !candidates.contains(&encoding) {
                    candidates.push(encoding);
                }
            }
        }

        Self {
            use_declared_charset: true,
            sniff: true,
            candidates,
        }
    }

    /// Decode `bytes`.
    ///
    /// `declared` is the charset label from the response headers, if any.
    /// `tld` is the host's top-level domain, used as a hint by the detector.
    pub fn decode(&self, bytes: &[u8], declared: Option<&str>, tld: Option<&str>) -> Decoded {
        if let Ok(text) = std::str::from_utf8(bytes) {
            return Decoded {
                text: text.to_string(),
                encoding: UTF_8,
                source: DecodeSource::Utf8,
            };
        }

        if self.use_declared_charset {
            if let Some(encoding) = declared.and_then(|l| Encoding::for_label(l.trim().as_bytes())) {
                if let Some(text) = strict(encoding, bytes) {
                    debug!(encoding = encoding.name(), "decoded with declared charset");
                    return Decoded {
                        text,
                        encoding,
                        source: DecodeSource::Declared,
                    };
                }
            }
        }

        if self.sniff {
            let mut detector = EncodingDetector::new();
            detector.feed(bytes, true);
            let guess = detector.guess(tld.map(str::as_bytes), true);
            if let Some(text) = strict(guess, bytes) {
                debug!(encoding = guess.name(), "decoded with sniffed encoding");
                return Decoded {
                    text,
                    encoding: guess,
                    source: DecodeSource::Sniffed,
                };
            }
        }

        for &encoding in &self.candidates {
            if let Some(text) = strict(encoding, bytes) {
                debug!(encoding = encoding.name(), "decoded with fallback candidate");
                return Decoded {
                    text,
                    encoding,
                    source: DecodeSource::Candidate,
                };
            }
        }

        debug!("no encoding decoded cleanly, replacing invalid sequences");
        Decoded {
            text: String::from_utf8_lossy(bytes).into_owned(),
            encoding: UTF_8,
            source: DecodeSource::Lossy,
        }
    }
}

fn strict(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(Cow::into_owned)
}

/// Extract the `charset` parameter from a Content-Type value
pub fn charset_from_content_type(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"'))
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    #[test]
    fn test_utf8_first() {
        let decoded = DecodePolicy::default().decode("canción".as_bytes(), Some("iso-8859-1"), None);
        assert_eq!(decoded.text, "canción");
        assert_eq!(decoded.source, DecodeSource::Utf8);
    }

    #[test]
    fn test_declared_charset_used_for_invalid_utf8() {
        let (bytes, _, _) = WINDOWS_1252.encode("Educación física");
        let decoded = DecodePolicy::default().decode(&bytes, Some("windows-1252"), None);
        assert_eq!(decoded.text, "Educación física");
        assert_eq!(decoded.source, DecodeSource::Declared);
    }

    #[test]
    fn test_latin1_without_declaration_is_recovered() {
        let (bytes, _, _) = WINDOWS_1252.encode("La configuración del año pasado está aquí");
        let decoded = DecodePolicy::default().decode(&bytes, None, Some("es"));
        assert_eq!(decoded.text, "La configuración del año pasado está aquí");
        assert_ne!(decoded.source, DecodeSource::Lossy);
    }

    #[test]
    fn test_candidates_when_sniffing_disabled() {
        let policy = DecodePolicy {
            sniff: false,
            use_declared_charset: false,
            ..DecodePolicy::default()
        };
        let decoded = policy.decode(&[b'c', b'a', b'f', 0xE9], None, None);
        assert_eq!(decoded.text, "café");
        assert_eq!(decoded.source, DecodeSource::Candidate);
        assert_eq!(decoded.encoding, WINDOWS_1252);
    }

    #[test]
    fn test_lossy_last_resort() {
        let policy = DecodePolicy {
            sniff: false,
            use_declared_charset: false,
            candidates: vec![UTF_8],
        };
        let decoded = policy.decode(&[b'o', b'k', 0xFF], None, None);
        assert_eq!(decoded.text, "ok\u{FFFD}");
        assert_eq!(decoded.source, DecodeSource::Lossy);
    }

    #[test]
    fn test_candidate_labels_are_deduplicated() {
        // latin1, iso-8859-1 and windows-1252 are one encoding in the WHATWG registry
        let policy = DecodePolicy::default();
        assert_eq!(policy.candidates, vec![UTF_8, WINDOWS_1252]);
    }

    #[test]
    fn test_charset_from_content_type() {
        assert_eq!(
            charset_from_content_type("text/html; charset=ISO-8859-1"),
            Some("ISO-8859-1")
        );
        assert_eq!(
            charset_from_content_type("text/html;Charset=\"utf-8\""),
            Some("utf-8")
        );
        assert_eq!(charset_from_content_type("text/html"), None);
    }
}
