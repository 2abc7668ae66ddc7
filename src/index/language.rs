//! URL based language guess for document metadata

use url::Url;

const LANGUAGE_CODES: &[&str] = &["es", "en", "fr", "de", "pt", "it", "ja", "zh", "ru", "ko"];

fn language_of_segment(segment: &str) -> Option<&'static str> {
    let lower = segment.to_ascii_lowercase();
    let (code, region) = match lower.split_once(['-', '_']) {
        Some((code, region)) => (code.to_string(), Some(region.to_string())),
        None => (lower, None),
    };

    if let Some(region) = region {
        if region.is_empty() || region.len() > 4 || !region.chars().all(|c| c.is_ascii_alphabetic())
        {
            return None;
        }
    }

    LANGUAGE_CODES.iter().copied().find(|known| *known == code)
}

fn language_of_tld(tld: &str) -> Option<&'static str> {
    match tld.to_ascii_lowercase().as_str() {
        "es" => Some("es"),
        "fr" => Some("fr"),
        "de" => Some("de"),
        "it" => Some("it"),
        "pt" | "br" => Some("pt"),
        "com" => Some("en"),
        _ => None,
    }
}

/// Guess the language of the page at `url`
///
/// A path segment naming a language (`/es/`, `/en-us/`) wins over the
/// top-level domain. Unparsable URLs and unknown domains get `default`.
pub fn detect_language(url: &str, default: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return default.to_string();
    };

    if let Some(language) = parsed
        .path_segments()
        .and_then(|mut segments| segments.find_map(language_of_segment))
    {
        return language.to_string();
    }

    parsed
        .host_str()
        .and_then(|host| host.rsplit('.').next())
        .and_then(language_of_tld)
        .unwrap_or(default)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segment_wins() {
        assert_eq!(detect_language("https://docs.python.org/es/3/", "en"), "es");
        assert_eq!(detect_language("https://example.com/fr/guide", "es"), "fr");
        assert_eq!(detect_language("https://example.es/en-us/docs", "es"), "en");
        assert_eq!(detect_language("https://example.org/docs/pt_BR/", "es"), "pt");
    }

    #[test]
    fn test_tld_fallback() {
        assert_eq!(detect_language("https://ejemplo.es/guia", "en"), "es");
        assert_eq!(detect_language("https://example.com/docs", "es"), "en");
        assert_eq!(detect_language("https://exemplo.com.br/", "es"), "pt");
        assert_eq!(detect_language("https://beispiel.de/", "es"), "de");
    }

    #[test]
    fn test_default() {
        assert_eq!(detect_language("https://example.org/guide", "es"), "es");
        assert_eq!(detect_language("not a url", "es"), "es");
    }

    #[test]
    fn test_words_that_merely_start_with_a_code_do_not_match() {
        assert_eq!(detect_language("https://example.org/english/", "es"), "es");
        assert_eq!(detect_language("https://example.org/es-2024/", "it"), "it");
        assert_eq!(detect_language("https://example.org/desktop", "es"), "es");
    }
}
