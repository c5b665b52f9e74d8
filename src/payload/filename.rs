//! Temp file naming for downloaded payloads.

use url::Url;

/// Name used when a locator has no usable final path segment.
const FALLBACK_FILENAME: &str = "payload.bin";

/// Derives the temp file name from a locator's final path segment.
///
/// The segment is percent-decoded and sanitized so it is always a single,
/// safe path component.
#[must_use]
pub(crate) fn filename_from_locator(url: &Url) -> String {
    let Some(last) = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
    else {
        return FALLBACK_FILENAME.to_string();
    };

    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned());
    let sanitized = sanitize_filename(&decoded);
    if sanitized.trim_matches('_').is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        sanitized
    }
}

/// Replaces path separators, reserved characters and control characters with `_`.
///
/// Names made only of dots are rewritten so they cannot address a parent
/// directory.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }
    if sanitized.chars().all(|c| c == '.') {
        return "_".repeat(sanitized.len());
    }
    sanitized
}

/// Inserts a numeric suffix before the extension: `cat.png` becomes `cat_2.png`.
pub(crate) fn suffixed_filename(name: &str, suffix: usize) -> String {
    let (stem, ext) = match name.rfind('.') {
        Some(pos) if pos > 0 => (&name[..pos], &name[pos..]),
        _ => (name, ""),
    };
    format!("{stem}_{suffix}{ext}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn name_for(raw: &str) -> String {
        filename_from_locator(&Url::parse(raw).unwrap())
    }

    #[test]
    fn test_uses_final_path_segment() {
        assert_eq!(name_for("https://i.redd.it/abc123.jpg"), "abc123.jpg");
        assert_eq!(name_for("https://i.imgur.com/a/b/c/photo.png"), "photo.png");
    }

    #[test]
    fn test_percent_encoded_segment_is_decoded() {
        assert_eq!(name_for("https://example.com/my%20cat.gif"), "my cat.gif");
    }

    #[test]
    fn test_encoded_separator_cannot_escape_directory() {
        assert_eq!(name_for("https://example.com/..%2F..%2Fetc.png"), ".._.._etc.png");
    }

    #[test]
    fn test_missing_segment_falls_back() {
        assert_eq!(name_for("https://example.com/"), "payload.bin");
        assert_eq!(name_for("https://example.com/dir/"), "payload.bin");
    }

    #[test]
    fn test_sanitize_filename_rewrites_dot_segments() {
        assert_eq!(sanitize_filename("."), "_");
        assert_eq!(sanitize_filename(".."), "__");
    }

    #[test]
    fn test_sanitize_filename_removes_invalid_chars() {
        assert_eq!(sanitize_filename("file:name.png"), "file_name.png");
        assert_eq!(sanitize_filename("file<name>.png"), "file_name_.png");
        assert_eq!(sanitize_filename("a\u{0}b.png"), "a_b.png");
    }

    #[test]
    fn test_suffixed_filename_keeps_extension() {
        assert_eq!(suffixed_filename("cat.png", 1), "cat_1.png");
        assert_eq!(suffixed_filename("archive.tar.gz", 3), "archive.tar_3.gz");
        assert_eq!(suffixed_filename("payload", 2), "payload_2");
        assert_eq!(suffixed_filename(".hidden", 1), ".hidden_1");
    }
}
