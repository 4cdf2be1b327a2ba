use sha2::{Digest, Sha256};

/// Portable, deterministic artifact name: `{label}--{short_hash(url)}.{extension}`.
pub fn artifact_filename(label: &str, url: &str, extension: &str) -> String {
    let label = sanitize_label(label);
    let hash = short_hash(url);
    format!("{label}--{hash}.{extension}")
}

fn sanitize_label(input: &str) -> String {
    let mut compacted = String::with_capacity(input.len());
    let mut prev_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            compacted.push(c.to_ascii_lowercase());
            prev_dash = false;
        } else if !prev_dash {
            compacted.push('-');
            prev_dash = true;
        }
    }
    let mut label = compacted.trim_matches('-').to_string();
    if label.is_empty() {
        label = "capture".to_string();
    }
    label.truncate(60);
    label
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_stable_and_portable() {
        let a = artifact_filename("Blocked: mid run!", "https://example.com/x", "png");
        let b = artifact_filename("Blocked: mid run!", "https://example.com/x", "png");
        assert_eq!(a, b);
        assert!(a.starts_with("blocked-mid-run--"));
        assert!(a.ends_with(".png"));
        assert_eq!(a.len(), "blocked-mid-run--".len() + 8 + ".png".len());
    }

    #[test]
    fn different_urls_differ() {
        assert_ne!(
            artifact_filename("t", "https://example.com/a", "html"),
            artifact_filename("t", "https://example.com/b", "html")
        );
    }

    #[test]
    fn empty_labels_get_a_placeholder() {
        assert!(artifact_filename("???", "u", "html").starts_with("capture--"));
    }
}
