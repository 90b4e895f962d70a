/// Parses a `sha256sums-*.txt` body, returning the hex digest for the
/// entry whose filename ends with `bundle_name` (distributions sometimes
/// prefix entries with a directory component).
pub fn find_digest(checksums_text: &str, bundle_name: &str) -> Option<String> {
    for line in checksums_text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let mut parts = trimmed.splitn(2, char::is_whitespace);
        let digest = parts.next()?;
        let rest = parts.next()?.trim_start();
        let filename = rest.strip_prefix('*').unwrap_or(rest);

        if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            continue;
        }
        if filename.ends_with(bundle_name) {
            return Some(digest.to_lowercase());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_matching_entry_with_binary_marker() {
        let text = format!(
            "{} *tor-expert-bundle-linux-x86_64-14.5.1.tar.gz\n",
            "a".repeat(64)
        );
        let digest = find_digest(&text, "tor-expert-bundle-linux-x86_64-14.5.1.tar.gz").unwrap();
        assert_eq!(digest, "a".repeat(64));
    }

    #[test]
    fn matches_entries_prefixed_with_a_directory() {
        let text = format!(
            "{}  dist/tor-expert-bundle-macos-aarch64-14.5.1.tar.gz\n",
            "b".repeat(64)
        );
        let digest =
            find_digest(&text, "tor-expert-bundle-macos-aarch64-14.5.1.tar.gz").unwrap();
        assert_eq!(digest, "b".repeat(64));
    }

    #[test]
    fn returns_none_when_bundle_absent() {
        let text = format!("{} *other-file.tar.gz\n", "c".repeat(64));
        assert!(find_digest(&text, "tor-expert-bundle-linux-x86_64-14.5.1.tar.gz").is_none());
    }
}
