use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MARKER_FILE: &str = ".installed";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstallMarker {
    pub version: String,
    pub file: String,
    pub sha256: String,
}

impl InstallMarker {
    pub fn write(dir: &Path, marker: &InstallMarker) -> std::io::Result<()> {
        let text = toml::to_string_pretty(marker)
            .unwrap_or_else(|_| String::from("# failed to serialize install marker"));
        std::fs::write(dir.join(MARKER_FILE), text)
    }

    pub fn read(dir: &Path) -> Option<InstallMarker> {
        let text = std::fs::read_to_string(dir.join(MARKER_FILE)).ok()?;
        toml::from_str(&text).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let marker = InstallMarker {
            version: "14.5.1".into(),
            file: "tor-expert-bundle-linux-x86_64-14.5.1.tar.gz".into(),
            sha256: "a".repeat(64),
        };
        InstallMarker::write(dir.path(), &marker).unwrap();
        let read_back = InstallMarker::read(dir.path()).unwrap();
        assert_eq!(marker, read_back);
    }

    #[test]
    fn missing_marker_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(InstallMarker::read(dir.path()).is_none());
    }
}
