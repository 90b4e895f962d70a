use onion_common::Platform;
use std::cmp::Reverse;
use std::path::{Path, PathBuf};

/// Directories, relative to `app_dir`, worth scanning for a pre-installed
/// daemon before falling back to the installer pipeline.
fn candidate_roots(app_dir: &Path) -> Vec<PathBuf> {
    let os = Platform::os_token();
    let arch = match Platform::arch_token() {
        Ok(a) => a,
        Err(_) => return Vec::new(),
    };
    let suffix = format!("{os}-{arch}");
    let mut roots = vec![app_dir.join("tor").join(&suffix)];
    if let Some(parent) = app_dir.parent() {
        roots.push(parent.join("AppData").join("tor-bin").join(&suffix));
    }
    roots
}

fn collect_candidates(dir: &Path, exe_name: &str, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_candidates(&path, exe_name, out);
        } else if path.file_name().map(|n| n == exe_name).unwrap_or(false) {
            out.push(path);
        }
    }
}

fn is_preferred(path: &Path) -> bool {
    let s = path.to_string_lossy();
    s.contains("/bin/") || s.contains("\\bin\\") || s.contains("/Tor/") || s.contains("\\Tor\\")
}

fn is_debug(path: &Path) -> bool {
    let s = path.to_string_lossy().to_lowercase();
    s.contains("/debug/") || s.contains("\\debug\\")
}

/// Picks the best already-installed daemon binary on disk, if any.
/// `TOR_BINARY` always wins outright; this is only consulted when that
/// override is absent.
pub fn discover(app_dir: &Path) -> Option<PathBuf> {
    let exe_name = Platform::exe_name("tor");
    let mut candidates = Vec::new();
    for root in candidate_roots(app_dir) {
        collect_candidates(&root, &exe_name, &mut candidates);
    }
    candidates.retain(|p| !is_debug(p));
    candidates.sort_by_key(|p| Reverse(is_preferred(p)));
    candidates.into_iter().next()
}

pub fn resolve_override() -> Option<PathBuf> {
    std::env::var_os("TOR_BINARY").map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_returns_none_on_empty_app_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover(dir.path()).is_none());
    }

    #[test]
    fn discover_prefers_bin_dir_over_debug() {
        let dir = tempfile::tempdir().unwrap();
        let os = Platform::os_token();
        let arch = Platform::arch_token().unwrap();
        let exe_name = Platform::exe_name("tor");
        let root = dir.path().join("tor").join(format!("{os}-{arch}"));

        let debug_path = root.join("debug").join(&exe_name);
        let bin_path = root.join("bin").join(&exe_name);
        std::fs::create_dir_all(debug_path.parent().unwrap()).unwrap();
        std::fs::create_dir_all(bin_path.parent().unwrap()).unwrap();
        std::fs::write(&debug_path, b"fake").unwrap();
        std::fs::write(&bin_path, b"fake").unwrap();

        let found = discover(dir.path()).unwrap();
        assert_eq!(found, bin_path);
    }
}
