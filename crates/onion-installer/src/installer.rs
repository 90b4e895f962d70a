use crate::archive::ArchiveExtractor;
use crate::checksums;
use crate::error::{GpgWarning, GpgWarningCode, InstallerError};
use crate::fetcher::HttpFetcher;
use crate::hash::HashVerifier;
use crate::lock::InstallLock;
use crate::marker::InstallMarker;
use crate::signature::{SignatureVerifier, SystemGpg};
use crate::version::latest_version;
use onion_common::{Platform, BUNDLE_PREFIX};
use std::path::{Path, PathBuf};
use std::time::Duration;

const INDEX_URL: &str = "https://dist.torproject.org/torbrowser/";
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

pub struct InstallerConfig {
    pub install_root: PathBuf,
    pub require_gpg: bool,
    pub allowed_fingerprints: Vec<String>,
    /// Overrides `dist.torproject.org/torbrowser/` — used by tests and by
    /// operators mirroring the bundle internally. `None` uses the default.
    pub index_base_url: Option<String>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            install_root: std::env::temp_dir().join("onion-install"),
            require_gpg: false,
            allowed_fingerprints: Vec::new(),
            index_base_url: None,
        }
    }
}

pub struct Installer {
    config: InstallerConfig,
    fetcher: HttpFetcher,
    /// Out-of-band warnings collected during the most recent `ensure_present`.
    pub warnings: Vec<GpgWarning>,
}

impl Installer {
    pub fn new(config: InstallerConfig) -> Self {
        Self {
            config,
            fetcher: HttpFetcher::new(),
            warnings: Vec::new(),
        }
    }

    fn index_url(&self) -> String {
        self.config
            .index_base_url
            .clone()
            .unwrap_or_else(|| INDEX_URL.to_string())
    }

    fn target_dir(&self) -> PathBuf {
        let os = Platform::os_token();
        let arch = Platform::arch_token().unwrap_or("x86_64");
        self.config.install_root.join(format!("{os}-{arch}"))
    }

    /// `force_download=false` short-circuits when a valid `.installed`
    /// marker matches the newest discovered version and its binary is
    /// still present and executable.
    pub async fn ensure_present(&mut self, force_download: bool) -> Result<PathBuf, InstallerError> {
        self.warnings.clear();

        let os = Platform::os_token();
        let arch = Platform::arch_token().map_err(InstallerError::HttpError)?;

        let index_url = self.index_url();
        let index_html_bytes = self.fetcher.get(&index_url, HTTP_TIMEOUT).await?;
        let index_html = String::from_utf8_lossy(&index_html_bytes).to_string();
        let version = latest_version(&index_html).ok_or(InstallerError::NoVersionsFound)?;

        let target_dir = self.target_dir();

        if !force_download {
            if let Some(marker) = InstallMarker::read(&target_dir) {
                if marker.version == version {
                    if let Ok(Some(bin)) = Self::locate_binary(&target_dir) {
                        if is_executable(&bin) {
                            println!("[installer] ✅ {version} already installed at {}", bin.display());
                            return Ok(bin);
                        }
                    }
                }
            }
        }

        let bundle_name = format!("{BUNDLE_PREFIX}-{os}-{arch}-{version}.tar.gz");

        let work_dir = tempfile::tempdir()?;

        let checksums_text = self.fetch_checksums(&version, work_dir.path()).await?;
        let digest = checksums::find_digest(&checksums_text, &bundle_name)
            .ok_or_else(|| InstallerError::BundleNameNotInChecksums(bundle_name.clone()))?;

        self.fetch_and_verify_signature(&version, &checksums_text, work_dir.path())
            .await?;

        let bundle_url = format!("{index_url}{version}/{bundle_name}");
        let bundle_path = work_dir.path().join(&bundle_name);
        self.fetcher
            .get_to_file(&bundle_url, &bundle_path, DOWNLOAD_TIMEOUT)
            .await?;

        let got = HashVerifier::sha256_of_file(&bundle_path)?;
        if !got.eq_ignore_ascii_case(&digest) {
            return Err(InstallerError::Sha256Mismatch { want: digest, got });
        }

        self.install_atomically(&bundle_path, &target_dir).await?;

        let bin = Self::locate_binary(&target_dir)?.ok_or(InstallerError::BinaryNotFound)?;
        set_executable(&bin)?;

        InstallMarker::write(
            &target_dir,
            &InstallMarker {
                version,
                file: bundle_name,
                sha256: digest,
            },
        )?;

        Ok(bin)
    }

    async fn fetch_checksums(&self, version: &str, work_dir: &Path) -> Result<String, InstallerError> {
        let index_url = self.index_url();
        for name in ["sha256sums-unsigned-build.txt", "sha256sums-signed-build.txt"] {
            let url = format!("{index_url}{version}/{name}");
            match self.fetcher.get(&url, HTTP_TIMEOUT).await {
                Ok(bytes) if !bytes.is_empty() => {
                    let path = work_dir.join(name);
                    std::fs::write(&path, &bytes)?;
                    return Ok(String::from_utf8_lossy(&bytes).to_string());
                }
                _ => continue,
            }
        }
        Err(InstallerError::HttpError(format!(
            "no checksums file available for version {version}"
        )))
    }

    async fn fetch_and_verify_signature(
        &mut self,
        version: &str,
        checksums_text: &str,
        work_dir: &Path,
    ) -> Result<(), InstallerError> {
        let index_url = self.index_url();
        let sig_url_candidates = [
            format!("{index_url}{version}/sha256sums-unsigned-build.txt.asc"),
            format!("{index_url}{version}/sha256sums-signed-build.txt.asc"),
        ];

        let mut sig_path = None;
        for url in &sig_url_candidates {
            let dest = work_dir.join("checksums.txt.asc");
            if self.fetcher.get_to_file(url, &dest, HTTP_TIMEOUT).await.is_ok() {
                sig_path = Some(dest);
                break;
            }
        }

        let warning = match sig_path {
            None => GpgWarning::new(GpgWarningCode::NotAttempted, "no detached signature published"),
            Some(sig_path) => {
                let checksums_path = work_dir.join("checksums.txt");
                std::fs::write(&checksums_path, checksums_text)?;

                let gnupg_home = self.config.install_root.join("gnupg");
                let allowed = self.config.allowed_fingerprints.clone();
                tokio::task::spawn_blocking(move || {
                    let tool = SystemGpg::discover();
                    let verifier = SignatureVerifier::new(&tool, gnupg_home, &allowed);
                    verifier.verify(&checksums_path, &sig_path)
                })
                .await
                .map_err(|e| InstallerError::Io(e.to_string()))?
            }
        };

        let fatal = self.config.require_gpg && !warning.is_success();
        println!("[installer] gpg_warning {:?}: {}", warning.code, warning.message);
        self.warnings.push(warning.clone());

        if fatal {
            return Err(InstallerError::HttpError(format!(
                "signature verification required and failed: {}",
                warning.message
            )));
        }
        Ok(())
    }

    async fn install_atomically(&self, bundle_path: &Path, target_dir: &Path) -> Result<(), InstallerError> {
        std::fs::create_dir_all(target_dir)?;
        let lock_path = target_dir.join(".lock");
        let _guard = InstallLock::acquire(&lock_path).await?;

        for entry in std::fs::read_dir(target_dir)? {
            let entry = entry?;
            if entry.file_name() == ".lock" {
                continue;
            }
            let path = entry.path();
            if path.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else {
                std::fs::remove_file(&path)?;
            }
        }

        ArchiveExtractor::extract(bundle_path, target_dir).await
    }

    /// Prefers paths containing `/bin/`; rejects debug directories.
    fn locate_binary(root: &Path) -> Result<Option<PathBuf>, InstallerError> {
        if !root.exists() {
            return Ok(None);
        }
        let exe_name = Platform::exe_name("tor");
        let mut candidates = Vec::new();
        collect_candidates(root, &exe_name, &mut candidates)?;

        candidates.sort_by_key(|p| {
            let s = p.to_string_lossy().replace('\\', "/");
            let preferred = s.contains("/bin/") || s.contains("/Tor/");
            std::cmp::Reverse(preferred)
        });

        Ok(candidates.into_iter().next())
    }
}

fn collect_candidates(dir: &Path, exe_name: &str, out: &mut Vec<PathBuf>) -> Result<(), InstallerError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_candidates(&path, exe_name, out)?;
            continue;
        }
        let file_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => continue,
        };
        if file_name != exe_name {
            continue;
        }
        let normalized = path.to_string_lossy().replace('\\', "/");
        if normalized.contains("/debug/")
            || normalized.contains("/.build-id/")
            || normalized.contains("/usr/lib/debug/")
            || normalized.ends_with(".debug")
        {
            continue;
        }
        out.push(path);
    }
    Ok(())
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<(), InstallerError> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<(), InstallerError> {
    Ok(())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_binary_prefers_bin_directory_over_debug() {
        let dir = tempfile::tempdir().unwrap();
        let exe = Platform::exe_name("tor");

        let debug_dir = dir.path().join("debug");
        std::fs::create_dir_all(&debug_dir).unwrap();
        std::fs::write(debug_dir.join(&exe), b"x").unwrap();

        let bin_dir = dir.path().join("bin");
        std::fs::create_dir_all(&bin_dir).unwrap();
        std::fs::write(bin_dir.join(&exe), b"x").unwrap();

        let found = Installer::locate_binary(dir.path()).unwrap().unwrap();
        assert!(found.to_string_lossy().replace('\\', "/").contains("/bin/"));
    }

    #[test]
    fn locate_binary_returns_none_on_missing_root() {
        let found = Installer::locate_binary(Path::new("/definitely/not/here")).unwrap();
        assert!(found.is_none());
    }
}
