use crate::error::InstallerError;
use onion_common::Platform;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use tokio::time::timeout;

const EXTRACT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TarFlavor {
    Gnu,
    Bsd,
}

pub struct ArchiveExtractor;

impl ArchiveExtractor {
    pub async fn extract(tar_gz_path: &Path, dest_dir: &Path) -> Result<(), InstallerError> {
        std::fs::create_dir_all(dest_dir)?;

        let tar_bin = find_tar()?;
        let flavor = probe_flavor(&tar_bin);
        let archive_arg = normalize_for_tar(&tar_bin, tar_gz_path, flavor);

        let mut cmd = tokio::process::Command::new(&tar_bin);
        // Never preserve owners/permissions from the archive.
        if Platform::os_token() == "windows" {
            match flavor {
                // GNU tar needs -z for .tar.gz and supports --force-local.
                TarFlavor::Gnu => {
                    cmd.arg("-xzf")
                        .arg(&archive_arg)
                        .arg("-C")
                        .arg(dest_dir)
                        .arg("--no-same-owner")
                        .arg("--no-same-permissions")
                        .arg("--force-local");
                }
                // bsdtar (Windows' built-in tar.exe) auto-detects gzip and
                // doesn't support --force-local.
                TarFlavor::Bsd => {
                    cmd.arg("-xf")
                        .arg(&archive_arg)
                        .arg("-C")
                        .arg(dest_dir)
                        .arg("--no-same-owner")
                        .arg("--no-same-permissions");
                }
            }
        } else {
            // -z is fine everywhere on Linux/macOS regardless of flavor.
            cmd.arg("-xzf").arg(&archive_arg).arg("-C").arg(dest_dir);
        }

        let output = timeout(EXTRACT_TIMEOUT, cmd.output())
            .await
            .map_err(|_| InstallerError::ExtractionFailed("tar timed out after 10 minutes".into()))?
            .map_err(|e| InstallerError::ExtractionFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(InstallerError::ExtractionFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
        Ok(())
    }
}

fn find_tar() -> Result<std::path::PathBuf, InstallerError> {
    let name = Platform::exe_name("tar");
    if let Some(path_var) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(&name);
            if Command::new(&candidate).arg("--version").output().is_ok() {
                return Ok(candidate);
            }
        }
    }
    // Fall back to relying on the shell to resolve it.
    if Command::new(&name).arg("--version").output().is_ok() {
        return Ok(std::path::PathBuf::from(name));
    }
    Err(InstallerError::ExtractionFailed(
        "no tar binary found on PATH".into(),
    ))
}

fn probe_flavor(tar_bin: &Path) -> TarFlavor {
    let out = Command::new(tar_bin).arg("--version").output();
    match out {
        Ok(o) => {
            let text = String::from_utf8_lossy(&o.stdout);
            if text.to_lowercase().contains("gnu tar") {
                TarFlavor::Gnu
            } else {
                TarFlavor::Bsd
            }
        }
        Err(_) => TarFlavor::Bsd,
    }
}

/// GNU tar shipped via MSYS on Windows expects `/c/Users/...` style paths,
/// not `C:\Users\...`.
fn normalize_for_tar(tar_bin: &Path, path: &Path, flavor: TarFlavor) -> String {
    let is_msys_gnu_tar = Platform::os_token() == "windows" && flavor == TarFlavor::Gnu;
    let _ = tar_bin;
    if !is_msys_gnu_tar {
        return path.to_string_lossy().to_string();
    }
    let raw = path.to_string_lossy().replace('\\', "/");
    if let Some(drive) = raw.chars().next() {
        if raw.len() > 1 && raw.as_bytes()[1] == b':' {
            return format!("/{}{}", drive.to_ascii_lowercase(), &raw[2..]);
        }
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_leaves_unix_paths_untouched_when_not_msys() {
        let out = normalize_for_tar(Path::new("tar"), Path::new("/tmp/a.tar.gz"), TarFlavor::Bsd);
        assert_eq!(out, "/tmp/a.tar.gz");
    }
}
