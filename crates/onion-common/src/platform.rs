use std::ffi::OsString;
use std::path::Path;

/// OS/arch token derivation and dynamic-loader path handling, centralized
/// so the installer and the daemon supervisor agree on the same names.
pub struct Platform;

/// Narrow seam shared by `std::process::Command` and
/// `tokio::process::Command`, both of which expose an identically shaped
/// `env` method but are otherwise unrelated types.
pub trait EnvTarget {
    fn set_env(&mut self, key: &str, value: OsString);
}

impl EnvTarget for std::process::Command {
    fn set_env(&mut self, key: &str, value: OsString) {
        self.env(key, value);
    }
}

impl EnvTarget for tokio::process::Command {
    fn set_env(&mut self, key: &str, value: OsString) {
        self.env(key, value);
    }
}

impl Platform {
    pub fn os_token() -> &'static str {
        match std::env::consts::OS {
            "windows" => "windows",
            "macos" => "macos",
            _ => "linux",
        }
    }

    /// Errors on architectures the upstream bundle names don't cover rather
    /// than silently guessing one.
    pub fn arch_token() -> Result<&'static str, String> {
        match std::env::consts::ARCH {
            "x86_64" => Ok("x86_64"),
            "aarch64" => Ok("aarch64"),
            "x86" => Ok("i686"),
            other => Err(format!("unsupported architecture: {other}")),
        }
    }

    pub fn exe_name(base: &str) -> String {
        if Self::os_token() == "windows" {
            format!("{base}.exe")
        } else {
            base.to_string()
        }
    }

    pub fn loader_env_var() -> &'static str {
        match Self::os_token() {
            "windows" => "PATH",
            "macos" => "DYLD_LIBRARY_PATH",
            _ => "LD_LIBRARY_PATH",
        }
    }

    /// Prepends `<bundle_root>/lib` to the loader search path env var on
    /// `cmd`, if that directory exists. No-op otherwise.
    pub fn augment_env<C: EnvTarget>(cmd: &mut C, bundle_root: &Path) {
        let lib_dir = bundle_root.join("lib");
        if !lib_dir.is_dir() {
            return;
        }

        let var = Self::loader_env_var();
        let existing = std::env::var_os(var);
        let mut paths = vec![lib_dir];
        if let Some(existing) = &existing {
            paths.extend(std::env::split_paths(existing));
        }
        match std::env::join_paths(paths) {
            Ok(joined) => {
                cmd.set_env(var, joined);
            }
            Err(e) => {
                eprintln!("[platform] ⚠️ failed to join loader path: {e}");
            }
        }
    }
}
