use crate::error::{GpgWarning, GpgWarningCode};
use std::path::{Path, PathBuf};
use std::process::Command;

const WKD_LOOKUP_EMAIL: &str = "torbrowser@torproject.org";
const KEYRING_FILE: &str = "tor.keyring";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpgKind {
    /// Full gpg: can bootstrap keys via WKD and export a keyring.
    Full,
    /// gpgv: verification only, needs a pre-existing keyring.
    VerifyOnly,
    Missing,
}

#[derive(Debug)]
pub enum GpgOutcome {
    Verified { signer_fpr: String, primary_fpr: String },
    BadSignature,
    NoKey,
    Error(String),
}

/// Encapsulates OpenPGP tool discovery and invocation so tests can inject
/// a fake returning any outcome in the warning taxonomy without touching
/// a real binary.
pub trait GpgTool {
    fn kind(&self) -> GpgKind;
    fn verify_with_keyring(&self, keyring: &Path, sig: &Path, data: &Path) -> GpgOutcome;
    fn bootstrap_and_pin(&self, gnupg_home: &Path, keyring_out: &Path) -> Result<(), String>;
}

pub struct SystemGpg {
    kind: GpgKind,
    binary: PathBuf,
    /// Only set when `kind == VerifyOnly`; bootstrapping still needs a
    /// full `gpg` even if the primary tool chosen is `gpgv`.
    full_gpg_binary: Option<PathBuf>,
}

impl SystemGpg {
    pub fn discover() -> Self {
        if let Ok(override_path) = std::env::var("APP_GPG_BIN") {
            let p = PathBuf::from(&override_path);
            if probe(&p, "--version") {
                let kind = if basename_is(&p, "gpgv") {
                    GpgKind::VerifyOnly
                } else {
                    GpgKind::Full
                };
                return Self {
                    kind,
                    binary: p,
                    full_gpg_binary: find_on_path("gpg"),
                };
            }
        }

        if let Some(gpg) = find_on_path("gpg") {
            return Self {
                kind: GpgKind::Full,
                binary: gpg.clone(),
                full_gpg_binary: Some(gpg),
            };
        }

        if let Some(gpgv) = find_on_path("gpgv") {
            return Self {
                kind: GpgKind::VerifyOnly,
                binary: gpgv,
                full_gpg_binary: find_on_path("gpg"),
            };
        }

        Self {
            kind: GpgKind::Missing,
            binary: PathBuf::new(),
            full_gpg_binary: None,
        }
    }
}

fn basename_is(p: &Path, name: &str) -> bool {
    p.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.eq_ignore_ascii_case(name))
        .unwrap_or(false)
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let exe = onion_common::Platform::exe_name(name);
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(&exe);
        if probe(&candidate, "--version") {
            return Some(candidate);
        }
    }
    let well_known: &[&str] = &[
        "/usr/bin/gpg",
        "/usr/local/bin/gpg",
        "/usr/bin/gpgv",
        "/usr/local/bin/gpgv",
    ];
    well_known
        .iter()
        .map(PathBuf::from)
        .find(|p| basename_is(p, name) && probe(p, "--version"))
}

fn probe(path: &Path, arg: &str) -> bool {
    Command::new(path)
        .arg(arg)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

impl GpgTool for SystemGpg {
    fn kind(&self) -> GpgKind {
        self.kind
    }

    fn verify_with_keyring(&self, keyring: &Path, sig: &Path, data: &Path) -> GpgOutcome {
        let output = match self.kind {
            GpgKind::VerifyOnly => Command::new(&self.binary)
                .arg("--keyring")
                .arg(keyring)
                .arg(sig)
                .arg(data)
                .output(),
            GpgKind::Full => Command::new(&self.binary)
                .arg("--no-default-keyring")
                .arg("--keyring")
                .arg(keyring)
                .arg("--batch")
                .arg("--status-fd")
                .arg("1")
                .arg("--verify")
                .arg(sig)
                .arg(data)
                .output(),
            GpgKind::Missing => return GpgOutcome::Error("no openpgp tool available".into()),
        };

        match output {
            Ok(out) => parse_status_output(&out.stdout, out.status.success()),
            Err(e) => GpgOutcome::Error(e.to_string()),
        }
    }

    fn bootstrap_and_pin(&self, gnupg_home: &Path, keyring_out: &Path) -> Result<(), String> {
        let gpg = self
            .full_gpg_binary
            .as_ref()
            .ok_or_else(|| "no full gpg available to bootstrap a key via WKD".to_string())?;

        let _ = std::fs::create_dir_all(gnupg_home);

        let locate = Command::new(gpg)
            .arg("--homedir")
            .arg(gnupg_home)
            .arg("--batch")
            .arg("--auto-key-locate")
            .arg("nodefault,wkd")
            .arg("--locate-keys")
            .arg(WKD_LOOKUP_EMAIL)
            .output()
            .map_err(|e| e.to_string())?;
        if !locate.status.success() {
            return Err(format!(
                "wkd key lookup failed: {}",
                String::from_utf8_lossy(&locate.stderr)
            ));
        }

        let export = Command::new(gpg)
            .arg("--homedir")
            .arg(gnupg_home)
            .arg("--batch")
            .arg("--export")
            .arg("--output")
            .arg(keyring_out)
            .arg(WKD_LOOKUP_EMAIL)
            .output()
            .map_err(|e| e.to_string())?;
        if !export.status.success() {
            return Err(format!(
                "keyring export failed: {}",
                String::from_utf8_lossy(&export.stderr)
            ));
        }
        Ok(())
    }
}

fn parse_status_output(stdout: &[u8], process_succeeded: bool) -> GpgOutcome {
    let text = String::from_utf8_lossy(stdout);
    let mut goodsig = false;
    let mut badsig = false;
    let mut no_pubkey = false;
    let mut validsig_line: Option<String> = None;

    for line in text.lines() {
        if line.contains("GOODSIG") {
            goodsig = true;
        } else if line.contains("BADSIG") {
            badsig = true;
        } else if line.contains("NO_PUBKEY") {
            no_pubkey = true;
        } else if line.contains("VALIDSIG") {
            validsig_line = Some(line.to_string());
        }
    }

    if no_pubkey {
        return GpgOutcome::NoKey;
    }
    if badsig {
        return GpgOutcome::BadSignature;
    }
    if !goodsig || !process_succeeded {
        return GpgOutcome::Error("gpg verification did not report a good signature".into());
    }

    match validsig_line.and_then(|l| parse_validsig(&l)) {
        Some((signer_fpr, primary_fpr)) => GpgOutcome::Verified {
            signer_fpr,
            primary_fpr,
        },
        None => GpgOutcome::Error("GOODSIG without a parseable VALIDSIG line".into()),
    }
}

/// `[GNUPG:] VALIDSIG <fingerprint> <date> <timestamp> <expire> <version>
/// <reserved> <pubkey-algo> <hash-algo> <sig-class> <primary-fpr>`
fn parse_validsig(line: &str) -> Option<(String, String)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let signer_fpr = tokens.get(2)?.to_string();
    let primary_fpr = tokens
        .iter()
        .rev()
        .find(|t| t.len() == 40 && t.chars().all(|c| c.is_ascii_hexdigit()))?
        .to_string();
    Some((signer_fpr, primary_fpr))
}

/// Orchestrates the verification cascade described in the component spec:
/// locate a tool, prefer a pinned keyring, bootstrap one via WKD if
/// missing, and only ever return a structured warning — never an error
/// that aborts the caller outright.
pub struct SignatureVerifier<'a, T: GpgTool> {
    tool: &'a T,
    gnupg_home: PathBuf,
    allowed_fingerprints: &'a [String],
}

impl<'a, T: GpgTool> SignatureVerifier<'a, T> {
    pub fn new(tool: &'a T, gnupg_home: PathBuf, allowed_fingerprints: &'a [String]) -> Self {
        Self {
            tool,
            gnupg_home,
            allowed_fingerprints,
        }
    }

    /// Blocking: shells out to the OpenPGP tool. Callers on an async
    /// executor should run this inside `spawn_blocking`.
    pub fn verify(&self, checksums_path: &Path, sig_path: &Path) -> GpgWarning {
        match self.tool.kind() {
            GpgKind::Missing => {
                GpgWarning::new(GpgWarningCode::NotInstalled, "no gpg or gpgv found on PATH")
            }
            GpgKind::VerifyOnly => {
                let keyring = self.gnupg_home.join(KEYRING_FILE);
                if keyring.exists() {
                    self.run_and_classify(&keyring, sig_path, checksums_path, true)
                } else {
                    match self.tool.bootstrap_and_pin(&self.gnupg_home, &keyring) {
                        Ok(()) => self.run_and_classify(&keyring, sig_path, checksums_path, true),
                        Err(e) => GpgWarning::new(GpgWarningCode::TimeoutOrError, e),
                    }
                }
            }
            GpgKind::Full => {
                let keyring = self.gnupg_home.join(KEYRING_FILE);
                if !keyring.exists() {
                    if let Err(e) = self.tool.bootstrap_and_pin(&self.gnupg_home, &keyring) {
                        return GpgWarning::new(GpgWarningCode::TimeoutOrError, e);
                    }
                }
                self.run_and_classify(&keyring, sig_path, checksums_path, false)
            }
        }
    }

    fn run_and_classify(
        &self,
        keyring: &Path,
        sig_path: &Path,
        data_path: &Path,
        already_pinned: bool,
    ) -> GpgWarning {
        match self.tool.verify_with_keyring(keyring, sig_path, data_path) {
            GpgOutcome::Verified {
                signer_fpr,
                primary_fpr,
            } => {
                let allowed = self.allowed_fingerprints.iter().any(|fpr| {
                    fpr.eq_ignore_ascii_case(&signer_fpr) || fpr.eq_ignore_ascii_case(&primary_fpr)
                });
                if !allowed {
                    return GpgWarning::new(
                        GpgWarningCode::UnexpectedSigner,
                        format!("signer {signer_fpr} / primary {primary_fpr} not in allow-list"),
                    );
                }
                if already_pinned {
                    GpgWarning::new(GpgWarningCode::VerifiedPinnedKeyring, "verified via pinned keyring")
                } else {
                    GpgWarning::new(GpgWarningCode::Verified, "verified")
                }
            }
            GpgOutcome::BadSignature => {
                GpgWarning::new(GpgWarningCode::BadSignature, "signature does not match data")
            }
            GpgOutcome::NoKey => {
                GpgWarning::new(GpgWarningCode::NoKey, "signer key not available")
            }
            GpgOutcome::Error(e) => GpgWarning::new(GpgWarningCode::TimeoutOrError, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FakeGpg {
        kind: GpgKind,
        outcome: RefCell<Option<GpgOutcome>>,
        keyring_exists_after_bootstrap: bool,
    }

    impl GpgTool for FakeGpg {
        fn kind(&self) -> GpgKind {
            self.kind
        }

        fn verify_with_keyring(&self, _keyring: &Path, _sig: &Path, _data: &Path) -> GpgOutcome {
            self.outcome
                .borrow_mut()
                .take()
                .unwrap_or(GpgOutcome::Error("no outcome configured".into()))
        }

        fn bootstrap_and_pin(&self, _gnupg_home: &Path, keyring_out: &Path) -> Result<(), String> {
            if self.keyring_exists_after_bootstrap {
                std::fs::write(keyring_out, b"fake-keyring").unwrap();
                Ok(())
            } else {
                Err("bootstrap failed".into())
            }
        }
    }

    #[test]
    fn missing_tool_yields_not_installed() {
        let tool = FakeGpg {
            kind: GpgKind::Missing,
            outcome: RefCell::new(None),
            keyring_exists_after_bootstrap: false,
        };
        let allow = vec![];
        let verifier = SignatureVerifier::new(&tool, PathBuf::from("/tmp/does-not-matter"), &allow);
        let w = verifier.verify(Path::new("checksums"), Path::new("sig"));
        assert_eq!(w.code, GpgWarningCode::NotInstalled);
    }

    #[test]
    fn unexpected_signer_is_rejected_even_on_good_signature() {
        let tool = FakeGpg {
            kind: GpgKind::Full,
            outcome: RefCell::new(Some(GpgOutcome::Verified {
                signer_fpr: "AAAA".repeat(10),
                primary_fpr: "BBBB".repeat(10),
            })),
            keyring_exists_after_bootstrap: true,
        };
        let allow = vec!["CCCC".repeat(10)];
        let dir = tempfile::tempdir().unwrap();
        let verifier = SignatureVerifier::new(&tool, dir.path().to_path_buf(), &allow);
        let w = verifier.verify(Path::new("checksums"), Path::new("sig"));
        assert_eq!(w.code, GpgWarningCode::UnexpectedSigner);
    }

    #[test]
    fn allow_list_matches_on_primary_fingerprint() {
        let primary = "BBBB".repeat(10);
        let tool = FakeGpg {
            kind: GpgKind::Full,
            outcome: RefCell::new(Some(GpgOutcome::Verified {
                signer_fpr: "AAAA".repeat(10),
                primary_fpr: primary.clone(),
            })),
            keyring_exists_after_bootstrap: true,
        };
        let allow = vec![primary];
        let dir = tempfile::tempdir().unwrap();
        let verifier = SignatureVerifier::new(&tool, dir.path().to_path_buf(), &allow);
        let w = verifier.verify(Path::new("checksums"), Path::new("sig"));
        assert!(w.is_success());
    }

    #[test]
    fn validsig_parsing_takes_third_token_and_last_hex_token() {
        let line = "[GNUPG:] VALIDSIG AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA 2024-01-01 1700000000 0 4 0 1 10 00 BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";
        let (signer, primary) = parse_validsig(line).unwrap();
        assert_eq!(signer, "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
        assert_eq!(primary, "BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB");
    }
}
