use std::fmt;

#[derive(Debug)]
pub enum InstallerError {
    NoVersionsFound,
    BundleNameNotInChecksums(String),
    HttpTimeout(String),
    HttpError(String),
    Sha256Mismatch { want: String, got: String },
    LockBusy,
    ExtractionFailed(String),
    BinaryNotFound,
    Io(String),
}

impl fmt::Display for InstallerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallerError::NoVersionsFound => {
                write!(f, "no versions found on the distribution index")
            }
            InstallerError::BundleNameNotInChecksums(name) => {
                write!(f, "bundle '{name}' not present in checksums file")
            }
            InstallerError::HttpTimeout(url) => write!(f, "request to {url} timed out"),
            InstallerError::HttpError(detail) => write!(f, "http error: {detail}"),
            InstallerError::Sha256Mismatch { want, got } => {
                write!(f, "sha256 mismatch: want {want}, got {got}")
            }
            InstallerError::LockBusy => write!(f, "install lock held by another process"),
            InstallerError::ExtractionFailed(detail) => write!(f, "extraction failed: {detail}"),
            InstallerError::BinaryNotFound => {
                write!(f, "no usable daemon binary found under install root")
            }
            InstallerError::Io(detail) => write!(f, "io error: {detail}"),
        }
    }
}

impl std::error::Error for InstallerError {}

impl From<std::io::Error> for InstallerError {
    fn from(e: std::io::Error) -> Self {
        InstallerError::Io(e.to_string())
    }
}

/// Non-fatal outcomes of signature verification. The installer proceeds
/// (optionally emitting a warning) for all of these unless `require_gpg`
/// is set, in which case the `Installer` maps them to a hard failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpgWarningCode {
    NotInstalled,
    NoKey,
    BadSignature,
    UnexpectedSigner,
    TimeoutOrError,
    NotAttempted,
    Verified,
    VerifiedPinnedKeyring,
}

#[derive(Debug, Clone)]
pub struct GpgWarning {
    pub code: GpgWarningCode,
    pub message: String,
}

impl GpgWarning {
    pub fn new(code: GpgWarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self.code,
            GpgWarningCode::Verified | GpgWarningCode::VerifiedPinnedKeyring
        )
    }
}
