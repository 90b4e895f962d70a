use crate::error::InstallerError;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime};

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

const WAIT_TIMEOUT: Duration = Duration::from_secs(60);
const STALE_THRESHOLD: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Exclusive install-tree lock. Held for the lifetime of the value;
/// released on drop. Cross-process coordination so two installer runs
/// never extract into the same directory concurrently.
pub struct InstallLock {
    _file: std::fs::File,
}

impl InstallLock {
    pub async fn acquire(lock_path: &Path) -> Result<Self, InstallerError> {
        let deadline = Instant::now() + WAIT_TIMEOUT;

        loop {
            if let Some(file) = try_lock(lock_path)? {
                return Ok(Self { _file: file });
            }

            if is_stale(lock_path) {
                eprintln!("[installer] 🔄 stale lock at {} — removing", lock_path.display());
                let _ = std::fs::remove_file(lock_path);
                continue;
            }

            if Instant::now() >= deadline {
                return Err(InstallerError::LockBusy);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[cfg(unix)]
fn try_lock(path: &Path) -> Result<Option<std::fs::File>, InstallerError> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)?;
    let fd = file.as_raw_fd();
    let ret = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if ret == 0 {
        touch(path);
        Ok(Some(file))
    } else {
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::WouldBlock {
            Ok(None)
        } else {
            Err(InstallerError::Io(err.to_string()))
        }
    }
}

#[cfg(not(unix))]
fn try_lock(path: &Path) -> Result<Option<std::fs::File>, InstallerError> {
    match std::fs::OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => {
            touch(path);
            Ok(Some(file))
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(InstallerError::Io(e.to_string())),
    }
}

fn touch(path: &Path) {
    let _ = filetime_now(path);
}

fn filetime_now(path: &Path) -> std::io::Result<()> {
    // Re-opening with write(true) and writing zero bytes updates mtime
    // without disturbing flock state held via a separate fd on unix.
    use std::io::Write;
    let mut f = std::fs::OpenOptions::new().write(true).open(path)?;
    f.write_all(&[])?;
    Ok(())
}

fn is_stale(path: &Path) -> bool {
    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return false,
    };
    match meta.modified() {
        Ok(modified) => match SystemTime::now().duration_since(modified) {
            Ok(age) => age > STALE_THRESHOLD,
            Err(_) => false,
        },
        Err(_) => false,
    }
}
