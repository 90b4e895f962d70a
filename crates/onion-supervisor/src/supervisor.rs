use crate::binary::{discover, resolve_override};
use crate::bootstrap::{classify, BootstrapState};
use crate::error::SupervisorError;
use crate::ports::allocate_distinct_pair;
use crate::torrc;
use onion_common::Platform;
use onion_installer::{Installer, InstallerConfig};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

/// Surfaced to the host per the component spec's state-signal set.
#[derive(Debug, Clone)]
pub enum SupervisorEvent {
    BootstrapProgress(u8),
    StatusChanged(String),
    Error(String),
    Installing(bool),
    /// Fired once per `start`, 500ms after crossing 100% bootstrap.
    ReadyForControlConnect,
    Stopped,
}

fn safe_lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct DaemonSupervisor {
    app_dir: PathBuf,
    data_dir: PathBuf,
    socks_port: u16,
    control_port: u16,
    child: Option<Child>,
    state: Arc<Mutex<BootstrapState>>,
    events_tx: mpsc::UnboundedSender<SupervisorEvent>,
    events_rx: mpsc::UnboundedReceiver<SupervisorEvent>,
    install_root: PathBuf,
}

impl DaemonSupervisor {
    pub fn new(app_dir: PathBuf, install_root: PathBuf) -> std::io::Result<Self> {
        let data_dir = std::env::temp_dir().join(format!("tor-{}", std::process::id()));
        std::fs::create_dir_all(&data_dir)?;
        let (socks_port, control_port) = allocate_distinct_pair()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Self {
            app_dir,
            data_dir,
            socks_port,
            control_port,
            child: None,
            state: Arc::new(Mutex::new(BootstrapState::new())),
            events_tx,
            events_rx,
            install_root,
        })
    }

    pub fn data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }

    pub fn control_port(&self) -> u16 {
        self.control_port
    }

    pub fn cookie_path(&self) -> PathBuf {
        self.data_dir.join("control_auth_cookie")
    }

    pub async fn next_event(&mut self) -> Option<SupervisorEvent> {
        self.events_rx.recv().await
    }

    pub fn bootstrap_percent(&self) -> u8 {
        safe_lock(&self.state).percent
    }

    pub fn running(&self) -> bool {
        safe_lock(&self.state).running()
    }

    pub fn initializing(&self) -> bool {
        safe_lock(&self.state).initializing()
    }

    async fn resolve_binary(&self, force_download: bool) -> Result<(PathBuf, PathBuf), SupervisorError> {
        if let Some(bin) = resolve_override() {
            let root = bin.parent().map(PathBuf::from).unwrap_or_default();
            return Ok((bin, root));
        }
        if !force_download {
            if let Some(bin) = discover(&self.app_dir) {
                let bundle_root = bin
                    .ancestors()
                    .find(|p| p.file_name().map(|n| n == "bin").unwrap_or(false))
                    .and_then(|p| p.parent())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| bin.parent().unwrap_or(&bin).to_path_buf());
                return Ok((bin, bundle_root));
            }
        }

        let _ = self.events_tx.send(SupervisorEvent::Installing(true));
        let mut installer = Installer::new(InstallerConfig {
            install_root: self.install_root.clone(),
            require_gpg: false,
            allowed_fingerprints: Vec::new(),
            index_base_url: None,
        });
        let result = installer.ensure_present(force_download).await;
        let _ = self.events_tx.send(SupervisorEvent::Installing(false));

        match result {
            Ok(bin) => {
                let bundle_root = bin
                    .ancestors()
                    .find(|p| p.file_name().map(|n| n == "bin").unwrap_or(false))
                    .and_then(|p| p.parent())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| bin.parent().unwrap_or(&bin).to_path_buf());
                Ok((bin, bundle_root))
            }
            Err(e) => Err(SupervisorError::SpawnFailed(e.to_string())),
        }
    }

    pub async fn start(&mut self, force_download: bool) -> Result<(), SupervisorError> {
        let (socks_port, control_port) = match allocate_distinct_pair() {
            Ok(pair) => pair,
            Err(_) => (self.socks_port, self.control_port),
        };
        self.socks_port = socks_port;
        self.control_port = control_port;

        let torrc_path = torrc::write(&self.data_dir, self.socks_port, self.control_port).await?;

        let (bin, bundle_root) = self.resolve_binary(force_download).await?;

        let mut cmd = Command::new(&bin);
        cmd.arg("-f")
            .arg(&torrc_path)
            .current_dir(&bundle_root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        Platform::augment_env(&mut cmd, &bundle_root);

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                let _ = self
                    .events_tx
                    .send(SupervisorEvent::Error(format!("spawn failed: {e}")));
                return Err(SupervisorError::SpawnFailed(e.to_string()));
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let state = self.state.clone();
        let tx = self.events_tx.clone();

        if let Some(stdout) = stdout {
            let state = state.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                run_stdout_loop(stdout, state, tx).await;
            });
        }
        if let Some(stderr) = stderr {
            let tx = tx.clone();
            tokio::spawn(async move {
                run_stderr_loop(stderr, tx).await;
            });
        }

        self.child = Some(child);
        Ok(())
    }

    pub async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            let wait = tokio::time::timeout(Duration::from_secs(3), child.wait()).await;
            if wait.is_err() {
                let _ = child.kill().await;
            }
        }
        *safe_lock(&self.state) = BootstrapState::new();
        let _ = self.events_tx.send(SupervisorEvent::Stopped);
    }
}

async fn run_stdout_loop(
    stdout: tokio::process::ChildStdout,
    state: Arc<Mutex<BootstrapState>>,
    tx: mpsc::UnboundedSender<SupervisorEvent>,
) {
    let mut reader = BufReader::new(stdout).lines();
    let mut bootstrapped_100 = false;

    loop {
        let line = match reader.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(_) => break,
        };

        println!("[tor] {line}");
        let signal = classify(&line);
        let crossed_100 = safe_lock(&state).apply(&signal);

        if let crate::bootstrap::StdoutSignal::BootstrapPercent(pct) = signal {
            let _ = tx.send(SupervisorEvent::BootstrapProgress(pct));
        }
        let _ = tx.send(SupervisorEvent::StatusChanged(line.clone()));

        if crossed_100 && !bootstrapped_100 {
            bootstrapped_100 = true;
            let tx = tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                let _ = tx.send(SupervisorEvent::ReadyForControlConnect);
            });
        }

        if matches!(signal, crate::bootstrap::StdoutSignal::SeverityErr) {
            let _ = tx.send(SupervisorEvent::Error(line));
        }
    }
}

async fn run_stderr_loop(stderr: tokio::process::ChildStderr, tx: mpsc::UnboundedSender<SupervisorEvent>) {
    let mut reader = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = reader.next_line().await {
        eprintln!("[tor:stderr] {line}");
        let _ = tx.send(SupervisorEvent::StatusChanged(line));
    }
}
