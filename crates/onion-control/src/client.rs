use crate::error::ControlError;
use crate::protocol::{LineEvent, ResponseAccumulator};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Events the background reader emits as it correlates multi-line
/// responses. `label_hint` is the FIFO-popped label for a `NEW` submission
/// (see the component spec's correlation rule); it is `None` for a known
/// pre-keyed `ADD_ONION` reply, which the caller matches by the onion
/// already stored in the identity.
#[derive(Debug)]
pub enum ControlEvent {
    NewOnionReady {
        label_hint: Option<String>,
        service_id: String,
        private_key: Option<String>,
    },
    KnownOnionReady {
        service_id: String,
    },
    Ack,
    ProtocolError(String),
    Disconnected(String),
}

/// Single TCP connection to the control port. `connect` performs the
/// cookie handshake synchronously (it is the trigger for the `Ready`
/// transition, per the component spec); everything after that flows
/// through `next_event` from a background reader task.
pub struct ControlClient {
    write_half: OwnedWriteHalf,
    events_rx: mpsc::UnboundedReceiver<ControlEvent>,
    pending_new_labels: Arc<Mutex<VecDeque<String>>>,
    add_onion_issued: bool,
}

impl ControlClient {
    pub async fn connect(addr: SocketAddr, cookie_path: &Path) -> Result<Self, ControlError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| ControlError::ControlConnectFailed(e.to_string()))?;
        let (read_half, mut write_half) = stream.into_split();

        let cookie = tokio::fs::read(cookie_path)
            .await
            .map_err(|e| ControlError::CookieUnreadable(e.to_string()))?;
        let hex_cookie = hex::encode(cookie);

        let mut reader = BufReader::new(read_half);
        write_half
            .write_all(format!("AUTHENTICATE {hex_cookie}\r\n").as_bytes())
            .await
            .map_err(|e| ControlError::ControlConnectFailed(e.to_string()))?;

        let mut line = String::new();
        reader
            .read_line(&mut line)
            .await
            .map_err(|e| ControlError::ControlConnectFailed(e.to_string()))?;
        if line.trim_end() != "250 OK" {
            return Err(ControlError::AuthRejected(line.trim().to_string()));
        }

        let pending_new_labels = Arc::new(Mutex::new(VecDeque::new()));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let queue_for_reader = pending_new_labels.clone();
        tokio::spawn(async move {
            run_reader_loop(reader, queue_for_reader, events_tx).await;
        });

        println!("[control] ✅ authenticated, ready");

        Ok(Self {
            write_half,
            events_rx,
            pending_new_labels,
            add_onion_issued: false,
        })
    }

    pub async fn next_event(&mut self) -> Option<ControlEvent> {
        self.events_rx.recv().await
    }

    pub fn add_onion_issued(&self) -> bool {
        self.add_onion_issued
    }

    /// Writes every command in one contiguous write, so the daemon's
    /// replies arrive in the same order for FIFO correlation. Guarded so
    /// it fires at most once per connected session.
    pub async fn send_initial_batch(&mut self, commands: &[String]) -> Result<(), ControlError> {
        if self.add_onion_issued {
            return Ok(());
        }
        for label in pending_labels_in(commands) {
            self.push_pending_label(label);
        }
        let joined = commands.concat();
        self.write_raw(&joined).await?;
        self.add_onion_issued = true;
        Ok(())
    }

    pub async fn send_known_onion(&mut self, key: &str, local_port: u16) -> Result<(), ControlError> {
        self.write_raw(&known_onion_command(key, local_port)).await
    }

    pub async fn send_new_onion(&mut self, label: String, local_port: u16) -> Result<(), ControlError> {
        self.push_pending_label(label);
        self.write_raw(&new_onion_command(local_port)).await
    }

    pub async fn send_del_onion(&mut self, onion_no_suffix: &str) -> Result<(), ControlError> {
        self.write_raw(&format!("DEL_ONION {onion_no_suffix}\r\n")).await
    }

    fn push_pending_label(&self, label: String) {
        safe_lock(&self.pending_new_labels).push_back(label);
    }

    async fn write_raw(&mut self, data: &str) -> Result<(), ControlError> {
        self.write_half
            .write_all(data.as_bytes())
            .await
            .map_err(|e| ControlError::ControlConnectFailed(e.to_string()))
    }
}

pub fn known_onion_command(key: &str, local_port: u16) -> String {
    format!("ADD_ONION {key} Port=80,127.0.0.1:{local_port} Flags=DiscardPK\r\n")
}

pub fn new_onion_command(local_port: u16) -> String {
    format!("ADD_ONION NEW:ED25519-V3 Port=80,127.0.0.1:{local_port}\r\n")
}

/// Extracts the labels implied by a pre-built batch isn't possible from
/// text alone — batches built by the orchestrator instead call
/// `send_new_onion`/`send_known_onion` per entry before the first batch
/// write when labels matter. `send_initial_batch` exists for the rare
/// case the whole batch is already pre-formatted text with no pending
/// labels of its own (e.g. all known keys).
fn pending_labels_in(_commands: &[String]) -> Vec<String> {
    Vec::new()
}

fn safe_lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn run_reader_loop(
    mut reader: BufReader<OwnedReadHalf>,
    pending_new_labels: Arc<Mutex<VecDeque<String>>>,
    events_tx: mpsc::UnboundedSender<ControlEvent>,
) {
    let mut acc = ResponseAccumulator::default();
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                let _ = events_tx.send(ControlEvent::Disconnected("connection closed".into()));
                return;
            }
            Ok(_) => {}
            Err(e) => {
                let _ = events_tx.send(ControlEvent::Disconnected(e.to_string()));
                return;
            }
        }

        match acc.process_line(&line) {
            LineEvent::Continue => {}
            LineEvent::ErrorLine(detail) => {
                let _ = events_tx.send(ControlEvent::ProtocolError(detail));
            }
            LineEvent::TerminalOk {
                service_id: None, ..
            } => {
                let _ = events_tx.send(ControlEvent::Ack);
            }
            LineEvent::TerminalOk {
                service_id: Some(service_id),
                private_key,
                had_private_key,
            } => {
                if had_private_key {
                    let label_hint = safe_lock(&pending_new_labels).pop_front();
                    let _ = events_tx.send(ControlEvent::NewOnionReady {
                        label_hint,
                        service_id,
                        private_key,
                    });
                } else {
                    let _ = events_tx.send(ControlEvent::KnownOnionReady { service_id });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_onion_command_includes_discard_pk() {
        let cmd = known_onion_command("ED25519-V3:abc", 4001);
        assert_eq!(
            cmd,
            "ADD_ONION ED25519-V3:abc Port=80,127.0.0.1:4001 Flags=DiscardPK\r\n"
        );
    }

    #[test]
    fn new_onion_command_has_no_discard_flag() {
        let cmd = new_onion_command(4002);
        assert_eq!(cmd, "ADD_ONION NEW:ED25519-V3 Port=80,127.0.0.1:4002\r\n");
    }
}
