use onion_registry::{Handler, ServiceHandlerFactory};
use std::net::TcpListener as StdTcpListener;
use std::sync::mpsc::Sender;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Reported upward whenever a per-onion listener accepts a request, so
/// the demo's metrics can bump `requests_total{onion}`.
#[derive(Debug, Clone)]
pub struct RequestReceived {
    pub onion: String,
    pub path: String,
    pub peer: String,
}

/// Minimal loopback listener standing in for whatever the host actually
/// wants to expose per onion. Accepts a connection, reads the request
/// line, replies with a canned 200, and reports the hit upward.
pub struct LoopbackHandler {
    port: u16,
    onion: String,
    events: Sender<RequestReceived>,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
}

impl LoopbackHandler {
    pub fn new(onion_or_empty: Option<&str>, events: Sender<RequestReceived>) -> Self {
        Self {
            port: 0,
            onion: onion_or_empty.unwrap_or_default().to_string(),
            events,
            shutdown: None,
        }
    }
}

impl Handler for LoopbackHandler {
    fn start(&mut self, port: u16) -> bool {
        let std_listener = match StdTcpListener::bind(("127.0.0.1", port)) {
            Ok(l) => l,
            Err(e) => {
                eprintln!("[handler] ⚠️ bind failed: {e}");
                return false;
            }
        };
        if std_listener.set_nonblocking(true).is_err() {
            return false;
        }
        self.port = match std_listener.local_addr() {
            Ok(addr) => addr.port(),
            Err(_) => return false,
        };

        let (tx, mut rx) = tokio::sync::oneshot::channel();
        self.shutdown = Some(tx);

        let onion = self.onion.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let listener = match TcpListener::from_std(std_listener) {
                Ok(l) => l,
                Err(e) => {
                    eprintln!("[handler] ⚠️ failed to adopt listener: {e}");
                    return;
                }
            };
            loop {
                tokio::select! {
                    _ = &mut rx => break,
                    accepted = listener.accept() => {
                        let (mut stream, peer) = match accepted {
                            Ok(v) => v,
                            Err(_) => continue,
                        };
                        let onion = onion.clone();
                        let events = events.clone();
                        tokio::spawn(async move {
                            let mut buf = [0u8; 1024];
                            let n = stream.read(&mut buf).await.unwrap_or(0);
                            let request = String::from_utf8_lossy(&buf[..n]);
                            let path = request
                                .lines()
                                .next()
                                .and_then(|l| l.split_whitespace().nth(1))
                                .unwrap_or("/")
                                .to_string();
                            let _ = events.send(RequestReceived {
                                onion,
                                path,
                                peer: peer.to_string(),
                            });
                            let body = b"ok";
                            let response = format!(
                                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                                body.len()
                            );
                            let _ = stream.write_all(response.as_bytes()).await;
                            let _ = stream.write_all(body).await;
                        });
                    }
                }
            }
        });

        true
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn set_bound_onion(&mut self, onion: String) {
        self.onion = onion;
    }

    fn close(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub struct LoopbackFactory {
    events: Sender<RequestReceived>,
}

impl LoopbackFactory {
    pub fn new(events: Sender<RequestReceived>) -> Self {
        Self { events }
    }
}

impl ServiceHandlerFactory for LoopbackFactory {
    fn create(&self, onion_or_empty: Option<&str>) -> Box<dyn Handler> {
        Box::new(LoopbackHandler::new(onion_or_empty, self.events.clone()))
    }
}
