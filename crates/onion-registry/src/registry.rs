use crate::error::RegistryError;
use crate::handler::{Handler, ServiceHandlerFactory};
use std::collections::{HashMap, VecDeque};

pub struct LocalService {
    pub onion: String,
    pub local_port: u16,
    pub handler: Box<dyn Handler>,
    pub online: bool,
}

/// A `NEW:ED25519-V3` submission still waiting for its `ServiceID` reply.
pub struct PendingEntry {
    pub label: String,
    pub local_port: u16,
    pub handler: Box<dyn Handler>,
}

/// Owns every local listener and the FIFO of outstanding `NEW` requests.
/// All access happens from the single cooperative event loop; nothing
/// here is `Sync` by necessity, only by the trait bound the factory
/// imposes on `Handler`.
pub struct ServiceRegistry {
    factory: Box<dyn ServiceHandlerFactory>,
    services: HashMap<String, LocalService>,
    pending_new: VecDeque<PendingEntry>,
    request_counts: HashMap<String, u64>,
}

impl ServiceRegistry {
    pub fn new(factory: Box<dyn ServiceHandlerFactory>) -> Self {
        Self {
            factory,
            services: HashMap::new(),
            pending_new: VecDeque::new(),
            request_counts: HashMap::new(),
        }
    }

    /// Binds a fresh handler to a free loopback port and returns it. Does
    /// not register the service yet — callers decide whether this becomes
    /// a live `LocalService` or a `PendingEntry` depending on whether the
    /// onion is already known.
    fn provision_handler(&self, onion_or_empty: Option<&str>) -> Result<Box<dyn Handler>, RegistryError> {
        let mut handler = self.factory.create(onion_or_empty);
        if !handler.start(0) {
            return Err(RegistryError::NoFreePort(
                "handler failed to bind an ephemeral port".to_string(),
            ));
        }
        Ok(handler)
    }

    /// Provisions for a known onion (key already on hand) and registers it
    /// directly as a live service. Returns the chosen local port.
    pub fn provision_known(&mut self, onion: String) -> Result<u16, RegistryError> {
        let key = onion.to_lowercase();
        if let Some(existing) = self.services.get(&key) {
            return Ok(existing.local_port);
        }
        let mut handler = self.provision_handler(Some(&onion))?;
        handler.set_bound_onion(onion.clone());
        let port = handler.port();
        self.services.insert(
            key,
            LocalService {
                onion,
                local_port: port,
                handler,
                online: true,
            },
        );
        Ok(port)
    }

    /// Provisions for a brand-new identity whose onion isn't assigned
    /// yet. Pushes a `PendingEntry` to the tail of the FIFO and returns
    /// the chosen local port.
    pub fn provision_new(&mut self, label: String) -> Result<u16, RegistryError> {
        let handler = self.provision_handler(None)?;
        let port = handler.port();
        self.pending_new.push_back(PendingEntry {
            label,
            local_port: port,
            handler,
        });
        Ok(port)
    }

    /// Applies the correlation decision made by the control client:
    /// promotes the matched `PendingEntry` into a live service.
    pub fn complete_pending(&mut self, label_for_this: Option<&str>, onion: String) -> Result<(), RegistryError> {
        let index = match label_for_this {
            Some(label) => self
                .pending_new
                .iter()
                .position(|e| e.label.eq_ignore_ascii_case(label))
                .or_else(|| if self.pending_new.is_empty() { None } else { Some(0) }),
            None => {
                if self.pending_new.is_empty() {
                    None
                } else {
                    Some(0)
                }
            }
        };

        let index = match index {
            Some(i) => i,
            None => return Err(RegistryError::UnknownOnion(onion)),
        };

        let entry = self.pending_new.remove(index).expect("index came from this deque");
        let mut handler = entry.handler;
        handler.set_bound_onion(onion.clone());
        self.services.insert(
            onion.to_lowercase(),
            LocalService {
                onion,
                local_port: entry.local_port,
                handler,
                online: true,
            },
        );
        Ok(())
    }

    /// Returns a pending entry to the head of the queue unconsumed, used
    /// when the daemon's reply carried no private key.
    pub fn requeue_pending_head(&mut self, label: String, local_port: u16, handler: Box<dyn Handler>) {
        self.pending_new.push_front(PendingEntry {
            label,
            local_port,
            handler,
        });
    }

    pub fn pending_len(&self) -> usize {
        self.pending_new.len()
    }

    pub fn close(&mut self, onion: &str) -> Result<(), RegistryError> {
        let key = onion.to_lowercase();
        match self.services.remove(&key) {
            Some(mut service) => {
                service.handler.close();
                self.request_counts.remove(&key);
                Ok(())
            }
            None => Err(RegistryError::UnknownOnion(onion.to_string())),
        }
    }

    pub fn record_request(&mut self, onion: &str) -> u64 {
        let key = onion.to_lowercase();
        let counter = self.request_counts.entry(key).or_insert(0);
        *counter += 1;
        *counter
    }

    pub fn request_count(&self, onion: &str) -> u64 {
        self.request_counts.get(&onion.to_lowercase()).copied().unwrap_or(0)
    }

    pub fn local_port(&self, onion: &str) -> Option<u16> {
        self.services.get(&onion.to_lowercase()).map(|s| s.local_port)
    }

    pub fn contains(&self, onion: &str) -> bool {
        self.services.contains_key(&onion.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn reset(&mut self) {
        for (_, mut service) in self.services.drain() {
            service.handler.close();
        }
        for mut entry in self.pending_new.drain(..) {
            entry.handler.close();
        }
        self.request_counts.clear();
    }
}
