/// An inbound-request notification a `Handler` reports upward. Delivered
/// through a channel rather than a callback so the registry never holds a
/// back-pointer into handler internals.
#[derive(Debug, Clone)]
pub struct RequestReceived {
    pub onion: String,
    pub path: String,
    pub peer: String,
}

/// Per-onion local listener, supplied by the host. `start`/`port`/`close`
/// mirror a loopback TCP listener's lifecycle; `set_bound_onion` is called
/// once the controlling onion address is known (it may not be at creation
/// time for a brand-new `NEW:ED25519-V3` request).
pub trait Handler: Send {
    fn start(&mut self, port: u16) -> bool;
    fn port(&self) -> u16;
    fn set_bound_onion(&mut self, onion: String);
    fn close(&mut self);
}

/// Host-supplied factory. `onion_or_empty` is `Some` when recreating a
/// known identity on startup, `None` when provisioning a brand-new one
/// whose onion isn't assigned yet.
pub trait ServiceHandlerFactory: Send + Sync {
    fn create(&self, onion_or_empty: Option<&str>) -> Box<dyn Handler>;
}
