use onion_core::{IdentityStore, OnionIdentity, OrchestratorConfig, TorOrchestrator};
use onion_registry::{Handler, ServiceHandlerFactory};

struct FakeStore {
    identities: Vec<OnionIdentity>,
    authenticated: bool,
    autoconnect: bool,
}

impl IdentityStore for FakeStore {
    fn get_tor_identities(&self) -> Vec<OnionIdentity> {
        self.identities.clone()
    }
    fn tor_priv_key_for(&self, onion: &str) -> Option<String> {
        self.identities.iter().find(|i| i.onion == onion).map(|i| i.private_key.clone())
    }
    fn store_tor_identity(&mut self, onion: String, priv_key: String, label: String, online: bool) {
        self.identities.push(OnionIdentity { onion, private_key: priv_key, label, online });
    }
    fn add_tor_identity(&mut self, label: String) {
        self.identities.push(OnionIdentity::placeholder(label));
    }
    fn set_placeholder_online_by_label(&mut self, label: &str, online: bool) {
        if let Some(i) = self.identities.iter_mut().find(|i| i.label == label) {
            i.online = online;
        }
    }
    fn set_tor_identity_online(&mut self, onion: &str, online: bool) -> bool {
        if let Some(i) = self.identities.iter_mut().find(|i| i.onion == onion) {
            i.online = online;
            true
        } else {
            false
        }
    }
    fn remove_tor_identity(&mut self, onion: &str) -> bool {
        let before = self.identities.len();
        self.identities.retain(|i| i.onion != onion);
        self.identities.len() != before
    }
    fn is_authenticated(&self) -> bool {
        self.authenticated
    }
    fn tor_autoconnect(&self) -> bool {
        self.autoconnect
    }
}

struct NoopHandler;
impl Handler for NoopHandler {
    fn start(&mut self, _port: u16) -> bool {
        true
    }
    fn port(&self) -> u16 {
        1
    }
    fn set_bound_onion(&mut self, _onion: String) {}
    fn close(&mut self) {}
}
struct NoopFactory;
impl ServiceHandlerFactory for NoopFactory {
    fn create(&self, _onion_or_empty: Option<&str>) -> Box<dyn Handler> {
        Box::new(NoopHandler)
    }
}

fn orchestrator(store: FakeStore) -> TorOrchestrator<FakeStore> {
    let dir = tempfile::tempdir().unwrap();
    let config = OrchestratorConfig { install_root: dir.path().join("install"), ..OrchestratorConfig::default() };
    TorOrchestrator::new(config, dir.path().join("app"), store, Box::new(NoopFactory)).unwrap()
}

#[tokio::test]
async fn ensure_default_service_creates_exactly_one_main_identity() {
    let mut orch = orchestrator(FakeStore { identities: vec![], authenticated: false, autoconnect: false });
    orch.ensure_default_service().await;
    let identities = orch.identities();
    assert_eq!(identities.len(), 1);
    assert_eq!(identities[0].label, "main");
    assert!(identities[0].is_placeholder());
}

#[tokio::test]
async fn set_service_online_updates_identity_flag() {
    let mut orch = orchestrator(FakeStore {
        identities: vec![OnionIdentity {
            onion: "abc.onion".to_string(),
            private_key: "key".to_string(),
            label: "main".to_string(),
            online: false,
        }],
        authenticated: false,
        autoconnect: false,
    });
    assert!(orch.set_service_online("abc.onion", true).await);
    assert!(orch.identities()[0].online);
    assert!(!orch.set_service_online("missing.onion", true).await);
}

#[tokio::test]
async fn remove_service_deletes_identity() {
    let mut orch = orchestrator(FakeStore {
        identities: vec![OnionIdentity {
            onion: "abc.onion".to_string(),
            private_key: "key".to_string(),
            label: "main".to_string(),
            online: true,
        }],
        authenticated: false,
        autoconnect: false,
    });
    assert!(orch.remove_service("abc.onion").await);
    assert!(orch.identities().is_empty());
}

#[tokio::test]
async fn start_if_autoconnect_is_gated_on_authentication_and_preference() {
    let mut orch = orchestrator(FakeStore { identities: vec![], authenticated: false, autoconnect: true });
    // Not authenticated: must not attempt to start (no panic, returns Ok without spawning).
    orch.start_if_autoconnect().await.unwrap();
    assert!(!orch.running());
    assert!(!orch.initializing());
}
