use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::events::OrchestratorEvent;
use crate::identity::{IdentityStore, OnionIdentity};
use onion_control::{ControlClient, ControlEvent};
use onion_registry::{ServiceHandlerFactory, ServiceRegistry};
use onion_supervisor::{DaemonSupervisor, SupervisorEvent};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Composes the installer/supervisor/control/registry subsystems behind
/// a single facade. Owns all mutable state; nothing downstream holds a
/// back-pointer into this struct.
pub struct TorOrchestrator<S: IdentityStore> {
    config: OrchestratorConfig,
    app_dir: PathBuf,
    supervisor: DaemonSupervisor,
    control: Option<ControlClient>,
    registry: ServiceRegistry,
    identity_store: S,
    running: bool,
    initializing: bool,
    installing: bool,
    bootstrap_progress: u8,
}

impl<S: IdentityStore> TorOrchestrator<S> {
    pub fn new(
        config: OrchestratorConfig,
        app_dir: PathBuf,
        identity_store: S,
        factory: Box<dyn ServiceHandlerFactory>,
    ) -> std::io::Result<Self> {
        let supervisor = DaemonSupervisor::new(app_dir.clone(), config.install_root.clone())?;
        Ok(Self {
            config,
            app_dir,
            supervisor,
            control: None,
            registry: ServiceRegistry::new(factory),
            identity_store,
            running: false,
            initializing: false,
            installing: false,
            bootstrap_progress: 0,
        })
    }

    pub fn identities(&self) -> Vec<OnionIdentity> {
        self.identity_store.get_tor_identities()
    }

    pub fn online_onion_addresses(&self) -> Vec<String> {
        self.identity_store
            .get_tor_identities()
            .into_iter()
            .filter(|i| i.online && !i.onion.is_empty())
            .map(|i| i.onion)
            .collect()
    }

    pub fn request_count(&self, onion: &str) -> u64 {
        self.registry.request_count(onion)
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn initializing(&self) -> bool {
        self.initializing
    }

    pub fn installing(&self) -> bool {
        self.installing
    }

    pub fn bootstrap_progress(&self) -> u8 {
        self.bootstrap_progress
    }

    pub async fn start(&mut self, force_download: bool) -> Result<(), OrchestratorError> {
        if self.running || self.initializing {
            return Err(OrchestratorError::AlreadyRunning);
        }
        self.supervisor.start(force_download).await?;
        self.initializing = true;
        println!("[orchestrator] 🔄 starting daemon");
        Ok(())
    }

    pub async fn start_if_autoconnect(&mut self) -> Result<(), OrchestratorError> {
        if self.identity_store.is_authenticated() && self.identity_store.tor_autoconnect() {
            self.start(false).await
        } else {
            Ok(())
        }
    }

    pub async fn stop(&mut self) {
        self.supervisor.stop().await;
        self.control = None;
        self.running = false;
        self.initializing = false;
        self.bootstrap_progress = 0;
        println!("[orchestrator] 🛑 stopped");
    }

    pub async fn reset(&mut self) {
        self.stop().await;
        self.registry.reset();
    }

    /// Pumps the next event from whichever subsystem has one ready,
    /// applies the correlation and bookkeeping rules, and returns a
    /// translated host-facing event. `None` means both subsystems have
    /// gone quiet (e.g. after `stop`).
    pub async fn drive_once(&mut self) -> Option<OrchestratorEvent> {
        loop {
            let event = if let Some(control) = self.control.as_mut() {
                tokio::select! {
                    sup = self.supervisor.next_event() => Source::Supervisor(sup),
                    ctrl = control.next_event() => Source::Control(ctrl),
                }
            } else {
                Source::Supervisor(self.supervisor.next_event().await)
            };

            match event {
                Source::Supervisor(Some(ev)) => {
                    if let Some(out) = self.handle_supervisor_event(ev).await {
                        return Some(out);
                    }
                }
                Source::Control(Some(ev)) => {
                    if let Some(out) = self.handle_control_event(ev) {
                        return Some(out);
                    }
                }
                Source::Supervisor(None) | Source::Control(None) => return None,
            }
        }
    }

    async fn handle_supervisor_event(&mut self, ev: SupervisorEvent) -> Option<OrchestratorEvent> {
        match ev {
            SupervisorEvent::BootstrapProgress(pct) => {
                self.bootstrap_progress = pct;
                self.initializing = pct < 100;
                Some(OrchestratorEvent::BootstrapProgressChanged(pct))
            }
            SupervisorEvent::StatusChanged(line) => Some(OrchestratorEvent::StatusChanged(line)),
            SupervisorEvent::Error(msg) => {
                self.running = false;
                self.initializing = false;
                Some(OrchestratorEvent::Error(msg))
            }
            SupervisorEvent::Installing(flag) => {
                self.installing = flag;
                Some(OrchestratorEvent::InstallingChanged(flag))
            }
            SupervisorEvent::ReadyForControlConnect => self.connect_control().await,
            SupervisorEvent::Stopped => {
                self.running = false;
                self.initializing = false;
                Some(OrchestratorEvent::Stopped)
            }
        }
    }

    async fn connect_control(&mut self) -> Option<OrchestratorEvent> {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.supervisor.control_port());
        let cookie_path = self.supervisor.cookie_path();
        match ControlClient::connect(addr, &cookie_path).await {
            Ok(mut client) => {
                self.running = true;
                self.initializing = false;
                if let Err(e) = self.issue_initial_batch(&mut client).await {
                    println!("[orchestrator] ⚠️ failed to issue initial ADD_ONION batch: {e}");
                }
                self.control = Some(client);
                println!("[orchestrator] ✅ control connected");
                Some(OrchestratorEvent::Started)
            }
            Err(e) => {
                println!("[orchestrator] ⚠️ control connect failed: {e}");
                Some(OrchestratorEvent::Error(format!("control connect failed: {e}")))
            }
        }
    }

    async fn issue_initial_batch(&mut self, client: &mut ControlClient) -> Result<(), OrchestratorError> {
        let identities: Vec<OnionIdentity> = self
            .identity_store
            .get_tor_identities()
            .into_iter()
            .filter(|i| i.online)
            .collect();

        for identity in identities {
            if !identity.private_key.is_empty() && !identity.onion.is_empty() {
                let port = self.registry.provision_known(identity.onion.clone())?;
                client
                    .send_known_onion(&format!("ED25519-V3:{}", identity.private_key), port)
                    .await?;
            } else {
                let port = self.registry.provision_new(identity.label.clone())?;
                client.send_new_onion(identity.label.clone(), port).await?;
            }
        }
        Ok(())
    }

    fn handle_control_event(&mut self, ev: ControlEvent) -> Option<OrchestratorEvent> {
        match ev {
            ControlEvent::NewOnionReady {
                label_hint,
                service_id,
                private_key,
            } => match self.registry.complete_pending(label_hint.as_deref(), service_id.clone()) {
                Ok(()) => {
                    let label = label_hint.unwrap_or_default();
                    let key = private_key.unwrap_or_default();
                    self.identity_store
                        .store_tor_identity(service_id.clone(), key, label, true);
                    Some(OrchestratorEvent::OnionAddressChanged(service_id))
                }
                Err(e) => Some(OrchestratorEvent::Error(format!(
                    "orphaned NEW reply for {service_id}: {e}"
                ))),
            },
            ControlEvent::KnownOnionReady { service_id } => {
                if !self.registry.contains(&service_id) && self.registry.pending_len() > 0 {
                    // The daemon's contract guarantees a PrivateKey line for
                    // every NEW submission; a ServiceID with none while a
                    // NEW is still outstanding means the daemon violated
                    // that contract. Surface it rather than silently adopt
                    // a service with no recoverable key.
                    Some(OrchestratorEvent::Error(format!(
                        "NEW submission acknowledged without a private key for {service_id}"
                    )))
                } else {
                    None
                }
            }
            ControlEvent::ProtocolError(detail) => Some(OrchestratorEvent::Error(detail)),
            ControlEvent::Disconnected(reason) => {
                self.control = None;
                self.running = false;
                Some(OrchestratorEvent::Error(format!("control disconnected: {reason}")))
            }
            ControlEvent::Ack => None,
        }
    }

    pub async fn add_new_service(&mut self, label: String) -> bool {
        let final_label = self.disambiguate_label(&label);
        self.identity_store.add_tor_identity(final_label.clone());
        self.identity_store.set_placeholder_online_by_label(&final_label, true);

        if self.running {
            match self.registry.provision_new(final_label.clone()) {
                Ok(port) => match self.control.as_mut() {
                    Some(client) => {
                        if let Err(e) = client.send_new_onion(final_label.clone(), port).await {
                            println!("[orchestrator] ⚠️ failed to issue ADD_ONION NEW for {final_label}: {e}");
                        }
                    }
                    None => println!("[orchestrator] ⚠️ add_new_service: running but no control connection"),
                },
                Err(e) => println!("[orchestrator] ⚠️ failed to provision listener for {final_label}: {e}"),
            }
        } else {
            println!("[orchestrator] 🔄 add_new_service: deferred until Tor auth");
        }

        true
    }

    fn disambiguate_label(&self, label: &str) -> String {
        let existing: Vec<String> = self
            .identity_store
            .get_tor_identities()
            .into_iter()
            .filter(|i| !i.is_placeholder())
            .map(|i| i.label.to_lowercase())
            .collect();

        if !existing.contains(&label.to_lowercase()) {
            return label.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{label}-{n}");
            if !existing.contains(&candidate.to_lowercase()) {
                return candidate;
            }
            n += 1;
        }
    }

    pub async fn set_service_online(&mut self, onion: &str, online: bool) -> bool {
        if !self.identity_store.set_tor_identity_online(onion, online) {
            return false;
        }

        if !self.running {
            println!("[orchestrator] 🔄 set_service_online: Tor not connected; persisted only");
            return true;
        }

        if online {
            match self.identity_store.tor_priv_key_for(onion) {
                Some(key) if !key.is_empty() => match self.registry.provision_known(onion.to_string()) {
                    Ok(port) => match self.control.as_mut() {
                        Some(client) => {
                            if let Err(e) = client.send_known_onion(&format!("ED25519-V3:{key}"), port).await {
                                println!("[orchestrator] ⚠️ failed to issue ADD_ONION for {onion}: {e}");
                            }
                        }
                        None => println!("[orchestrator] ⚠️ set_service_online: running but no control connection"),
                    },
                    Err(e) => println!("[orchestrator] ⚠️ failed to provision listener for {onion}: {e}"),
                },
                _ => match self.registry.provision_new(String::new()) {
                    Ok(port) => match self.control.as_mut() {
                        Some(client) => {
                            if let Err(e) = client.send_new_onion(String::new(), port).await {
                                println!("[orchestrator] ⚠️ failed to issue ADD_ONION NEW for {onion}: {e}");
                            }
                        }
                        None => println!("[orchestrator] ⚠️ set_service_online: running but no control connection"),
                    },
                    Err(e) => println!("[orchestrator] ⚠️ failed to provision listener for {onion}: {e}"),
                },
            }
        } else {
            let sid = onion.strip_suffix(".onion").unwrap_or(onion);
            if let Some(client) = self.control.as_mut() {
                if let Err(e) = client.send_del_onion(sid).await {
                    println!("[orchestrator] ⚠️ failed to issue DEL_ONION for {onion}: {e}");
                }
            }
            let _ = self.registry.close(onion);
        }

        true
    }

    pub async fn remove_service(&mut self, onion: &str) -> bool {
        if self.running {
            let sid = onion.strip_suffix(".onion").unwrap_or(onion);
            if let Some(client) = self.control.as_mut() {
                if let Err(e) = client.send_del_onion(sid).await {
                    println!("[orchestrator] ⚠️ failed to issue DEL_ONION for {onion}: {e}");
                }
            }
        } else {
            println!("[orchestrator] 🔄 remove_service: Tor not connected; removing from storage only");
        }

        let _ = self.registry.close(onion);
        self.identity_store.remove_tor_identity(onion)
    }

    pub async fn ensure_default_service(&mut self) {
        if self.identity_store.get_tor_identities().is_empty() {
            self.add_new_service("main".to_string()).await;
        }
    }
}

enum Source {
    Supervisor(Option<SupervisorEvent>),
    Control(Option<ControlEvent>),
}

#[cfg(test)]
mod tests {
    use super::*;

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
            self.identities
                .iter()
                .find(|i| i.onion == onion)
                .map(|i| i.private_key.clone())
        }
        fn store_tor_identity(&mut self, onion: String, priv_key: String, label: String, online: bool) {
            self.identities.retain(|i| i.label != label);
            self.identities.push(OnionIdentity {
                onion,
                private_key: priv_key,
                label,
                online,
            });
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

    struct FakeHandler;
    impl onion_registry::Handler for FakeHandler {
        fn start(&mut self, _port: u16) -> bool {
            true
        }
        fn port(&self) -> u16 {
            9999
        }
        fn set_bound_onion(&mut self, _onion: String) {}
        fn close(&mut self) {}
    }
    struct FakeFactory;
    impl ServiceHandlerFactory for FakeFactory {
        fn create(&self, _onion_or_empty: Option<&str>) -> Box<dyn onion_registry::Handler> {
            Box::new(FakeHandler)
        }
    }

    fn make_orchestrator() -> TorOrchestrator<FakeStore> {
        let dir = tempfile::tempdir().unwrap();
        let config = OrchestratorConfig {
            install_root: dir.path().join("install"),
            ..OrchestratorConfig::default()
        };
        TorOrchestrator::new(
            config,
            dir.path().join("app"),
            FakeStore {
                identities: Vec::new(),
                authenticated: true,
                autoconnect: true,
            },
            Box::new(FakeFactory),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn disambiguate_label_suffixes_on_collision() {
        let mut orch = make_orchestrator();
        orch.add_new_service("main".to_string()).await;
        orch.identity_store.store_tor_identity(
            "abc.onion".to_string(),
            "key".to_string(),
            "main".to_string(),
            true,
        );
        let next = orch.disambiguate_label("main");
        assert_eq!(next, "main-2");
    }

    #[tokio::test]
    async fn ensure_default_service_only_acts_when_empty() {
        let mut orch = make_orchestrator();
        orch.ensure_default_service().await;
        assert_eq!(orch.identities().len(), 1);
        orch.ensure_default_service().await;
        assert_eq!(orch.identities().len(), 1);
    }
}
