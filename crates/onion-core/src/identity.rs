/// Owned by the host's persistence layer, referenced here. `onion` and
/// `private_key` are both empty for a placeholder record awaiting its
/// first `ADD_ONION NEW` round trip.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OnionIdentity {
    pub onion: String,
    pub private_key: String,
    pub label: String,
    pub online: bool,
}

impl OnionIdentity {
    pub fn placeholder(label: String) -> Self {
        Self {
            onion: String::new(),
            private_key: String::new(),
            label,
            online: false,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.onion.is_empty() || self.private_key.is_empty()
    }
}

/// External interface the orchestrator consumes for persistence. The host
/// implements this over whatever storage it already has; the orchestrator
/// never assumes a particular backend.
pub trait IdentityStore: Send {
    fn get_tor_identities(&self) -> Vec<OnionIdentity>;
    fn tor_priv_key_for(&self, onion: &str) -> Option<String>;
    fn store_tor_identity(&mut self, onion: String, priv_key: String, label: String, online: bool);
    fn add_tor_identity(&mut self, label: String);
    fn set_placeholder_online_by_label(&mut self, label: &str, online: bool);
    fn set_tor_identity_online(&mut self, onion: &str, online: bool) -> bool;
    fn remove_tor_identity(&mut self, onion: &str) -> bool;
    fn is_authenticated(&self) -> bool;
    fn tor_autoconnect(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_detected_by_empty_onion_or_key() {
        let p = OnionIdentity::placeholder("main".to_string());
        assert!(p.is_placeholder());

        let full = OnionIdentity {
            onion: "abc.onion".to_string(),
            private_key: "ED25519-V3:xyz".to_string(),
            label: "main".to_string(),
            online: true,
        };
        assert!(!full.is_placeholder());
    }
}
