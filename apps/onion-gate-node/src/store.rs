use onion_core::{IdentityStore, OnionIdentity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredIdentity {
    onion: String,
    private_key: String,
    label: String,
    online: bool,
}

impl From<&StoredIdentity> for OnionIdentity {
    fn from(s: &StoredIdentity) -> Self {
        OnionIdentity {
            onion: s.onion.clone(),
            private_key: s.private_key.clone(),
            label: s.label.clone(),
            online: s.online,
        }
    }
}

/// JSON-file-backed identity store. Rewrites the whole file on every
/// mutation; good enough for a handful of onions per host.
pub struct JsonIdentityStore {
    path: PathBuf,
    identities: Vec<StoredIdentity>,
    authenticated: bool,
    autoconnect: bool,
}

impl JsonIdentityStore {
    pub fn open(path: PathBuf) -> std::io::Result<Self> {
        let identities = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            serde_json::from_str(&text).unwrap_or_default()
        } else {
            Vec::new()
        };
        Ok(Self {
            path,
            identities,
            authenticated: true,
            autoconnect: true,
        })
    }

    fn persist(&self) {
        if let Ok(text) = serde_json::to_string_pretty(&self.identities) {
            if let Err(e) = std::fs::write(&self.path, text) {
                eprintln!("[store] ⚠️ failed to persist identities: {e}");
            }
        }
    }

    pub fn set_authenticated(&mut self, value: bool) {
        self.authenticated = value;
    }

    pub fn set_autoconnect(&mut self, value: bool) {
        self.autoconnect = value;
    }
}

impl IdentityStore for JsonIdentityStore {
    fn get_tor_identities(&self) -> Vec<OnionIdentity> {
        self.identities.iter().map(OnionIdentity::from).collect()
    }

    fn tor_priv_key_for(&self, onion: &str) -> Option<String> {
        self.identities
            .iter()
            .find(|i| i.onion.eq_ignore_ascii_case(onion))
            .map(|i| i.private_key.clone())
    }

    fn store_tor_identity(&mut self, onion: String, priv_key: String, label: String, online: bool) {
        self.identities.retain(|i| !i.label.eq_ignore_ascii_case(&label) || !i.onion.is_empty());
        self.identities.push(StoredIdentity {
            onion,
            private_key: priv_key,
            label,
            online,
        });
        self.persist();
    }

    fn add_tor_identity(&mut self, label: String) {
        self.identities.push(StoredIdentity {
            onion: String::new(),
            private_key: String::new(),
            label,
            online: false,
        });
        self.persist();
    }

    fn set_placeholder_online_by_label(&mut self, label: &str, online: bool) {
        if let Some(i) = self.identities.iter_mut().find(|i| i.label.eq_ignore_ascii_case(label)) {
            i.online = online;
            self.persist();
        }
    }

    fn set_tor_identity_online(&mut self, onion: &str, online: bool) -> bool {
        match self.identities.iter_mut().find(|i| i.onion.eq_ignore_ascii_case(onion)) {
            Some(i) => {
                i.online = online;
                self.persist();
                true
            }
            None => false,
        }
    }

    fn remove_tor_identity(&mut self, onion: &str) -> bool {
        let before = self.identities.len();
        self.identities.retain(|i| !i.onion.eq_ignore_ascii_case(onion));
        let changed = self.identities.len() != before;
        if changed {
            self.persist();
        }
        changed
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    fn tor_autoconnect(&self) -> bool {
        self.autoconnect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identities.json");

        let mut store = JsonIdentityStore::open(path.clone()).unwrap();
        store.add_tor_identity("main".to_string());
        store.store_tor_identity("abc.onion".to_string(), "key".to_string(), "main".to_string(), true);

        let reopened = JsonIdentityStore::open(path).unwrap();
        let identities = reopened.get_tor_identities();
        assert!(identities.iter().any(|i| i.onion == "abc.onion" && i.online));
    }
}

