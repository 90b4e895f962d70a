use std::fmt;

#[derive(Debug)]
pub enum RegistryError {
    NoFreePort(String),
    UnknownOnion(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::NoFreePort(detail) => write!(f, "could not bind a local listener: {detail}"),
            RegistryError::UnknownOnion(onion) => write!(f, "no registered service for {onion}"),
        }
    }
}

impl std::error::Error for RegistryError {}
