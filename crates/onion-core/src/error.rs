use std::fmt;

#[derive(Debug)]
pub enum OrchestratorError {
    AlreadyRunning,
    NotRunning,
    Supervisor(String),
    Control(String),
    Registry(String),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorError::AlreadyRunning => write!(f, "orchestrator is already running"),
            OrchestratorError::NotRunning => write!(f, "orchestrator is not running"),
            OrchestratorError::Supervisor(detail) => write!(f, "supervisor error: {detail}"),
            OrchestratorError::Control(detail) => write!(f, "control error: {detail}"),
            OrchestratorError::Registry(detail) => write!(f, "registry error: {detail}"),
        }
    }
}

impl std::error::Error for OrchestratorError {}

impl From<onion_supervisor::SupervisorError> for OrchestratorError {
    fn from(e: onion_supervisor::SupervisorError) -> Self {
        OrchestratorError::Supervisor(e.to_string())
    }
}

impl From<onion_control::ControlError> for OrchestratorError {
    fn from(e: onion_control::ControlError) -> Self {
        OrchestratorError::Control(e.to_string())
    }
}

impl From<onion_registry::RegistryError> for OrchestratorError {
    fn from(e: onion_registry::RegistryError) -> Self {
        OrchestratorError::Registry(e.to_string())
    }
}
