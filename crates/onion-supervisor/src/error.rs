use std::fmt;

#[derive(Debug)]
pub enum SupervisorError {
    SpawnFailed(String),
    ControlConnectFailed(String),
    CookieUnreadable(String),
    BinaryNotFound,
    Io(String),
}

impl fmt::Display for SupervisorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorError::SpawnFailed(detail) => write!(f, "failed to spawn tor daemon: {detail}"),
            SupervisorError::ControlConnectFailed(detail) => {
                write!(f, "could not connect to control port: {detail}")
            }
            SupervisorError::CookieUnreadable(detail) => {
                write!(f, "could not read control auth cookie: {detail}")
            }
            SupervisorError::BinaryNotFound => write!(f, "no tor binary found or installed"),
            SupervisorError::Io(detail) => write!(f, "io error: {detail}"),
        }
    }
}

impl std::error::Error for SupervisorError {}

impl From<std::io::Error> for SupervisorError {
    fn from(e: std::io::Error) -> Self {
        SupervisorError::Io(e.to_string())
    }
}
