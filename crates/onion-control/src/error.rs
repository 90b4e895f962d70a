use std::fmt;

#[derive(Debug)]
pub enum ControlError {
    ControlConnectFailed(String),
    CookieUnreadable(String),
    AuthRejected(String),
    ProtocolError(String),
    NotReady,
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::ControlConnectFailed(detail) => {
                write!(f, "failed to connect to control port: {detail}")
            }
            ControlError::CookieUnreadable(detail) => {
                write!(f, "could not read control auth cookie: {detail}")
            }
            ControlError::AuthRejected(detail) => write!(f, "AUTHENTICATE rejected: {detail}"),
            ControlError::ProtocolError(line) => write!(f, "protocol error: {line}"),
            ControlError::NotReady => write!(f, "control client is not in the Ready state"),
        }
    }
}

impl std::error::Error for ControlError {}
