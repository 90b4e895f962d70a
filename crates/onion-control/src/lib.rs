mod client;
mod error;
mod protocol;

pub use client::{known_onion_command, new_onion_command, ControlClient, ControlEvent};
pub use error::ControlError;
pub use protocol::{LineEvent, ResponseAccumulator};
