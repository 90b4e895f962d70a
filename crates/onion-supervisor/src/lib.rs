mod binary;
mod bootstrap;
mod error;
mod ports;
mod supervisor;
mod torrc;

pub use bootstrap::{classify, BootstrapState, StdoutSignal};
pub use error::SupervisorError;
pub use ports::{allocate_distinct_pair, allocate_free_port};
pub use supervisor::{DaemonSupervisor, SupervisorEvent};
