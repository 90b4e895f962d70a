mod error;
mod handler;
mod registry;

pub use error::RegistryError;
pub use handler::{Handler, RequestReceived, ServiceHandlerFactory};
pub use registry::{LocalService, PendingEntry, ServiceRegistry};
