/// Host-facing notifications the facade produces. The host polls or
/// subscribes to these; the orchestrator never calls back into host code
/// directly.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    RunningChanged(bool),
    OnionAddressChanged(String),
    OnionAddressesChanged,
    StatusChanged(String),
    Log(String),
    Error(String),
    Started,
    Stopped,
    BootstrapProgressChanged(u8),
    CurrentStatusChanged(String),
    InitializingChanged(bool),
    InstallingChanged(bool),
    RequestCountChanged(String, u64),
    RequestCountsChanged,
    DownloadErrorCodeChanged(String),
    DownloadErrorMsgChanged(String),
    GpgWarning(String, String),
}
