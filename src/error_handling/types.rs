use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    InvalidNodeId(String),
    MissingValue(String),
    FileNotAccessible(String),
    DirectoryDoesNotExist(String),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::InvalidNodeId(e) => write!(f, "Node id error: {}", e),
            ConfigError::MissingValue(e) => write!(f, "Missing configuration value: {}", e),
            ConfigError::FileNotAccessible(e) => write!(f, "File access error: {}", e),
            ConfigError::DirectoryDoesNotExist(e) => write!(f, "Directory error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Reason a status snapshot could not be turned into a session table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Fewer lines than a complete status file can have.
    TooFewLines(usize),
    /// The first line is not the client list header.
    MissingClientListHeader,
    /// A line that is not a section header appeared before any header.
    UnexpectedLine(usize),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::TooFewLines(n) => write!(f, "Status file too short ({} lines)", n),
            ParseError::MissingClientListHeader => {
                write!(f, "Status file does not start with the client list header")
            }
            ParseError::UnexpectedLine(n) => {
                write!(f, "Unexpected line {} before any section header", n)
            }
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug)]
pub enum RpcError {
    Transport(reqwest::Error),
    Status(String),
    Decode(String),
    NoEndpoints(String),
    InvalidIdentity(String),
    UnexpectedResponse(String),
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::Transport(e) => write!(f, "RPC transport error: {}", e),
            RpcError::Status(e) => write!(f, "RPC command failed: {}", e),
            RpcError::Decode(e) => write!(f, "RPC response decode error: {}", e),
            RpcError::NoEndpoints(role) => write!(f, "No endpoints registered for role {}", role),
            RpcError::InvalidIdentity(id) => write!(f, "Identity is not a user id: {}", id),
            RpcError::UnexpectedResponse(e) => write!(f, "Unexpected RPC response: {}", e),
        }
    }
}

impl std::error::Error for RpcError {}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        RpcError::Transport(err)
    }
}

#[derive(Debug)]
pub enum StorageError {
    ReadFailed(std::io::Error),
    WriteFailed(std::io::Error),
    Corrupt(serde_json::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ReadFailed(e) => write!(f, "Storage read failed: {}", e),
            StorageError::WriteFailed(e) => write!(f, "Storage write failed: {}", e),
            StorageError::Corrupt(e) => write!(f, "Storage content is corrupt: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug)]
pub enum ReconcileError {
    Rpc(RpcError),
    Storage(StorageError),
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::Rpc(e) => write!(f, "Backend error: {}", e),
            ReconcileError::Storage(e) => write!(f, "Recovery snapshot error: {}", e),
        }
    }
}

impl std::error::Error for ReconcileError {}

impl From<RpcError> for ReconcileError {
    fn from(err: RpcError) -> Self {
        ReconcileError::Rpc(err)
    }
}

impl From<StorageError> for ReconcileError {
    fn from(err: StorageError) -> Self {
        ReconcileError::Storage(err)
    }
}

#[derive(Debug)]
pub enum WatchError {
    Notify(notify::Error),
    ReadFailed(std::io::Error),
    Parse(ParseError),
    Reconcile(ReconcileError),
    ChannelClosed,
}

impl fmt::Display for WatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchError::Notify(e) => write!(f, "File watcher error: {}", e),
            WatchError::ReadFailed(e) => write!(f, "Status file read failed: {}", e),
            WatchError::Parse(e) => write!(f, "Status file parse failed: {}", e),
            WatchError::Reconcile(e) => write!(f, "Reconciliation failed: {}", e),
            WatchError::ChannelClosed => write!(f, "File watcher channel closed"),
        }
    }
}

impl std::error::Error for WatchError {}

impl From<notify::Error> for WatchError {
    fn from(err: notify::Error) -> Self {
        WatchError::Notify(err)
    }
}

impl From<ParseError> for WatchError {
    fn from(err: ParseError) -> Self {
        WatchError::Parse(err)
    }
}

impl From<ReconcileError> for WatchError {
    fn from(err: ReconcileError) -> Self {
        WatchError::Reconcile(err)
    }
}

#[derive(Debug)]
pub enum RelayError {
    BindFailed(String),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::BindFailed(e) => write!(f, "Relay bind failed: {}", e),
        }
    }
}

impl std::error::Error for RelayError {}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    RecoveryError(ReconcileError),
    WatchError(WatchError),
    RelayError(RelayError),
    InitializationFailed(String),
    TaskFailed(String),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::RecoveryError(e) => write!(f, "Crash recovery error: {}", e),
            ControllerError::WatchError(e) => write!(f, "Status monitor error: {}", e),
            ControllerError::RelayError(e) => write!(f, "Authentication relay error: {}", e),
            ControllerError::InitializationFailed(e) => write!(f, "Initialization failed: {}", e),
            ControllerError::TaskFailed(e) => write!(f, "Service task failed: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<WatchError> for ControllerError {
    fn from(err: WatchError) -> Self {
        ControllerError::WatchError(err)
    }
}

impl From<RelayError> for ControllerError {
    fn from(err: RelayError) -> Self {
        ControllerError::RelayError(err)
    }
}
