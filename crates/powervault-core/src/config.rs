//! Collector configuration, validated once at startup.

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Install location of `SMcli` in Dell MD Storage Manager packages.
pub const DEFAULT_SMCLI_PATH: &str = "/opt/dell/mdstoragesoftware/mdstoragemanager/client/SMcli";
/// `SMcli` ships as a shell script.
pub const DEFAULT_SHELL: &str = "/bin/sh";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Startup configuration errors. All of them are fatal.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("no storage array address configured")]
    NoTargets,
    #[error("SMcli binary not found at {0}")]
    BinaryNotFound(PathBuf),
    #[error("shell not found at {0}")]
    ShellNotFound(PathBuf),
    #[error("poll interval must be greater than zero")]
    ZeroInterval,
    #[error("command timeout must be greater than zero")]
    ZeroTimeout,
}

/// Ordered, deduplicated storage array addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSet(Vec<IpAddr>);

impl TargetSet {
    /// Keeps the first occurrence of each address.
    pub fn new(addrs: impl IntoIterator<Item = IpAddr>) -> Result<Self, ConfigError> {
        let mut unique: Vec<IpAddr> = Vec::new();
        for addr in addrs {
            if !unique.contains(&addr) {
                unique.push(addr);
            }
        }
        if unique.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        Ok(Self(unique))
    }

    pub fn addresses(&self) -> &[IpAddr] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Address list in the form `SMcli` expects: `a, b, c`.
impl fmt::Display for TargetSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, addr) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{addr}")?;
        }
        Ok(())
    }
}

/// Everything the collection pipeline needs.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub targets: TargetSet,
    /// Path to `SMcli`.
    pub binary: PathBuf,
    /// Interpreter used to launch `binary`; `None` executes it directly.
    pub shell: Option<PathBuf>,
    pub interval: Duration,
    pub command_timeout: Duration,
}

impl ExporterConfig {
    pub fn new(targets: TargetSet, binary: impl Into<PathBuf>) -> Self {
        Self {
            targets,
            binary: binary.into(),
            shell: Some(PathBuf::from(DEFAULT_SHELL)),
            interval: DEFAULT_INTERVAL,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_shell(mut self, shell: Option<PathBuf>) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Checks that the collector can run at all.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        if !self.binary.exists() {
            return Err(ConfigError::BinaryNotFound(self.binary.clone()));
        }
        if let Some(shell) = &self.shell
            && !shell.exists()
        {
            return Err(ConfigError::ShellNotFound(shell.clone()));
        }
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.command_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}
