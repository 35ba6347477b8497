//! Execution of `SMcli` report queries.
//!
//! [`ReportSource`] is the seam between the scheduler and the external tool:
//! [`SmCli`] runs the real binary, [`crate::mock::MockSource`] serves canned
//! reports in tests.

use std::ffi::OsString;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, trace, warn};

use crate::config::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_SHELL, ExporterConfig, TargetSet};
use crate::query::QueryKind;

/// Failure to obtain a report. The pass is skipped and retried next tick.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed waiting for SMcli: {0}")]
    Wait(#[source] io::Error),
    #[error("SMcli exited with {}: {stderr}", exit_label(.code))]
    ExitStatus { code: Option<i32>, stderr: String },
    #[error("SMcli produced no output")]
    EmptyOutput,
    #[error("SMcli did not finish within {0:?}")]
    Timeout(Duration),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "signal".to_string(),
    }
}

/// Captured standard output of one query.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReport {
    pub kind: QueryKind,
    pub output: String,
}

/// Anything that can produce the raw text of a report.
pub trait ReportSource: Send + Sync {
    fn fetch(&self, kind: QueryKind)
    -> impl Future<Output = Result<RawReport, CommandError>> + Send;
}

/// Runs `SMcli` as a child process, one query at a time.
#[derive(Debug, Clone)]
pub struct SmCli {
    binary: PathBuf,
    shell: Option<PathBuf>,
    targets: TargetSet,
    timeout: Duration,
}

impl SmCli {
    /// Runner launching `binary` through `/bin/sh` with the default timeout.
    pub fn new(binary: impl Into<PathBuf>, targets: TargetSet) -> Self {
        Self {
            binary: binary.into(),
            shell: Some(PathBuf::from(DEFAULT_SHELL)),
            targets,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn from_config(config: &ExporterConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            shell: config.shell.clone(),
            targets: config.targets.clone(),
            timeout: config.command_timeout,
        }
    }

    pub fn with_shell(mut self, shell: Option<PathBuf>) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program and arguments for `kind`:
    /// `[shell] <binary> <targets> -S -c <script>`.
    pub fn command_line(&self, kind: QueryKind) -> (OsString, Vec<OsString>) {
        let mut args: Vec<OsString> = vec![
            self.targets.to_string().into(),
            "-S".into(),
            "-c".into(),
            kind.script().into(),
        ];
        match &self.shell {
            Some(shell) => {
                args.insert(0, self.binary.clone().into_os_string());
                (shell.clone().into_os_string(), args)
            }
            None => (self.binary.clone().into_os_string(), args),
        }
    }

    /// Runs the query and returns its stdout.
    ///
    /// Stderr is only kept for the error message. On unix the child leads its
    /// own process group, and the whole group is killed if the query outlives
    /// the timeout or is cancelled, so processes `SMcli` forks go with it.
    pub async fn run(&self, kind: QueryKind) -> Result<RawReport, CommandError> {
        let (program, args) = self.command_line(kind);
        debug!(query = %kind, program = ?program, args = ?args, "running SMcli");

        let mut command = Command::new(&program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|source| CommandError::Spawn {
            program: program.to_string_lossy().into_owned(),
            source,
        })?;
        let group = GroupKill { pgid: child.id() };

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CommandError::Timeout(self.timeout))?
            .map_err(CommandError::Wait)?;
        group.disarm();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CommandError::ExitStatus {
                code: output.status.code(),
                stderr: stderr.lines().next().unwrap_or_default().trim().to_string(),
            });
        }

        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Err(CommandError::EmptyOutput);
        }

        let output = String::from_utf8_lossy(&output.stdout).into_owned();
        trace!(query = %kind, bytes = output.len(), "SMcli output captured");
        Ok(RawReport { kind, output })
    }
}

/// Kills a child's process group when dropped, unless disarmed after the
/// child exited on its own.
struct GroupKill {
    pgid: Option<u32>,
}

impl GroupKill {
    fn disarm(mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupKill {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_process_group(pgid);
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pgid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => debug!(pgid, "killed SMcli process group"),
        Err(e) => warn!(pgid, error = %e, "failed to kill SMcli process group"),
    }
}

// kill_on_drop still stops the direct child
#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}

impl ReportSource for SmCli {
    async fn fetch(&self, kind: QueryKind) -> Result<RawReport, CommandError> {
        self.run(kind).await
    }
}
