// src/process/backend.rs

//! Pluggable process backend abstraction.
//!
//! The controller talks to a [`ProcessBackend`] instead of
//! `tokio::process::Command` directly. This makes it easy to swap in a fake
//! backend in tests while keeping the production implementation in
//! [`TokioBackend`].

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::debug;

use crate::errors::LaunchError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    /// A command line run through the platform shell (`sh -c` / `cmd /C`).
    Shell(String),
    /// A program and its arguments, executed directly.
    Argv { program: String, args: Vec<String> },
}

impl CommandSpec {
    /// Name used in error messages and logs.
    pub fn program(&self) -> &str {
        match self {
            CommandSpec::Shell(_) if cfg!(windows) => "cmd",
            CommandSpec::Shell(_) => "sh",
            CommandSpec::Argv { program, .. } => program,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CommandSpec::Shell(line) => line.trim().is_empty(),
            CommandSpec::Argv { program, .. } => program.trim().is_empty(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandSpec::Shell(line) => f.write_str(line),
            CommandSpec::Argv { program, args } => {
                f.write_str(program)?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                Ok(())
            }
        }
    }
}

/// Platform-neutral exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    /// Terminating signal (Unix only).
    pub signal: Option<i32>,
}

impl ExitInfo {
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn from_signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    /// Status could not be determined.
    pub fn unknown() -> Self {
        Self {
            code: None,
            signal: None,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(sig)) => write!(f, "signal {sig}"),
            (None, None) => f.write_str("unknown status"),
        }
    }
}

impl From<std::process::ExitStatus> for ExitInfo {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            Self {
                code: status.code(),
                signal: status.signal(),
            }
        }
        #[cfg(not(unix))]
        {
            Self {
                code: status.code(),
                signal: None,
            }
        }
    }
}

/// A launched child process.
pub trait ChildProcess: Send {
    fn id(&self) -> Option<u32>;

    /// Ask the process to exit (SIGTERM on Unix). Must not block.
    fn terminate(&mut self) -> io::Result<()>;

    /// Force the process to exit (SIGKILL on Unix). Must not block; call
    /// [`wait`](Self::wait) afterwards to reap it.
    fn kill(&mut self) -> io::Result<()>;

    /// Resolve once the process has exited. Cancel safe: dropping the future
    /// and calling `wait` again is fine.
    fn wait(&mut self) -> BoxFuture<'_, io::Result<ExitInfo>>;

    /// Kill whatever the process left behind in its process group. Called
    /// after the process itself has been reaped; without a group it does
    /// nothing.
    fn kill_leftovers(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Trait abstracting how the served process is launched.
///
/// Production code uses [`TokioBackend`]; tests can provide their own
/// implementation that doesn't spawn real processes.
pub trait ProcessBackend: Send {
    /// Launch `command` with `env` layered over the inherited environment.
    fn spawn(
        &mut self,
        command: &CommandSpec,
        env: &[(String, String)],
    ) -> Result<Box<dyn ChildProcess>, LaunchError>;
}

/// Real backend over `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct TokioBackend;

impl ProcessBackend for TokioBackend {
    fn spawn(
        &mut self,
        command: &CommandSpec,
        env: &[(String, String)],
    ) -> Result<Box<dyn ChildProcess>, LaunchError> {
        if command.is_empty() {
            return Err(LaunchError::EmptyCommand);
        }

        let mut cmd = match command {
            CommandSpec::Shell(line) => {
                // Build a shell command appropriate for the platform.
                if cfg!(windows) {
                    let mut c = Command::new("cmd");
                    c.arg("/C").arg(line);
                    c
                } else {
                    let mut c = Command::new("sh");
                    c.arg("-c").arg(line);
                    c
                }
            }
            CommandSpec::Argv { program, args } => {
                let mut c = Command::new(program);
                c.args(args);
                c
            }
        };

        cmd.envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        // Own process group, so signals reach grandchildren spawned by a
        // shell or a reloader inside the served app.
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .map_err(|e| LaunchError::from_spawn(command.program(), e))?;
        let pid = child.id();
        debug!(?pid, command = %command, "spawned child process");

        Ok(Box::new(TokioChild { child, pid }))
    }
}

struct TokioChild {
    child: Child,
    pid: Option<u32>,
}

impl ChildProcess for TokioChild {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    fn terminate(&mut self) -> io::Result<()> {
        #[cfg(unix)]
        {
            match self.pid {
                Some(pid) => signal_group(pid, libc::SIGTERM),
                None => Ok(()),
            }
        }
        #[cfg(not(unix))]
        {
            // No graceful equivalent; terminate outright.
            self.child.start_kill()
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        kill_group(self.pid)?;
        match self.child.start_kill() {
            Ok(()) => Ok(()),
            // Already reaped.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn wait(&mut self) -> BoxFuture<'_, io::Result<ExitInfo>> {
        Box::pin(async move {
            let status = self.child.wait().await?;
            Ok(ExitInfo::from(status))
        })
    }

    fn kill_leftovers(&mut self) -> io::Result<()> {
        // The group outlives its leader: background jobs of a shell command
        // or workers of a reloader keep it alive.
        kill_group(self.pid)
    }
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>) -> io::Result<()> {
    match pid {
        Some(pid) => signal_group(pid, libc::SIGKILL),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) -> io::Result<()> {
    Ok(())
}

/// Send `sig` to the process group led by `pid`. A group that is already
/// gone is not an error.
#[cfg(unix)]
fn signal_group(pid: u32, sig: libc::c_int) -> io::Result<()> {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"));
    };
    // SAFETY: kill(2) takes plain integers and has no memory-safety
    // requirements.
    let rc = unsafe { libc::kill(-pgid, sig) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}
