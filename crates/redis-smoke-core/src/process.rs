//! External process invocation
//!
//! [`CommandSpec`] describes a command line; [`CommandSpec::spawn`] starts
//! it and returns a [`ProcessAttempt`] the retry session can wait on.
//! Output is drained concurrently so a timed-out attempt still exposes
//! whatever the process printed before it was killed.

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::retry::{Attempt, AttemptOutcome};

const REDACTED: &str = "[REDACTED]";

/// How long pipe readers may run on after the process has exited
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// A command line to launch, possibly many times
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, OsString)>,
    secret_args: Vec<usize>,
}

impl CommandSpec {
    /// Create a spec for `program` with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append an argument that must never appear in logs
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.secret_args.push(self.args.len());
        self.args.push(arg.into());
        self
    }

    /// Set an environment variable for the child
    pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// The program name
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The arguments, unredacted
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Start the command
    pub fn spawn(&self) -> io::Result<ProcessAttempt> {
        debug!(command = %self, "spawning");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }

        Ok(ProcessAttempt::from_child(cmd.spawn()?, self.to_string()))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for (i, arg) in self.args.iter().enumerate() {
            if self.secret_args.contains(&i) {
                write!(f, " {}", REDACTED)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

type SharedBuffer = Arc<Mutex<Vec<u8>>>;

/// A running (or finished) child process
pub struct ProcessAttempt {
    child: Child,
    label: String,
    stdout: SharedBuffer,
    stderr: SharedBuffer,
    readers: Vec<JoinHandle<()>>,
}

impl ProcessAttempt {
    fn from_child(mut child: Child, label: String) -> Self {
        let stdout = SharedBuffer::default();
        let stderr = SharedBuffer::default();
        let mut readers = Vec::with_capacity(2);

        if let Some(pipe) = child.stdout.take() {
            readers.push(tokio::spawn(drain(pipe, stdout.clone())));
        }
        if let Some(pipe) = child.stderr.take() {
            readers.push(tokio::spawn(drain(pipe, stderr.clone())));
        }

        Self {
            child,
            label,
            stdout,
            stderr,
            readers,
        }
    }

    fn captured(buffer: &SharedBuffer) -> String {
        match buffer.lock() {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }
}

async fn drain<R>(mut pipe: R, buffer: SharedBuffer)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if let Ok(mut bytes) = buffer.lock() {
                    bytes.extend_from_slice(&chunk[..n]);
                }
            }
        }
    }
}

#[async_trait]
impl Attempt for ProcessAttempt {
    async fn wait(&mut self, timeout: Duration) -> AttemptOutcome {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                // Pipes close at exit unless a grandchild inherited them
                for mut reader in self.readers.drain(..) {
                    if tokio::time::timeout(PIPE_DRAIN_TIMEOUT, &mut reader)
                        .await
                        .is_err()
                    {
                        debug!(command = %self.label, "pipe still open after exit, abandoning");
                        reader.abort();
                    }
                }
                debug!(command = %self.label, status = %status, "process exited");

                AttemptOutcome {
                    exit_code: status.code(),
                    stdout: Self::captured(&self.stdout),
                    stderr: Self::captured(&self.stderr),
                    timed_out: false,
                }
            }
            Ok(Err(e)) => {
                debug!(command = %self.label, error = %e, "failed to wait on process");
                AttemptOutcome {
                    exit_code: None,
                    stdout: Self::captured(&self.stdout),
                    stderr: Self::captured(&self.stderr),
                    timed_out: false,
                }
            }
            Err(_) => {
                debug!(
                    command = %self.label,
                    timeout_ms = timeout.as_millis() as u64,
                    "process did not exit in time, killing"
                );
                let _ = self.child.start_kill();
                for reader in self.readers.drain(..) {
                    reader.abort();
                }

                AttemptOutcome::timed_out(
                    Self::captured(&self.stdout),
                    Self::captured(&self.stderr),
                )
            }
        }
    }
}
