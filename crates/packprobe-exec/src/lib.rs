//! Blocking subprocess invocation with captured output
//!
//! Probes call external executables and judge them by exit code and output.
//! Invocations block until the child exits, with stdout and stderr fully
//! buffered. A timeout is opt-in; without one a hung child blocks forever.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors raised when a child process cannot be run to completion
#[derive(thiserror::Error, Debug)]
pub enum ExecError {
    #[error("packprobe: ERR_SPAWN: failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("packprobe: ERR_SPAWN: failed to collect output from {program}: {source}")]
    Collect {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("packprobe: ERR_TIMEOUT: {program} did not exit within {timeout_ms}ms")]
    Timeout { program: String, timeout_ms: u128 },
}

/// Exit code plus captured output of one finished child process
#[derive(Debug)]
pub struct InvocationOutput {
    pub code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl InvocationOutput {
    #[must_use]
    pub const fn success(&self) -> bool {
        self.code == 0
    }

    /// Captured stdout as text, lossily decoded.
    #[must_use]
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Captured stderr as text, lossily decoded.
    #[must_use]
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

/// One pending invocation of an external executable
pub struct Invocation {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl Invocation {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Kill the child and fail with `ERR_TIMEOUT` if it outlives `timeout`.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run the child to completion, blocking the calling thread.
    ///
    /// # Errors
    ///
    /// Returns `ExecError` when the child cannot be started, its output
    /// cannot be collected, or the configured timeout expires.
    pub fn run(&self) -> Result<InvocationOutput, ExecError> {
        match self.timeout {
            None => self.run_blocking(),
            Some(timeout) => self.run_with_deadline(timeout),
        }
    }

    fn run_blocking(&self) -> Result<InvocationOutput, ExecError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| ExecError::Spawn {
                program: self.program_name(),
                source,
            })?;

        Ok(InvocationOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn run_with_deadline(&self, timeout: Duration) -> Result<InvocationOutput, ExecError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: self.program_name(),
                source,
            })?;

        // Drain both pipes off-thread while polling, so a child that
        // outgrows the OS pipe buffer never blocks on write and stalls
        // until the deadline.
        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let deadline = Instant::now() + timeout;
        let status = loop {
            let exited = child.try_wait().map_err(|source| ExecError::Collect {
                program: self.program_name(),
                source,
            })?;
            if let Some(status) = exited {
                break status;
            }
            if Instant::now() >= deadline {
                // Best effort: the child may have exited between the poll
                // and the kill. The reader threads see EOF once it dies.
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExecError::Timeout {
                    program: self.program_name(),
                    timeout_ms: timeout.as_millis(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        Ok(InvocationOutput {
            code: status.code().unwrap_or(-1),
            stdout: join_reader(stdout_reader),
            stderr: join_reader(stderr_reader),
        })
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

fn spawn_reader<R>(pipe: Option<R>) -> Option<thread::JoinHandle<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = pipe.read_to_end(&mut buffer);
            buffer
        })
    })
}

fn join_reader(reader: Option<thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}
