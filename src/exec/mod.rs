//! External process execution.
//!
//! Every devtool invocation, native or containerized, ends up here. The
//! executor expands `$VAR` references, overlays the caller's environment on
//! top of the inherited one, and separates "could not start" from "ran and
//! failed" so exit codes can be propagated unchanged.

mod expand;

pub use expand::expand;

use crate::error::ProcessError;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Where a child's output stream goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSink {
    /// Forward live to this process's stream
    Inherit,
    /// Drop the output
    Discard,
    /// Collect into memory
    Capture,
}

impl OutputSink {
    fn stdio(self) -> Stdio {
        match self {
            OutputSink::Inherit => Stdio::inherit(),
            OutputSink::Discard => Stdio::null(),
            OutputSink::Capture => Stdio::piped(),
        }
    }
}

/// A single command to run.
///
/// `env` entries override the inherited environment; inherited variables not
/// named in `env` pass through unchanged.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Environment overlay
    pub env: BTreeMap<String, String>,
    /// Working directory; inherited when `None`
    pub working_dir: Option<PathBuf>,
    /// Program to run
    pub command: String,
    /// Arguments, in order
    pub args: Vec<String>,
    /// Stdout routing
    pub stdout: OutputSink,
    /// Stderr routing
    pub stderr: OutputSink,
}

impl Invocation {
    /// Create an invocation that forwards both streams live
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            env: BTreeMap::new(),
            working_dir: None,
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            stdout: OutputSink::Inherit,
            stderr: OutputSink::Inherit,
        }
    }

    /// Set the environment overlay
    pub fn envs(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Add one environment entry
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory; an empty path means "inherit"
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.working_dir = if dir.as_os_str().is_empty() {
            None
        } else {
            Some(dir)
        };
        self
    }

    /// Set stdout routing
    pub fn stdout(mut self, sink: OutputSink) -> Self {
        self.stdout = sink;
        self
    }

    /// Set stderr routing
    pub fn stderr(mut self, sink: OutputSink) -> Self {
        self.stderr = sink;
        self
    }

    /// Expand `$VAR` references in command and arguments against the
    /// overlay, falling back to the ambient environment.
    pub fn expanded(&self) -> (String, Vec<String>) {
        let lookup = |name: &str| {
            self.env
                .get(name)
                .cloned()
                .or_else(|| std::env::var(name).ok())
        };
        let command = expand(&self.command, lookup);
        let args = self.args.iter().map(|a| expand(a, lookup)).collect();
        (command, args)
    }
}

/// Output collected from streams routed to [`OutputSink::Capture`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
}

/// Render a command line the way it is logged: program followed by
/// Debug-quoted arguments.
pub fn quoted_command_line(command: &str, args: &[String]) -> String {
    let mut line = command.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&format!("{:?}", arg));
    }
    line
}

fn plain_command_line(command: &str, args: &[String]) -> String {
    if args.is_empty() {
        command.to_string()
    } else {
        format!("{} {}", command, args.join(" "))
    }
}

/// Run an invocation to completion.
///
/// * `Ok(captured)` - the command ran and exited zero
/// * `Err(ProcessError::Failed)` - the command ran and exited non-zero
/// * `Err(ProcessError::NotStarted)` - the command could not be started
pub async fn execute(invocation: &Invocation) -> Result<Captured, ProcessError> {
    execute_logged(invocation, false).await
}

async fn execute_logged(invocation: &Invocation, verbose: bool) -> Result<Captured, ProcessError> {
    let (command, args) = invocation.expanded();

    let quoted = quoted_command_line(&command, &args);
    if verbose {
        log::info!("exec: {}", quoted);
    } else {
        log::debug!("exec: {}", quoted);
    }

    let mut cmd = Command::new(&command);
    cmd.args(&args)
        .envs(&invocation.env)
        .stdin(Stdio::inherit())
        .stdout(invocation.stdout.stdio())
        .stderr(invocation.stderr.stdio());

    if let Some(dir) = &invocation.working_dir {
        cmd.current_dir(dir);
    }

    let child = cmd.spawn().map_err(|e| ProcessError::NotStarted {
        command: plain_command_line(&command, &args),
        source: e,
    })?;

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| ProcessError::NotStarted {
            command: plain_command_line(&command, &args),
            source: e,
        })?;

    let captured = Captured {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if output.status.success() {
        return Ok(captured);
    }

    Err(ProcessError::Failed {
        command: plain_command_line(&command, &args),
        // Killed by a signal: no code exposed
        code: output.status.code().unwrap_or(1),
        stdout: captured.stdout,
        stderr: captured.stderr,
    })
}

/// Exit code of an execution result: 0 on success, the process's own code
/// when it ran, 1 otherwise.
pub fn exit_status<T>(result: &Result<T, ProcessError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.exit_code(),
    }
}

/// Verbosity-aware runner used by the devtool layer.
///
/// With verbosity on, stdout is forwarded live and command lines are logged
/// at info level. With verbosity off, stdout is captured and printed only if
/// the command fails. Stderr is always forwarded live.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner {
    verbose: bool,
}

impl ProcessRunner {
    /// Create a runner
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Whether stdout is forwarded live
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Run with the runner's verbosity semantics
    pub async fn run(&self, invocation: Invocation) -> Result<(), ProcessError> {
        if self.verbose {
            return self.run_verbose(invocation).await;
        }

        let invocation = invocation
            .stdout(OutputSink::Capture)
            .stderr(OutputSink::Inherit);
        match execute_logged(&invocation, false).await {
            Ok(_) => Ok(()),
            Err(e) => {
                if let ProcessError::Failed { stdout, .. } = &e {
                    if !stdout.is_empty() {
                        print!("{}", stdout);
                    }
                }
                Err(e)
            }
        }
    }

    /// Run with stdout always forwarded live
    pub async fn run_verbose(&self, invocation: Invocation) -> Result<(), ProcessError> {
        let invocation = invocation
            .stdout(OutputSink::Inherit)
            .stderr(OutputSink::Inherit);
        execute_logged(&invocation, self.verbose).await.map(|_| ())
    }

    /// Run and return stdout with one trailing newline removed
    pub async fn output(&self, invocation: Invocation) -> Result<String, ProcessError> {
        let invocation = invocation.stdout(OutputSink::Capture);
        let captured = execute_logged(&invocation, self.verbose).await?;
        let stdout = captured.stdout;
        Ok(stdout
            .strip_suffix('\n')
            .map(|s| s.strip_suffix('\r').unwrap_or(s).to_string())
            .unwrap_or(stdout))
    }
}
