//! Audited command execution engine.
//!
//! Every privileged action a plugin takes on the host funnels through
//! [`CommandExecutor`]. The executor enforces the configured command
//! allowlist, refuses shell metacharacters outright, supervises each child
//! with a deadline, and escalates termination from SIGTERM to SIGKILL when
//! a child overstays. Each live child is tracked in a process table so the
//! daemon can terminate everything it spawned during shutdown.
//!
//! # Deadline semantics
//!
//! At the options deadline the child receives a graceful termination
//! signal; if it has not exited after the grace period (5 seconds) it is
//! killed forcibly. A timeout is reported as an execution failure, never
//! as a success with a nonzero exit code.

use std::{
    collections::HashMap,
    path::PathBuf,
    process::Stdio,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::StewardError;

/// Grace period between the graceful and forcible termination signals.
const KILL_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Tokens that are rejected inside a command name: shell chaining,
/// pipes, and path traversal have no business in a bare command token.
const FORBIDDEN_TOKENS: &[&str] = &[";", "&&", "||", "|", "..", "~"];

/// Options for a single command invocation.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Working directory for the child.
    pub cwd: Option<PathBuf>,
    /// Extra environment variables, merged over the parent environment.
    pub env: HashMap<String, String>,
    /// Deadline in milliseconds; falls back to the configured default.
    pub timeout_ms: Option<u64>,
    /// Payload written to the child's stdin before closing it.
    pub stdin: Option<String>,
    /// Capture stdout/stderr (true) or inherit the parent's stdio (false).
    pub capture_output: Option<bool>,
}

/// Outcome of a completed (or killed) command.
#[derive(Debug, Clone, Serialize)]
pub struct ExecResult {
    /// Exit code, absent when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// True only for a clean zero exit.
    pub success: bool,
    /// Identity of the terminating signal, when there was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    /// True when the deadline expired and the executor killed the child.
    pub timed_out: bool,
    /// Failure detail for timeouts and signal deaths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Kill escalation state for a tracked child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KillState {
    None,
    Graceful,
    Forced,
}

/// Entry in the process table for one live child.
#[derive(Debug)]
struct ProcessEntry {
    pid: u32,
    command: String,
    started: Instant,
    kill_state: KillState,
}

/// Spawns, supervises, time-bounds and cancels child processes.
#[derive(Debug)]
pub struct CommandExecutor {
    /// Bare command names admitted for execution. Empty means no
    /// allowlist restriction is applied.
    allowed_commands: Vec<String>,
    /// Deadline applied when the options carry none.
    default_timeout: Duration,
    /// Live children, keyed by a monotonic-plus-random id. The lock is
    /// held only for insertion, removal and kill-state flips.
    processes: Mutex<HashMap<String, ProcessEntry>>,
    counter: AtomicU64,
}

impl CommandExecutor {
    /// Create an executor with the given allowlist and default deadline.
    pub fn new(allowed_commands: Vec<String>, default_timeout_ms: u64) -> Self {
        Self {
            allowed_commands,
            default_timeout: Duration::from_millis(default_timeout_ms),
            processes: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(1),
        }
    }

    /// Run `command` with `args`, supervised under the options deadline.
    pub async fn execute(
        &self,
        command: &str,
        args: &[String],
        options: ExecOptions,
    ) -> Result<ExecResult, StewardError> {
        self.check_command_allowed(command)?;
        self.run(command.to_string(), args.to_vec(), options).await
    }

    /// Run `command` rewritten through the non-interactive elevation
    /// helper unless the daemon already holds superuser identity.
    ///
    /// The allowlist check applies to the original command token, not the
    /// helper.
    pub async fn execute_with_elevation(
        &self,
        command: &str,
        args: &[String],
        options: ExecOptions,
    ) -> Result<ExecResult, StewardError> {
        self.check_command_allowed(command)?;

        if is_superuser() {
            debug!(command, "Already superuser, elevation is a no-op");
            return self.run(command.to_string(), args.to_vec(), options).await;
        }

        let mut sudo_args = vec!["-n".to_string(), command.to_string()];
        sudo_args.extend_from_slice(args);
        self.run("sudo".to_string(), sudo_args, options).await
    }

    /// True when `command` resolves to an executable on the PATH.
    pub fn check_command_exists(&self, command: &str) -> bool {
        let Some(path) = std::env::var_os("PATH") else {
            return false;
        };
        std::env::split_paths(&path).any(|dir| is_executable(&dir.join(command)))
    }

    /// Ids of all live children.
    pub fn live_processes(&self) -> Vec<String> {
        self.processes
            .lock()
            .expect("process table lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Request termination of one tracked child: graceful first, forcible
    /// after the grace period if it is still alive.
    ///
    /// Returns `false` when the id is unknown (already exited).
    pub async fn kill_process(&self, id: &str) -> bool {
        let pid = {
            let mut table = self.processes.lock().expect("process table lock poisoned");
            match table.get_mut(id) {
                Some(entry) => {
                    entry.kill_state = KillState::Graceful;
                    entry.pid
                }
                None => return false,
            }
        };

        debug!(id, pid, "Sending graceful termination signal");
        send_term_signal(pid);

        // Poll until the supervising task reaps the child, escalating to
        // a forcible kill once the grace period runs out.
        let deadline = Instant::now() + KILL_GRACE_PERIOD;
        loop {
            tokio::time::sleep(Duration::from_millis(50)).await;

            let mut table = self.processes.lock().expect("process table lock poisoned");
            let Some(entry) = table.get_mut(id) else {
                return true;
            };
            if Instant::now() >= deadline {
                entry.kill_state = KillState::Forced;
                drop(table);
                warn!(id, pid, "Child ignored graceful termination, killing");
                send_kill_signal(pid);
                return true;
            }
        }
    }

    /// Gracefully terminate every live child concurrently and await
    /// completion. Invoked during shutdown.
    pub async fn kill_all_processes(&self) {
        let ids = self.live_processes();
        if ids.is_empty() {
            return;
        }
        debug!(count = ids.len(), "Terminating all live child processes");
        futures::future::join_all(ids.iter().map(|id| self.kill_process(id))).await;
    }

    /// Allowlist and injection checks, applied before any spawn.
    fn check_command_allowed(&self, command: &str) -> Result<(), StewardError> {
        for token in FORBIDDEN_TOKENS {
            if command.contains(token) {
                return Err(StewardError::CommandNotAllowed(format!(
                    "Command not allowed: {command}"
                )));
            }
        }

        if !self.allowed_commands.is_empty()
            && !self.allowed_commands.iter().any(|c| c == command)
        {
            return Err(StewardError::CommandNotAllowed(format!(
                "Command not allowed: {command}"
            )));
        }

        Ok(())
    }

    /// Spawn and supervise one child to completion.
    async fn run(
        &self,
        command: String,
        args: Vec<String>,
        options: ExecOptions,
    ) -> Result<ExecResult, StewardError> {
        let capture = options.capture_output.unwrap_or(true);
        let timeout = options
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout);

        let mut cmd = Command::new(&command);
        cmd.args(&args);
        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }
        cmd.envs(&options.env);
        if capture {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        if options.stdin.is_some() {
            cmd.stdin(Stdio::piped());
        } else {
            cmd.stdin(Stdio::null());
        }
        cmd.kill_on_drop(true);

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|e| {
            StewardError::internal(format!("Failed to spawn command '{command}': {e}"))
        })?;

        let pid = child.id().unwrap_or_default();
        let id = self.track(pid, &command);
        debug!(id = %id, pid, command = %command, "Child process started");

        if let (Some(payload), Some(mut stdin)) = (options.stdin.as_ref(), child.stdin.take()) {
            if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                warn!(id = %id, error = %e, "Failed to write stdin payload");
            }
            // Dropping the handle closes the pipe so the child sees EOF.
        }

        let stdout_task = child.stdout.take().map(|mut out| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = out.read_to_end(&mut buf).await;
                buf
            })
        });
        let stderr_task = child.stderr.take().map(|mut err| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = err.read_to_end(&mut buf).await;
                buf
            })
        });

        let (status, timed_out, signal_sent) =
            match tokio::time::timeout(timeout, child.wait()).await {
                Ok(status) => {
                    let status = status.map_err(|e| {
                        self.untrack(&id);
                        StewardError::internal(format!("Failed to await child: {e}"))
                    })?;
                    (Some(status), false, None)
                }
                Err(_) => {
                    debug!(id = %id, pid, "Deadline expired, escalating termination");
                    self.set_kill_state(&id, KillState::Graceful);
                    send_term_signal(pid);

                    match tokio::time::timeout(KILL_GRACE_PERIOD, child.wait()).await {
                        Ok(status) => (status.ok(), true, Some("SIGTERM")),
                        Err(_) => {
                            self.set_kill_state(&id, KillState::Forced);
                            let _ = child.kill().await;
                            (child.wait().await.ok(), true, Some("SIGKILL"))
                        }
                    }
                }
            };

        self.untrack(&id);
        let duration_ms = started.elapsed().as_millis() as u64;

        let stdout = match stdout_task {
            Some(t) => String::from_utf8_lossy(&t.await.unwrap_or_default()).into_owned(),
            None => String::new(),
        };
        let stderr = match stderr_task {
            Some(t) => String::from_utf8_lossy(&t.await.unwrap_or_default()).into_owned(),
            None => String::new(),
        };

        if timed_out {
            return Ok(ExecResult {
                exit_code: None,
                stdout,
                stderr,
                duration_ms,
                success: false,
                signal: signal_sent.map(str::to_string),
                timed_out: true,
                error: Some(format!(
                    "Command '{command}' timed out after {} ms",
                    timeout.as_millis()
                )),
            });
        }

        let status = status.expect("non-timeout path always has a status");
        let exit_code = status.code();
        let signal = exit_signal(&status);
        let success = exit_code == Some(0);

        Ok(ExecResult {
            exit_code,
            stdout,
            stderr,
            duration_ms,
            success,
            signal: signal.clone(),
            timed_out: false,
            error: signal.map(|s| format!("Command '{command}' terminated by signal {s}")),
        })
    }

    /// Insert a child into the process table under a fresh id.
    fn track(&self, pid: u32, command: &str) -> String {
        let id = format!(
            "{}-{:04x}",
            self.counter.fetch_add(1, Ordering::SeqCst),
            rand::random::<u16>()
        );
        self.processes
            .lock()
            .expect("process table lock poisoned")
            .insert(
                id.clone(),
                ProcessEntry {
                    pid,
                    command: command.to_string(),
                    started: Instant::now(),
                    kill_state: KillState::None,
                },
            );
        id
    }

    /// Remove a child from the process table.
    fn untrack(&self, id: &str) {
        if let Some(entry) = self
            .processes
            .lock()
            .expect("process table lock poisoned")
            .remove(id)
        {
            debug!(
                id,
                pid = entry.pid,
                command = %entry.command,
                elapsed_ms = entry.started.elapsed().as_millis() as u64,
                killed = entry.kill_state != KillState::None,
                "Child process reaped"
            );
        }
    }

    fn set_kill_state(&self, id: &str, state: KillState) {
        if let Some(entry) = self
            .processes
            .lock()
            .expect("process table lock poisoned")
            .get_mut(id)
        {
            entry.kill_state = state;
        }
    }
}

/// True when the daemon runs with superuser identity.
#[cfg(unix)]
pub fn is_superuser() -> bool {
    // Effective uid decides whether the elevation helper is needed.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn is_superuser() -> bool {
    false
}

/// Send SIGTERM to a pid. Best-effort: the child may already be gone.
#[cfg(unix)]
fn send_term_signal(pid: u32) {
    unsafe {
        libc::kill(pid as i32, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn send_term_signal(_pid: u32) {}

/// Send SIGKILL to a pid.
#[cfg(unix)]
fn send_kill_signal(pid: u32) {
    unsafe {
        libc::kill(pid as i32, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn send_kill_signal(_pid: u32) {}

/// Signal identity of a signal-terminated exit status.
#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map(|s| match s {
        libc::SIGTERM => "SIGTERM".to_string(),
        libc::SIGKILL => "SIGKILL".to_string(),
        libc::SIGINT => "SIGINT".to_string(),
        libc::SIGSEGV => "SIGSEGV".to_string(),
        other => format!("signal {other}"),
    })
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<String> {
    None
}

/// True when `path` is an existing executable file.
#[cfg(unix)]
fn is_executable(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &std::path::Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_tokens_are_rejected() {
        let exec = CommandExecutor::new(vec![], 1000);
        for cmd in ["ls;rm", "a&&b", "a||b", "cat|grep", "../etc/passwd", "~root"] {
            let err = exec.check_command_allowed(cmd).unwrap_err();
            assert_eq!(err.code(), crate::errors::INSUFFICIENT_PRIVILEGES);
        }
    }

    #[test]
    fn empty_allowlist_admits_plain_commands() {
        let exec = CommandExecutor::new(vec![], 1000);
        assert!(exec.check_command_allowed("ls").is_ok());
    }

    #[test]
    fn allowlist_rejects_unlisted_commands() {
        let exec = CommandExecutor::new(vec!["ls".to_string()], 1000);
        assert!(exec.check_command_allowed("ls").is_ok());
        let err = exec.check_command_allowed("rm").unwrap_err();
        assert_eq!(err.to_string(), "Command not allowed: rm");
    }

    #[test]
    fn process_ids_are_unique() {
        let exec = CommandExecutor::new(vec![], 1000);
        let a = exec.track(1, "a");
        let b = exec.track(2, "b");
        assert_ne!(a, b);
        exec.untrack(&a);
        exec.untrack(&b);
        assert!(exec.live_processes().is_empty());
    }
}
