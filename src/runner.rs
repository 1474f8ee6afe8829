use anyhow::Context;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One external tool call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Kill the child once this elapses. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Pipe stdout/stderr back to us instead of sharing the terminal.
    pub capture: bool,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: None,
            capture: false,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn captured(mut self) -> Self {
        self.capture = true;
        self
    }

    #[cfg(test)]
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// Command line for logs, with API keys masked.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        for arg in &self.args {
            match arg.split_once('=') {
                Some((flag, _)) if flag.ends_with("api-key") => parts.push(format!("{}=***", flag)),
                _ => parts.push(arg.clone()),
            }
        }
        parts.join(" ")
    }
}

/// What came back from a finished (or killed) child.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when killed by a signal or after a timeout.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.code == Some(0)
    }

    pub fn failed(&self) -> bool {
        !self.timed_out && !self.success()
    }
}

#[cfg(test)]
impl CommandOutput {
    pub fn ok(stdout: &str) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.to_string(),
            ..Self::default()
        }
    }

    pub fn exit(code: i32, stderr: &str) -> Self {
        Self {
            code: Some(code),
            stderr: stderr.to_string(),
            ..Self::default()
        }
    }

    pub fn timeout(partial_stdout: &str) -> Self {
        Self {
            code: None,
            stdout: partial_stdout.to_string(),
            timed_out: true,
            ..Self::default()
        }
    }
}

/// Seam between the pipeline and the external tools.
pub trait CommandRunner {
    /// Run to completion. `Err` only when the process could not be started
    /// or waited on; a non-zero exit is reported through `CommandOutput`.
    fn run(&self, invocation: &Invocation) -> anyhow::Result<CommandOutput>;
}

/// Runs real processes with `std::process::Command`.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> anyhow::Result<CommandOutput> {
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if invocation.capture {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to spawn {}. Is it installed?", invocation.program))?;

        // Drain both pipes while we wait so a chatty child never blocks on a full buffer
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let waited = match invocation.timeout {
            Some(limit) => wait_with_timeout(&mut child, limit),
            None => child.wait().map(Some),
        };
        // Join the drain threads before reporting a wait error so none outlive the call
        let stdout = collect(stdout);
        let stderr = collect(stderr);
        let status = waited.with_context(|| format!("Failed to wait for {}", invocation.program))?;

        Ok(CommandOutput {
            code: status.and_then(|s| s.code()),
            stdout,
            stderr,
            timed_out: status.is_none(),
        })
    }
}

/// The parts of `std::process::Child` the timeout loop needs.
trait Reap {
    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>>;
    fn kill(&mut self) -> std::io::Result<()>;
    fn wait(&mut self) -> std::io::Result<ExitStatus>;
}

impl Reap for Child {
    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        Child::try_wait(self)
    }

    fn kill(&mut self) -> std::io::Result<()> {
        Child::kill(self)
    }

    fn wait(&mut self) -> std::io::Result<ExitStatus> {
        Child::wait(self)
    }
}

/// Returns `None` if the child had to be killed. The child is killed and
/// reaped on every path that gives up on it, including a failed poll.
fn wait_with_timeout<C: Reap>(child: &mut C, limit: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + limit;
    loop {
        let polled = match child.try_wait() {
            Ok(polled) => polled,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        };
        if let Some(status) = polled {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            // Already-exited races are fine to ignore here
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R: Read + Send + 'static>(mut source: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = source.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_masks_keys() {
        let inv = Invocation::new(
            "immich-go",
            ["upload", "--server=http://host", "--api-key=secret", "--admin-api-key=root", "dir"],
        );
        assert_eq!(
            inv.display(),
            "immich-go upload --server=http://host --api-key=*** --admin-api-key=*** dir"
        );
    }

    #[test]
    fn test_output_states() {
        assert!(CommandOutput::ok("").success());
        assert!(CommandOutput::exit(2, "bad").failed());
        let timed_out = CommandOutput::timeout("partial");
        assert!(!timed_out.success());
        assert!(!timed_out.failed());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures_output() {
        let inv = Invocation::new("sh", ["-c", "echo hello; echo oops >&2"]).captured();
        let out = SystemRunner.run(&inv).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_exit_code() {
        let inv = Invocation::new("sh", ["-c", "exit 3"]).captured();
        let out = SystemRunner.run(&inv).unwrap();
        assert_eq!(out.code, Some(3));
        assert!(out.failed());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_timeout() {
        let inv = Invocation::new("sleep", ["5"])
            .captured()
            .timeout(Duration::from_millis(200));
        let started = Instant::now();
        let out = SystemRunner.run(&inv).unwrap();
        assert!(out.timed_out);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_system_runner_missing_binary() {
        let inv = Invocation::new("definitely-not-a-real-tool-7f3a", Vec::<String>::new());
        let err = SystemRunner.run(&inv).unwrap_err();
        assert!(err.to_string().contains("Failed to spawn"));
    }

    /// Child whose status poll always errors.
    #[cfg(unix)]
    #[derive(Default)]
    struct BrokenPoll {
        killed: bool,
        reaped: bool,
    }

    #[cfg(unix)]
    impl Reap for BrokenPoll {
        fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
            Err(std::io::Error::other("poll failed"))
        }

        fn kill(&mut self) -> std::io::Result<()> {
            self.killed = true;
            Ok(())
        }

        fn wait(&mut self) -> std::io::Result<ExitStatus> {
            use std::os::unix::process::ExitStatusExt;
            self.reaped = true;
            Ok(ExitStatus::from_raw(9))
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_poll_error_kills_child() {
        let mut child = BrokenPoll::default();
        let err = wait_with_timeout(&mut child, Duration::from_secs(5)).unwrap_err();
        assert_eq!(err.to_string(), "poll failed");
        assert!(child.killed);
        assert!(child.reaped);
    }
}
