use crate::utils::error::{Result, ToolsError};
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How a subprocess should be launched. `check` defaults to true.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub cwd: Option<PathBuf>,
    pub input: Option<Vec<u8>>,
    pub capture_stdout: bool,
    pub capture_stderr: bool,
    pub shell: bool,
    /// Replaces the child's environment entirely when set.
    pub env: Option<HashMap<String, String>>,
    pub check: bool,
    /// Send streams that are not captured to the null device.
    pub quiet: bool,
    pub timeout: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            cwd: None,
            input: None,
            capture_stdout: false,
            capture_stderr: false,
            shell: false,
            env: None,
            check: true,
            quiet: false,
            timeout: None,
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn capture_stdout(mut self) -> Self {
        self.capture_stdout = true;
        self
    }

    pub fn capture_stderr(mut self) -> Self {
        self.capture_stderr = true;
        self
    }

    pub fn capture_output(self) -> Self {
        self.capture_stdout().capture_stderr()
    }

    pub fn shell(mut self, shell: bool) -> Self {
        self.shell = shell;
        self
    }

    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn output_stdio(&self, captured: bool) -> Stdio {
        if captured {
            Stdio::piped()
        } else if self.quiet {
            Stdio::null()
        } else {
            Stdio::inherit()
        }
    }
}

/// Outcome of a finished subprocess. Streams are `Some` only when captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedProcess {
    pub args: Vec<String>,
    /// Negative signal number when the process was killed by a signal.
    pub returncode: i32,
    pub stdout: Option<Vec<u8>>,
    pub stderr: Option<Vec<u8>>,
}

impl CompletedProcess {
    pub fn success(&self) -> bool {
        self.returncode == 0
    }

    pub fn stdout_str(&self) -> Option<String> {
        self.stdout
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn stderr_str(&self) -> Option<String> {
        self.stderr
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn check_returncode(&self) -> Result<()> {
        if self.success() {
            Ok(())
        } else {
            Err(ToolsError::CalledProcessError {
                command: self.args.clone(),
                returncode: self.returncode,
                stdout: self.stdout.clone(),
                stderr: self.stderr.clone(),
            })
        }
    }
}

/// Runs `args` with default options: inherited streams, error on non-zero exit.
pub fn run<I, S>(args: I) -> Result<CompletedProcess>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    run_with(args, &RunOptions::default())
}

pub fn run_with<I, S>(args: I, options: &RunOptions) -> Result<CompletedProcess>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<OsString> = args
        .into_iter()
        .map(|arg| arg.as_ref().to_os_string())
        .collect();
    if args.is_empty() {
        return Err(ToolsError::InvalidCommandError {
            message: "no program given".to_string(),
        });
    }
    let command_line: Vec<String> = args
        .iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();

    let cwd = match &options.cwd {
        Some(cwd) => cwd.clone(),
        None => std::env::current_dir()?,
    };
    info!("Running subprocess in '{}'\n  {:?}", cwd.display(), command_line);

    let mut command = build_command(&args, &command_line, options);
    let mut child = command.spawn().map_err(|source| ToolsError::SpawnError {
        program: command_line[0].clone(),
        source,
    })?;

    let stdin_writer = match (child.stdin.take(), options.input.clone()) {
        (Some(mut stdin), Some(input)) => Some(thread::spawn(move || {
            // The child may exit without reading everything.
            let _ = stdin.write_all(&input);
        })),
        _ => None,
    };
    let stdout_reader = child.stdout.take().map(spawn_reader);
    let stderr_reader = child.stderr.take().map(spawn_reader);

    let status = match wait_with_timeout(&mut child, options.timeout)? {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolsError::TimeoutError {
                command: command_line,
                timeout: options.timeout.unwrap_or_default(),
            });
        }
    };

    if let Some(writer) = stdin_writer {
        let _ = writer.join();
    }
    let stdout = stdout_reader.map(join_reader).transpose()?;
    let stderr = stderr_reader.map(join_reader).transpose()?;

    let returncode = exit_code(&status);
    debug!("Subprocess completed. Return code: {}", returncode);

    let completed = CompletedProcess {
        args: command_line,
        returncode,
        stdout,
        stderr,
    };
    if options.check {
        completed.check_returncode()?;
    }
    Ok(completed)
}

fn build_command(args: &[OsString], command_line: &[String], options: &RunOptions) -> Command {
    let mut command = if options.shell {
        let script = command_line.join(" ");
        if cfg!(windows) {
            let mut command = Command::new("cmd");
            command.arg("/C").arg(script);
            command
        } else {
            let mut command = Command::new("sh");
            command.arg("-c").arg(script);
            command
        }
    } else {
        let mut command = Command::new(&args[0]);
        command.args(&args[1..]);
        command
    };

    if let Some(cwd) = &options.cwd {
        command.current_dir(cwd);
    }
    if let Some(env) = &options.env {
        command.env_clear().envs(env);
    }

    command
        .stdin(if options.input.is_some() {
            Stdio::piped()
        } else {
            Stdio::inherit()
        })
        .stdout(options.output_stdio(options.capture_stdout))
        .stderr(options.output_stdio(options.capture_stderr));
    command
}

/// `Ok(None)` means the deadline passed and the child is still running.
pub(crate) fn wait_with_timeout(
    child: &mut Child,
    timeout: Option<Duration>,
) -> Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return Ok(Some(child.wait()?));
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(WAIT_POLL_INTERVAL);
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut stream: R) -> JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        stream.read_to_end(&mut buffer)?;
        Ok(buffer)
    })
}

fn join_reader(handle: JoinHandle<std::io::Result<Vec<u8>>>) -> Result<Vec<u8>> {
    let bytes = handle
        .join()
        .map_err(|_| std::io::Error::other("output reader thread panicked"))??;
    Ok(bytes)
}

pub(crate) fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_run_captures_stdout() {
        let result = run_with(["echo", "hi"], &RunOptions::new().capture_stdout()).unwrap();
        assert_eq!(result.returncode, 0);
        assert_eq!(result.stdout_str().as_deref(), Some("hi\n"));
        assert!(result.stderr.is_none());
        assert_eq!(result.args, vec!["echo".to_string(), "hi".to_string()]);
    }

    #[test]
    fn test_run_without_capture_returns_no_output() {
        let result = run(["true"]).unwrap();
        assert!(result.success());
        assert!(result.stdout.is_none());
    }

    #[test]
    fn test_nonzero_exit_is_error_when_checked() {
        let err = run(["false"]).unwrap_err();
        assert_eq!(err.returncode(), Some(1));

        let result = run_with(["false"], &RunOptions::new().check(false)).unwrap();
        assert_eq!(result.returncode, 1);
        assert!(result.check_returncode().is_err());
    }

    #[test]
    fn test_input_is_fed_to_stdin() {
        let options = RunOptions::new().input("y\n").capture_stdout();
        let result = run_with(["cat"], &options).unwrap();
        assert_eq!(result.stdout.unwrap(), b"y\n".to_vec());
    }

    #[test]
    fn test_shell_and_quiet() {
        let options = RunOptions::new().shell(true).capture_stdout().quiet(true);
        let result = run_with(["echo hi && echo there >&2"], &options).unwrap();
        assert_eq!(result.stdout_str().as_deref(), Some("hi\n"));
        assert!(result.stderr.is_none());
    }

    #[test]
    fn test_timeout_kills_child() {
        let options = RunOptions::new().timeout(Duration::from_millis(200));
        let started = Instant::now();
        let err = run_with(["sleep", "5"], &options).unwrap_err();
        assert!(matches!(err, ToolsError::TimeoutError { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_signal_gives_negative_returncode() {
        let options = RunOptions::new().check(false);
        let result = run_with(["sh", "-c", "kill -TERM $$"], &options).unwrap();
        assert_eq!(result.returncode, -15);
    }

    #[test]
    fn test_env_replaces_child_environment() {
        let mut env = HashMap::new();
        env.insert("GENAI_TOOLS_ONLY".to_string(), "1".to_string());
        std::env::set_var("GENAI_TOOLS_INHERITED", "leaked");

        let options = RunOptions::new().env(env).capture_stdout();
        let result = run_with(
            [
                "/bin/sh",
                "-c",
                "echo \"${GENAI_TOOLS_ONLY}-${GENAI_TOOLS_INHERITED:-unset}\"",
            ],
            &options,
        )
        .unwrap();
        assert_eq!(result.stdout_str().as_deref(), Some("1-unset\n"));

        std::env::remove_var("GENAI_TOOLS_INHERITED");
    }

    #[test]
    fn test_cwd_is_applied() {
        let dir = tempfile::TempDir::new().unwrap();
        let options = RunOptions::new().cwd(dir.path()).capture_stdout();
        let result = run_with(["sh", "-c", "pwd -P"], &options).unwrap();

        let expected = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(
            result.stdout_str().unwrap().trim_end(),
            expected.to_string_lossy()
        );
    }

    #[test]
    fn test_empty_and_missing_programs() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            run(empty).unwrap_err(),
            ToolsError::InvalidCommandError { .. }
        ));
        assert!(matches!(
            run(["definitely-not-a-real-program-xyz"]).unwrap_err(),
            ToolsError::SpawnError { .. }
        ));
    }
}
