use crate::android::sdk::SdkToolPaths;
use crate::utils::error::{Result, ToolsError};
use crate::utils::monitor::ProcessMonitor;
use crate::utils::platform::is_linux;
use crate::utils::run::{exit_code, run_with, wait_with_timeout, RunOptions};
use std::ffi::{OsStr, OsString};
use std::process::{Child, Command};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(120);

const STOP_GRACE_PERIOD: Duration = Duration::from_secs(30);
const STOP_POLL_INTERVAL: Duration = Duration::from_secs(5);
const PID_POLL_INTERVAL: Duration = Duration::from_millis(250);
const GETPROP_TIMEOUT: Duration = Duration::from_secs(10);

#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatorOptions {
    pub extra_args: Vec<String>,
    pub memory_mb: u32,
    pub timezone: String,
    /// Overall budget for the emulator to boot.
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for EmulatorOptions {
    fn default() -> Self {
        Self {
            extra_args: Vec::new(),
            memory_mb: 4096,
            timezone: "America/Los_Angeles".to_string(),
            timeout: Duration::from_secs(20 * 60),
            poll_interval: Duration::from_secs(10),
        }
    }
}

/// An emulator to stop: either a process we started or a bare PID.
#[derive(Debug)]
pub enum EmulatorProcess {
    Child(Child),
    Pid(u32),
}

impl From<Child> for EmulatorProcess {
    fn from(child: Child) -> Self {
        EmulatorProcess::Child(child)
    }
}

impl From<u32> for EmulatorProcess {
    fn from(pid: u32) -> Self {
        EmulatorProcess::Pid(pid)
    }
}

fn emulator_error(message: impl Into<String>) -> ToolsError {
    ToolsError::EmulatorError {
        message: message.into(),
    }
}

/// Installs the system image and creates (or overwrites) the AVD.
pub fn create_virtual_device(
    sdk_tool_paths: &SdkToolPaths,
    system_image_package_name: &str,
    avd_name: &str,
) -> Result<()> {
    run_with(
        [
            sdk_tool_paths.sdkmanager.as_os_str(),
            OsStr::new("--install"),
            OsStr::new(system_image_package_name),
        ],
        // accept the license prompt
        &RunOptions::new().input("y"),
    )?;

    run_with(
        [
            sdk_tool_paths.avdmanager.as_os_str(),
            OsStr::new("create"),
            OsStr::new("avd"),
            OsStr::new("--name"),
            OsStr::new(avd_name),
            OsStr::new("--package"),
            OsStr::new(system_image_package_name),
            OsStr::new("--force"),
        ],
        // decline the custom hardware profile prompt
        &RunOptions::new().input("no"),
    )?;

    info!("Created virtual device '{}'", avd_name);
    Ok(())
}

fn start_process(args: &[OsString]) -> Result<Child> {
    debug!("Starting process - args: {:?}", args);

    let mut command = Command::new(&args[0]);
    command.args(&args[1..]);
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        command.creation_flags(CREATE_NEW_PROCESS_GROUP);
    }

    command.spawn().map_err(|source| ToolsError::SpawnError {
        program: args[0].to_string_lossy().into_owned(),
        source,
    })
}

fn stop_process(child: &mut Child) -> Result<()> {
    if child.try_wait()?.is_some() {
        return Ok(());
    }
    debug!("Stopping process - pid: {}", child.id());

    if cfg!(windows) {
        child.kill()?;
    } else if !ProcessMonitor::new().terminate(child.id()) {
        child.kill()?;
    }

    if wait_with_timeout(child, Some(STOP_GRACE_PERIOD))?.is_none() {
        warn!("Timeout expired, forcibly stopping process...");
        child.kill()?;
        child.wait()?;
    }
    Ok(())
}

/// Stops the wrapped process on drop unless it was released.
struct ProcessGuard {
    child: Option<Child>,
}

impl ProcessGuard {
    fn new(child: Child) -> Self {
        Self { child: Some(child) }
    }

    fn poll(&mut self) -> Result<Option<i32>> {
        match self.child.as_mut() {
            Some(child) => Ok(child.try_wait()?.map(|status| exit_code(&status))),
            None => Ok(None),
        }
    }

    fn release(mut self) -> Option<Child> {
        self.child.take()
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = stop_process(&mut child) {
                warn!("Failed to stop process {}: {}", child.id(), e);
            }
        }
    }
}

/// Boots `avd_name` and returns once the device reports `sys.boot_completed`.
/// Waiting for adb and waiting for the boot flag each get `options.timeout`.
/// Any failure on the way stops the emulator again.
pub fn start_emulator(
    sdk_tool_paths: &SdkToolPaths,
    avd_name: &str,
    options: &EmulatorOptions,
) -> Result<Child> {
    if check_emulator_running_using_avd_name(avd_name) {
        return Err(emulator_error(format!(
            "An emulator with avd_name {} is already running.",
            avd_name
        )));
    }

    let mut emulator_args: Vec<OsString> = vec![
        sdk_tool_paths.emulator.clone().into_os_string(),
        "-avd".into(),
        avd_name.into(),
        "-memory".into(),
        options.memory_mb.to_string().into(),
        "-timezone".into(),
        options.timezone.clone().into(),
        "-no-snapstorage".into(),
        "-no-audio".into(),
        "-no-boot-anim".into(),
        "-gpu".into(),
        "guest".into(),
        "-delay-adb".into(),
        "-verbose".into(),
    ];
    // Linux CI machines have no display for the Qt window.
    if is_linux() {
        emulator_args.push("-no-window".into());
    }
    emulator_args.extend(options.extra_args.iter().map(OsString::from));

    let deadline = Instant::now() + options.timeout;
    let mut emulator = ProcessGuard::new(start_process(&emulator_args)?);

    // -delay-adb means adb only answers once the device is usable
    let waiter_args: Vec<OsString> = vec![
        sdk_tool_paths.adb.clone().into_os_string(),
        "wait-for-device".into(),
        "shell".into(),
        "ls /data/local/tmp".into(),
    ];
    let mut waiter = ProcessGuard::new(start_process(&waiter_args)?);

    loop {
        let waiter_ret = waiter.poll()?;
        let emulator_ret = emulator.poll()?;

        if let Some(code) = emulator_ret {
            return Err(emulator_error(format!(
                "Emulator exited early with return code: {}",
                code
            )));
        }
        if let Some(code) = waiter_ret {
            if code == 0 {
                debug!("adb wait-for-device process has completed.");
                break;
            }
            return Err(emulator_error(format!(
                "Waiter process exited with return code: {}",
                code
            )));
        }
        if Instant::now() > deadline {
            return Err(emulator_error("Emulator startup timeout"));
        }
        thread::sleep(options.poll_interval);
    }
    drop(waiter);

    // -delay-adb alone is not always enough; wait for the boot flag too,
    // with a full timeout window of its own.
    let deadline = Instant::now() + options.timeout;
    loop {
        let getprop = run_with(
            [
                sdk_tool_paths.adb.as_os_str(),
                OsStr::new("shell"),
                OsStr::new("getprop"),
                OsStr::new("sys.boot_completed"),
            ],
            &RunOptions::new().capture_stdout().timeout(GETPROP_TIMEOUT),
        )?;
        let value = getprop.stdout_str().unwrap_or_default();
        if value.trim() == "1" {
            break;
        }
        if Instant::now() > deadline {
            return Err(emulator_error(
                "Emulator startup timeout. sys.boot_completed was not set.",
            ));
        }
        debug!(
            "sys.boot_completed='{}'. Sleeping for {:?} before retrying.",
            value.trim(),
            options.poll_interval
        );
        thread::sleep(options.poll_interval);
    }

    if !check_emulator_running_using_avd_name(avd_name) {
        return Err(emulator_error("Emulator failed to start."));
    }

    let child = emulator
        .release()
        .ok_or_else(|| emulator_error("Emulator process handle was lost"))?;
    info!("Emulator '{}' is running with PID {}", avd_name, child.id());
    Ok(child)
}

/// True when some process was started with `-avd <avd_name>`.
pub fn check_emulator_running_using_avd_name(avd_name: &str) -> bool {
    let pids = ProcessMonitor::new().find_by_arguments(&["-avd", avd_name]);
    if pids.is_empty() {
        debug!("No emulator found with AVD name: {}", avd_name);
        false
    } else {
        debug!("Found emulator with AVD name: {} (pids {:?})", avd_name, pids);
        true
    }
}

pub fn check_emulator_running_using_process(emulator_proc: &mut Child) -> bool {
    match emulator_proc.try_wait() {
        Ok(None) => true,
        Ok(Some(_)) => false,
        Err(e) => {
            warn!("Error checking emulator status: {}", e);
            false
        }
    }
}

pub fn check_emulator_running_using_pid(emulator_pid: u32) -> bool {
    ProcessMonitor::new().is_running(emulator_pid)
}

pub fn stop_emulator_by_proc(emulator_proc: &mut Child, timeout: Duration) -> Result<()> {
    if !check_emulator_running_using_process(emulator_proc) {
        warn!("The specified emulator process is not running.");
        return Ok(());
    }

    debug!("Stopping emulator process");
    stop_process(emulator_proc)?;

    let deadline = Instant::now() + timeout;
    while check_emulator_running_using_process(emulator_proc) {
        let now = Instant::now();
        if now > deadline {
            return Err(emulator_error(format!(
                "Emulator process did not stop within {:?}",
                timeout
            )));
        }
        thread::sleep(STOP_POLL_INTERVAL.min(deadline - now));
    }

    info!("Emulator stopped successfully.");
    Ok(())
}

pub fn stop_emulator_by_pid(emulator_pid: u32, timeout: Duration) -> Result<()> {
    let mut monitor = ProcessMonitor::new();
    if !monitor.is_running(emulator_pid) {
        warn!("No emulator process exists with pid={}", emulator_pid);
        return Ok(());
    }

    debug!("Stopping emulator process - pid={}", emulator_pid);
    let deadline = Instant::now() + timeout;
    monitor.terminate(emulator_pid);

    if !monitor.wait_for_exit(emulator_pid, STOP_GRACE_PERIOD.min(timeout), PID_POLL_INTERVAL) {
        warn!(
            "Process {} did not terminate within {:?}. Killing.",
            emulator_pid,
            STOP_GRACE_PERIOD.min(timeout)
        );
        monitor.kill(emulator_pid);

        let remaining = deadline.saturating_duration_since(Instant::now());
        if !monitor.wait_for_exit(emulator_pid, remaining, PID_POLL_INTERVAL) {
            return Err(emulator_error(format!(
                "Process {} still exists. State: {}",
                emulator_pid,
                monitor
                    .status(emulator_pid)
                    .unwrap_or_else(|| "unknown".to_string())
            )));
        }
    }

    info!("Emulator stopped successfully.");
    Ok(())
}

pub fn stop_emulator(emulator: impl Into<EmulatorProcess>, timeout: Duration) -> Result<()> {
    match emulator.into() {
        EmulatorProcess::Child(mut child) => stop_emulator_by_proc(&mut child, timeout),
        EmulatorProcess::Pid(pid) => stop_emulator_by_pid(pid, timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = EmulatorOptions::default();
        assert_eq!(options.memory_mb, 4096);
        assert_eq!(options.timeout, Duration::from_secs(1200));
        assert_eq!(options.poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_unknown_avd_is_not_running() {
        assert!(!check_emulator_running_using_avd_name(
            "genai-tools-no-such-avd-3f9c"
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_child_process() {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id();
        assert!(check_emulator_running_using_pid(pid));

        stop_emulator(child, Duration::from_secs(10)).unwrap();
        assert!(!check_emulator_running_using_pid(pid));
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_by_pid() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id();

        stop_emulator(pid, Duration::from_secs(10)).unwrap();
        let status = child.wait().unwrap();
        assert!(!status.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_stopping_exited_process_is_noop() {
        let mut child = Command::new("true").spawn().unwrap();
        child.wait().unwrap();
        assert!(stop_emulator_by_proc(&mut child, Duration::from_secs(1)).is_ok());
    }
}
