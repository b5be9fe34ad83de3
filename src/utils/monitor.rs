use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, Signal, System};

/// Snapshot-based view of the OS process table.
pub struct ProcessMonitor {
    system: System,
}

impl ProcessMonitor {
    pub fn new() -> Self {
        let mut monitor = Self {
            system: System::new(),
        };
        monitor.refresh();
        monitor
    }

    pub fn refresh(&mut self) {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::everything(),
        );
    }

    pub fn pid_exists(&self, pid: u32) -> bool {
        self.system.process(Pid::from_u32(pid)).is_some()
    }

    /// Exists and has not exited (zombies and dead entries count as stopped).
    pub fn is_running(&self, pid: u32) -> bool {
        match self.system.process(Pid::from_u32(pid)) {
            Some(process) => !matches!(
                process.status(),
                ProcessStatus::Zombie | ProcessStatus::Dead
            ),
            None => false,
        }
    }

    pub fn status(&self, pid: u32) -> Option<String> {
        self.system
            .process(Pid::from_u32(pid))
            .map(|process| process.status().to_string())
    }

    pub fn command_line(&self, pid: u32) -> Option<String> {
        self.system
            .process(Pid::from_u32(pid))
            .map(|process| join_cmd(process.cmd()))
    }

    /// PIDs of live processes whose argument list contains `args` as a consecutive run.
    pub fn find_by_arguments(&self, args: &[&str]) -> Vec<u32> {
        let mut pids: Vec<u32> = self
            .system
            .processes()
            .iter()
            .filter(|(_, process)| {
                !matches!(
                    process.status(),
                    ProcessStatus::Zombie | ProcessStatus::Dead
                )
            })
            .filter(|(_, process)| contains_run(process.cmd(), args))
            .map(|(pid, _)| pid.as_u32())
            .collect();
        pids.sort_unstable();
        pids
    }

    /// Polite stop: SIGTERM where supported, otherwise a hard kill.
    pub fn terminate(&self, pid: u32) -> bool {
        match self.system.process(Pid::from_u32(pid)) {
            Some(process) => process
                .kill_with(Signal::Term)
                .unwrap_or_else(|| process.kill()),
            None => false,
        }
    }

    pub fn kill(&self, pid: u32) -> bool {
        self.system
            .process(Pid::from_u32(pid))
            .map(|process| process.kill())
            .unwrap_or(false)
    }

    /// Polls until `pid` stops running or `timeout` passes. Returns whether it stopped.
    pub fn wait_for_exit(&mut self, pid: u32, timeout: Duration, interval: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            self.refresh();
            if !self.is_running(pid) {
                return true;
            }
            if std::time::Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(interval);
        }
    }
}

impl Default for ProcessMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn contains_run(cmd: &[std::ffi::OsString], args: &[&str]) -> bool {
    if args.is_empty() || cmd.len() < args.len() {
        return false;
    }
    cmd.windows(args.len()).any(|window| {
        window
            .iter()
            .zip(args)
            .all(|(part, arg)| part.as_os_str() == std::ffi::OsStr::new(arg))
    })
}

fn join_cmd(cmd: &[std::ffi::OsString]) -> String {
    cmd.iter()
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}
