use std::fmt;

pub fn is_windows() -> bool {
    cfg!(target_os = "windows")
}

pub fn is_mac() -> bool {
    cfg!(target_os = "macos")
}

pub fn is_linux() -> bool {
    cfg!(target_os = "linux")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Mac,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if is_linux() {
            Platform::Linux
        } else if is_mac() {
            Platform::Mac
        } else if is_windows() {
            Platform::Windows
        } else {
            Platform::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Mac => "mac",
            Platform::Windows => "windows",
            Platform::Other => std::env::consts::OS,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `adb` -> `adb.exe` on Windows, unchanged elsewhere.
pub fn executable_name(name: &str, windows_extension: &str) -> String {
    if is_windows() {
        format!("{}.{}", name, windows_extension)
    } else {
        name.to_string()
    }
}
