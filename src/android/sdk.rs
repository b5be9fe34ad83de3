use crate::utils::error::{Result, ToolsError};
use crate::utils::platform::executable_name;
use serde::Serialize;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Absolute paths of the Android SDK tools used to manage emulators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SdkToolPaths {
    pub emulator: PathBuf,
    pub adb: PathBuf,
    pub sdkmanager: PathBuf,
    pub avdmanager: PathBuf,
}

/// Resolves the SDK tools, preferring copies found on `PATH` over the ones in `sdk_root`.
pub fn get_sdk_tool_paths(sdk_root: impl AsRef<Path>) -> Result<SdkToolPaths> {
    let search_path = std::env::var_os("PATH");
    resolve_sdk_tool_paths(sdk_root, search_path.as_deref())
}

/// Same as [`get_sdk_tool_paths`] with an explicit search path; `None` only looks in `sdk_root`.
pub fn resolve_sdk_tool_paths(
    sdk_root: impl AsRef<Path>,
    search_path: Option<&OsStr>,
) -> Result<SdkToolPaths> {
    let sdk_root = std::path::absolute(sdk_root.as_ref())?;
    let cmdline_tools = sdk_root.join("cmdline-tools").join("latest").join("bin");

    Ok(SdkToolPaths {
        emulator: resolve_tool(
            search_path,
            &[sdk_root.join("emulator")],
            &executable_name("emulator", "exe"),
        )?,
        adb: resolve_tool(
            search_path,
            &[sdk_root.join("platform-tools")],
            &executable_name("adb", "exe"),
        )?,
        sdkmanager: resolve_tool(
            search_path,
            &[cmdline_tools.clone()],
            &executable_name("sdkmanager", "bat"),
        )?,
        avdmanager: resolve_tool(
            search_path,
            &[cmdline_tools],
            &executable_name("avdmanager", "bat"),
        )?,
    })
}

fn resolve_tool(search_path: Option<&OsStr>, dirs: &[PathBuf], basename: &str) -> Result<PathBuf> {
    let on_path = search_path
        .into_iter()
        .flat_map(std::env::split_paths)
        .filter(|dir| !dir.as_os_str().is_empty());

    for dir in on_path.chain(dirs.iter().cloned()) {
        let candidate = dir.join(basename);
        if is_executable(&candidate) {
            let resolved = fs::canonicalize(&candidate)?;
            debug!("Found {} at {}", basename, resolved.display());
            return Ok(resolved);
        }
    }

    Err(ToolsError::ToolNotFoundError {
        name: basename.to_string(),
    })
}

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}
