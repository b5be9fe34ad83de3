//! Android SDK helpers: tool discovery, AVD creation and emulator lifecycle.
//!
//! Everything public here is re-exported from the crate root, so the list
//! below is the module's whole surface.

mod emulator;
mod sdk;

pub use emulator::{
    check_emulator_running_using_avd_name, check_emulator_running_using_pid,
    check_emulator_running_using_process, create_virtual_device, start_emulator, stop_emulator,
    stop_emulator_by_pid, stop_emulator_by_proc, EmulatorOptions, EmulatorProcess,
    DEFAULT_STOP_TIMEOUT,
};
pub use sdk::{get_sdk_tool_paths, resolve_sdk_tool_paths, SdkToolPaths};
