use genai_tools::utils::error::Result as ToolsResult;
use genai_tools::utils::{logger, platform};
use std::sync::Arc;

#[test]
fn test_platform_predicates_are_reexported() {
    let linux: fn() -> bool = genai_tools::is_linux;
    let mac: fn() -> bool = genai_tools::is_mac;
    let windows: fn() -> bool = genai_tools::is_windows;

    assert_eq!(linux(), platform::is_linux());
    assert_eq!(mac(), platform::is_mac());
    assert_eq!(windows(), platform::is_windows());
    assert_eq!(genai_tools::is_linux(), cfg!(target_os = "linux"));
}

#[test]
fn test_root_logger_is_the_shared_logger() {
    let from_root = genai_tools::get_logger("facade");
    let from_module = logger::get_logger("facade");
    assert!(Arc::ptr_eq(&from_root, &from_module));
}

#[cfg(unix)]
#[test]
fn test_root_run_matches_module_run() {
    let from_root = genai_tools::run(["echo", "hi"]).unwrap();
    let from_module = genai_tools::utils::run::run(["echo", "hi"]).unwrap();

    assert_eq!(from_root, from_module);
    assert_eq!(from_root.returncode, 0);
    assert_eq!(from_root.args, vec!["echo".to_string(), "hi".to_string()]);
}

#[test]
fn test_lora_writer_is_reexported() {
    use genai_tools::lora::{LoraParams, LoraTensor};

    let dir = tempfile::TempDir::new().unwrap();
    let mut params = LoraParams::new();
    params.insert(
        "w".to_string(),
        LoraTensor::from_f32(vec![1], &[1.0]).unwrap(),
    );

    let root_path = dir.path().join("root.fb");
    let module_path = dir.path().join("module.fb");
    genai_tools::save_lora_params_to_flatbuffers(&params, &root_path).unwrap();
    genai_tools::lora::save_lora_params_to_flatbuffers(&params, &module_path).unwrap();

    assert_eq!(
        std::fs::read(root_path).unwrap(),
        std::fs::read(module_path).unwrap()
    );
}

#[test]
fn test_android_surface_is_reachable_from_root() {
    use std::time::Duration;

    let _: fn(&str) -> bool = genai_tools::check_emulator_running_using_avd_name;
    let _: fn(u32) -> bool = genai_tools::check_emulator_running_using_pid;
    let _: fn(&mut std::process::Child) -> bool =
        genai_tools::check_emulator_running_using_process;
    let _: fn(&genai_tools::SdkToolPaths, &str, &str) -> ToolsResult<()> =
        genai_tools::create_virtual_device;
    let _: fn(
        &genai_tools::SdkToolPaths,
        &str,
        &genai_tools::EmulatorOptions,
    ) -> ToolsResult<std::process::Child> = genai_tools::start_emulator;
    let _: fn(&mut std::process::Child, Duration) -> ToolsResult<()> =
        genai_tools::stop_emulator_by_proc;
    let _: fn(u32, Duration) -> ToolsResult<()> = genai_tools::stop_emulator_by_pid;
    let _: fn(genai_tools::EmulatorProcess, Duration) -> ToolsResult<()> =
        genai_tools::stop_emulator;
    let _: fn(std::path::PathBuf) -> ToolsResult<genai_tools::SdkToolPaths> =
        genai_tools::get_sdk_tool_paths;

    assert_eq!(genai_tools::DEFAULT_STOP_TIMEOUT, Duration::from_secs(120));
    assert_eq!(
        genai_tools::EmulatorOptions::default(),
        genai_tools::android::EmulatorOptions::default()
    );
}

/// Names a root glob import must not provide. If the crate root ever
/// re-exported one of them, naming it below would be ambiguous and this
/// file would stop compiling.
mod closed_root_surface {
    mod local {
        pub struct ToolsError;
        pub struct Result;
        pub struct Logger;
        pub struct RunOptions;
        pub struct CompletedProcess;
        pub struct LoraParams;
        pub struct LoraTensor;
        pub struct ToolsConfig;
        pub struct Platform;
        pub struct ProcessMonitor;
    }

    use genai_tools::*;
    use local::*;

    #[test]
    fn test_root_adds_no_names_beyond_collaborators() {
        let _: ToolsError = ToolsError;
        let _: Result = Result;
        let _: Logger = Logger;
        let _: RunOptions = RunOptions;
        let _: CompletedProcess = CompletedProcess;
        let _: LoraParams = LoraParams;
        let _: LoraTensor = LoraTensor;
        let _: ToolsConfig = ToolsConfig;
        let _: Platform = Platform;
        let _: ProcessMonitor = ProcessMonitor;

        // the five collaborator names and the Android list stay reachable
        let _: fn() -> bool = is_linux;
        let _ = get_logger("closed-surface");
        let _ = EmulatorOptions::default();
        let _ = DEFAULT_STOP_TIMEOUT;
    }
}
