use anyhow::{Context, Result};
use clap::Parser;
use genai_tools::config::cli::{AndroidCommand, Command, LoraCommand, RunArgs};
use genai_tools::config::{CliConfig, ToolsConfig};
use genai_tools::lora::{self, load_lora_params_from_flatbuffers, lora_params_from_safetensors};
use genai_tools::utils::error::ToolsError;
use genai_tools::utils::logger;
use genai_tools::utils::platform::Platform;
use genai_tools::utils::run::{run_with, RunOptions};
use genai_tools::utils::validation::Validate;
use genai_tools::{
    check_emulator_running_using_avd_name, check_emulator_running_using_pid,
    create_virtual_device, get_sdk_tool_paths, start_emulator, stop_emulator_by_pid, SdkToolPaths,
};
use std::time::Duration;

fn main() {
    let cli = CliConfig::parse();

    // 載入配置
    let config = match cli.load_tools_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config: {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    // 初始化日誌
    let log_level = config.effective_log_level(cli.verbose);
    if config.json_logs() {
        logger::init_json_logger(log_level);
    } else {
        logger::init_cli_logger(log_level);
    }
    tracing::debug!("CLI config: {:?}", cli);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e);
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    if let Err(e) = dispatch(&cli.command, &config) {
        // 子程序失敗時沿用其結束碼
        let exit_code = e
            .downcast_ref::<ToolsError>()
            .and_then(|tools_error| {
                tracing::error!(
                    "❌ {} (Category: {:?})",
                    tools_error,
                    tools_error.category()
                );
                eprintln!("💡 {}", tools_error.recovery_suggestion());
                tools_error.returncode()
            })
            .filter(|code| *code > 0)
            .unwrap_or(1);
        eprintln!("❌ {:#}", e);
        std::process::exit(exit_code);
    }
}

fn dispatch(command: &Command, config: &ToolsConfig) -> Result<()> {
    match command {
        Command::Platform => {
            println!("{}", Platform::current());
            Ok(())
        }
        Command::Run(args) => run_command(args),
        Command::Lora(lora_command) => run_lora(lora_command, config),
        Command::Android(android_command) => run_android(android_command, config),
    }
}

fn run_command(args: &RunArgs) -> Result<()> {
    let mut options = RunOptions::new().shell(args.shell).check(!args.no_check);
    if let Some(cwd) = &args.cwd {
        options = options.cwd(cwd);
    }
    if let Some(seconds) = args.timeout {
        options = options.timeout(Duration::from_secs(seconds));
    }

    let completed = run_with(&args.command, &options)?;
    tracing::info!("✅ Command finished with return code {}", completed.returncode);
    Ok(())
}

fn run_lora(command: &LoraCommand, config: &ToolsConfig) -> Result<()> {
    match command {
        LoraCommand::Export {
            input,
            output,
            adapter_version,
            model_version,
        } => {
            let params = lora_params_from_safetensors(input)
                .with_context(|| format!("reading {}", input.display()))?;
            lora::save_lora_params_with_versions(
                &params,
                output,
                adapter_version.unwrap_or_else(|| config.adapter_version()),
                model_version.unwrap_or_else(|| config.model_version()),
            )?;
            println!("✅ Wrote {} parameters to {}", params.len(), output.display());
            Ok(())
        }
        LoraCommand::Inspect { file } => {
            let adapter = load_lora_params_from_flatbuffers(file)
                .with_context(|| format!("reading {}", file.display()))?;
            println!(
                "format_version={} adapter_version={} model_version={}",
                adapter.format_version, adapter.adapter_version, adapter.model_version
            );
            for (name, tensor) in &adapter.parameters {
                println!("{}\t{}\t{:?}", name, tensor.data_type(), tensor.dims());
            }
            Ok(())
        }
    }
}

fn sdk_tools(config: &ToolsConfig) -> Result<SdkToolPaths> {
    let sdk_root = config.require_sdk_root()?;
    let tools = get_sdk_tool_paths(&sdk_root)
        .with_context(|| format!("resolving SDK tools under {}", sdk_root))?;
    Ok(tools)
}

fn avd_name<'a>(flag: &'a Option<String>, config: &'a ToolsConfig) -> Result<&'a str> {
    match flag {
        Some(name) => Ok(name.as_str()),
        None => Ok(config.require_avd_name()?),
    }
}

fn run_android(command: &AndroidCommand, config: &ToolsConfig) -> Result<()> {
    match command {
        AndroidCommand::Tools => {
            let tools = sdk_tools(config)?;
            println!("{}", serde_json::to_string_pretty(&tools)?);
            Ok(())
        }
        AndroidCommand::CreateAvd {
            system_image,
            avd_name: avd_flag,
        } => {
            let tools = sdk_tools(config)?;
            let system_image = system_image
                .as_deref()
                .or(config.android.system_image.as_deref())
                .ok_or_else(|| ToolsError::MissingConfigError {
                    field: "android.system_image".to_string(),
                })?;
            create_virtual_device(&tools, system_image, avd_name(avd_flag, config)?)?;
            Ok(())
        }
        AndroidCommand::StartEmulator {
            avd_name: avd_flag,
            detach,
        } => {
            let tools = sdk_tools(config)?;
            let avd = avd_name(avd_flag, config)?;
            let mut emulator = start_emulator(&tools, avd, &config.emulator_options())?;
            println!("✅ Emulator '{}' booted (pid {})", avd, emulator.id());

            if !*detach {
                // 等待模擬器自行結束
                let status = emulator.wait()?;
                tracing::info!("Emulator exited: {}", status);
            } else {
                tracing::debug!("Detached from emulator");
                drop(emulator);
            }
            Ok(())
        }
        AndroidCommand::StopEmulator { pid, timeout } => {
            stop_emulator_by_pid(*pid, Duration::from_secs(*timeout))?;
            Ok(())
        }
        AndroidCommand::Status {
            avd_name: avd_flag,
            pid,
        } => {
            let running = match pid {
                Some(pid) => check_emulator_running_using_pid(*pid),
                None => check_emulator_running_using_avd_name(avd_name(avd_flag, config)?),
            };
            println!("{}", if running { "running" } else { "stopped" });
            Ok(())
        }
    }
}
