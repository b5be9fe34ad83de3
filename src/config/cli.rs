use crate::android::DEFAULT_STOP_TIMEOUT;
use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the detected host platform
    Platform,

    /// Run a command through the subprocess helper
    Run(RunArgs),

    /// LoRA adapter files
    #[command(subcommand)]
    Lora(LoraCommand),

    /// Android SDK and emulator helpers
    #[command(subcommand)]
    Android(AndroidCommand),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Run through the system shell
    #[arg(long)]
    pub shell: bool,

    /// Kill the command after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Do not fail on a non-zero exit status
    #[arg(long)]
    pub no_check: bool,

    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum LoraCommand {
    /// Convert a .safetensors adapter into a LoRA flatbuffers file
    Export {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        adapter_version: Option<i32>,
        #[arg(long)]
        model_version: Option<i32>,
    },

    /// List the parameters stored in a LoRA flatbuffers file
    Inspect { file: PathBuf },
}

#[derive(Debug, Clone, Subcommand)]
pub enum AndroidCommand {
    /// Show where the SDK tools were found
    Tools,

    /// Install a system image and create an AVD
    CreateAvd {
        #[arg(long)]
        system_image: Option<String>,
        #[arg(long)]
        avd_name: Option<String>,
    },

    /// Boot an emulator and wait until it is ready
    StartEmulator {
        #[arg(long)]
        avd_name: Option<String>,
        /// Leave the emulator running after the command exits
        #[arg(long)]
        detach: bool,
    },

    /// Stop a running emulator by PID
    StopEmulator {
        #[arg(long)]
        pid: u32,
        #[arg(long, default_value_t = DEFAULT_STOP_TIMEOUT.as_secs())]
        timeout: u64,
    },

    /// Report whether an emulator is running
    Status {
        #[arg(long)]
        avd_name: Option<String>,
        #[arg(long)]
        pid: Option<u32>,
    },
}
