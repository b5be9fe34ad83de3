#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

pub use toml_config::{ToolsConfig, DEFAULT_CONFIG_FILE};

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "genai-tools")]
#[command(about = "Build and test tooling: subprocesses, LoRA adapters, Android emulators")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    /// Android SDK root, overrides the config file and ANDROID_HOME
    #[arg(long)]
    pub sdk_root: Option<String>,

    #[command(subcommand)]
    pub command: cli::Command,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Loads the TOML config named on the command line, or `genai-tools.toml`
    /// when it exists, then applies command-line overrides.
    pub fn load_tools_config(&self) -> crate::utils::error::Result<ToolsConfig> {
        let mut config = match &self.config {
            Some(path) => ToolsConfig::from_file(path)?,
            None if std::path::Path::new(DEFAULT_CONFIG_FILE).exists() => {
                ToolsConfig::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => ToolsConfig::default(),
        };

        if let Some(sdk_root) = &self.sdk_root {
            config.android.sdk_root = Some(sdk_root.clone());
        }
        if self.json_logs {
            config.logging.json = Some(true);
        }
        Ok(config)
    }
}
