use crate::android::EmulatorOptions;
use crate::lora::{DEFAULT_ADAPTER_VERSION, DEFAULT_MODEL_VERSION};
use crate::utils::error::{Result, ToolsError};
use crate::utils::logger::parse_level;
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_CONFIG_FILE: &str = "genai-tools.toml";

/// 所有區段皆可省略，缺少時使用預設值
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub android: AndroidConfig,
    #[serde(default)]
    pub lora: LoraConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub json: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AndroidConfig {
    pub sdk_root: Option<String>,
    pub avd_name: Option<String>,
    pub system_image: Option<String>,
    pub emulator_timeout_minutes: Option<u64>,
    pub poll_interval_seconds: Option<u64>,
    pub memory_mb: Option<u32>,
    pub timezone: Option<String>,
    pub extra_args: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoraConfig {
    pub adapter_version: Option<i32>,
    pub model_version: Option<i32>,
}

impl ToolsConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ToolsError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ToolsError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${ANDROID_HOME})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ToolsError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        if let Some(level) = &self.logging.level {
            if parse_level(level).is_none() {
                return Err(ToolsError::InvalidConfigValueError {
                    field: "logging.level".to_string(),
                    value: level.clone(),
                    reason: "Expected one of trace, debug, info, warning, error".to_string(),
                });
            }
        }

        if let Some(sdk_root) = &self.android.sdk_root {
            validation::validate_path("android.sdk_root", sdk_root)?;
        }
        if let Some(avd_name) = &self.android.avd_name {
            validation::validate_avd_name("android.avd_name", avd_name)?;
        }
        if let Some(system_image) = &self.android.system_image {
            validation::validate_non_empty_string("android.system_image", system_image)?;
        }
        if let Some(minutes) = self.android.emulator_timeout_minutes {
            validation::validate_positive_number("android.emulator_timeout_minutes", minutes, 1)?;
        }
        if let Some(seconds) = self.android.poll_interval_seconds {
            validation::validate_positive_number("android.poll_interval_seconds", seconds, 1)?;
        }
        if let Some(memory_mb) = self.android.memory_mb {
            validation::validate_range("android.memory_mb", memory_mb, 512, 65536)?;
        }

        if let Some(version) = self.lora.adapter_version {
            validation::validate_range("lora.adapter_version", version, 0, i32::MAX)?;
        }
        if let Some(version) = self.lora.model_version {
            validation::validate_range("lora.model_version", version, 0, i32::MAX)?;
        }

        Ok(())
    }

    /// 取得日誌等級，預設 INFO
    pub fn log_level(&self) -> Level {
        self.logging
            .level
            .as_deref()
            .and_then(parse_level)
            .unwrap_or(Level::INFO)
    }

    /// `--verbose` 至少開到 DEBUG，設定為 TRACE 時保留 TRACE
    pub fn effective_log_level(&self, verbose: bool) -> Level {
        let level = self.log_level();
        if verbose && level < Level::DEBUG {
            Level::DEBUG
        } else {
            level
        }
    }

    pub fn json_logs(&self) -> bool {
        self.logging.json.unwrap_or(false)
    }

    /// 取得 SDK 路徑，未設定時讀取 ANDROID_HOME / ANDROID_SDK_ROOT
    pub fn sdk_root(&self) -> Option<String> {
        self.android
            .sdk_root
            .clone()
            .or_else(|| std::env::var("ANDROID_HOME").ok())
            .or_else(|| std::env::var("ANDROID_SDK_ROOT").ok())
    }

    pub fn require_sdk_root(&self) -> Result<String> {
        let sdk_root = self.sdk_root();
        validation::validate_required_field("android.sdk_root", &sdk_root).cloned()
    }

    pub fn require_avd_name(&self) -> Result<&str> {
        validation::validate_required_field("android.avd_name", &self.android.avd_name)
            .map(String::as_str)
    }

    pub fn emulator_options(&self) -> EmulatorOptions {
        let defaults = EmulatorOptions::default();
        EmulatorOptions {
            extra_args: self.android.extra_args.clone().unwrap_or_default(),
            memory_mb: self.android.memory_mb.unwrap_or(defaults.memory_mb),
            timezone: self.android.timezone.clone().unwrap_or(defaults.timezone),
            timeout: self
                .android
                .emulator_timeout_minutes
                .map(|minutes| Duration::from_secs(minutes * 60))
                .unwrap_or(defaults.timeout),
            poll_interval: self
                .android
                .poll_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
        }
    }

    pub fn adapter_version(&self) -> i32 {
        self.lora.adapter_version.unwrap_or(DEFAULT_ADAPTER_VERSION)
    }

    pub fn model_version(&self) -> i32 {
        self.lora.model_version.unwrap_or(DEFAULT_MODEL_VERSION)
    }
}

impl Validate for ToolsConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[logging]
level = "debug"
json = true

[android]
sdk_root = "/opt/android-sdk"
avd_name = "ort_android"
system_image = "system-images;android-31;default;x86_64"
emulator_timeout_minutes = 5
poll_interval_seconds = 2
extra_args = ["-partition-size", "2047"]

[lora]
adapter_version = 3
"#;

        let config = ToolsConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.log_level(), Level::DEBUG);
        assert!(config.json_logs());
        assert_eq!(config.sdk_root().as_deref(), Some("/opt/android-sdk"));
        assert_eq!(config.require_avd_name().unwrap(), "ort_android");
        assert_eq!(config.adapter_version(), 3);
        assert_eq!(config.model_version(), DEFAULT_MODEL_VERSION);

        let options = config.emulator_options();
        assert_eq!(options.timeout, Duration::from_secs(300));
        assert_eq!(options.poll_interval, Duration::from_secs(2));
        assert_eq!(options.memory_mb, 4096);
        assert_eq!(options.extra_args, vec!["-partition-size", "2047"]);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ToolsConfig::from_toml_str("").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.log_level(), Level::INFO);
        assert!(!config.json_logs());
        assert!(config.require_avd_name().is_err());
        assert_eq!(config.emulator_options().timeout, Duration::from_secs(1200));
    }

    #[test]
    fn test_effective_log_level() {
        let quiet = ToolsConfig::from_toml_str("[logging]\nlevel = \"error\"\n").unwrap();
        assert_eq!(quiet.effective_log_level(false), Level::ERROR);
        assert_eq!(quiet.effective_log_level(true), Level::DEBUG);

        let warning = ToolsConfig::from_toml_str("[logging]\nlevel = \"warning\"\n").unwrap();
        assert_eq!(warning.effective_log_level(false), Level::WARN);

        let trace = ToolsConfig::from_toml_str("[logging]\nlevel = \"trace\"\n").unwrap();
        assert_eq!(trace.effective_log_level(true), Level::TRACE);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("GENAI_TOOLS_TEST_SDK", "/tmp/test-sdk");

        let toml_content = r#"
[android]
sdk_root = "${GENAI_TOOLS_TEST_SDK}"
system_image = "${GENAI_TOOLS_TEST_UNSET_VAR}"
"#;

        let config = ToolsConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.android.sdk_root.as_deref(), Some("/tmp/test-sdk"));
        assert_eq!(
            config.android.system_image.as_deref(),
            Some("${GENAI_TOOLS_TEST_UNSET_VAR}")
        );

        std::env::remove_var("GENAI_TOOLS_TEST_SDK");
    }

    #[test]
    fn test_config_validation() {
        let bad_level = ToolsConfig::from_toml_str("[logging]\nlevel = \"loud\"\n").unwrap();
        assert!(bad_level.validate().is_err());

        let bad_timeout =
            ToolsConfig::from_toml_str("[android]\nemulator_timeout_minutes = 0\n").unwrap();
        assert!(bad_timeout.validate().is_err());

        let bad_avd = ToolsConfig::from_toml_str("[android]\navd_name = \"my avd\"\n").unwrap();
        assert!(bad_avd.validate().is_err());

        assert!(ToolsConfig::from_toml_str("[android\n").is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[android]\navd_name = \"from_file\"\n")
            .unwrap();

        let config = ToolsConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.require_avd_name().unwrap(), "from_file");
    }
}
