use crate::adapters::registry::ModuleRegistry;
use crate::core::codec::CodecSettings;
use crate::utils::error::{CallableError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const LOG_FORMATS: [&str; 2] = ["compact", "json"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodecConfig {
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub codec: CodecSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    #[serde(default)]
    pub search_paths: Vec<String>,
    pub include_stdlib: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodecSection {
    pub max_steps: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub verbose: Option<bool>,
    pub format: Option<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            include_stdlib: Some(true),
        }
    }
}

impl CodecConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(CallableError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content);
        Ok(toml::from_str(&processed_content)?)
    }

    /// 替換環境變數 (例如 ${SCRIPT_ROOT})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        let re = Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid");
        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.loader.search_paths.iter().map(PathBuf::from).collect()
    }

    pub fn include_stdlib(&self) -> bool {
        self.loader.include_stdlib.unwrap_or(true)
    }

    pub fn max_steps(&self) -> Option<u64> {
        self.codec.max_steps
    }

    pub fn verbose(&self) -> bool {
        self.logging.verbose.unwrap_or(false)
    }

    pub fn json_logs(&self) -> bool {
        self.logging.format.as_deref() == Some("json")
    }

    pub fn codec_settings(&self) -> CodecSettings {
        CodecSettings {
            max_steps: self.codec.max_steps,
        }
    }

    /// 依照 [loader] 設定建立模組註冊表
    pub fn build_registry(&self) -> ModuleRegistry {
        let registry = if self.include_stdlib() {
            ModuleRegistry::with_stdlib()
        } else {
            ModuleRegistry::new()
        };
        registry
            .with_search_paths(self.search_paths())
            .with_max_steps(self.max_steps())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        for path in &self.loader.search_paths {
            validation::validate_path("loader.search_paths", path)?;
        }

        if let Some(max_steps) = self.codec.max_steps {
            validation::validate_positive_number("codec.max_steps", max_steps, 1)?;
        }

        if let Some(format) = &self.logging.format {
            validation::validate_one_of("logging.format", format, &LOG_FORMATS)?;
        }

        Ok(())
    }
}

impl Validate for CodecConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
