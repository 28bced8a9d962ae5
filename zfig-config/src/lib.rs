pub mod sidecar;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub use sidecar::{FigureConfig, MaxDistOverride, Segment, SidecarStore, UnitSelection};

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub import: ImportSettings,
}

impl AppSettings {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings
            .import
            .validate()
            .map_err(|message| ConfigError::Invalid {
                path: path.to_path_buf(),
                message,
            })?;
        Ok(settings)
    }

    /// 自动发现配置文件：优先读取环境变量 `ZFIG_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("ZFIG_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 导入流程的全局参数：新图纸的默认精度、伴随文件后缀与路径优化轮数。
#[derive(Debug, Clone, Deserialize)]
pub struct ImportSettings {
    #[serde(default = "ImportSettings::default_accuracy")]
    pub default_accuracy: f64,
    #[serde(default = "ImportSettings::default_sidecar_extension")]
    pub sidecar_extension: String,
    #[serde(default = "ImportSettings::default_optimization_rounds")]
    pub optimization_rounds: usize,
}

impl ImportSettings {
    fn default_accuracy() -> f64 {
        0.5
    }

    fn default_sidecar_extension() -> String {
        "figure.json".to_string()
    }

    fn default_optimization_rounds() -> usize {
        10
    }

    /// 新图纸的默认精度必须为有限正数。
    pub fn validate(&self) -> Result<(), String> {
        if !(self.default_accuracy.is_finite() && self.default_accuracy > 0.0) {
            return Err(format!(
                "default_accuracy 必须为正数，实际为 {}",
                self.default_accuracy
            ));
        }
        Ok(())
    }
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            default_accuracy: Self::default_accuracy(),
            sidecar_extension: Self::default_sidecar_extension(),
            optimization_rounds: Self::default_optimization_rounds(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("配置文件 {path:?} 内容无效: {message}")]
    Invalid { path: PathBuf, message: String },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
    #[error("读取伴随配置 {path:?} 失败: {source}")]
    SidecarRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析伴随配置 {path:?} 失败: {source}")]
    SidecarParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("伴随配置 {path:?} 内容无效: {message}")]
    SidecarInvalid { path: PathBuf, message: String },
    #[error("序列化伴随配置失败: {source}")]
    SidecarEncode {
        #[source]
        source: serde_json::Error,
    },
    #[error("写入伴随配置 {path:?} 失败: {source}")]
    SidecarWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_returned_when_file_missing() {
        let cfg = AppSettings::discover().expect("discover should succeed");
        assert_eq!(cfg.logging.level, "info");
        assert!((cfg.import.default_accuracy - 0.5).abs() < f64::EPSILON);
        assert_eq!(cfg.import.sidecar_extension, "figure.json");
        assert_eq!(cfg.import.optimization_rounds, 10);
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [import]
            default_accuracy = 0.1
            sidecar_extension = "laser.json"
            "#
        )
        .unwrap();

        let cfg = AppSettings::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert!((cfg.import.default_accuracy - 0.1).abs() < f64::EPSILON);
        assert_eq!(cfg.import.sidecar_extension, "laser.json");
        assert_eq!(cfg.import.optimization_rounds, 10);
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[import\ndefault_accuracy = ").unwrap();
        let err = AppSettings::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn non_positive_default_accuracy_is_rejected_at_load() {
        for value in ["0", "-0.5", "nan"] {
            let mut file = tempfile::NamedTempFile::new().expect("create temp file");
            writeln!(file, "[import]\ndefault_accuracy = {value}").unwrap();
            let err = AppSettings::from_file(file.path()).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { .. }), "{value}");
        }
        assert!(ImportSettings::default().validate().is_ok());
    }
}
