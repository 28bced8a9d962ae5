//! 每张图纸一份的伴随配置：全局精度、单位、图形元信息以及逐段的用户设置。

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zfig_core::geometry::{CircularDescriptor, Point2};

use crate::ConfigError;

/// 图纸单位选择。`FromFile` 表示沿用 DXF 头部声明的单位。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitSelection {
    #[default]
    FromFile,
    Millimeter,
    Centimeter,
    Inch,
}

impl UnitSelection {
    /// 显式单位对应的毫米数，`FromFile` 返回 `None`。
    pub fn millimeters(self) -> Option<f64> {
        match self {
            Self::FromFile => None,
            Self::Millimeter => Some(1.0),
            Self::Centimeter => Some(10.0),
            Self::Inch => Some(25.4),
        }
    }
}

impl FromStr for UnitSelection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" | "from_file" => Ok(Self::FromFile),
            "mm" | "millimeter" => Ok(Self::Millimeter),
            "cm" | "centimeter" => Ok(Self::Centimeter),
            "in" | "inch" => Ok(Self::Inch),
            other => Err(format!("未知单位 {other}（可选 file/mm/cm/inch）")),
        }
    }
}

impl fmt::Display for UnitSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FromFile => f.write_str("file"),
            Self::Millimeter => f.write_str("mm"),
            Self::Centimeter => f.write_str("cm"),
            Self::Inch => f.write_str("inch"),
        }
    }
}

/// 逐段点间距覆盖：继承全局值、显式禁用或指定上限。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxDistOverride {
    #[default]
    Inherit,
    Disabled,
    Limit(f64),
}

impl MaxDistOverride {
    /// 结合全局默认值得到有效的点间距上限，`None` 表示不限制。
    pub fn resolve(self, global: Option<f64>) -> Option<f64> {
        match self {
            Self::Inherit => global,
            Self::Disabled => None,
            Self::Limit(limit) => Some(limit),
        }
    }
}

/// 持久化的路径段。几何字段在每次对账后根据绑定的路径刷新，其余字段由用户设置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub path_index: usize,
    #[serde(default)]
    pub curved: bool,
    #[serde(default)]
    pub is_circle: bool,
    #[serde(default)]
    pub circular: Option<CircularDescriptor>,
    pub start: Point2,
    pub end: Point2,
    #[serde(default)]
    pub reverse: bool,
    /// 圆的起始角，单位为度。
    #[serde(default)]
    pub start_angle: f64,
    #[serde(default)]
    pub accuracy_override: Option<f64>,
    #[serde(default)]
    pub max_dist_override: MaxDistOverride,
}

impl Segment {
    pub fn new(path_index: usize, start: Point2, end: Point2) -> Self {
        Self {
            path_index,
            curved: false,
            is_circle: false,
            circular: None,
            start,
            end,
            reverse: false,
            start_angle: 0.0,
            accuracy_override: None,
            max_dist_override: MaxDistOverride::Inherit,
        }
    }
}

/// 伴随配置根结构。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureConfig {
    pub accuracy: f64,
    #[serde(default)]
    pub max_dist: Option<f64>,
    #[serde(default)]
    pub unit: UnitSelection,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl FigureConfig {
    pub fn with_defaults(name: impl Into<String>, accuracy: f64) -> Self {
        Self {
            accuracy,
            max_dist: None,
            unit: UnitSelection::FromFile,
            name: name.into(),
            id: String::new(),
            description: String::new(),
            segments: Vec::new(),
        }
    }

    /// 全局点间距上限，非正值视为不限制。
    pub fn global_max_dist(&self) -> Option<f64> {
        self.max_dist.filter(|value| *value > 0.0)
    }

    fn validate(&self) -> Result<(), String> {
        if !(self.accuracy.is_finite() && self.accuracy > 0.0) {
            return Err(format!("精度必须为正数，实际为 {}", self.accuracy));
        }
        if let Some(max_dist) = self.max_dist {
            if !max_dist.is_finite() {
                return Err(format!("点间距必须为有限值，实际为 {max_dist}"));
            }
        }
        for (position, segment) in self.segments.iter().enumerate() {
            if let Some(accuracy) = segment.accuracy_override {
                if !(accuracy.is_finite() && accuracy > 0.0) {
                    return Err(format!("第 {position} 段的精度覆盖无效：{accuracy}"));
                }
            }
            if let MaxDistOverride::Limit(limit) = segment.max_dist_override {
                if !(limit.is_finite() && limit > 0.0) {
                    return Err(format!("第 {position} 段的点间距覆盖无效：{limit}"));
                }
            }
        }
        Ok(())
    }
}

/// 由图纸文件名得到默认图形名称。
pub fn default_name(drawing: &Path) -> String {
    drawing
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// 伴随配置的读写：与图纸同目录、同主文件名、固定后缀。
#[derive(Debug, Clone)]
pub struct SidecarStore {
    extension: String,
}

impl SidecarStore {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    pub fn sidecar_path(&self, drawing: &Path) -> PathBuf {
        drawing.with_extension(&self.extension)
    }

    /// 读取伴随配置；文件不存在时返回 `Ok(None)`。
    pub fn load(&self, drawing: &Path) -> Result<Option<FigureConfig>, ConfigError> {
        let path = self.sidecar_path(drawing);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::SidecarRead {
            path: path.clone(),
            source,
        })?;
        let config: FigureConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::SidecarParse {
                path: path.clone(),
                source,
            })?;
        config
            .validate()
            .map_err(|message| ConfigError::SidecarInvalid { path, message })?;
        Ok(Some(config))
    }

    /// 写入伴随配置，返回实际写入的路径。
    pub fn save(&self, drawing: &Path, config: &FigureConfig) -> Result<PathBuf, ConfigError> {
        let path = self.sidecar_path(drawing);
        let content = serde_json::to_string_pretty(config)
            .map_err(|source| ConfigError::SidecarEncode { source })?;
        fs::write(&path, content).map_err(|source| ConfigError::SidecarWrite {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> FigureConfig {
        let mut config = FigureConfig::with_defaults("part", 0.25);
        config.max_dist = Some(2.0);
        config.unit = UnitSelection::Inch;
        let mut circle = Segment::new(1, Point2::new(1.0, 0.0), Point2::new(1.0, 0.0));
        circle.is_circle = true;
        circle.curved = true;
        circle.circular = Some(CircularDescriptor::circle(Point2::new(0.0, 0.0), 1.0));
        circle.start_angle = 90.0;
        circle.max_dist_override = MaxDistOverride::Disabled;
        let mut line = Segment::new(0, Point2::new(0.0, 0.0), Point2::new(5.0, 0.0));
        line.reverse = true;
        line.accuracy_override = Some(0.125);
        line.max_dist_override = MaxDistOverride::Limit(0.5);
        config.segments = vec![circle, line];
        config
    }

    #[test]
    fn sidecar_path_replaces_extension() {
        let store = SidecarStore::new("figure.json");
        assert_eq!(
            store.sidecar_path(Path::new("/tmp/drawings/part.dxf")),
            PathBuf::from("/tmp/drawings/part.figure.json")
        );
        assert_eq!(default_name(Path::new("/tmp/drawings/part.dxf")), "part");
    }

    #[test]
    fn save_then_load_restores_segments() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let drawing = dir.path().join("part.dxf");
        let store = SidecarStore::new("figure.json");
        let config = sample_config();

        let written = store.save(&drawing, &config).expect("save sidecar");
        assert!(written.exists());
        let loaded = store
            .load(&drawing)
            .expect("load sidecar")
            .expect("sidecar should exist");
        assert_eq!(loaded, config);
    }

    #[test]
    fn tri_state_override_is_tagged_in_json() {
        let config = sample_config();
        let json = serde_json::to_value(&config).expect("encode");
        assert_eq!(json["segments"][0]["max_dist_override"], "disabled");
        assert_eq!(json["segments"][1]["max_dist_override"]["limit"], 0.5);
        assert_eq!(json["unit"], "inch");

        let mut inherit = Segment::new(0, Point2::new(0.0, 0.0), Point2::new(1.0, 0.0));
        inherit.max_dist_override = MaxDistOverride::Inherit;
        let json = serde_json::to_value(&inherit).expect("encode");
        assert_eq!(json["max_dist_override"], "inherit");
    }

    #[test]
    fn override_resolution_honours_disabled() {
        assert_eq!(MaxDistOverride::Inherit.resolve(Some(2.0)), Some(2.0));
        assert_eq!(MaxDistOverride::Disabled.resolve(Some(2.0)), None);
        assert_eq!(MaxDistOverride::Limit(0.5).resolve(None), Some(0.5));
    }

    #[test]
    fn missing_sidecar_is_none_and_malformed_is_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let drawing = dir.path().join("part.dxf");
        let store = SidecarStore::new("figure.json");
        assert!(store.load(&drawing).expect("load").is_none());

        fs::write(store.sidecar_path(&drawing), "{ not json").expect("write garbage");
        let err = store.load(&drawing).unwrap_err();
        assert!(matches!(err, ConfigError::SidecarParse { .. }));

        fs::write(store.sidecar_path(&drawing), r#"{ "accuracy": -1.0 }"#).expect("write");
        let err = store.load(&drawing).unwrap_err();
        assert!(matches!(err, ConfigError::SidecarInvalid { .. }));
    }

    #[test]
    fn sparse_sidecar_fills_defaults() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let drawing = dir.path().join("part.dxf");
        let store = SidecarStore::new("figure.json");
        fs::write(
            store.sidecar_path(&drawing),
            r#"{ "accuracy": 0.2, "segments": [ { "path_index": 0, "start": [0.0, 0.0], "end": [1.0, 0.0] } ] }"#,
        )
        .expect("write");
        let loaded = store.load(&drawing).expect("load").expect("exists");
        assert_eq!(loaded.unit, UnitSelection::FromFile);
        assert!(loaded.max_dist.is_none());
        assert_eq!(loaded.segments.len(), 1);
        assert_eq!(loaded.segments[0].max_dist_override, MaxDistOverride::Inherit);
        assert!(!loaded.segments[0].reverse);
    }

    #[test]
    fn unit_selection_parses_cli_names() {
        assert_eq!("mm".parse::<UnitSelection>(), Ok(UnitSelection::Millimeter));
        assert_eq!("Inch".parse::<UnitSelection>(), Ok(UnitSelection::Inch));
        assert_eq!("file".parse::<UnitSelection>(), Ok(UnitSelection::FromFile));
        assert!("parsec".parse::<UnitSelection>().is_err());
        assert_eq!(UnitSelection::Centimeter.millimeters(), Some(10.0));
    }
}
