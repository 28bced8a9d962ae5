//! 导入会话：持有当前图纸、伴随配置、原始实体与最近一次运行的产物。
//!
//! 每个修改操作都会完整重跑流水线。运行成功时整体替换路径与图形；
//! 流水线失败时清空路径与图形、保留配置，并记录可读的错误信息。

use std::path::{Path, PathBuf};

use tracing::{info, warn};
use zfig_config::sidecar::default_name;
use zfig_config::{FigureConfig, ImportSettings, MaxDistOverride, SidecarStore, UnitSelection};
use zfig_core::document::Document;
use zfig_io::{DocumentLoader, DxfFacade};

use crate::errors::{EngineError, describe_error};
use crate::figure::Figure;
use crate::path::ToolPath;
use crate::pipeline::{self, PipelineOptions, PipelineOutput};

pub struct ImportSession {
    loader: Box<dyn DocumentLoader>,
    store: SidecarStore,
    settings: ImportSettings,
    drawing: Option<PathBuf>,
    config: FigureConfig,
    document: Option<Document>,
    paths: Vec<ToolPath>,
    figure: Option<Figure>,
    last_error: Option<String>,
}

impl ImportSession {
    pub fn new(loader: Box<dyn DocumentLoader>, settings: ImportSettings) -> Self {
        let store = SidecarStore::new(settings.sidecar_extension.clone());
        let config = FigureConfig::with_defaults(String::new(), settings.default_accuracy);
        Self {
            loader,
            store,
            settings,
            drawing: None,
            config,
            document: None,
            paths: Vec::new(),
            figure: None,
            last_error: None,
        }
    }

    /// 使用 DXF 读取器的会话。
    pub fn with_dxf(settings: ImportSettings) -> Self {
        Self::new(Box::new(DxfFacade::new()), settings)
    }

    #[inline]
    pub fn drawing_path(&self) -> Option<&Path> {
        self.drawing.as_deref()
    }

    #[inline]
    pub fn config(&self) -> &FigureConfig {
        &self.config
    }

    #[inline]
    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    #[inline]
    pub fn paths(&self) -> &[ToolPath] {
        &self.paths
    }

    #[inline]
    pub fn figure(&self) -> Option<&Figure> {
        self.figure.as_ref()
    }

    #[inline]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[inline]
    pub fn sidecar_path(&self) -> Option<PathBuf> {
        self.drawing
            .as_deref()
            .map(|drawing| self.store.sidecar_path(drawing))
    }

    /// 打开新图纸：读取伴随配置（缺失或损坏时使用默认值），再读取图纸并运行。
    pub fn set_drawing_path(&mut self, path: impl Into<PathBuf>) -> Result<(), EngineError> {
        let path = path.into();
        self.config = match self.store.load(&path) {
            Ok(Some(config)) => {
                info!(path = %path.display(), segments = config.segments.len(), "已加载伴随配置");
                config
            }
            Ok(None) => self.default_config(&path),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "伴随配置无效，使用默认配置");
                self.default_config(&path)
            }
        };
        self.drawing = Some(path);
        self.reload()
    }

    /// 从磁盘重新读取当前图纸并运行流水线。
    pub fn reload(&mut self) -> Result<(), EngineError> {
        let drawing = self.drawing.clone().ok_or(EngineError::NoDrawing)?;
        match self.loader.load(&drawing) {
            Ok(document) => {
                info!(
                    path = %drawing.display(),
                    entities = document.entity_count(),
                    "已读取图纸"
                );
                self.document = Some(document);
                self.run()
            }
            Err(err) => {
                self.document = None;
                Err(self.fail(EngineError::from(err)))
            }
        }
    }

    pub fn set_accuracy(&mut self, accuracy: f64) -> Result<(), EngineError> {
        self.config.accuracy = positive("精度", accuracy)?;
        self.refresh()
    }

    /// `None` 取消全局点间距上限。
    pub fn set_max_dist(&mut self, max_dist: Option<f64>) -> Result<(), EngineError> {
        self.config.max_dist = max_dist.map(|value| positive("点间距", value)).transpose()?;
        self.refresh()
    }

    pub fn set_unit(&mut self, unit: UnitSelection) -> Result<(), EngineError> {
        self.config.unit = unit;
        self.refresh()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.config.name = name.into();
        if let Some(figure) = self.figure.as_mut() {
            figure.name = self.config.name.clone();
        }
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.config.id = id.into();
        if let Some(figure) = self.figure.as_mut() {
            figure.id = self.config.id.clone();
        }
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.config.description = description.into();
        if let Some(figure) = self.figure.as_mut() {
            figure.description = self.config.description.clone();
        }
    }

    pub fn swap_segments(&mut self, a: usize, b: usize) -> Result<(), EngineError> {
        self.check_segment(a)?;
        self.check_segment(b)?;
        self.config.segments.swap(a, b);
        self.refresh()
    }

    /// 将段移动到新位置，其余段依次顺移。
    pub fn move_segment(&mut self, from: usize, to: usize) -> Result<(), EngineError> {
        self.check_segment(from)?;
        self.check_segment(to)?;
        let segment = self.config.segments.remove(from);
        self.config.segments.insert(to, segment);
        self.refresh()
    }

    pub fn set_segment_reverse(&mut self, index: usize, reverse: bool) -> Result<(), EngineError> {
        self.check_segment(index)?;
        self.config.segments[index].reverse = reverse;
        self.refresh()
    }

    /// 起始角单位为度，仅对圆与闭合椭圆生效。
    pub fn set_segment_start_angle(&mut self, index: usize, degrees: f64) -> Result<(), EngineError> {
        self.check_segment(index)?;
        if !degrees.is_finite() {
            return Err(EngineError::InvalidValue(format!("起始角无效：{degrees}")));
        }
        self.config.segments[index].start_angle = degrees;
        self.refresh()
    }

    /// `None` 恢复继承全局精度。
    pub fn set_segment_accuracy(
        &mut self,
        index: usize,
        accuracy: Option<f64>,
    ) -> Result<(), EngineError> {
        self.check_segment(index)?;
        let accuracy = accuracy.map(|value| positive("精度", value)).transpose()?;
        self.config.segments[index].accuracy_override = accuracy;
        self.refresh()
    }

    pub fn set_segment_max_dist(
        &mut self,
        index: usize,
        max_dist: MaxDistOverride,
    ) -> Result<(), EngineError> {
        self.check_segment(index)?;
        if let MaxDistOverride::Limit(limit) = max_dist {
            positive("点间距", limit)?;
        }
        self.config.segments[index].max_dist_override = max_dist;
        self.refresh()
    }

    /// 丢弃全部自定义设置，只保留由文件名得到的默认名称。
    pub fn restart_with_defaults(&mut self) -> Result<(), EngineError> {
        let drawing = self.drawing.clone().ok_or(EngineError::NoDrawing)?;
        self.config = self.default_config(&drawing);
        info!(path = %drawing.display(), "已恢复默认配置");
        self.refresh()
    }

    /// 写入伴随配置并交出当前图形。写入失败只记录日志。
    pub fn finalize(&self) -> Result<Option<&Figure>, EngineError> {
        let drawing = self.drawing.as_deref().ok_or(EngineError::NoDrawing)?;
        match self.store.save(drawing, &self.config) {
            Ok(path) => info!(path = %path.display(), "已保存伴随配置"),
            Err(err) => warn!(error = %err, "保存伴随配置失败"),
        }
        Ok(self.figure.as_ref())
    }

    /// 输出点索引对应的段位置。
    pub fn segment_at_output_index(&self, index: usize) -> Option<usize> {
        self.figure.as_ref()?.segment_at(index)
    }

    fn default_config(&self, drawing: &Path) -> FigureConfig {
        FigureConfig::with_defaults(default_name(drawing), self.settings.default_accuracy)
    }

    fn check_segment(&self, index: usize) -> Result<(), EngineError> {
        let len = self.config.segments.len();
        if index < len {
            Ok(())
        } else {
            Err(EngineError::SegmentOutOfRange { index, len })
        }
    }

    /// 图纸尚未读取成功时只更新配置。
    fn refresh(&mut self) -> Result<(), EngineError> {
        if self.document.is_none() {
            return Ok(());
        }
        self.run()
    }

    fn run(&mut self) -> Result<(), EngineError> {
        let Some(document) = self.document.as_ref() else {
            return Err(EngineError::NoDrawing);
        };
        let options = PipelineOptions::from(&self.settings);
        match pipeline::run(document, &self.config, &options) {
            Ok(output) => {
                self.apply(output);
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn apply(&mut self, output: PipelineOutput) {
        let PipelineOutput {
            segments,
            paths,
            figure,
            ..
        } = output;
        self.config.segments = segments;
        self.paths = paths;
        self.figure = Some(figure);
        self.last_error = None;
    }

    fn fail(&mut self, err: EngineError) -> EngineError {
        let message = describe_error(&err);
        warn!(error = %message, "流水线运行失败");
        self.paths.clear();
        self.figure = None;
        self.last_error = Some(message);
        err
    }
}

fn positive(label: &str, value: f64) -> Result<f64, EngineError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(EngineError::InvalidValue(format!("{label}必须为正数，实际为 {value}")))
    }
}
