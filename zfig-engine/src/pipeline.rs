//! 两遍采样流水线：单位换算 → 第一遍采样/合并/排序 → 推导来源映射 →
//! 第二遍按段覆盖重新采样 → 段对账 → 生成图形。

use tracing::{debug, info};
use zfig_config::{FigureConfig, ImportSettings, Segment};
use zfig_core::document::Document;

use crate::errors::EngineError;
use crate::figure::{Figure, build_figure};
use crate::joining::join_paths;
use crate::path::ToolPath;
use crate::provider::{Provenance, SegmentConfigProvider};
use crate::reconcile::{match_segments, reconcile};
use crate::route::{MAX_OPTIMIZATION_ROUNDS, order_paths};
use crate::sampling::sample_document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub optimization_rounds: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            optimization_rounds: MAX_OPTIMIZATION_ROUNDS,
        }
    }
}

impl From<&ImportSettings> for PipelineOptions {
    fn from(settings: &ImportSettings) -> Self {
        Self {
            optimization_rounds: settings.optimization_rounds.min(MAX_OPTIMIZATION_ROUNDS),
        }
    }
}

/// 一次成功运行的全部产物，由会话整体替换。
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub segments: Vec<Segment>,
    pub paths: Vec<ToolPath>,
    pub figure: Figure,
    pub provenance: Provenance,
}

/// 将图纸缩放到毫米。显式单位优先；沿用文件单位但文件未声明时报错。
pub fn resolve_units(document: &Document, config: &FigureConfig) -> Result<f64, EngineError> {
    config
        .unit
        .millimeters()
        .or_else(|| document.units().map(|unit| unit.millimeters()))
        .ok_or(EngineError::MissingUnit)
}

pub fn run(
    document: &Document,
    config: &FigureConfig,
    options: &PipelineOptions,
) -> Result<PipelineOutput, EngineError> {
    let factor = resolve_units(document, config)?;
    let scaled;
    let document = if (factor - 1.0).abs() > f64::EPSILON {
        scaled = document.scaled(factor);
        &scaled
    } else {
        document
    };

    let tolerance = config.accuracy;
    let mut provider =
        SegmentConfigProvider::new(&config.segments, tolerance, config.global_max_dist());

    provider.begin_pass(None);
    let discovered = build_paths(document, &mut provider, tolerance, options)?;
    let matches = match_segments(&config.segments, &discovered, tolerance);
    let provenance = Provenance::from_matches(&discovered, &matches);
    debug!(
        merged = discovered.len(),
        mapped = provenance.len(),
        "第一遍完成，已推导来源映射"
    );

    provider.begin_pass(Some(provenance.clone()));
    let refined = build_paths(document, &mut provider, tolerance, options)?;

    let reconciled = reconcile(&config.segments, refined, tolerance);
    let figure = build_figure(config, &reconciled.segments, &reconciled.paths);
    info!(
        entities = document.entity_count(),
        paths = reconciled.paths.len(),
        points = figure.len(),
        size = figure.size,
        "图形已生成"
    );

    Ok(PipelineOutput {
        segments: reconciled.segments,
        paths: reconciled.paths,
        figure,
        provenance,
    })
}

fn build_paths(
    document: &Document,
    provider: &mut SegmentConfigProvider<'_>,
    tolerance: f64,
    options: &PipelineOptions,
) -> Result<Vec<ToolPath>, EngineError> {
    let raw = sample_document(document, provider)?;
    let joined = join_paths(raw, tolerance);
    Ok(order_paths(joined, options.optimization_rounds))
}
