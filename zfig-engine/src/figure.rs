//! 将对账后的段展开为最终输出点序列。

use std::ops::Range;

use serde::Serialize;
use zfig_config::{FigureConfig, Segment};
use zfig_core::geometry::{Bounds2D, Point2, Vector2};

use crate::path::ToolPath;

/// 功率标记。`Inherit` 沿用序列中前一个已定义的值，`Value(0.0)` 强制停光。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerMarker {
    Inherit,
    Value(f64),
}

impl PowerMarker {
    pub const STOP: PowerMarker = PowerMarker::Value(0.0);

    #[inline]
    pub fn is_stop(self) -> bool {
        self == Self::STOP
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutputPoint {
    pub position: Point2,
    pub power: PowerMarker,
    pub ring_power: PowerMarker,
}

impl OutputPoint {
    fn inherit(position: Point2) -> Self {
        Self {
            position,
            power: PowerMarker::Inherit,
            ring_power: PowerMarker::Inherit,
        }
    }

    fn stop(position: Point2) -> Self {
        Self {
            position,
            power: PowerMarker::STOP,
            ring_power: PowerMarker::STOP,
        }
    }
}

/// 交给渲染端的图形：点已平移到以包围盒中心为原点，`center` 记录平移前的中心。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    pub name: String,
    pub id: String,
    pub description: String,
    pub points: Vec<OutputPoint>,
    pub center: Point2,
    pub size: f64,
    /// 第 `i` 段贡献的输出点区间（左闭右开）。
    pub segment_ranges: Vec<Range<usize>>,
}

impl Figure {
    /// 输出点索引所属段在段列表中的位置。
    pub fn segment_at(&self, index: usize) -> Option<usize> {
        self.segment_ranges
            .iter()
            .position(|range| range.contains(&index))
    }

    pub fn segment_range(&self, segment: usize) -> Option<Range<usize>> {
        self.segment_ranges.get(segment).cloned()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

pub fn build_figure(config: &FigureConfig, segments: &[Segment], paths: &[ToolPath]) -> Figure {
    let mut points = Vec::new();
    let mut segment_ranges = Vec::with_capacity(segments.len());

    for segment in segments {
        let begin = points.len();
        let path = &paths[segment.path_index];
        let last = path.points.len().saturating_sub(1);
        for (position, point) in path.points.iter().enumerate() {
            if position == last && !path.cyclic {
                points.push(OutputPoint::stop(*point));
            } else {
                points.push(OutputPoint::inherit(*point));
            }
        }
        if path.cyclic {
            points.push(OutputPoint::stop(path.start()));
        }
        segment_ranges.push(begin..points.len());
    }

    let (center, size) = match Bounds2D::from_points(points.iter().map(|p| p.position)) {
        Some(bounds) => {
            let center = bounds.center();
            let offset = Vector2::from_points(center, Point2::new(0.0, 0.0));
            for point in &mut points {
                point.position = point.position.translate(offset);
            }
            (center, bounds.width().max(bounds.height()))
        }
        None => (Point2::new(0.0, 0.0), 0.0),
    };

    Figure {
        name: config.name.clone(),
        id: config.id.clone(),
        description: config.description.clone(),
        points,
        center,
        size,
        segment_ranges,
    }
}
