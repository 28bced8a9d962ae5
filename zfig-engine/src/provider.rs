//! 采样器查询逐路径参数的接口，以及基于上一次对账结果的实现。

use std::collections::BTreeMap;

use tracing::debug;
use zfig_config::{MaxDistOverride, Segment};
use zfig_core::geometry::CircularDescriptor;

use crate::path::ToolPath;
use crate::spatial::ClaimIndex;

/// 采样器在处理每条原始路径时回调的参数来源。
pub trait PathConfigProvider {
    /// 圆或闭合椭圆的起始角（度）。
    fn circle_start_angle(&mut self, raw_index: usize, descriptor: &CircularDescriptor) -> f64;
    /// 点间距上限，`None` 表示不限制。
    fn max_dist(&self, raw_index: usize) -> Option<f64>;
    /// 允许的最大弦高误差。
    fn max_error(&self, raw_index: usize) -> f64;
}

/// 原始路径索引到上一次段列表位置的映射，由第一遍的合并结果推得。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    owners: BTreeMap<usize, usize>,
}

impl Provenance {
    /// `matches[i]` 为第 `i` 个旧段匹配到的合并路径。
    pub fn from_matches(paths: &[ToolPath], matches: &[Option<usize>]) -> Self {
        let mut owners = BTreeMap::new();
        for (segment, matched) in matches.iter().enumerate() {
            let Some(path) = matched.and_then(|index| paths.get(index)) else {
                continue;
            };
            for &raw in &path.source_indices {
                owners.entry(raw).or_insert(segment);
            }
        }
        Self { owners }
    }

    #[inline]
    pub fn owner(&self, raw_index: usize) -> Option<usize> {
        self.owners.get(&raw_index).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// 由上一次段列表支撑的参数来源。
///
/// 第一遍（无来源映射）只返回全局值；第二遍按来源映射取所属段的覆盖值。
/// 圆心索引在构造时建立一次，每遍开始时清空认领状态。
#[derive(Debug)]
pub struct SegmentConfigProvider<'a> {
    previous: &'a [Segment],
    accuracy: f64,
    global_max_dist: Option<f64>,
    circles: ClaimIndex,
    provenance: Option<Provenance>,
}

impl<'a> SegmentConfigProvider<'a> {
    pub fn new(previous: &'a [Segment], accuracy: f64, global_max_dist: Option<f64>) -> Self {
        let mut circles = ClaimIndex::new(accuracy);
        for (index, segment) in previous.iter().enumerate() {
            if let (true, Some(descriptor)) = (segment.is_circle, segment.circular) {
                circles.insert(index, descriptor.center);
            }
        }
        debug!(circles = circles.len(), "已建立圆心索引");
        Self {
            previous,
            accuracy,
            global_max_dist,
            circles,
            provenance: None,
        }
    }

    /// 开始新的一遍采样。传入 `Some` 时进入逐段覆盖模式。
    pub fn begin_pass(&mut self, provenance: Option<Provenance>) {
        self.circles.reset_claims();
        self.provenance = provenance;
    }

    fn owner(&self, raw_index: usize) -> Option<&Segment> {
        let provenance = self.provenance.as_ref()?;
        provenance
            .owner(raw_index)
            .and_then(|segment| self.previous.get(segment))
    }
}

impl PathConfigProvider for SegmentConfigProvider<'_> {
    fn circle_start_angle(&mut self, raw_index: usize, descriptor: &CircularDescriptor) -> f64 {
        let previous = self.previous;
        let tolerance = self.accuracy;
        let claimed = self.circles.claim_nearest(descriptor.center, |key, distance| {
            previous[key]
                .circular
                .filter(|old| old.matches(descriptor, tolerance))
                .map(|_| distance)
        });
        match claimed {
            Some(key) => {
                debug!(raw_index, segment = key, "复用已保存的圆起始角");
                previous[key].start_angle
            }
            None => 0.0,
        }
    }

    fn max_dist(&self, raw_index: usize) -> Option<f64> {
        let resolved = match self.owner(raw_index) {
            Some(segment) => segment.max_dist_override.resolve(self.global_max_dist),
            None => MaxDistOverride::Inherit.resolve(self.global_max_dist),
        };
        resolved.filter(|limit| *limit > 0.0)
    }

    fn max_error(&self, raw_index: usize) -> f64 {
        self.owner(raw_index)
            .and_then(|segment| segment.accuracy_override)
            .unwrap_or(self.accuracy)
    }
}

#[cfg(test)]
mod tests {
    use zfig_core::geometry::Point2;

    use super::*;

    fn circle_segment(center: Point2, radius: f64, start_angle: f64) -> Segment {
        let mut segment = Segment::new(0, center, center);
        segment.is_circle = true;
        segment.curved = true;
        segment.circular = Some(CircularDescriptor::circle(center, radius));
        segment.start_angle = start_angle;
        segment
    }

    #[test]
    fn start_angle_is_claimed_once_per_pass() {
        let previous = vec![circle_segment(Point2::new(0.0, 0.0), 2.0, 90.0)];
        let mut provider = SegmentConfigProvider::new(&previous, 0.5, None);
        let moved = CircularDescriptor::circle(Point2::new(0.01, 0.0), 2.0);

        provider.begin_pass(None);
        assert_eq!(provider.circle_start_angle(0, &moved), 90.0);
        assert_eq!(provider.circle_start_angle(1, &moved), 0.0);

        provider.begin_pass(Some(Provenance::default()));
        assert_eq!(provider.circle_start_angle(0, &moved), 90.0);
    }

    #[test]
    fn different_radius_does_not_match() {
        let previous = vec![circle_segment(Point2::new(0.0, 0.0), 2.0, 45.0)];
        let mut provider = SegmentConfigProvider::new(&previous, 0.5, None);
        provider.begin_pass(None);
        let other = CircularDescriptor::circle(Point2::new(0.0, 0.0), 5.0);
        assert_eq!(provider.circle_start_angle(0, &other), 0.0);
    }

    #[test]
    fn overrides_apply_only_in_refine_pass() {
        let mut segment = Segment::new(0, Point2::new(0.0, 0.0), Point2::new(5.0, 0.0));
        segment.accuracy_override = Some(0.01);
        segment.max_dist_override = MaxDistOverride::Disabled;
        let previous = vec![segment];
        let path = ToolPath::open(vec![Point2::new(0.0, 0.0), Point2::new(5.0, 0.0)], false, 4);
        let provenance = Provenance::from_matches(&[path], &[Some(0)]);
        assert_eq!(provenance.owner(4), Some(0));

        let mut provider = SegmentConfigProvider::new(&previous, 0.5, Some(2.0));
        provider.begin_pass(None);
        assert_eq!(provider.max_error(4), 0.5);
        assert_eq!(provider.max_dist(4), Some(2.0));

        provider.begin_pass(Some(provenance));
        assert_eq!(provider.max_error(4), 0.01);
        assert_eq!(provider.max_dist(4), None, "disabled must beat the global limit");
        assert_eq!(provider.max_dist(5), Some(2.0));
        assert_eq!(provider.max_error(5), 0.5);
    }
}
