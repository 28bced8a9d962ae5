use std::collections::BTreeSet;

use zfig_core::geometry::{Bounds2D, CircularDescriptor, Point2};

/// 采样得到的折线路径。闭合路径不重复保存首点，闭合点隐含在末尾。
///
/// 路径至少包含一个点，由采样阶段保证。
#[derive(Debug, Clone, PartialEq)]
pub struct ToolPath {
    pub points: Vec<Point2>,
    pub cyclic: bool,
    pub is_circle: bool,
    pub curved: bool,
    pub circular: Option<CircularDescriptor>,
    /// 组成该路径的原始路径索引（即实体在文档中的顺序）。
    pub source_indices: BTreeSet<usize>,
}

impl ToolPath {
    pub fn open(points: Vec<Point2>, curved: bool, source: usize) -> Self {
        Self {
            points,
            cyclic: false,
            is_circle: false,
            curved,
            circular: None,
            source_indices: BTreeSet::from([source]),
        }
    }

    pub fn closed(points: Vec<Point2>, curved: bool, source: usize) -> Self {
        Self {
            cyclic: true,
            ..Self::open(points, curved, source)
        }
    }

    /// 圆与闭合椭圆：闭合、带圆形描述。
    pub fn circular(points: Vec<Point2>, descriptor: CircularDescriptor, source: usize) -> Self {
        Self {
            is_circle: true,
            circular: Some(descriptor),
            ..Self::closed(points, true, source)
        }
    }

    #[inline]
    pub fn start(&self) -> Point2 {
        self.points[0]
    }

    /// 终点；闭合路径回到起点。
    #[inline]
    pub fn end(&self) -> Point2 {
        if self.cyclic {
            self.start()
        } else {
            self.points[self.points.len() - 1]
        }
    }

    /// 输出时贡献的点数，闭合路径额外补一个闭合点。
    #[inline]
    pub fn output_len(&self) -> usize {
        self.points.len() + usize::from(self.cyclic)
    }

    /// 反转遍历方向。闭合路径保持起点不变，仅调转其余点的顺序。
    pub fn reverse(&mut self) {
        if self.cyclic {
            if self.points.len() > 1 {
                self.points[1..].reverse();
            }
        } else {
            self.points.reverse();
        }
    }

    pub fn bounds(&self) -> Option<Bounds2D> {
        Bounds2D::from_points(self.points.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> ToolPath {
        ToolPath::closed(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(0.0, 1.0),
            ],
            false,
            3,
        )
    }

    #[test]
    fn cyclic_reverse_keeps_start() {
        let mut path = square();
        path.reverse();
        assert_eq!(path.start(), Point2::new(0.0, 0.0));
        assert_eq!(path.points[1], Point2::new(0.0, 1.0));
        assert_eq!(path.points[3], Point2::new(1.0, 0.0));
        assert_eq!(path.end(), path.start());
        assert_eq!(path.output_len(), 5);
    }

    #[test]
    fn open_reverse_swaps_ends() {
        let mut path = ToolPath::open(
            vec![Point2::new(0.0, 0.0), Point2::new(2.0, 0.0), Point2::new(2.0, 3.0)],
            false,
            0,
        );
        path.reverse();
        assert_eq!(path.start(), Point2::new(2.0, 3.0));
        assert_eq!(path.end(), Point2::new(0.0, 0.0));
        assert_eq!(path.output_len(), 3);
        assert!(path.source_indices.contains(&0));
    }
}
