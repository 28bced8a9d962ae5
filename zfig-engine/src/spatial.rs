//! 固定半径的网格索引，以及在其上实现的“容差内最近的未认领候选”查找。

use std::collections::HashMap;

use zfig_core::geometry::Point2;

/// 以容差为边长的方格划分平面，查询只需扫描 3×3 邻域。
#[derive(Debug, Clone)]
pub struct PointGrid {
    cell_size: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
    points: Vec<Point2>,
}

impl PointGrid {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: cell_size.max(f64::EPSILON),
            cells: HashMap::new(),
            points: Vec::new(),
        }
    }

    fn cell_of(&self, point: Point2) -> (i64, i64) {
        (
            (point.x() / self.cell_size).floor() as i64,
            (point.y() / self.cell_size).floor() as i64,
        )
    }

    /// 插入一个点并返回其槽位号（按插入顺序递增）。
    pub fn insert(&mut self, point: Point2) -> usize {
        let slot = self.points.len();
        self.points.push(point);
        let cell = self.cell_of(point);
        self.cells.entry(cell).or_default().push(slot);
        slot
    }

    #[inline]
    pub fn point(&self, slot: usize) -> Point2 {
        self.points[slot]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 返回与 `query` 距离不超过单元边长的全部槽位及其距离，按槽位升序。
    pub fn within(&self, query: Point2) -> Vec<(usize, f64)> {
        let (cx, cy) = self.cell_of(query);
        let mut found = Vec::new();
        for dy in -1..=1 {
            for dx in -1..=1 {
                let Some(slots) = self.cells.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                for &slot in slots {
                    let distance = self.points[slot].distance(query);
                    if distance <= self.cell_size {
                        found.push((slot, distance));
                    }
                }
            }
        }
        found.sort_by_key(|(slot, _)| *slot);
        found
    }
}

/// 贪心认领索引：每个候选最多被认领一次，查询按调用顺序依次进行，结果确定。
#[derive(Debug, Clone)]
pub struct ClaimIndex {
    grid: PointGrid,
    keys: Vec<usize>,
    slots_by_key: HashMap<usize, usize>,
    claimed: Vec<bool>,
}

impl ClaimIndex {
    pub fn new(tolerance: f64) -> Self {
        Self {
            grid: PointGrid::new(tolerance),
            keys: Vec::new(),
            slots_by_key: HashMap::new(),
            claimed: Vec::new(),
        }
    }

    /// 以外部键登记一个候选位置。同一键只登记一次。
    pub fn insert(&mut self, key: usize, position: Point2) {
        if self.slots_by_key.contains_key(&key) {
            return;
        }
        let slot = self.grid.insert(position);
        self.keys.push(key);
        self.claimed.push(false);
        self.slots_by_key.insert(key, slot);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.grid.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    /// 在容差内挑选评分最小的未认领候选并认领之。
    ///
    /// `score` 接收候选键与其到查询点的距离，返回 `None` 表示拒绝该候选。
    /// 评分相同时取键较小者。
    pub fn claim_nearest<F>(&mut self, query: Point2, mut score: F) -> Option<usize>
    where
        F: FnMut(usize, f64) -> Option<f64>,
    {
        let mut best: Option<(f64, usize, usize)> = None;
        for (slot, distance) in self.grid.within(query) {
            if self.claimed[slot] {
                continue;
            }
            let key = self.keys[slot];
            let Some(value) = score(key, distance) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((best_value, best_key, _)) => {
                    value < best_value || (value == best_value && key < best_key)
                }
            };
            if better {
                best = Some((value, key, slot));
            }
        }
        let (_, key, slot) = best?;
        self.claimed[slot] = true;
        Some(key)
    }

    /// 直接认领指定键；键不存在或已被认领时返回 `false`。
    pub fn claim_key(&mut self, key: usize) -> bool {
        match self.slots_by_key.get(&key) {
            Some(&slot) if !self.claimed[slot] => {
                self.claimed[slot] = true;
                true
            }
            _ => false,
        }
    }

    pub fn is_claimed(&self, key: usize) -> bool {
        self.slots_by_key
            .get(&key)
            .is_some_and(|&slot| self.claimed[slot])
    }

    pub fn reset_claims(&mut self) {
        self.claimed.fill(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_unclaimed_is_taken_once() {
        let mut index = ClaimIndex::new(0.5);
        index.insert(7, Point2::new(0.0, 0.0));
        index.insert(3, Point2::new(0.2, 0.0));
        index.insert(9, Point2::new(5.0, 5.0));

        let query = Point2::new(0.15, 0.0);
        assert_eq!(index.claim_nearest(query, |_, d| Some(d)), Some(3));
        assert_eq!(index.claim_nearest(query, |_, d| Some(d)), Some(7));
        assert_eq!(index.claim_nearest(query, |_, d| Some(d)), None);
        assert!(index.is_claimed(3));
        assert!(!index.is_claimed(9));

        index.reset_claims();
        assert!(!index.is_claimed(3));
    }

    #[test]
    fn rejected_and_distant_candidates_are_skipped() {
        let mut index = ClaimIndex::new(1.0);
        index.insert(0, Point2::new(0.0, 0.0));
        index.insert(1, Point2::new(0.9, 0.0));
        index.insert(2, Point2::new(1.9, 0.0));

        let picked = index.claim_nearest(Point2::new(0.0, 0.0), |key, d| (key != 0).then_some(d));
        assert_eq!(picked, Some(1));
        // 2 lies outside the tolerance even though it shares a neighbouring cell.
        assert_eq!(index.claim_nearest(Point2::new(0.0, 0.0), |_, d| Some(d)), Some(0));
        assert_eq!(index.claim_nearest(Point2::new(0.0, 0.0), |_, d| Some(d)), None);
    }

    #[test]
    fn equal_scores_prefer_lower_key() {
        let mut index = ClaimIndex::new(1.0);
        index.insert(5, Point2::new(0.5, 0.0));
        index.insert(2, Point2::new(-0.5, 0.0));
        assert_eq!(index.claim_nearest(Point2::new(0.0, 0.0), |_, d| Some(d)), Some(2));
        assert!(index.claim_key(5));
        assert!(!index.claim_key(5));
        assert!(!index.claim_key(42));
    }
}
