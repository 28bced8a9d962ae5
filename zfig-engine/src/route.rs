//! 路径遍历顺序优化：最近邻贪心排序，再做有限轮的两两换位改进。
//!
//! 路径方向保持不变；相邻两条路径之间的代价为前一条出口到后一条起点的距离，
//! 闭合路径的出口即其起点。

use tracing::debug;
use zfig_core::geometry::{Bounds2D, Point2};

use crate::path::ToolPath;

const IMPROVEMENT_EPSILON: f64 = 1e-12;

/// 两两换位改进的轮数上限，更大的设置值按此截断。
pub const MAX_OPTIMIZATION_ROUNDS: usize = 10;

pub fn order_paths(paths: Vec<ToolPath>, rounds: usize) -> Vec<ToolPath> {
    let rounds = rounds.min(MAX_OPTIMIZATION_ROUNDS);
    if paths.len() < 2 {
        return paths;
    }
    let Some(bounds) = Bounds2D::from_points(paths.iter().flat_map(|p| p.points.iter().copied()))
    else {
        return paths;
    };
    let origin = bounds.min();

    let mut order = greedy_order(&paths, origin);
    let initial = total_cost(&paths, &order, origin);
    let performed = improve_by_swaps(&paths, &mut order, origin, rounds);
    debug!(
        paths = paths.len(),
        initial_cost = initial,
        final_cost = total_cost(&paths, &order, origin),
        rounds = performed,
        "已优化路径顺序"
    );

    let mut slots: Vec<Option<ToolPath>> = paths.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect()
}

fn greedy_order(paths: &[ToolPath], origin: Point2) -> Vec<usize> {
    let mut remaining: Vec<usize> = (0..paths.len()).collect();
    let mut order = Vec::with_capacity(paths.len());
    let mut position = origin;
    while !remaining.is_empty() {
        let mut best = 0;
        let mut best_cost = f64::INFINITY;
        for (slot, &index) in remaining.iter().enumerate() {
            let cost = position.distance(paths[index].start());
            if cost < best_cost {
                best = slot;
                best_cost = cost;
            }
        }
        let index = remaining.remove(best);
        position = paths[index].end();
        order.push(index);
    }
    order
}

/// 第 `link` 条连接：从前一条路径（首条则为起始点）到 `order[link]` 的起点。
fn link_cost(paths: &[ToolPath], order: &[usize], origin: Point2, link: usize) -> f64 {
    let from = if link == 0 {
        origin
    } else {
        paths[order[link - 1]].end()
    };
    from.distance(paths[order[link]].start())
}

fn total_cost(paths: &[ToolPath], order: &[usize], origin: Point2) -> f64 {
    (0..order.len())
        .map(|link| link_cost(paths, order, origin, link))
        .sum()
}

/// 交换位置 `i`、`j` 只影响进入和离开这两个位置的连接。
fn affected_links(i: usize, j: usize, len: usize) -> Vec<usize> {
    let mut links: Vec<usize> = [i, i + 1, j, j + 1]
        .into_iter()
        .filter(|link| *link < len)
        .collect();
    links.sort_unstable();
    links.dedup();
    links
}

fn improve_by_swaps(
    paths: &[ToolPath],
    order: &mut [usize],
    origin: Point2,
    rounds: usize,
) -> usize {
    let len = order.len();
    for round in 0..rounds {
        let mut improved = false;
        for i in 0..len {
            for j in (i + 1)..len {
                let links = affected_links(i, j, len);
                let before: f64 = links
                    .iter()
                    .map(|&link| link_cost(paths, order, origin, link))
                    .sum();
                order.swap(i, j);
                let after: f64 = links
                    .iter()
                    .map(|&link| link_cost(paths, order, origin, link))
                    .sum();
                if after + IMPROVEMENT_EPSILON < before {
                    improved = true;
                } else {
                    order.swap(i, j);
                }
            }
        }
        if !improved {
            return round + 1;
        }
    }
    rounds
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(a: (f64, f64), b: (f64, f64), source: usize) -> ToolPath {
        ToolPath::open(
            vec![Point2::new(a.0, a.1), Point2::new(b.0, b.1)],
            false,
            source,
        )
    }

    fn sources(paths: &[ToolPath]) -> Vec<usize> {
        paths
            .iter()
            .map(|p| *p.source_indices.iter().next().expect("source"))
            .collect()
    }

    #[test]
    fn greedy_walk_starts_at_lower_left_corner() {
        let paths = vec![
            segment((10.0, 0.0), (12.0, 0.0), 0),
            segment((0.0, 0.0), (2.0, 0.0), 1),
            segment((5.0, 0.0), (7.0, 0.0), 2),
        ];
        let ordered = order_paths(paths, 10);
        assert_eq!(sources(&ordered), vec![1, 2, 0]);
    }

    #[test]
    fn direction_is_preserved() {
        let paths = vec![
            segment((2.0, 0.0), (0.0, 0.0), 0),
            segment((3.0, 0.0), (5.0, 0.0), 1),
        ];
        let ordered = order_paths(paths, 10);
        assert_eq!(ordered[0].start(), Point2::new(2.0, 0.0));
        assert_eq!(ordered[0].end(), Point2::new(0.0, 0.0));
        assert_eq!(ordered[1].start(), Point2::new(3.0, 0.0));
    }

    #[test]
    fn swaps_never_increase_cost() {
        let paths = vec![
            segment((0.0, 0.0), (0.0, 10.0), 0),
            segment((0.5, 0.0), (9.0, 9.0), 1),
            segment((0.0, 10.5), (10.0, 0.0), 2),
            segment((9.5, 9.0), (1.0, 1.0), 3),
        ];
        let origin = Point2::new(0.0, 0.0);
        let greedy = greedy_order(&paths, origin);
        let greedy_cost = total_cost(&paths, &greedy, origin);
        let mut improved = greedy.clone();
        improve_by_swaps(&paths, &mut improved, origin, 10);
        assert!(total_cost(&paths, &improved, origin) <= greedy_cost + 1e-12);

        let mut sorted = improved.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3]);
    }

    #[test]
    fn zero_rounds_keep_greedy_order() {
        let paths = vec![
            segment((1.0, 0.0), (2.0, 0.0), 0),
            segment((0.0, 0.0), (0.5, 0.0), 1),
        ];
        let ordered = order_paths(paths, 0);
        assert_eq!(sources(&ordered), vec![1, 0]);
    }
}
