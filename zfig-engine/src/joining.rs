//! 合并端点相接的开放路径。
//!
//! 端点按容差聚类。只有恰好包含两个自由端、且不含闭合路径起点的簇才会连接；
//! 三条以上路径端点交汇之处保持断开，以便用户指定闭合回路的切入点。

use tracing::debug;
use zfig_core::geometry::Point2;

use crate::path::ToolPath;
use crate::spatial::PointGrid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndKind {
    Start,
    End,
}

impl EndKind {
    fn opposite(self) -> Self {
        match self {
            Self::Start => Self::End,
            Self::End => Self::Start,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FreeEnd {
    path: usize,
    /// `None` 表示闭合路径的起点，只参与聚类、阻止连接。
    kind: Option<EndKind>,
}

/// 每条开放路径两端各自连接到的 (路径, 端)。
#[derive(Debug, Default, Clone, Copy)]
struct Links {
    start: Option<(usize, EndKind)>,
    end: Option<(usize, EndKind)>,
}

impl Links {
    fn at(&self, kind: EndKind) -> Option<(usize, EndKind)> {
        match kind {
            EndKind::Start => self.start,
            EndKind::End => self.end,
        }
    }

    fn set(&mut self, kind: EndKind, target: (usize, EndKind)) {
        match kind {
            EndKind::Start => self.start = Some(target),
            EndKind::End => self.end = Some(target),
        }
    }
}

/// 合并端点重合的开放路径。索引较小的路径作为基准并保持方向，
/// 输出顺序为各组基准路径的原始顺序。
pub fn join_paths(paths: Vec<ToolPath>, tolerance: f64) -> Vec<ToolPath> {
    let links = find_links(&paths, tolerance);
    let mut visited = vec![false; paths.len()];
    let mut joined = Vec::with_capacity(paths.len());

    for index in 0..paths.len() {
        if visited[index] {
            continue;
        }
        visited[index] = true;
        if paths[index].cyclic {
            joined.push(paths[index].clone());
            continue;
        }
        joined.push(build_chain(index, &paths, &links, &mut visited));
    }

    if joined.len() != paths.len() {
        debug!(before = paths.len(), after = joined.len(), "已合并相接路径");
    }
    joined
}

fn find_links(paths: &[ToolPath], tolerance: f64) -> Vec<Links> {
    let mut grid = PointGrid::new(tolerance);
    let mut ends = Vec::new();
    for (index, path) in paths.iter().enumerate() {
        if path.cyclic {
            grid.insert(path.start());
            ends.push(FreeEnd { path: index, kind: None });
        } else {
            grid.insert(path.start());
            ends.push(FreeEnd {
                path: index,
                kind: Some(EndKind::Start),
            });
            grid.insert(path.end());
            ends.push(FreeEnd {
                path: index,
                kind: Some(EndKind::End),
            });
        }
    }

    let mut clusters = DisjointSet::new(ends.len());
    for slot in 0..grid.len() {
        for (other, _) in grid.within(grid.point(slot)) {
            clusters.union(slot, other);
        }
    }

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); ends.len()];
    for slot in 0..ends.len() {
        members[clusters.find(slot)].push(slot);
    }

    let mut links = vec![Links::default(); paths.len()];
    for cluster in members.iter().filter(|cluster| cluster.len() == 2) {
        let (a, b) = (ends[cluster[0]], ends[cluster[1]]);
        let (Some(kind_a), Some(kind_b)) = (a.kind, b.kind) else {
            continue;
        };
        links[a.path].set(kind_a, (b.path, kind_b));
        links[b.path].set(kind_b, (a.path, kind_a));
    }
    links
}

/// 以 `base` 为起点向两侧延伸，拼出一条合并路径。
fn build_chain(
    base: usize,
    paths: &[ToolPath],
    links: &[Links],
    visited: &mut [bool],
) -> ToolPath {
    let mut merged = paths[base].clone();

    // 向后延伸：沿基准路径的终点方向。
    let mut exit = (base, EndKind::End);
    let mut closed = false;
    while let Some((next, entry)) = links[exit.0].at(exit.1) {
        if next == base {
            closed = true;
            break;
        }
        if visited[next] {
            break;
        }
        visited[next] = true;
        append(&mut merged, &paths[next], entry == EndKind::End);
        exit = (next, entry.opposite());
    }

    if closed {
        merged.points.pop();
        merged.cyclic = true;
        merged.is_circle = false;
        merged.circular = None;
        return merged;
    }

    // 向前延伸：沿基准路径的起点方向。
    let mut entry = (base, EndKind::Start);
    while let Some((previous, attach)) = links[entry.0].at(entry.1) {
        if visited[previous] {
            break;
        }
        visited[previous] = true;
        prepend(&mut merged, &paths[previous], attach == EndKind::Start);
        entry = (previous, attach.opposite());
    }
    merged
}

fn append(merged: &mut ToolPath, next: &ToolPath, reversed: bool) {
    let points: Vec<Point2> = if reversed {
        next.points.iter().rev().skip(1).copied().collect()
    } else {
        next.points.iter().skip(1).copied().collect()
    };
    merged.points.extend(points);
    absorb(merged, next);
}

fn prepend(merged: &mut ToolPath, previous: &ToolPath, reversed: bool) {
    let mut points: Vec<Point2> = if reversed {
        previous.points.iter().rev().copied().collect()
    } else {
        previous.points.clone()
    };
    points.pop();
    points.extend(merged.points.drain(..));
    merged.points = points;
    absorb(merged, previous);
}

fn absorb(merged: &mut ToolPath, other: &ToolPath) {
    merged.curved |= other.curved;
    merged.is_circle = false;
    merged.circular = None;
    merged
        .source_indices
        .extend(other.source_indices.iter().copied());
}

/// 路径压缩的并查集。
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(points: &[(f64, f64)], source: usize) -> ToolPath {
        ToolPath::open(
            points.iter().map(|&(x, y)| Point2::new(x, y)).collect(),
            false,
            source,
        )
    }

    fn coords(path: &ToolPath) -> Vec<(f64, f64)> {
        path.points.iter().map(|p| (p.x(), p.y())).collect()
    }

    #[test]
    fn touching_lines_are_joined() {
        let joined = join_paths(
            vec![line(&[(0.0, 0.0), (1.0, 0.0)], 0), line(&[(1.0, 0.0), (2.0, 0.0)], 1)],
            0.1,
        );
        assert_eq!(joined.len(), 1);
        assert_eq!(coords(&joined[0]), vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        assert!(!joined[0].cyclic);
        assert_eq!(joined[0].source_indices.iter().copied().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn base_keeps_direction_and_neighbours_are_flipped() {
        // 1 ends where 0 ends, 2 starts where 0 starts.
        let joined = join_paths(
            vec![
                line(&[(1.0, 0.0), (2.0, 0.0)], 0),
                line(&[(3.0, 0.0), (2.0, 0.0)], 1),
                line(&[(0.0, 0.0), (1.0, 0.0)], 2),
            ],
            0.1,
        );
        assert_eq!(joined.len(), 1);
        assert_eq!(
            coords(&joined[0]),
            vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]
        );
    }

    #[test]
    fn chain_that_returns_to_base_becomes_cyclic() {
        let joined = join_paths(
            vec![
                line(&[(0.0, 0.0), (1.0, 0.0)], 0),
                line(&[(1.0, 0.0), (1.0, 1.0)], 1),
                line(&[(0.0, 0.0), (1.0, 1.0)], 2),
            ],
            0.1,
        );
        assert_eq!(joined.len(), 1);
        assert!(joined[0].cyclic);
        assert_eq!(coords(&joined[0]), vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
    }

    #[test]
    fn open_path_with_meeting_ends_closes_itself() {
        let joined = join_paths(
            vec![line(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.05)], 0)],
            0.1,
        );
        assert!(joined[0].cyclic);
        assert_eq!(joined[0].points.len(), 3);
    }

    #[test]
    fn three_way_junction_is_left_alone() {
        let joined = join_paths(
            vec![
                line(&[(0.0, 0.0), (1.0, 0.0)], 0),
                line(&[(1.0, 0.0), (2.0, 0.0)], 1),
                line(&[(1.0, 0.0), (1.0, 1.0)], 2),
            ],
            0.1,
        );
        assert_eq!(joined.len(), 3);
    }

    #[test]
    fn cyclic_start_blocks_joining() {
        let square = ToolPath::closed(
            vec![
                Point2::new(1.0, 0.0),
                Point2::new(1.0, -1.0),
                Point2::new(2.0, -1.0),
            ],
            false,
            2,
        );
        let joined = join_paths(
            vec![
                line(&[(0.0, 0.0), (1.0, 0.0)], 0),
                line(&[(1.0, 0.0), (2.0, 0.0)], 1),
                square,
            ],
            0.1,
        );
        assert_eq!(joined.len(), 3);
        assert!(joined[2].cyclic);
    }
}
