//! 段对账：把新采样的路径重新绑定到上一次保存的段上。
//!
//! 对旧段按原有顺序逐个贪心认领：圆形段按圆心与描述匹配，其它段按起终点。
//! 未能就近匹配的旧段退回认领其 `path_index` 指向的路径。

use tracing::debug;
use zfig_config::Segment;

use crate::path::ToolPath;
use crate::spatial::ClaimIndex;

/// 对账结果：段顺序即输出顺序，`path_index` 指向 `paths`。
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub segments: Vec<Segment>,
    pub paths: Vec<ToolPath>,
}

/// 为每个旧段找出其认领的新路径索引，不修改任何数据。
pub fn match_segments(
    previous: &[Segment],
    paths: &[ToolPath],
    tolerance: f64,
) -> Vec<Option<usize>> {
    let mut circles = ClaimIndex::new(tolerance);
    let mut others = ClaimIndex::new(tolerance);
    for (index, path) in paths.iter().enumerate() {
        match (path.is_circle, path.circular) {
            (true, Some(descriptor)) => circles.insert(index, descriptor.center),
            _ => others.insert(index, path.start()),
        }
    }

    let mut matches: Vec<Option<usize>> = previous
        .iter()
        .map(|segment| match (segment.is_circle, segment.circular) {
            (true, Some(descriptor)) => circles.claim_nearest(descriptor.center, |key, distance| {
                paths[key]
                    .circular
                    .filter(|candidate| candidate.matches(&descriptor, tolerance))
                    .map(|_| distance)
            }),
            _ => others.claim_nearest(segment.start, |key, start_distance| {
                let end_distance = paths[key].end().distance(segment.end);
                (end_distance <= tolerance).then_some(start_distance.max(end_distance))
            }),
        })
        .collect();

    for (position, (segment, matched)) in previous.iter().zip(matches.iter_mut()).enumerate() {
        let fallback = segment.path_index;
        if matched.is_none()
            && fallback < paths.len()
            && (circles.claim_key(fallback) || others.claim_key(fallback))
        {
            debug!(segment = position, path = fallback, "按 path_index 回退认领路径");
            *matched = Some(fallback);
        }
    }
    matches
}

/// 重建段列表：匹配成功的旧段按旧顺序保留用户设置，未被认领的路径追加默认段；
/// 随后从绑定路径刷新几何标识，最后按 `reverse` 调转路径方向。
pub fn reconcile(previous: &[Segment], mut paths: Vec<ToolPath>, tolerance: f64) -> Reconciled {
    let matches = match_segments(previous, &paths, tolerance);
    let mut claimed = vec![false; paths.len()];
    let mut segments = Vec::with_capacity(paths.len());

    for (old, matched) in previous.iter().zip(&matches) {
        let Some(path_index) = *matched else {
            continue;
        };
        claimed[path_index] = true;
        let mut segment = old.clone();
        segment.path_index = path_index;
        segments.push(segment);
    }
    let carried = segments.len();

    for (path_index, path) in paths.iter().enumerate() {
        if !claimed[path_index] {
            segments.push(Segment::new(path_index, path.start(), path.end()));
        }
    }

    for segment in &mut segments {
        refresh_identity(segment, &paths[segment.path_index]);
    }
    for segment in &segments {
        if segment.reverse {
            paths[segment.path_index].reverse();
        }
    }

    debug!(
        previous = previous.len(),
        carried,
        fresh = segments.len() - carried,
        "段对账完成"
    );
    Reconciled { segments, paths }
}

fn refresh_identity(segment: &mut Segment, path: &ToolPath) {
    segment.start = path.start();
    segment.end = path.end();
    segment.is_circle = path.is_circle;
    segment.circular = path.circular;
    segment.curved = path.curved;
}
