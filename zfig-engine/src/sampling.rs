//! 将原始实体离散为折线路径。
//!
//! 圆、圆弧与 bulge 弧按弦高公式确定步长；椭圆与样条使用自适应二分。
//! 采样结束后按点间距上限补点。

use std::f64::consts::{PI, TAU};

use glam::{DVec2, DVec3};
use zfig_core::document::{
    Arc, Circle, Document, Ellipse, Entity, Line, Polyline, PolylineVertex, Spline,
    canonical_interval,
};
use zfig_core::geometry::{CircularDescriptor, Point2};

use crate::errors::EngineError;
use crate::path::ToolPath;
use crate::provider::PathConfigProvider;

const COINCIDENT: f64 = 1e-9;
const BULGE_EPSILON: f64 = 1e-12;
const MIN_CIRCLE_SEGMENTS: usize = 8;
const MIN_CURVE_SEGMENTS: usize = 16;
const MAX_BISECTION_DEPTH: u32 = 16;
/// 单条路径允许的最大点数。
pub const MAX_PATH_POINTS: usize = 1 << 20;

/// 按文档顺序采样全部实体，原始路径索引即实体序号。
pub fn sample_document(
    document: &Document,
    provider: &mut dyn PathConfigProvider,
) -> Result<Vec<ToolPath>, EngineError> {
    document
        .entities()
        .enumerate()
        .map(|(index, (_, entity))| sample_entity(index, entity, provider))
        .collect()
}

pub fn sample_entity(
    index: usize,
    entity: &Entity,
    provider: &mut dyn PathConfigProvider,
) -> Result<ToolPath, EngineError> {
    let accuracy = provider.max_error(index);
    if !(accuracy.is_finite() && accuracy > 0.0) {
        return Err(EngineError::geometry(index, format!("精度无效：{accuracy}")));
    }

    if !entity.is_finite() {
        return Err(EngineError::geometry(index, "图元包含非有限数值"));
    }

    let mut path = match entity {
        Entity::Line(line) => sample_line(index, line)?,
        Entity::Circle(circle) => sample_circle(index, circle, accuracy, provider)?,
        Entity::Arc(arc) => sample_arc(index, arc, accuracy)?,
        Entity::Ellipse(ellipse) => sample_ellipse(index, ellipse, accuracy, provider)?,
        Entity::Polyline(polyline) => sample_polyline(index, polyline, accuracy)?,
        Entity::Spline(spline) => sample_spline(index, spline, accuracy)?,
    };

    if let Some(limit) = provider.max_dist(index) {
        path.points = densify(index, &path.points, path.cyclic, limit)?;
    }
    Ok(path)
}

fn sample_line(index: usize, line: &Line) -> Result<ToolPath, EngineError> {
    if line.start.distance(line.end) <= COINCIDENT {
        return Err(EngineError::geometry(index, "线段长度为零"));
    }
    Ok(ToolPath::open(vec![line.start, line.end], false, index))
}

fn sample_circle(
    index: usize,
    circle: &Circle,
    accuracy: f64,
    provider: &mut dyn PathConfigProvider,
) -> Result<ToolPath, EngineError> {
    if !(circle.radius > COINCIDENT) {
        return Err(EngineError::geometry(
            index,
            format!("圆半径必须为正数，实际为 {}", circle.radius),
        ));
    }
    let descriptor = CircularDescriptor::circle(circle.center, circle.radius);
    let start = provider.circle_start_angle(index, &descriptor).to_radians();
    let count = segment_count(index, circle.radius, TAU, accuracy, MIN_CIRCLE_SEGMENTS)?;
    let mut points = arc_points(circle.center.as_vec2(), circle.radius, start, TAU, count);
    points.pop();
    Ok(ToolPath::circular(points, descriptor, index))
}

fn sample_arc(index: usize, arc: &Arc, accuracy: f64) -> Result<ToolPath, EngineError> {
    if !(arc.radius > COINCIDENT) {
        return Err(EngineError::geometry(
            index,
            format!("圆弧半径必须为正数，实际为 {}", arc.radius),
        ));
    }
    let (start, end) = canonical_interval(arc.start_angle, arc.end_angle);
    let sweep = end - start;
    let count = segment_count(index, arc.radius, sweep, accuracy, 1)?;
    let points = arc_points(arc.center.as_vec2(), arc.radius, start, sweep, count);
    Ok(ToolPath::open(points, true, index))
}

fn sample_ellipse(
    index: usize,
    ellipse: &Ellipse,
    accuracy: f64,
    provider: &mut dyn PathConfigProvider,
) -> Result<ToolPath, EngineError> {
    let major = ellipse.major_axis.as_vec2();
    if major.length() <= COINCIDENT || !(ellipse.ratio > COINCIDENT) {
        return Err(EngineError::geometry(index, "椭圆轴长度为零"));
    }
    let minor = major.perp() * ellipse.ratio;
    let center = ellipse.center.as_vec2();
    let eval = |t: f64| Point2::from_vec(center + major * t.cos() + minor * t.sin());

    if ellipse.is_closed() {
        let descriptor =
            CircularDescriptor::ellipse(ellipse.center, ellipse.major_axis, ellipse.ratio);
        let start = ellipse.start_parameter
            + provider.circle_start_angle(index, &descriptor).to_radians();
        let mut points =
            adaptive_sample(index, eval, start, start + TAU, accuracy, MIN_CURVE_SEGMENTS)?;
        points.pop();
        return Ok(ToolPath::circular(points, descriptor, index));
    }

    let (start, end) = canonical_interval(ellipse.start_parameter, ellipse.end_parameter);
    let points = adaptive_sample(index, eval, start, end, accuracy, MIN_CURVE_SEGMENTS)?;
    Ok(ToolPath::open(points, true, index))
}

fn sample_polyline(
    index: usize,
    polyline: &Polyline,
    accuracy: f64,
) -> Result<ToolPath, EngineError> {
    let mut vertices: Vec<&PolylineVertex> = Vec::with_capacity(polyline.vertices.len());
    for vertex in &polyline.vertices {
        match vertices.last() {
            Some(last) if last.position.distance(vertex.position) <= COINCIDENT => {}
            _ => vertices.push(vertex),
        }
    }
    if polyline.is_closed && vertices.len() > 1 {
        let first = vertices[0].position;
        if vertices[vertices.len() - 1].position.distance(first) <= COINCIDENT {
            vertices.pop();
        }
    }
    if vertices.len() < 2 {
        return Err(EngineError::geometry(index, "多段线至少需要两个不重合的顶点"));
    }

    let count = vertices.len();
    let spans = if polyline.is_closed { count } else { count - 1 };
    let mut points = vec![vertices[0].position];
    let mut curved = false;
    for span in 0..spans {
        let from = vertices[span];
        let to = vertices[(span + 1) % count];
        if from.bulge.abs() > BULGE_EPSILON {
            curved = true;
            append_bulge_arc(index, &mut points, from, to.position, accuracy)?;
        } else {
            points.push(to.position);
        }
    }

    if polyline.is_closed {
        points.pop();
        Ok(ToolPath::closed(points, curved, index))
    } else {
        Ok(ToolPath::open(points, curved, index))
    }
}

/// 追加 `from` 到 `to` 之间的 bulge 圆弧，不含起点。bulge 为包含角四分之一的正切，正值为逆时针。
fn append_bulge_arc(
    index: usize,
    points: &mut Vec<Point2>,
    from: &PolylineVertex,
    to: Point2,
    accuracy: f64,
) -> Result<(), EngineError> {
    let bulge = from.bulge;
    let a = from.position.as_vec2();
    let b = to.as_vec2();
    let chord = b - a;
    let sweep = 4.0 * bulge.atan();
    let radius = chord.length() / (2.0 * (sweep / 2.0).sin().abs());
    let center = (a + b) * 0.5 + chord.perp() * ((1.0 - bulge * bulge) / (4.0 * bulge));
    let offset = a - center;
    let start = offset.y.atan2(offset.x);

    let count = segment_count(index, radius, sweep, accuracy, 1)?;
    if points.len() + count > MAX_PATH_POINTS {
        return Err(budget_exceeded(index));
    }
    for step in 1..count {
        let angle = start + sweep * step as f64 / count as f64;
        points.push(Point2::from_vec(
            center + DVec2::new(angle.cos(), angle.sin()) * radius,
        ));
    }
    points.push(to);
    Ok(())
}

fn sample_spline(index: usize, spline: &Spline, accuracy: f64) -> Result<ToolPath, EngineError> {
    let degree = usize::try_from(spline.degree).unwrap_or(0);
    let controls = &spline.control_points;

    let mut points = if degree >= 1 && controls.len() > degree {
        let curve = NurbsCurve::new(index, spline, degree)?;
        let (t0, t1) = curve.domain();
        let min_segments = MIN_CURVE_SEGMENTS.max(controls.len() * 2);
        adaptive_sample(index, |t| curve.evaluate(t), t0, t1, accuracy, min_segments)?
    } else if spline.fit_points.len() >= 2 {
        let mut points: Vec<Point2> = Vec::with_capacity(spline.fit_points.len());
        for point in &spline.fit_points {
            if points.last().is_none_or(|last| last.distance(*point) > COINCIDENT) {
                points.push(*point);
            }
        }
        points
    } else {
        return Err(EngineError::geometry(
            index,
            format!(
                "样条控制点不足：阶数 {}，控制点 {} 个",
                spline.degree,
                controls.len()
            ),
        ));
    };

    if points.len() < 2 {
        return Err(EngineError::geometry(index, "样条退化为单点"));
    }
    let ends_meet = points[0].distance(points[points.len() - 1]) <= COINCIDENT;
    if ends_meet && points.len() > 2 {
        points.pop();
        return Ok(ToolPath::closed(points, true, index));
    }
    if spline.is_closed && points.len() > 2 {
        return Ok(ToolPath::closed(points, true, index));
    }
    Ok(ToolPath::open(points, true, index))
}

/// 有理 B 样条，按 de Boor 算法在齐次坐标下求值。
struct NurbsCurve<'a> {
    degree: usize,
    controls: &'a [Point2],
    knots: Vec<f64>,
    weights: Vec<f64>,
}

impl<'a> NurbsCurve<'a> {
    fn new(index: usize, spline: &'a Spline, degree: usize) -> Result<Self, EngineError> {
        let controls = spline.control_points.as_slice();
        let count = controls.len();
        let knots = if spline.knot_values.len() == count + degree + 1 {
            spline.knot_values.clone()
        } else {
            clamped_knots(count, degree)
        };
        if knots.windows(2).any(|pair| pair[1] < pair[0]) || knots[count] <= knots[degree] {
            return Err(EngineError::geometry(index, "样条节点向量无效"));
        }
        let weights = if spline.weights.len() == count {
            spline.weights.clone()
        } else {
            vec![1.0; count]
        };
        if weights.iter().any(|weight| !(*weight > 0.0)) {
            return Err(EngineError::geometry(index, "样条权重必须为正数"));
        }
        Ok(Self {
            degree,
            controls,
            knots,
            weights,
        })
    }

    fn domain(&self) -> (f64, f64) {
        (self.knots[self.degree], self.knots[self.controls.len()])
    }

    fn evaluate(&self, t: f64) -> Point2 {
        let p = self.degree;
        let n = self.controls.len();
        let mut span = p;
        while span + 1 < n && t >= self.knots[span + 1] {
            span += 1;
        }

        let mut d: Vec<DVec3> = (0..=p)
            .map(|j| {
                let i = j + span - p;
                let w = self.weights[i];
                let c = self.controls[i].as_vec2() * w;
                DVec3::new(c.x, c.y, w)
            })
            .collect();
        for r in 1..=p {
            for j in (r..=p).rev() {
                let i = j + span - p;
                let denom = self.knots[i + p + 1 - r] - self.knots[i];
                let alpha = if denom.abs() < f64::EPSILON {
                    0.0
                } else {
                    (t - self.knots[i]) / denom
                };
                d[j] = d[j - 1] * (1.0 - alpha) + d[j] * alpha;
            }
        }
        let h = d[p];
        Point2::new(h.x / h.z, h.y / h.z)
    }
}

/// 两端重复 `degree + 1` 次的均匀节点向量。
fn clamped_knots(count: usize, degree: usize) -> Vec<f64> {
    let interior = count - degree;
    let mut knots = vec![0.0; degree + 1];
    knots.extend((1..interior).map(|i| i as f64 / interior as f64));
    knots.extend(std::iter::repeat_n(1.0, degree + 1));
    knots
}

/// 弦高不超过 `accuracy` 时允许的最大角步长，即 `2·acos(1 - accuracy/radius)`。
/// 改写为 `asin` 形式，半径远大于精度时不会舍入为零。
fn arc_step(radius: f64, accuracy: f64) -> f64 {
    if accuracy >= radius {
        PI
    } else {
        4.0 * (accuracy / (2.0 * radius)).sqrt().asin()
    }
}

fn segment_count(
    index: usize,
    radius: f64,
    sweep: f64,
    accuracy: f64,
    min: usize,
) -> Result<usize, EngineError> {
    let count = (sweep.abs() / arc_step(radius, accuracy)).ceil();
    within_budget(index, count).map(|count| count.max(min))
}

/// 点数为有限值且不超过 `MAX_PATH_POINTS` 时返回整数点数。
fn within_budget(index: usize, count: f64) -> Result<usize, EngineError> {
    if count.is_finite() && count <= MAX_PATH_POINTS as f64 {
        Ok(count as usize)
    } else {
        Err(budget_exceeded(index))
    }
}

fn budget_exceeded(index: usize) -> EngineError {
    EngineError::geometry(index, format!("采样点数超过上限 {MAX_PATH_POINTS}"))
}

fn arc_points(center: DVec2, radius: f64, start: f64, sweep: f64, count: usize) -> Vec<Point2> {
    (0..=count)
        .map(|step| {
            let angle = start + sweep * step as f64 / count as f64;
            Point2::from_vec(center + DVec2::new(angle.cos(), angle.sin()) * radius)
        })
        .collect()
}

fn adaptive_sample<F>(
    index: usize,
    eval: F,
    t0: f64,
    t1: f64,
    accuracy: f64,
    min_segments: usize,
) -> Result<Vec<Point2>, EngineError>
where
    F: Fn(f64) -> Point2,
{
    if min_segments >= MAX_PATH_POINTS {
        return Err(budget_exceeded(index));
    }
    let mut points = vec![eval(t0)];
    let step = (t1 - t0) / min_segments as f64;
    for i in 0..min_segments {
        let a = t0 + step * i as f64;
        let b = if i + 1 == min_segments { t1 } else { a + step };
        let pa = points[points.len() - 1];
        let pb = eval(b);
        subdivide(&eval, (a, pa), (b, pb), accuracy, 0, &mut points);
        if points.len() > MAX_PATH_POINTS {
            return Err(budget_exceeded(index));
        }
    }
    Ok(points)
}

fn subdivide<F>(
    eval: &F,
    (a, pa): (f64, Point2),
    (b, pb): (f64, Point2),
    accuracy: f64,
    depth: u32,
    out: &mut Vec<Point2>,
) where
    F: Fn(f64) -> Point2,
{
    let mid = 0.5 * (a + b);
    let pm = eval(mid);
    let deviation = [0.25, 0.75]
        .iter()
        .map(|f| chord_deviation(pa, pb, eval(a + (b - a) * f)))
        .fold(chord_deviation(pa, pb, pm), f64::max);

    if depth < MAX_BISECTION_DEPTH && deviation > accuracy {
        subdivide(eval, (a, pa), (mid, pm), accuracy, depth + 1, out);
        subdivide(eval, (mid, pm), (b, pb), accuracy, depth + 1, out);
    } else {
        out.push(pb);
    }
}

/// 点到线段的距离。
fn chord_deviation(a: Point2, b: Point2, point: Point2) -> f64 {
    let ab = b.as_vec2() - a.as_vec2();
    let ap = point.as_vec2() - a.as_vec2();
    let length_squared = ab.length_squared();
    if length_squared <= f64::EPSILON {
        return ap.length();
    }
    let t = (ap.dot(ab) / length_squared).clamp(0.0, 1.0);
    (ap - ab * t).length()
}

/// 插入等分点使相邻点距离不超过 `max_dist`；闭合路径同样处理末点到首点的隐含边。
/// 结果超过 `MAX_PATH_POINTS` 时返回 `Geometry` 错误。
pub fn densify(
    index: usize,
    points: &[Point2],
    cyclic: bool,
    max_dist: f64,
) -> Result<Vec<Point2>, EngineError> {
    if !(max_dist > 0.0) || points.is_empty() {
        return Ok(points.to_vec());
    }
    let count = points.len();
    let spans = if cyclic { count } else { count - 1 };
    let mut out = Vec::with_capacity(count);
    out.push(points[0]);
    for span in 0..spans {
        let from = points[span];
        let to = points[(span + 1) % count];
        let pieces = within_budget(index, (from.distance(to) / max_dist).ceil().max(1.0))?;
        if out.len() + pieces > MAX_PATH_POINTS {
            return Err(budget_exceeded(index));
        }
        for step in 1..pieces {
            out.push(from.lerp(to, step as f64 / pieces as f64));
        }
        if span + 1 < count {
            out.push(to);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use zfig_core::geometry::Vector2;

    use super::*;

    struct FixedProvider {
        accuracy: f64,
        max_dist: Option<f64>,
        start_angle: f64,
    }

    impl FixedProvider {
        fn new(accuracy: f64) -> Self {
            Self {
                accuracy,
                max_dist: None,
                start_angle: 0.0,
            }
        }
    }

    impl PathConfigProvider for FixedProvider {
        fn circle_start_angle(&mut self, _raw_index: usize, _d: &CircularDescriptor) -> f64 {
            self.start_angle
        }

        fn max_dist(&self, _raw_index: usize) -> Option<f64> {
            self.max_dist
        }

        fn max_error(&self, _raw_index: usize) -> f64 {
            self.accuracy
        }
    }

    fn consecutive_pairs(path: &ToolPath) -> Vec<(Point2, Point2)> {
        let mut pairs: Vec<_> = path.points.windows(2).map(|w| (w[0], w[1])).collect();
        if path.cyclic {
            pairs.push((path.points[path.points.len() - 1], path.points[0]));
        }
        pairs
    }

    #[test]
    fn circle_respects_sagitta_bound_and_start_angle() {
        let mut doc = Document::new();
        doc.add_circle(Point2::new(3.0, 4.0), 10.0, "0");
        let mut provider = FixedProvider::new(0.05);
        provider.start_angle = 90.0;

        let paths = sample_document(&doc, &mut provider).expect("sample");
        let path = &paths[0];
        assert!(path.cyclic && path.is_circle && path.curved);
        assert!(path.start().distance(Point2::new(3.0, 14.0)) < 1e-9);
        for (a, b) in consecutive_pairs(path) {
            let mid = a.lerp(b, 0.5);
            let deviation = 10.0 - mid.distance(Point2::new(3.0, 4.0));
            assert!(deviation <= 0.05 + 1e-9, "deviation {deviation}");
        }
        let descriptor = path.circular.expect("descriptor");
        assert!(descriptor.matches(&CircularDescriptor::circle(Point2::new(3.0, 4.0), 10.0), 1e-9));
    }

    #[test]
    fn max_dist_limits_spacing_and_none_leaves_line_alone() {
        let mut doc = Document::new();
        doc.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), "0");

        let mut provider = FixedProvider::new(0.5);
        provider.max_dist = Some(2.0);
        let limited = sample_document(&doc, &mut provider).expect("sample");
        assert_eq!(limited[0].points.len(), 6);
        assert!(
            limited[0]
                .points
                .windows(2)
                .all(|w| w[0].distance(w[1]) <= 2.0 + 1e-9)
        );

        provider.max_dist = None;
        let unlimited = sample_document(&doc, &mut provider).expect("sample");
        assert_eq!(unlimited[0].points.len(), 2);
    }

    #[test]
    fn densify_covers_closing_edge() {
        let square = [
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 4.0),
            Point2::new(0.0, 4.0),
        ];
        let dense = densify(0, &square, true, 1.0).expect("densify");
        assert_eq!(dense.len(), 16);
        assert_eq!(dense[0], square[0]);
        assert!(dense[dense.len() - 1].distance(Point2::new(0.0, 1.0)) < 1e-9);
    }

    #[test]
    fn bulge_span_becomes_semicircle() {
        let mut doc = Document::new();
        doc.add_polyline_with_vertices(
            [
                PolylineVertex::with_bulge(Point2::new(0.0, 0.0), 1.0),
                PolylineVertex::new(Point2::new(2.0, 0.0)),
            ],
            false,
            "0",
        );
        let paths = sample_document(&doc, &mut FixedProvider::new(0.01)).expect("sample");
        let path = &paths[0];
        assert!(path.curved && !path.cyclic);
        assert_eq!(path.start(), Point2::new(0.0, 0.0));
        assert_eq!(path.end(), Point2::new(2.0, 0.0));
        for point in &path.points {
            assert!((point.distance(Point2::new(1.0, 0.0)) - 1.0).abs() < 1e-9);
        }
        assert!(path.points.iter().any(|p| p.y() < -0.99), "ccw bulge passes below the chord");
    }

    #[test]
    fn closed_polyline_is_cyclic_without_repeated_start() {
        let mut doc = Document::new();
        doc.add_polyline(
            [
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(0.0, 0.0),
            ],
            true,
            "0",
        );
        let paths = sample_document(&doc, &mut FixedProvider::new(0.1)).expect("sample");
        assert!(paths[0].cyclic);
        assert!(!paths[0].curved);
        assert_eq!(paths[0].points.len(), 3);
    }

    #[test]
    fn closed_ellipse_counts_as_circular() {
        let mut doc = Document::new();
        doc.add_ellipse(Point2::new(0.0, 0.0), Vector2::new(4.0, 0.0), 0.5, 0.0, TAU, "0");
        let paths = sample_document(&doc, &mut FixedProvider::new(0.01)).expect("sample");
        let path = &paths[0];
        assert!(path.is_circle && path.cyclic);
        assert!(path.start().distance(Point2::new(4.0, 0.0)) < 1e-9);
        for (a, b) in consecutive_pairs(path) {
            let mid = a.lerp(b, 0.5);
            // 中点落在椭圆内侧，偏离不超过精度。
            let value = (mid.x() / 4.0).powi(2) + (mid.y() / 2.0).powi(2);
            assert!(value <= 1.0 + 1e-9);
            assert!(value > 0.98);
        }
    }

    #[test]
    fn clamped_spline_interpolates_end_controls() {
        let mut doc = Document::new();
        doc.add_entity(Entity::Spline(Spline {
            degree: 3,
            is_rational: false,
            is_closed: false,
            is_periodic: false,
            control_points: vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 2.0),
                Point2::new(3.0, 2.0),
                Point2::new(4.0, 0.0),
            ],
            fit_points: Vec::new(),
            knot_values: Vec::new(),
            weights: Vec::new(),
            start_tangent: None,
            end_tangent: None,
            layer: "0".to_string(),
        }));
        let paths = sample_document(&doc, &mut FixedProvider::new(0.01)).expect("sample");
        let path = &paths[0];
        assert!(path.start().distance(Point2::new(0.0, 0.0)) < 1e-9);
        assert!(path.end().distance(Point2::new(4.0, 0.0)) < 1e-9);
        // Bezier midpoint of this control polygon is (2, 1.5).
        assert!(
            path.points
                .iter()
                .any(|p| p.distance(Point2::new(2.0, 1.5)) < 0.05)
        );
    }

    #[test]
    fn degenerate_geometry_reports_entity_index() {
        let mut doc = Document::new();
        doc.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), "0");
        doc.add_circle(Point2::new(0.0, 0.0), 0.0, "0");
        let err = sample_document(&doc, &mut FixedProvider::new(0.1)).unwrap_err();
        assert!(matches!(err, EngineError::Geometry { index: 1, .. }));
    }

    #[test]
    fn non_finite_geometry_is_rejected() {
        let mut nan_line = Document::new();
        nan_line.add_line(Point2::new(f64::NAN, 0.0), Point2::new(1.0, 0.0), "0");
        let err = sample_document(&nan_line, &mut FixedProvider::new(0.5)).unwrap_err();
        assert!(matches!(err, EngineError::Geometry { index: 0, .. }));

        let mut infinite_circle = Document::new();
        infinite_circle.add_circle(Point2::new(0.0, 0.0), f64::INFINITY, "0");
        let err = sample_document(&infinite_circle, &mut FixedProvider::new(0.5)).unwrap_err();
        assert!(matches!(err, EngineError::Geometry { index: 0, .. }));
    }

    #[test]
    fn oversized_geometry_exceeds_point_budget() {
        let mut doc = Document::new();
        doc.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), "0");
        doc.add_circle(Point2::new(0.0, 0.0), 1e17, "0");
        let err = sample_document(&doc, &mut FixedProvider::new(0.5)).unwrap_err();
        assert!(matches!(err, EngineError::Geometry { index: 1, .. }));

        let long = [Point2::new(0.0, 0.0), Point2::new(1e9, 0.0)];
        assert!(matches!(
            densify(3, &long, false, 1e-3),
            Err(EngineError::Geometry { index: 3, .. })
        ));
        let huge = [Point2::new(-1e308, 0.0), Point2::new(1e308, 0.0)];
        assert!(densify(0, &huge, false, 1.0).is_err());
    }

    #[test]
    fn large_radius_keeps_a_positive_step() {
        // 1 - 0.5 / 1e16 在 f64 中舍入为 1。
        let step = arc_step(1e16, 0.5);
        assert!(step > 0.0);
        // 小角度时步长约为 2·sqrt(2·accuracy/radius)。
        assert!((step / 2e-8 - 1.0).abs() < 1e-6);
        assert!((arc_step(10.0, 0.05) - 2.0 * 0.995_f64.acos()).abs() < 1e-12);
    }
}
