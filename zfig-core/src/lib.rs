pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn distance(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn distance_squared(self, other: Point2) -> f64 {
            self.0.distance_squared(other.0)
        }

        /// 以原点为基准缩放坐标，用于单位换算。
        #[inline]
        pub fn scale(self, factor: f64) -> Self {
            Self(self.0 * factor)
        }

        /// 在两点之间线性插值，`t` 取 0 返回自身，取 1 返回 `other`。
        #[inline]
        pub fn lerp(self, other: Point2, t: f64) -> Self {
            Self(self.0.lerp(other.0, t))
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn scale(self, factor: f64) -> Self {
            Self(self.0 * factor)
        }

        /// 逆时针旋转 90°。
        #[inline]
        pub fn perp(self) -> Self {
            Self(self.0.perp())
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        /// 由一组点构建边界框，点集为空时返回 `None`。
        pub fn from_points<I>(points: I) -> Option<Self>
        where
            I: IntoIterator<Item = Point2>,
        {
            let mut bounds = Self::empty();
            for point in points {
                bounds.include_point(point);
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.max.x() - self.min.x()
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.max.y() - self.min.y()
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let min_vec = self.min.as_vec2();
            let max_vec = self.max.as_vec2();
            let center = (min_vec + max_vec) * 0.5;
            Point2::from_vec(center)
        }
    }

    /// 圆与闭合椭圆的规范描述：圆心加两条半轴向量。
    ///
    /// 圆的主轴取 `(r, 0)`、次轴取 `(0, r)`；椭圆的次轴为主轴逆时针旋转 90° 后按半径比缩放。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct CircularDescriptor {
        pub center: Point2,
        pub minor_axis: Vector2,
        pub major_axis: Vector2,
    }

    impl CircularDescriptor {
        pub fn circle(center: Point2, radius: f64) -> Self {
            let radius = radius.abs();
            Self {
                center,
                minor_axis: Vector2::new(0.0, radius),
                major_axis: Vector2::new(radius, 0.0),
            }
        }

        pub fn ellipse(center: Point2, major_axis: Vector2, ratio: f64) -> Self {
            Self {
                center,
                minor_axis: major_axis.perp().scale(ratio.abs()),
                major_axis,
            }
        }

        /// 判定两个描述是否表示同一形状。轴向量与其反向视为相同。
        pub fn matches(&self, other: &CircularDescriptor, tolerance: f64) -> bool {
            self.center.distance(other.center) <= tolerance
                && axis_distance(self.major_axis, other.major_axis) <= tolerance
                && axis_distance(self.minor_axis, other.minor_axis) <= tolerance
        }

        pub fn scaled(&self, factor: f64) -> Self {
            Self {
                center: self.center.scale(factor),
                minor_axis: self.minor_axis.scale(factor),
                major_axis: self.major_axis.scale(factor),
            }
        }
    }

    fn axis_distance(a: Vector2, b: Vector2) -> f64 {
        let same = (a.as_vec2() - b.as_vec2()).length();
        let flipped = (a.as_vec2() + b.as_vec2()).length();
        same.min(flipped)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn bounds_from_points_tracks_extent() {
            let bounds = Bounds2D::from_points([
                Point2::new(-1.0, -1.0),
                Point2::new(3.0, 5.0),
                Point2::new(0.5, 2.0),
            ])
            .expect("non-empty bounds");
            assert_eq!(bounds.width(), 4.0);
            assert_eq!(bounds.height(), 6.0);
            assert_eq!(bounds.center(), Point2::new(1.0, 2.0));
            assert!(Bounds2D::from_points(std::iter::empty()).is_none());
        }

        #[test]
        fn descriptor_matching_ignores_axis_sign() {
            let a = CircularDescriptor::ellipse(Point2::new(0.0, 0.0), Vector2::new(4.0, 0.0), 0.5);
            let b =
                CircularDescriptor::ellipse(Point2::new(0.01, 0.0), Vector2::new(-4.0, 0.0), 0.5);
            assert!(a.matches(&b, 0.1));
            assert!(!a.matches(&b, 0.001));

            let circle = CircularDescriptor::circle(Point2::new(0.0, 0.0), 2.0);
            let bigger = CircularDescriptor::circle(Point2::new(0.0, 0.0), 3.0);
            assert!(!circle.matches(&bigger, 0.5));
        }
    }
}

pub mod document {
    use std::f64::consts::TAU;

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Point2, Vector2};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    /// 图纸声明的长度单位，对应 DXF 头部变量 `$INSUNITS`。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum DrawingUnit {
        Inch,
        Foot,
        Millimeter,
        Centimeter,
        Meter,
    }

    impl DrawingUnit {
        /// 将 `$INSUNITS` 代码映射为单位；0（无单位）及未支持的代码返回 `None`。
        pub fn from_insunits(code: i32) -> Option<Self> {
            match code {
                1 => Some(Self::Inch),
                2 => Some(Self::Foot),
                4 => Some(Self::Millimeter),
                5 => Some(Self::Centimeter),
                6 => Some(Self::Meter),
                _ => None,
            }
        }

        /// 一个图纸单位对应的毫米数。
        pub fn millimeters(self) -> f64 {
            match self {
                Self::Inch => 25.4,
                Self::Foot => 304.8,
                Self::Millimeter => 1.0,
                Self::Centimeter => 10.0,
                Self::Meter => 1000.0,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum Entity {
        Line(Line),
        Circle(Circle),
        Arc(Arc),
        Ellipse(Ellipse),
        Polyline(Polyline),
        Spline(Spline),
    }

    impl Entity {
        /// 实体类型名称，用于日志与错误信息。
        pub fn kind(&self) -> &'static str {
            match self {
                Entity::Line(_) => "LINE",
                Entity::Circle(_) => "CIRCLE",
                Entity::Arc(_) => "ARC",
                Entity::Ellipse(_) => "ELLIPSE",
                Entity::Polyline(_) => "POLYLINE",
                Entity::Spline(_) => "SPLINE",
            }
        }

        /// 全部坐标、长度、角度与权重均为有限值。
        pub fn is_finite(&self) -> bool {
            let point = |p: &Point2| p.as_vec2().is_finite();
            match self {
                Entity::Line(line) => point(&line.start) && point(&line.end),
                Entity::Circle(circle) => point(&circle.center) && circle.radius.is_finite(),
                Entity::Arc(arc) => {
                    point(&arc.center)
                        && [arc.radius, arc.start_angle, arc.end_angle]
                            .iter()
                            .all(|value| value.is_finite())
                }
                Entity::Ellipse(ellipse) => {
                    point(&ellipse.center)
                        && ellipse.major_axis.as_vec2().is_finite()
                        && [ellipse.ratio, ellipse.start_parameter, ellipse.end_parameter]
                            .iter()
                            .all(|value| value.is_finite())
                }
                Entity::Polyline(polyline) => polyline
                    .vertices
                    .iter()
                    .all(|vertex| point(&vertex.position) && vertex.bulge.is_finite()),
                Entity::Spline(spline) => {
                    spline
                        .control_points
                        .iter()
                        .chain(&spline.fit_points)
                        .all(point)
                        && spline
                            .knot_values
                            .iter()
                            .chain(&spline.weights)
                            .all(|value| value.is_finite())
                }
            }
        }

        /// 以原点为基准等比缩放实体，角度、半径比与 bulge 不受影响。
        pub fn scaled(&self, factor: f64) -> Entity {
            match self {
                Entity::Line(line) => Entity::Line(Line {
                    start: line.start.scale(factor),
                    end: line.end.scale(factor),
                    layer: line.layer.clone(),
                }),
                Entity::Circle(circle) => Entity::Circle(Circle {
                    center: circle.center.scale(factor),
                    radius: circle.radius * factor,
                    layer: circle.layer.clone(),
                }),
                Entity::Arc(arc) => Entity::Arc(Arc {
                    center: arc.center.scale(factor),
                    radius: arc.radius * factor,
                    ..arc.clone()
                }),
                Entity::Ellipse(ellipse) => Entity::Ellipse(Ellipse {
                    center: ellipse.center.scale(factor),
                    major_axis: ellipse.major_axis.scale(factor),
                    ..ellipse.clone()
                }),
                Entity::Polyline(polyline) => Entity::Polyline(Polyline {
                    vertices: polyline
                        .vertices
                        .iter()
                        .map(|vertex| {
                            PolylineVertex::with_bulge(vertex.position.scale(factor), vertex.bulge)
                        })
                        .collect(),
                    is_closed: polyline.is_closed,
                    layer: polyline.layer.clone(),
                }),
                Entity::Spline(spline) => Entity::Spline(Spline {
                    control_points: spline
                        .control_points
                        .iter()
                        .map(|point| point.scale(factor))
                        .collect(),
                    fit_points: spline
                        .fit_points
                        .iter()
                        .map(|point| point.scale(factor))
                        .collect(),
                    start_tangent: spline.start_tangent.map(|t| t.scale(factor)),
                    end_tangent: spline.end_tangent.map(|t| t.scale(factor)),
                    ..spline.clone()
                }),
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point2,
        pub radius: f64,
        pub layer: String,
    }

    /// 圆弧实体，角度以弧度形式储存，遵循数学正方向。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
        pub layer: String,
    }

    /// 椭圆实体，记录主轴向量与参数范围（单位为弧度）。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Ellipse {
        pub center: Point2,
        pub major_axis: Vector2,
        pub ratio: f64,
        pub start_parameter: f64,
        pub end_parameter: f64,
        pub layer: String,
    }

    impl Ellipse {
        /// 参数范围覆盖整圈时视为闭合椭圆。
        pub fn is_closed(&self) -> bool {
            let span = (self.end_parameter - self.start_parameter).abs();
            span < 1e-9 || (span - TAU).abs() < 1e-9
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<PolylineVertex>,
        pub is_closed: bool,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Spline {
        pub degree: i32,
        pub is_rational: bool,
        pub is_closed: bool,
        pub is_periodic: bool,
        pub control_points: Vec<Point2>,
        pub fit_points: Vec<Point2>,
        pub knot_values: Vec<f64>,
        pub weights: Vec<f64>,
        pub start_tangent: Option<Vector2>,
        pub end_tangent: Option<Vector2>,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PolylineVertex {
        pub position: Point2,
        pub bulge: f64,
    }

    impl PolylineVertex {
        #[inline]
        pub fn new(position: Point2) -> Self {
            Self {
                position,
                bulge: 0.0,
            }
        }

        #[inline]
        pub fn with_bulge(position: Point2, bulge: f64) -> Self {
            Self { position, bulge }
        }
    }

    /// 读取器产出的原始实体集合，按文件中的出现顺序保存。
    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Document {
        entities: Vec<(EntityId, Entity)>,
        next_entity_id: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        units: Option<DrawingUnit>,
    }

    impl Document {
        pub fn new() -> Self {
            Self::default()
        }

        #[inline]
        pub fn units(&self) -> Option<DrawingUnit> {
            self.units
        }

        #[inline]
        pub fn set_units(&mut self, units: Option<DrawingUnit>) {
            self.units = units;
        }

        pub fn add_line(
            &mut self,
            start: Point2,
            end: Point2,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            let id = self.next_id();
            self.entities
                .push((id, Entity::Line(Line { start, end, layer })));
            id
        }

        pub fn add_circle(
            &mut self,
            center: Point2,
            radius: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            let id = self.next_id();
            self.entities.push((
                id,
                Entity::Circle(Circle {
                    center,
                    radius,
                    layer,
                }),
            ));
            id
        }

        pub fn add_arc(
            &mut self,
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            let id = self.next_id();
            self.entities.push((
                id,
                Entity::Arc(Arc {
                    center,
                    radius,
                    start_angle,
                    end_angle,
                    layer,
                }),
            ));
            id
        }

        pub fn add_ellipse(
            &mut self,
            center: Point2,
            major_axis: Vector2,
            ratio: f64,
            start_parameter: f64,
            end_parameter: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            let id = self.next_id();
            self.entities.push((
                id,
                Entity::Ellipse(Ellipse {
                    center,
                    major_axis,
                    ratio,
                    start_parameter,
                    end_parameter,
                    layer,
                }),
            ));
            id
        }

        pub fn add_polyline<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = Point2>,
        {
            let collected = vertices
                .into_iter()
                .map(PolylineVertex::new)
                .collect::<Vec<_>>();
            self.add_polyline_with_vertices(collected, is_closed, layer)
        }

        pub fn add_polyline_with_vertices<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = PolylineVertex>,
        {
            let layer = layer.into();
            let collected: Vec<PolylineVertex> = vertices.into_iter().collect();
            let id = self.next_id();
            self.entities.push((
                id,
                Entity::Polyline(Polyline {
                    vertices: collected,
                    is_closed,
                    layer,
                }),
            ));
            id
        }

        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            let id = self.next_id();
            self.entities.push((id, entity));
            id
        }

        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
            self.entities.iter()
        }

        #[inline]
        pub fn entity_count(&self) -> usize {
            self.entities.len()
        }

        /// 返回所有实体等比缩放后的新文档，实体 ID 保持不变。
        pub fn scaled(&self, factor: f64) -> Document {
            Document {
                entities: self
                    .entities
                    .iter()
                    .map(|(id, entity)| (*id, entity.scaled(factor)))
                    .collect(),
                next_entity_id: self.next_entity_id,
                units: self.units,
            }
        }

        #[inline]
        fn next_id(&mut self) -> EntityId {
            let id = self.next_entity_id;
            self.next_entity_id += 1;
            EntityId(id)
        }
    }

    pub fn normalize_angle(angle: f64) -> f64 {
        let mut result = angle % TAU;
        if result < 0.0 {
            result += TAU;
        }
        result
    }

    /// 将起止角规范化为 `start ∈ [0, 2π)`、`end > start` 的区间，起止重合视为整圆。
    pub fn canonical_interval(start: f64, end: f64) -> (f64, f64) {
        let start = normalize_angle(start);
        let mut end = normalize_angle(end);
        if (end - start).abs() < 1e-9 {
            end = start + TAU;
        } else if end < start {
            end += TAU;
        }
        (start, end)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::geometry::{Point2, Vector2};
        use std::f64::consts::{FRAC_PI_2, PI};

        #[test]
        fn scaling_converts_lengths_but_keeps_angles() {
            let mut doc = Document::new();
            doc.set_units(Some(DrawingUnit::Inch));
            let arc_id = doc.add_arc(Point2::new(1.0, 2.0), 0.5, 0.0, FRAC_PI_2, "0");
            let factor = DrawingUnit::Inch.millimeters();
            let scaled = doc.scaled(factor);

            assert_eq!(scaled.units(), Some(DrawingUnit::Inch));
            let (id, entity) = scaled.entities().next().expect("scaled arc");
            assert_eq!(*id, arc_id);
            match entity {
                Entity::Arc(arc) => {
                    assert!((arc.center.x() - 25.4).abs() < 1e-9);
                    assert!((arc.center.y() - 50.8).abs() < 1e-9);
                    assert!((arc.radius - 12.7).abs() < 1e-9);
                    assert!((arc.end_angle - FRAC_PI_2).abs() < 1e-12);
                }
                other => panic!("unexpected entity lookup result: {other:?}"),
            }
        }

        #[test]
        fn non_finite_values_are_detected() {
            let mut doc = Document::new();
            doc.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), "0");
            doc.add_circle(Point2::new(0.0, 0.0), f64::INFINITY, "0");
            doc.add_polyline_with_vertices(
                [
                    PolylineVertex::new(Point2::new(0.0, 0.0)),
                    PolylineVertex::with_bulge(Point2::new(1.0, 0.0), f64::NAN),
                ],
                false,
                "0",
            );
            let finite: Vec<bool> = doc.entities().map(|(_, entity)| entity.is_finite()).collect();
            assert_eq!(finite, vec![true, false, false]);
        }

        #[test]
        fn insunits_codes_map_to_units() {
            assert_eq!(DrawingUnit::from_insunits(4), Some(DrawingUnit::Millimeter));
            assert_eq!(DrawingUnit::from_insunits(1), Some(DrawingUnit::Inch));
            assert_eq!(DrawingUnit::from_insunits(0), None);
            assert_eq!(DrawingUnit::from_insunits(42), None);
            assert!((DrawingUnit::Centimeter.millimeters() - 10.0).abs() < f64::EPSILON);
        }

        #[test]
        fn full_parameter_range_marks_closed_ellipse() {
            let closed = Ellipse {
                center: Point2::new(0.0, 0.0),
                major_axis: Vector2::new(2.0, 0.0),
                ratio: 0.5,
                start_parameter: 0.0,
                end_parameter: std::f64::consts::TAU,
                layer: "0".to_string(),
            };
            assert!(closed.is_closed());
            let open = Ellipse {
                end_parameter: PI,
                ..closed
            };
            assert!(!open.is_closed());
        }
    }
}
