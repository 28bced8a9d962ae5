use std::convert::TryFrom;
use std::fs;
use std::path::Path;

use thiserror::Error;
use zfig_core::{
    document::{
        Arc, Circle, Document, DrawingUnit, Ellipse, Entity, Line, Polyline, PolylineVertex,
        Spline,
    },
    geometry::{Point2, Vector2},
};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("failed to read file {path:?}")]
    ReadError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

/// 实体读取接口。导入流程只通过该 trait 获取原始实体，便于替换数据源。
pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DxfFacade;

impl DxfFacade {
    pub fn new() -> Self {
        Self
    }

    /// 直接解析内存中的 DXF 文本。
    pub fn parse_str(&self, source: &str) -> Result<Document, IoError> {
        let parser = DxfParser::new(source);
        parser.parse().map_err(|err| match err {
            DxfError::Unsupported { feature } => IoError::UnsupportedFeature(feature),
            DxfError::Invalid { message } => IoError::InvalidDocument(message),
        })
    }
}

impl DocumentLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_str(&data)
    }
}

#[derive(Debug)]
enum DxfError {
    Unsupported { feature: String },
    Invalid { message: String },
}

impl DxfError {
    fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported {
            feature: feature.into(),
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

struct DxfParser<'a> {
    reader: DxfReader<'a>,
}

impl<'a> DxfParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            reader: DxfReader::new(source),
        }
    }

    fn parse(mut self) -> Result<Document, DxfError> {
        let mut document = Document::new();
        while let Some((code, value)) = self.reader.next_pair()? {
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "意外的组码 {code}（期望 0 表示 SECTION/EOF）"
                )));
            }
            match value.as_str() {
                "SECTION" => {
                    let (name_code, name) = self
                        .reader
                        .next_pair()?
                        .ok_or_else(|| DxfError::invalid("SECTION 缺少名称（组码 2）"))?;
                    if name_code != 2 {
                        return Err(DxfError::invalid(format!(
                            "SECTION 名称使用了组码 {name_code}（期望 2）"
                        )));
                    }
                    match name.as_str() {
                        "HEADER" => self.parse_header(&mut document)?,
                        "ENTITIES" => self.parse_entities(&mut document)?,
                        _ => self.skip_section()?,
                    }
                }
                "EOF" => break,
                unexpected => {
                    return Err(DxfError::invalid(format!(
                        "意外的标记 {unexpected}，期望 SECTION 或 EOF"
                    )));
                }
            }
        }
        Ok(document)
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value == "ENDSEC" => break,
                Some(_) => continue,
                None => {
                    return Err(DxfError::invalid("SECTION 未找到 ENDSEC 终止标记"));
                }
            }
        }
        Ok(())
    }

    /// 头部段只关心 `$INSUNITS`，其余变量跳过。
    fn parse_header(&mut self, document: &mut Document) -> Result<(), DxfError> {
        let mut current_variable: Option<String> = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value == "ENDSEC" => break,
                Some((9, name)) => current_variable = Some(name.trim().to_string()),
                Some((70, value)) if current_variable.as_deref() == Some("$INSUNITS") => {
                    let code = parse_i32(&value, "HEADER $INSUNITS（组码 70）")?;
                    document.set_units(DrawingUnit::from_insunits(code));
                }
                Some(_) => continue,
                None => return Err(DxfError::invalid("HEADER 段未找到 ENDSEC 终止标记")),
            }
        }
        Ok(())
    }

    fn parse_entities(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some(pair) => pair,
                None => return Err(DxfError::invalid("ENTITIES 段提前结束")),
            };
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "ENTITIES 段遇到组码 {code}（期望 0 表示实体起始）"
                )));
            }

            match value.as_str() {
                "ENDSEC" => break,
                "POLYLINE" => {
                    if let Some(polyline) = self.parse_polyline_entity()? {
                        document.add_entity(polyline);
                    }
                }
                "LINE" | "CIRCLE" | "ARC" | "ELLIPSE" | "LWPOLYLINE" | "SPLINE" => {
                    let parsed = self.parse_entity(&value)?;
                    document.add_entity(parsed);
                }
                _ => {
                    // 文字、标注、块参照等不参与路径生成
                    self.skip_entity_body()?;
                }
            }
        }
        Ok(())
    }

    fn parse_entity(&mut self, kind: &str) -> Result<Entity, DxfError> {
        match kind {
            "LINE" => self.parse_line(),
            "CIRCLE" => self.parse_circle(),
            "ARC" => self.parse_arc(),
            "ELLIPSE" => self.parse_ellipse(),
            "LWPOLYLINE" => self.parse_lwpolyline(),
            "SPLINE" => self.parse_spline(),
            other => Err(DxfError::unsupported(format!("暂不支持的实体类型 {other}"))),
        }
    }

    fn parse_line(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut start_x = None;
        let mut start_y = None;
        let mut end_x = None;
        let mut end_y = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut start_x, &value, "LINE 起点 X（组码 10）")?,
                    20 => assign_coord(&mut start_y, &value, "LINE 起点 Y（组码 20）")?,
                    11 => assign_coord(&mut end_x, &value, "LINE 终点 X（组码 11）")?,
                    21 => assign_coord(&mut end_y, &value, "LINE 终点 Y（组码 21）")?,
                    30 | 31 => {} // 忽略 Z 坐标
                    _ => {}
                },
                None => return Err(DxfError::invalid("LINE 未正确结束")),
            }
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        let sx = start_x.ok_or_else(|| DxfError::invalid("LINE 缺少起点 X（组码 10）"))?;
        let sy = start_y.ok_or_else(|| DxfError::invalid("LINE 缺少起点 Y（组码 20）"))?;
        let ex = end_x.ok_or_else(|| DxfError::invalid("LINE 缺少终点 X（组码 11）"))?;
        let ey = end_y.ok_or_else(|| DxfError::invalid("LINE 缺少终点 Y（组码 21）"))?;

        Ok(Entity::Line(Line {
            start: Point2::new(sx, sy),
            end: Point2::new(ex, ey),
            layer,
        }))
    }

    fn parse_circle(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut center_x = None;
        let mut center_y = None;
        let mut radius = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut center_x, &value, "CIRCLE 圆心 X（组码 10）")?,
                    20 => assign_coord(&mut center_y, &value, "CIRCLE 圆心 Y（组码 20）")?,
                    40 => assign_coord(&mut radius, &value, "CIRCLE 半径（组码 40）")?,
                    _ => {}
                },
                None => return Err(DxfError::invalid("CIRCLE 未正确结束")),
            }
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        let cx = center_x.ok_or_else(|| DxfError::invalid("CIRCLE 缺少圆心 X（组码 10）"))?;
        let cy = center_y.ok_or_else(|| DxfError::invalid("CIRCLE 缺少圆心 Y（组码 20）"))?;
        let radius = radius.ok_or_else(|| DxfError::invalid("CIRCLE 缺少半径（组码 40）"))?;

        Ok(Entity::Circle(Circle {
            center: Point2::new(cx, cy),
            radius,
            layer,
        }))
    }

    fn parse_arc(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut center_x = None;
        let mut center_y = None;
        let mut radius = None;
        let mut start_angle = None;
        let mut end_angle = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut center_x, &value, "ARC 圆心 X（组码 10）")?,
                    20 => assign_coord(&mut center_y, &value, "ARC 圆心 Y（组码 20）")?,
                    40 => assign_coord(&mut radius, &value, "ARC 半径（组码 40）")?,
                    50 => assign_coord(&mut start_angle, &value, "ARC 起始角（组码 50）")?,
                    51 => assign_coord(&mut end_angle, &value, "ARC 终止角（组码 51）")?,
                    _ => {}
                },
                None => return Err(DxfError::invalid("ARC 未正确结束")),
            }
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        let cx = center_x.ok_or_else(|| DxfError::invalid("ARC 缺少圆心 X（组码 10）"))?;
        let cy = center_y.ok_or_else(|| DxfError::invalid("ARC 缺少圆心 Y（组码 20）"))?;
        let radius = radius.ok_or_else(|| DxfError::invalid("ARC 缺少半径（组码 40）"))?;
        let start_angle =
            start_angle.ok_or_else(|| DxfError::invalid("ARC 缺少起始角（组码 50）"))?;
        let end_angle = end_angle.ok_or_else(|| DxfError::invalid("ARC 缺少终止角（组码 51）"))?;

        Ok(Entity::Arc(Arc {
            center: Point2::new(cx, cy),
            radius,
            start_angle: start_angle.to_radians(),
            end_angle: end_angle.to_radians(),
            layer,
        }))
    }

    fn parse_ellipse(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut center_x = None;
        let mut center_y = None;
        let mut major_x = None;
        let mut major_y = None;
        let mut ratio = None;
        let mut start_parameter = 0.0;
        let mut end_parameter = std::f64::consts::TAU;

        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut center_x, &value, "ELLIPSE 圆心 X（组码 10）")?,
                    20 => assign_coord(&mut center_y, &value, "ELLIPSE 圆心 Y（组码 20）")?,
                    11 => assign_coord(&mut major_x, &value, "ELLIPSE 主轴向量 X（组码 11）")?,
                    21 => assign_coord(&mut major_y, &value, "ELLIPSE 主轴向量 Y（组码 21）")?,
                    40 => assign_coord(&mut ratio, &value, "ELLIPSE 半径比（组码 40）")?,
                    41 => start_parameter = parse_f64(&value, "ELLIPSE 起始参数")?,
                    42 => end_parameter = parse_f64(&value, "ELLIPSE 终止参数")?,
                    30 | 31 | 210 | 220 | 230 => {
                        // 忽略 Z 分量与法向量
                    }
                    _ => {}
                },
                None => return Err(DxfError::invalid("ELLIPSE 未正确结束")),
            }
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        let cx = center_x.ok_or_else(|| DxfError::invalid("ELLIPSE 缺少圆心 X（组码 10）"))?;
        let cy = center_y.ok_or_else(|| DxfError::invalid("ELLIPSE 缺少圆心 Y（组码 20）"))?;
        let major_x =
            major_x.ok_or_else(|| DxfError::invalid("ELLIPSE 缺少主轴向量 X（组码 11）"))?;
        let major_y =
            major_y.ok_or_else(|| DxfError::invalid("ELLIPSE 缺少主轴向量 Y（组码 21）"))?;

        if major_x.abs() < f64::EPSILON && major_y.abs() < f64::EPSILON {
            return Err(DxfError::invalid("ELLIPSE 主轴向量长度为 0，无法创建实体"));
        }

        let ratio = ratio.unwrap_or(1.0);
        if ratio <= 0.0 {
            return Err(DxfError::invalid(format!(
                "ELLIPSE 半径比必须为正数，实际为 {ratio}"
            )));
        }

        Ok(Entity::Ellipse(Ellipse {
            center: Point2::new(cx, cy),
            major_axis: Vector2::new(major_x, major_y),
            ratio,
            start_parameter,
            end_parameter,
            layer,
        }))
    }

    fn parse_lwpolyline(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut is_closed = false;
        let mut vertices: Vec<PolylineVertex> = Vec::new();
        let mut pending_x: Option<f64> = None;
        let mut pending_y: Option<f64> = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    70 => {
                        let flag = parse_i32(&value, "LWPOLYLINE 标志")?;
                        is_closed = flag & 0x01 == 0x01;
                    }
                    10 => {
                        let x = parse_f64(&value, "LWPOLYLINE 顶点 X")?;
                        if let Some(y) = pending_y.take() {
                            vertices.push(PolylineVertex::new(Point2::new(x, y)));
                        } else if pending_x.replace(x).is_some() {
                            return Err(DxfError::invalid(
                                "LWPOLYLINE 顶点缺少对应的 Y（组码 20）",
                            ));
                        }
                    }
                    20 => {
                        let y = parse_f64(&value, "LWPOLYLINE 顶点 Y")?;
                        if let Some(x) = pending_x.take() {
                            vertices.push(PolylineVertex::new(Point2::new(x, y)));
                        } else if pending_y.replace(y).is_some() {
                            return Err(DxfError::invalid(
                                "LWPOLYLINE 顶点缺少对应的 X（组码 10）",
                            ));
                        }
                    }
                    42 => {
                        let bulge = parse_f64(&value, "LWPOLYLINE 顶点 bulge")?;
                        let vertex = vertices.last_mut().ok_or_else(|| {
                            DxfError::invalid("LWPOLYLINE 在定义首个顶点前遇到 bulge（组码 42）")
                        })?;
                        vertex.bulge = bulge;
                    }
                    _ => {}
                },
                None => return Err(DxfError::invalid("LWPOLYLINE 未正确结束")),
            }
        }

        if pending_x.is_some() || pending_y.is_some() {
            return Err(DxfError::invalid(
                "LWPOLYLINE 顶点坐标成对出现（组码 10/20），检测到不完整的顶点",
            ));
        }

        if vertices.is_empty() {
            return Err(DxfError::invalid("LWPOLYLINE 未解析到任何顶点"));
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        Ok(Entity::Polyline(Polyline {
            vertices,
            is_closed,
            layer,
        }))
    }

    /// 旧式 POLYLINE：仅支持二维/三维折线，网格与多面体跳过后返回 `None`。
    fn parse_polyline_entity(&mut self) -> Result<Option<Entity>, DxfError> {
        let mut layer = None;
        let mut flags: i16 = 0;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    70 => flags = parse_i16(&value, "POLYLINE 标志（组码 70）")?,
                    _ => {}
                },
                None => return Err(DxfError::invalid("POLYLINE 未正确结束")),
            }
        }

        if flags & (0x10 | 0x40) != 0 {
            self.skip_polyline_sequence()?;
            return Ok(None);
        }

        let mut vertices = Vec::new();
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => match value.as_str() {
                    "VERTEX" => {
                        if let Some(vertex) = self.parse_vertex_record()? {
                            vertices.push(vertex);
                        }
                    }
                    "SEQEND" => {
                        self.skip_entity_body()?;
                        break;
                    }
                    _ => {
                        self.reader.put_back((0, value));
                        break;
                    }
                },
                Some(_) => continue,
                None => return Err(DxfError::invalid("POLYLINE 顶点序列未正确结束")),
            }
        }

        if vertices.is_empty() {
            return Err(DxfError::invalid("POLYLINE 未解析到任何顶点"));
        }

        Ok(Some(Entity::Polyline(Polyline {
            vertices,
            is_closed: flags & 0x01 != 0,
            layer: layer.unwrap_or_else(|| "0".to_string()),
        })))
    }

    fn parse_vertex_record(&mut self) -> Result<Option<PolylineVertex>, DxfError> {
        let mut x = None;
        let mut y = None;
        let mut bulge = 0.0;
        let mut flags: i16 = 0;

        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    10 => assign_coord(&mut x, &value, "VERTEX X（组码 10）")?,
                    20 => assign_coord(&mut y, &value, "VERTEX Y（组码 20）")?,
                    42 => bulge = parse_f64(&value, "VERTEX bulge（组码 42）")?,
                    70 => flags = parse_i16(&value, "VERTEX 标志（组码 70）")?,
                    _ => {}
                },
                None => return Err(DxfError::invalid("VERTEX 未正确结束")),
            }
        }

        // 样条拟合生成的控制框架顶点不属于实际轮廓
        if flags & 0x10 != 0 {
            return Ok(None);
        }

        let x = x.ok_or_else(|| DxfError::invalid("VERTEX 缺少 X（组码 10）"))?;
        let y = y.ok_or_else(|| DxfError::invalid("VERTEX 缺少 Y（组码 20）"))?;
        Ok(Some(PolylineVertex::with_bulge(Point2::new(x, y), bulge)))
    }

    fn skip_polyline_sequence(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => match value.as_str() {
                    "VERTEX" => self.skip_entity_body()?,
                    "SEQEND" => {
                        self.skip_entity_body()?;
                        break;
                    }
                    _ => {
                        self.reader.put_back((0, value));
                        break;
                    }
                },
                Some(_) => continue,
                None => break,
            }
        }
        Ok(())
    }

    fn parse_spline(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut flags: i16 = 0;
        let mut degree: Option<i16> = None;
        let mut knot_values: Vec<f64> = Vec::new();
        let mut weights: Vec<f64> = Vec::new();
        let mut control_points: Vec<Point2> = Vec::new();
        let mut fit_points: Vec<Point2> = Vec::new();
        let mut pending_control_x: Option<f64> = None;
        let mut pending_fit_x: Option<f64> = None;
        let mut pending_start_tangent_x: Option<f64> = None;
        let mut pending_end_tangent_x: Option<f64> = None;
        let mut start_tangent: Option<Vector2> = None;
        let mut end_tangent: Option<Vector2> = None;

        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    70 => {
                        flags = parse_i16(&value, "SPLINE 类型标志（组码 70）")?;
                    }
                    71 => {
                        degree = Some(parse_i16(&value, "SPLINE 阶数（组码 71）")?);
                    }
                    72 | 73 | 74 => {
                        // 节点/控制点/拟合点计数，仅用于校验，当前忽略
                        let _ = parse_i32(&value, "SPLINE 计数信息")?;
                    }
                    40 => {
                        knot_values.push(parse_f64(&value, "SPLINE 节点值（组码 40）")?);
                    }
                    41 => {
                        weights.push(parse_f64(&value, "SPLINE 权重（组码 41）")?);
                    }
                    10 => {
                        if pending_control_x
                            .replace(parse_f64(&value, "SPLINE 控制点 X（组码 10）")?)
                            .is_some()
                        {
                            return Err(DxfError::invalid(
                                "SPLINE 控制点 X（组码 10）在未提供 Y 之前重复出现",
                            ));
                        }
                    }
                    20 => {
                        let y = parse_f64(&value, "SPLINE 控制点 Y（组码 20）")?;
                        let x = pending_control_x.take().ok_or_else(|| {
                            DxfError::invalid("SPLINE 控制点 Y（组码 20）缺少对应的 X")
                        })?;
                        control_points.push(Point2::new(x, y));
                    }
                    11 => {
                        if pending_fit_x
                            .replace(parse_f64(&value, "SPLINE 拟合点 X（组码 11）")?)
                            .is_some()
                        {
                            return Err(DxfError::invalid(
                                "SPLINE 拟合点 X（组码 11）在未提供 Y 之前重复出现",
                            ));
                        }
                    }
                    21 => {
                        let y = parse_f64(&value, "SPLINE 拟合点 Y（组码 21）")?;
                        let x = pending_fit_x.take().ok_or_else(|| {
                            DxfError::invalid("SPLINE 拟合点 Y（组码 21）缺少对应的 X")
                        })?;
                        fit_points.push(Point2::new(x, y));
                    }
                    12 => {
                        if pending_start_tangent_x
                            .replace(parse_f64(&value, "SPLINE 起始切向量 X（组码 12）")?)
                            .is_some()
                        {
                            return Err(DxfError::invalid(
                                "SPLINE 起始切向量 X（组码 12）重复出现",
                            ));
                        }
                    }
                    22 => {
                        let y = parse_f64(&value, "SPLINE 起始切向量 Y（组码 22）")?;
                        let x = pending_start_tangent_x.take().ok_or_else(|| {
                            DxfError::invalid("SPLINE 起始切向量 Y（组码 22）缺少对应的 X")
                        })?;
                        start_tangent = Some(Vector2::new(x, y));
                    }
                    13 => {
                        if pending_end_tangent_x
                            .replace(parse_f64(&value, "SPLINE 终止切向量 X（组码 13）")?)
                            .is_some()
                        {
                            return Err(DxfError::invalid(
                                "SPLINE 终止切向量 X（组码 13）重复出现",
                            ));
                        }
                    }
                    23 => {
                        let y = parse_f64(&value, "SPLINE 终止切向量 Y（组码 23）")?;
                        let x = pending_end_tangent_x.take().ok_or_else(|| {
                            DxfError::invalid("SPLINE 终止切向量 Y（组码 23）缺少对应的 X")
                        })?;
                        end_tangent = Some(Vector2::new(x, y));
                    }
                    _ => {}
                },
                None => return Err(DxfError::invalid("SPLINE 未正确结束")),
            }
        }

        if let Some(x) = pending_control_x.take() {
            return Err(DxfError::invalid(format!(
                "SPLINE 控制点 X={x} 缺少对应的 Y（组码 20）"
            )));
        }
        if let Some(x) = pending_fit_x.take() {
            return Err(DxfError::invalid(format!(
                "SPLINE 拟合点 X={x} 缺少对应的 Y（组码 21）"
            )));
        }
        if let Some(x) = pending_start_tangent_x.take() {
            return Err(DxfError::invalid(format!(
                "SPLINE 起始切向量 X={x} 缺少对应的 Y（组码 22）"
            )));
        }
        if let Some(x) = pending_end_tangent_x.take() {
            return Err(DxfError::invalid(format!(
                "SPLINE 终止切向量 X={x} 缺少对应的 Y（组码 23）"
            )));
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        let degree = degree.ok_or_else(|| DxfError::invalid("SPLINE 缺少阶数（组码 71）"))? as i32;

        Ok(Entity::Spline(Spline {
            degree,
            is_rational: flags & 0x04 != 0,
            is_closed: flags & 0x01 != 0,
            is_periodic: flags & 0x02 != 0,
            control_points,
            fit_points,
            knot_values,
            weights,
            start_tangent,
            end_tangent,
            layer,
        }))
    }

    fn skip_entity_body(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some(_) => continue,
                None => break,
            }
        }
        Ok(())
    }
}

struct DxfReader<'a> {
    lines: std::str::Lines<'a>,
    buffer: Option<(i32, String)>,
    line_number: usize,
}

impl<'a> DxfReader<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines(),
            buffer: None,
            line_number: 0,
        }
    }

    fn next_pair(&mut self) -> Result<Option<(i32, String)>, DxfError> {
        if let Some(pair) = self.buffer.take() {
            return Ok(Some(pair));
        }

        let code_line = loop {
            match self.lines.next() {
                Some(line) => {
                    self.line_number += 1;
                    // 文件末尾常带有空行
                    if line.trim().is_empty() {
                        continue;
                    }
                    break line;
                }
                None => return Ok(None),
            }
        };

        let value_line = match self.lines.next() {
            Some(line) => {
                self.line_number += 1;
                line
            }
            None => {
                return Err(DxfError::invalid(format!(
                    "文件在第 {} 行结束，缺少与组码对应的值行",
                    self.line_number
                )));
            }
        };

        let code = code_line.trim().parse::<i32>().map_err(|_| {
            DxfError::invalid(format!(
                "第 {} 行的组码 \"{}\" 无法解析为整数",
                self.line_number - 1,
                code_line.trim()
            ))
        })?;
        let value = value_line.trim().to_string();
        Ok(Some((code, value)))
    }

    fn put_back(&mut self, pair: (i32, String)) {
        debug_assert!(self.buffer.is_none(), "DXF pair 只能回退一次");
        self.buffer = Some(pair);
    }
}

fn assign_coord(slot: &mut Option<f64>, raw: &str, context: &str) -> Result<(), DxfError> {
    if slot.is_some() {
        return Err(DxfError::invalid(format!("{context} 出现重复值")));
    }
    *slot = Some(parse_f64(raw, context)?);
    Ok(())
}

fn parse_f64(raw: &str, context: &str) -> Result<f64, DxfError> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DxfError::invalid(format!("{context} 不是有限数值（值：\"{raw}\"）")))
    }
}

fn parse_i32(raw: &str, context: &str) -> Result<i32, DxfError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i16(raw: &str, context: &str) -> Result<i16, DxfError> {
    let value = parse_i32(raw, context)?;
    i16::try_from(value)
        .map_err(|_| DxfError::invalid(format!("{context} 超出 i16 范围（值：{value}）")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_skips_blank_lines_and_reports_bad_codes() {
        let mut reader = DxfReader::new("\n  0\nSECTION\n");
        assert_eq!(
            reader.next_pair().expect("pair"),
            Some((0, "SECTION".to_string()))
        );
        assert!(reader.next_pair().expect("eof").is_none());

        let mut broken = DxfReader::new("abc\nLINE\n");
        assert!(matches!(
            broken.next_pair(),
            Err(DxfError::Invalid { .. })
        ));
    }

    #[test]
    fn header_without_insunits_leaves_units_empty() {
        let source = "0\nSECTION\n2\nHEADER\n9\n$ACADVER\n1\nAC1015\n0\nENDSEC\n0\nEOF\n";
        let doc = DxfFacade::new().parse_str(source).expect("parse header");
        assert!(doc.units().is_none());
        assert_eq!(doc.entity_count(), 0);
    }

    #[test]
    fn unknown_entities_are_skipped() {
        let source = "0\nSECTION\n2\nENTITIES\n0\nTEXT\n8\n0\n10\n1.0\n20\n2.0\n1\nhello\n0\nLINE\n10\n0\n20\n0\n11\n1\n21\n0\n0\nENDSEC\n0\nEOF\n";
        let doc = DxfFacade::new().parse_str(source).expect("parse entities");
        assert_eq!(doc.entity_count(), 1);
        let (_, entity) = doc.entities().next().expect("line entity");
        assert_eq!(entity.kind(), "LINE");
    }

    #[test]
    fn duplicate_coordinate_is_invalid() {
        let source = "0\nSECTION\n2\nENTITIES\n0\nCIRCLE\n10\n0\n10\n1\n20\n0\n40\n1\n0\nENDSEC\n0\nEOF\n";
        let err = DxfFacade::new().parse_str(source).unwrap_err();
        assert!(matches!(err, IoError::InvalidDocument(_)));
    }

    #[test]
    fn non_finite_numbers_are_invalid() {
        for (x, y, radius) in [("0", "0", "inf"), ("nan", "0", "1"), ("0", "-infinity", "1")] {
            let source = format!(
                "0\nSECTION\n2\nENTITIES\n0\nCIRCLE\n10\n{x}\n20\n{y}\n40\n{radius}\n0\nENDSEC\n0\nEOF\n"
            );
            let err = DxfFacade::new().parse_str(&source).unwrap_err();
            assert!(matches!(err, IoError::InvalidDocument(_)), "({x}, {y}) r={radius}");
        }
    }
}
