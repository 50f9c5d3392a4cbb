//! 元素标识和定义
//!
//! 元素是带身份的几何图元。多段线与矩形拥有一组线段/圆弧子元素，
//! 子元素通过 `group_id` 指向所属元素（按 ID 查找，而非嵌入引用），
//! 因此空间索引可以独立地增删子元素条目。

use crate::error::{KernelError, Result};
use crate::geometry::{Arc, Circle, Line};
use crate::math::{points_equal, BoundingBox2, Point2, Vector2, EPSILON, TAU};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// 全局元素ID生成器
static ELEMENT_COUNTER: AtomicU64 = AtomicU64::new(1);

/// 元素唯一标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(u64);

impl ElementId {
    /// 创建新的元素ID
    pub fn new() -> Self {
        Self(ELEMENT_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 选择/捕捉点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointType {
    /// 端点（含圆的象限点、多段线顶点）
    EndPoint,
    /// 中点
    MidPoint,
    /// 圆心
    Center,
}

/// 可平移、旋转
pub trait Movable {
    fn translate(&mut self, offset: &Vector2);
    fn rotate_about(&mut self, pivot: &Point2, angle: f64);
}

/// 可计算包围盒
pub trait Boundable {
    fn bounding_box(&self) -> BoundingBox2;
}

/// 拥有可拾取的特征点
pub trait PointOwning {
    /// 端点、中点、圆心等特征点
    fn selection_points(&self) -> Vec<(Point2, PointType)>;

    /// 拖动特征点；返回是否发生了改变
    fn drag_point(&mut self, point_type: PointType, from: &Point2, to: &Point2) -> bool;
}

/// 多段线：有序的线段/圆弧子元素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    segments: Vec<Element>,
}

/// 元素几何类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElementKind {
    Line(Line),
    Arc(Arc),
    Circle(Circle),
    Polyline(Polyline),
    /// 矩形：闭合的四段多段线
    Rectangle(Polyline),
}

/// 元素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    id: ElementId,
    group_id: Option<ElementId>,
    kind: ElementKind,
}

impl ElementKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ElementKind::Line(_) => "Line",
            ElementKind::Arc(_) => "Arc",
            ElementKind::Circle(_) => "Circle",
            ElementKind::Polyline(_) => "Polyline",
            ElementKind::Rectangle(_) => "Rectangle",
        }
    }

    /// 几何端点（线段、圆弧）
    pub fn endpoints(&self) -> Option<(Point2, Point2)> {
        match self {
            ElementKind::Line(line) => Some((line.start, line.end)),
            ElementKind::Arc(arc) => Some((arc.start_point(), arc.end_point())),
            _ => None,
        }
    }

    /// 沿路径方向的长度
    pub fn path_length(&self) -> f64 {
        match self {
            ElementKind::Line(line) => line.length(),
            ElementKind::Arc(arc) => arc.length(),
            ElementKind::Circle(circle) => circle.circumference(),
            ElementKind::Polyline(pl) | ElementKind::Rectangle(pl) => pl.length(),
        }
    }

    /// 线段/圆弧上的点距路径起点的距离；`reversed` 表示沿几何终点→起点行进
    pub fn path_distance(&self, point: &Point2, reversed: bool) -> f64 {
        let len = self.path_length();
        let forward = match self {
            ElementKind::Line(line) => line.distance_from_start(point).clamp(0.0, len),
            ElementKind::Arc(arc) => {
                let sweep = arc.sweep_angle();
                let mut angle = arc.angular_distance(point);
                if angle > sweep {
                    // 超出弧范围时归到较近的端点
                    angle = if angle > sweep + (TAU - sweep) / 2.0 { 0.0 } else { sweep };
                }
                angle * arc.radius
            }
            _ => 0.0,
        };
        if reversed {
            len - forward
        } else {
            forward
        }
    }

    /// 路径距离 `distance` 处的点
    pub fn point_at_path_distance(&self, distance: f64, reversed: bool) -> Option<Point2> {
        let len = self.path_length();
        let d = if reversed { len - distance } else { distance };
        match self {
            ElementKind::Line(line) => Some(line.point_at_distance(d)),
            ElementKind::Arc(arc) => Some(arc.point_at_angular_distance(d / arc.radius)),
            _ => None,
        }
    }

    /// 截取路径距离 `[from, to]` 之间的一段，结果沿路径方向
    pub fn clip(&self, reversed: bool, from: f64, to: f64) -> Option<ElementKind> {
        let len = self.path_length();
        let from = from.clamp(0.0, len);
        let to = to.clamp(0.0, len);
        if to - from < EPSILON {
            return None;
        }
        let (g0, g1) = if reversed {
            (len - to, len - from)
        } else {
            (from, to)
        };
        match self {
            ElementKind::Line(line) => {
                let a = line.point_at_distance(g0);
                let b = line.point_at_distance(g1);
                Some(ElementKind::Line(if reversed {
                    Line::new(b, a)
                } else {
                    Line::new(a, b)
                }))
            }
            ElementKind::Arc(arc) => Some(ElementKind::Arc(Arc::new(
                arc.center,
                arc.radius,
                arc.start_angle + g0 / arc.radius,
                arc.start_angle + g1 / arc.radius,
            ))),
            _ => None,
        }
    }

    fn check_defined(&self) -> Result<()> {
        match self {
            ElementKind::Line(line) => {
                if line.length() < EPSILON {
                    return Err(KernelError::degenerate("zero-length line"));
                }
            }
            ElementKind::Arc(arc) => {
                if arc.radius < EPSILON {
                    return Err(KernelError::degenerate("zero-radius arc"));
                }
                let sweep = arc.sweep_angle();
                if sweep < EPSILON || sweep > TAU - EPSILON {
                    return Err(KernelError::degenerate("arc with empty sweep"));
                }
            }
            ElementKind::Circle(circle) => {
                if circle.radius < EPSILON {
                    return Err(KernelError::degenerate("zero-radius circle"));
                }
            }
            ElementKind::Polyline(pl) | ElementKind::Rectangle(pl) => {
                if pl.segments.is_empty() {
                    return Err(KernelError::degenerate("polyline without segments"));
                }
                for seg in &pl.segments {
                    match seg.kind {
                        ElementKind::Line(_) | ElementKind::Arc(_) => seg.kind.check_defined()?,
                        _ => {
                            return Err(KernelError::invalid(
                                "polyline segments must be lines or arcs",
                            ))
                        }
                    }
                }
                if !pl.is_contiguous() {
                    return Err(KernelError::degenerate("polyline segments are not connected"));
                }
            }
        }
        Ok(())
    }
}

impl Polyline {
    /// 由子元素创建（子元素的 group_id 在 [`Element::new`] 中统一设置）
    pub fn new(segments: Vec<Element>) -> Self {
        Self { segments }
    }

    /// 由几何片段创建，为每段分配新ID
    pub fn from_kinds(kinds: impl IntoIterator<Item = ElementKind>) -> Self {
        Self {
            segments: kinds.into_iter().map(Element::raw).collect(),
        }
    }

    /// 从点列表创建（所有顶点直线连接）
    pub fn from_points(points: &[Point2], closed: bool) -> Self {
        let mut kinds: Vec<ElementKind> = points
            .windows(2)
            .map(|w| ElementKind::Line(Line::new(w[0], w[1])))
            .collect();
        if closed && points.len() > 2 {
            if let (Some(first), Some(last)) = (points.first(), points.last()) {
                if !points_equal(first, last) {
                    kinds.push(ElementKind::Line(Line::new(*last, *first)));
                }
            }
        }
        Self::from_kinds(kinds)
    }

    pub fn segments(&self) -> &[Element] {
        &self.segments
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// 每段的行进方向：`true` 表示沿几何终点→起点
    pub fn orientations(&self) -> Vec<bool> {
        let n = self.segments.len();
        let mut flags = Vec::with_capacity(n);
        let Some((s0, e0)) = self.segments.first().and_then(|s| s.kind.endpoints()) else {
            return flags;
        };

        let first_reversed = match self.segments.get(1).and_then(|s| s.kind.endpoints()) {
            Some((s1, e1)) => {
                let end_connects = points_equal(&e0, &s1) || points_equal(&e0, &e1);
                let start_connects = points_equal(&s0, &s1) || points_equal(&s0, &e1);
                !end_connects && start_connects
            }
            None => false,
        };
        flags.push(first_reversed);
        let mut cursor = if first_reversed { s0 } else { e0 };

        for seg in &self.segments[1..] {
            let (s, e) = seg.kind.endpoints().unwrap_or((cursor, cursor));
            let reversed = !points_equal(&s, &cursor) && points_equal(&e, &cursor);
            flags.push(reversed);
            cursor = if reversed { s } else { e };
        }
        flags
    }

    /// 相邻子元素首尾相接
    fn is_contiguous(&self) -> bool {
        let flags = self.orientations();
        let mut cursor: Option<Point2> = None;
        for (seg, reversed) in self.segments.iter().zip(flags) {
            let Some((s, e)) = seg.kind.endpoints() else {
                return false;
            };
            let (entry, exit) = if reversed { (e, s) } else { (s, e) };
            if let Some(c) = cursor {
                if !points_equal(&c, &entry) {
                    return false;
                }
            }
            cursor = Some(exit);
        }
        true
    }

    /// 按路径顺序的顶点（闭合时首尾重复）
    pub fn vertices(&self) -> Vec<Point2> {
        let mut points = Vec::with_capacity(self.segments.len() + 1);
        for (seg, reversed) in self.segments.iter().zip(self.orientations()) {
            if let Some((s, e)) = seg.kind.endpoints() {
                let (entry, exit) = if reversed { (e, s) } else { (s, e) };
                if points.is_empty() {
                    points.push(entry);
                }
                points.push(exit);
            }
        }
        points
    }

    pub fn path_start(&self) -> Option<Point2> {
        self.vertices().first().copied()
    }

    pub fn path_end(&self) -> Option<Point2> {
        self.vertices().last().copied()
    }

    /// 首尾相接（闭合）
    pub fn is_joined(&self) -> bool {
        if self.segments.len() < 2 {
            return false;
        }
        match (self.path_start(), self.path_end()) {
            (Some(s), Some(e)) => points_equal(&s, &e),
            _ => false,
        }
    }

    /// 计算总长度
    pub fn length(&self) -> f64 {
        self.segments.iter().map(|s| s.kind.path_length()).sum()
    }

    /// 累计长度表，长度为段数 + 1，首项为 0
    pub fn cumulative_lengths(&self) -> Vec<f64> {
        let mut table = Vec::with_capacity(self.segments.len() + 1);
        let mut total = 0.0;
        table.push(total);
        for seg in &self.segments {
            total += seg.kind.path_length();
            table.push(total);
        }
        table
    }

    /// 距离给定点最近的子元素序号
    pub fn nearest_segment(&self, point: &Point2) -> Option<usize> {
        self.segments
            .iter()
            .enumerate()
            .map(|(i, seg)| (i, seg.distance_to_point(point)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    /// 点（投影到最近子元素后）距路径起点的累计距离
    pub fn distance_along(&self, point: &Point2) -> f64 {
        let Some(index) = self.nearest_segment(point) else {
            return 0.0;
        };
        let table = self.cumulative_lengths();
        let reversed = self.orientations()[index];
        let seg = &self.segments[index];
        let projected = seg.nearest_point(point);
        table[index] + seg.kind.path_distance(&projected, reversed)
    }

    /// 路径距离处的点
    pub fn point_at_distance(&self, distance: f64) -> Option<Point2> {
        let table = self.cumulative_lengths();
        let flags = self.orientations();
        let index = (0..self.segments.len())
            .find(|&i| distance <= table[i + 1] + EPSILON)
            .or_else(|| self.segments.len().checked_sub(1))?;
        self.segments[index]
            .kind
            .point_at_path_distance(distance - table[index], flags[index])
    }

    /// 截取路径距离 `[from, to]` 的几何片段
    pub fn section(&self, from: f64, to: f64) -> Vec<ElementKind> {
        let table = self.cumulative_lengths();
        let flags = self.orientations();
        let mut kinds = Vec::new();
        for (i, seg) in self.segments.iter().enumerate() {
            let (seg_start, seg_end) = (table[i], table[i + 1]);
            if seg_end <= from + EPSILON || seg_start >= to - EPSILON {
                continue;
            }
            let local_from = (from - seg_start).max(0.0);
            let local_to = (to - seg_start).min(seg_end - seg_start);
            if let Some(kind) = seg.kind.clip(flags[i], local_from, local_to) {
                kinds.push(kind);
            }
        }
        kinds
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        self.segments
            .iter()
            .fold(BoundingBox2::empty(), |acc, seg| acc.union(&seg.bounding_box()))
    }
}

impl Element {
    /// 创建完全定义的元素：校验几何、分配ID、为子元素设置 group_id
    pub fn new(kind: ElementKind) -> Result<Self> {
        kind.check_defined()?;
        let mut element = Self::raw(kind);
        element.regroup();
        Ok(element)
    }

    /// 未校验的元素（子元素、预览）
    pub(crate) fn raw(kind: ElementKind) -> Self {
        Self {
            id: ElementId::new(),
            group_id: None,
            kind,
        }
    }

    pub fn line(start: Point2, end: Point2) -> Result<Self> {
        Self::new(ElementKind::Line(Line::new(start, end)))
    }

    pub fn arc(arc: Arc) -> Result<Self> {
        Self::new(ElementKind::Arc(arc))
    }

    pub fn circle(center: Point2, radius: f64) -> Result<Self> {
        Self::new(ElementKind::Circle(Circle::new(center, radius)))
    }

    pub fn polyline(points: &[Point2], closed: bool) -> Result<Self> {
        Self::new(ElementKind::Polyline(Polyline::from_points(points, closed)))
    }

    /// 轴对齐矩形，由两个对角点确定
    pub fn rectangle(corner: Point2, opposite: Point2) -> Result<Self> {
        let bbox = BoundingBox2::new(corner, opposite);
        if bbox.width() < EPSILON || bbox.height() < EPSILON {
            return Err(KernelError::degenerate("rectangle without area"));
        }
        Self::new(ElementKind::Rectangle(Polyline::from_points(
            &bbox.corners(),
            true,
        )))
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn group_id(&self) -> Option<ElementId> {
        self.group_id
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// 是否为多段线/矩形这类组元素
    pub fn is_group(&self) -> bool {
        matches!(
            self.kind,
            ElementKind::Polyline(_) | ElementKind::Rectangle(_)
        )
    }

    pub fn polyline_ref(&self) -> Option<&Polyline> {
        match &self.kind {
            ElementKind::Polyline(pl) | ElementKind::Rectangle(pl) => Some(pl),
            _ => None,
        }
    }

    fn polyline_mut(&mut self) -> Option<&mut Polyline> {
        match &mut self.kind {
            ElementKind::Polyline(pl) | ElementKind::Rectangle(pl) => Some(pl),
            _ => None,
        }
    }

    /// 子元素（非组元素返回空切片）
    pub fn segments(&self) -> &[Element] {
        self.polyline_ref().map(|pl| pl.segments()).unwrap_or(&[])
    }

    /// 叶子图元：组元素返回其子元素，否则返回自身
    pub fn leaves(&self) -> Vec<&Element> {
        if self.is_group() {
            self.segments().iter().collect()
        } else {
            vec![self]
        }
    }

    /// 查找子元素
    pub fn segment(&self, id: ElementId) -> Option<&Element> {
        self.segments().iter().find(|s| s.id == id)
    }

    /// 闭合图形（圆、首尾相接的多段线）
    pub fn is_closed(&self) -> bool {
        match &self.kind {
            ElementKind::Circle(_) | ElementKind::Rectangle(_) => true,
            ElementKind::Polyline(pl) => pl.is_joined(),
            _ => false,
        }
    }

    /// 路径起点与终点；闭合图形返回 None
    pub fn endpoints(&self) -> Option<(Point2, Point2)> {
        match &self.kind {
            ElementKind::Line(_) | ElementKind::Arc(_) => self.kind.endpoints(),
            ElementKind::Polyline(pl) if !pl.is_joined() => pl.path_start().zip(pl.path_end()),
            _ => None,
        }
    }

    pub fn length(&self) -> f64 {
        self.kind.path_length()
    }

    /// 元素上距离给定点最近的点
    pub fn nearest_point(&self, point: &Point2) -> Point2 {
        match &self.kind {
            ElementKind::Line(line) => line.nearest_point(point),
            ElementKind::Arc(arc) => arc.nearest_point(point),
            ElementKind::Circle(circle) => circle.nearest_point(point),
            ElementKind::Polyline(pl) | ElementKind::Rectangle(pl) => pl
                .nearest_segment(point)
                .map(|i| pl.segments[i].nearest_point(point))
                .unwrap_or(*point),
        }
    }

    /// 点到元素的距离
    pub fn distance_to_point(&self, point: &Point2) -> f64 {
        (point - self.nearest_point(point)).norm()
    }

    /// 深拷贝；`reassign_ids` 为真时为自身及子元素分配新ID
    pub fn copy_element(&self, reassign_ids: bool) -> Element {
        let mut copy = self.clone();
        if reassign_ids {
            copy.id = ElementId::new();
            if let Some(pl) = copy.polyline_mut() {
                for seg in &mut pl.segments {
                    seg.id = ElementId::new();
                }
            }
            copy.regroup();
        }
        copy
    }

    /// 子元素的 group_id 指向自身
    pub(crate) fn regroup(&mut self) {
        let id = self.id;
        if let Some(pl) = self.polyline_mut() {
            for seg in &mut pl.segments {
                seg.group_id = Some(id);
            }
        }
    }

    /// 拖动后保证几何仍然有效，否则回滚
    fn apply_checked(&mut self, updated: ElementKind) -> bool {
        if updated.check_defined().is_err() {
            return false;
        }
        self.kind = updated;
        self.regroup();
        true
    }
}

impl Movable for Line {
    fn translate(&mut self, offset: &Vector2) {
        Line::translate(self, offset)
    }

    fn rotate_about(&mut self, pivot: &Point2, angle: f64) {
        Line::rotate_about(self, pivot, angle)
    }
}

impl Movable for Arc {
    fn translate(&mut self, offset: &Vector2) {
        Arc::translate(self, offset)
    }

    fn rotate_about(&mut self, pivot: &Point2, angle: f64) {
        Arc::rotate_about(self, pivot, angle)
    }
}

impl Movable for Circle {
    fn translate(&mut self, offset: &Vector2) {
        Circle::translate(self, offset)
    }

    fn rotate_about(&mut self, pivot: &Point2, angle: f64) {
        Circle::rotate_about(self, pivot, angle)
    }
}

impl Movable for Element {
    fn translate(&mut self, offset: &Vector2) {
        match &mut self.kind {
            ElementKind::Line(line) => Movable::translate(line, offset),
            ElementKind::Arc(arc) => Movable::translate(arc, offset),
            ElementKind::Circle(circle) => Movable::translate(circle, offset),
            ElementKind::Polyline(pl) | ElementKind::Rectangle(pl) => {
                for seg in &mut pl.segments {
                    seg.translate(offset);
                }
            }
        }
    }

    fn rotate_about(&mut self, pivot: &Point2, angle: f64) {
        match &mut self.kind {
            ElementKind::Line(line) => Movable::rotate_about(line, pivot, angle),
            ElementKind::Arc(arc) => Movable::rotate_about(arc, pivot, angle),
            ElementKind::Circle(circle) => Movable::rotate_about(circle, pivot, angle),
            ElementKind::Polyline(pl) => {
                for seg in &mut pl.segments {
                    seg.rotate_about(pivot, angle);
                }
            }
            ElementKind::Rectangle(pl) => {
                // 旋转后不再轴对齐，退化为普通闭合多段线
                let mut pl = std::mem::replace(pl, Polyline::new(Vec::new()));
                for seg in &mut pl.segments {
                    seg.rotate_about(pivot, angle);
                }
                self.kind = ElementKind::Polyline(pl);
            }
        }
    }
}

impl Boundable for Element {
    fn bounding_box(&self) -> BoundingBox2 {
        match &self.kind {
            ElementKind::Line(line) => line.bounding_box(),
            ElementKind::Arc(arc) => arc.bounding_box(),
            ElementKind::Circle(circle) => circle.bounding_box(),
            ElementKind::Polyline(pl) | ElementKind::Rectangle(pl) => pl.bounding_box(),
        }
    }
}

impl Element {
    pub fn bounding_box(&self) -> BoundingBox2 {
        Boundable::bounding_box(self)
    }
}

fn push_unique(points: &mut Vec<(Point2, PointType)>, point: Point2, point_type: PointType) {
    if !points
        .iter()
        .any(|(p, t)| *t == point_type && points_equal(p, &point))
    {
        points.push((point, point_type));
    }
}

/// 拖动圆弧的端点或中点，保持另外两个特征点不动
fn drag_arc(arc: &Arc, point_type: PointType, from: &Point2, to: &Point2) -> Option<ElementKind> {
    let (start, mid, end) = (arc.start_point(), arc.mid_point(), arc.end_point());
    let dragged = match point_type {
        PointType::EndPoint if points_equal(from, &start) => Arc::from_three_points(*to, mid, end),
        PointType::EndPoint if points_equal(from, &end) => Arc::from_three_points(start, mid, *to),
        PointType::MidPoint if points_equal(from, &mid) => Arc::from_three_points(start, *to, end),
        PointType::Center if points_equal(from, &arc.center) => {
            let mut moved = arc.clone();
            moved.translate(&(to - from));
            Some(moved)
        }
        _ => None,
    }?;
    Some(ElementKind::Arc(dragged))
}

impl PointOwning for Element {
    fn selection_points(&self) -> Vec<(Point2, PointType)> {
        let mut points = Vec::new();
        match &self.kind {
            ElementKind::Line(line) => {
                points.push((line.start, PointType::EndPoint));
                points.push((line.end, PointType::EndPoint));
                points.push((line.midpoint(), PointType::MidPoint));
            }
            ElementKind::Arc(arc) => {
                points.push((arc.start_point(), PointType::EndPoint));
                points.push((arc.end_point(), PointType::EndPoint));
                points.push((arc.mid_point(), PointType::MidPoint));
                points.push((arc.center, PointType::Center));
            }
            ElementKind::Circle(circle) => {
                points.push((circle.center, PointType::Center));
                for p in circle.boundary_points() {
                    points.push((p, PointType::EndPoint));
                }
            }
            ElementKind::Polyline(pl) | ElementKind::Rectangle(pl) => {
                for seg in &pl.segments {
                    for (p, t) in seg.selection_points() {
                        push_unique(&mut points, p, t);
                    }
                }
            }
        }
        points
    }

    fn drag_point(&mut self, point_type: PointType, from: &Point2, to: &Point2) -> bool {
        let offset = to - from;
        let updated = match &self.kind {
            ElementKind::Line(line) => match point_type {
                PointType::EndPoint if points_equal(from, &line.start) => {
                    Some(ElementKind::Line(Line::new(*to, line.end)))
                }
                PointType::EndPoint if points_equal(from, &line.end) => {
                    Some(ElementKind::Line(Line::new(line.start, *to)))
                }
                PointType::MidPoint if points_equal(from, &line.midpoint()) => {
                    let mut moved = line.clone();
                    moved.translate(&offset);
                    Some(ElementKind::Line(moved))
                }
                _ => None,
            },
            ElementKind::Arc(arc) => drag_arc(arc, point_type, from, to),
            ElementKind::Circle(circle) => match point_type {
                PointType::Center if points_equal(from, &circle.center) => {
                    Some(ElementKind::Circle(Circle::new(*to, circle.radius)))
                }
                PointType::EndPoint if circle.contains_point(from) => Some(ElementKind::Circle(
                    Circle::new(circle.center, (to - circle.center).norm()),
                )),
                _ => None,
            },
            ElementKind::Rectangle(pl) if point_type == PointType::EndPoint => {
                // 拖动角点：对角点固定，保持轴对齐
                let corners = pl.vertices();
                corners
                    .iter()
                    .take(4)
                    .position(|c| points_equal(c, from))
                    .and_then(|i| {
                        let opposite = corners[(i + 2) % 4];
                        let bbox = BoundingBox2::new(*to, opposite);
                        if bbox.width() < EPSILON || bbox.height() < EPSILON {
                            return None;
                        }
                        let mut moved = pl.clone();
                        let new_corners = bbox.corners();
                        for (k, seg) in moved.segments.iter_mut().enumerate() {
                            seg.kind = ElementKind::Line(Line::new(
                                new_corners[k % 4],
                                new_corners[(k + 1) % 4],
                            ));
                        }
                        Some(ElementKind::Rectangle(moved))
                    })
            }
            ElementKind::Polyline(pl) if point_type == PointType::EndPoint => {
                // 拖动顶点：所有以该点为端点的子元素一起移动
                let mut moved = pl.clone();
                let mut touched = false;
                for seg in &mut moved.segments {
                    let next = match &seg.kind {
                        ElementKind::Line(line) if points_equal(from, &line.start) => {
                            Some(ElementKind::Line(Line::new(*to, line.end)))
                        }
                        ElementKind::Line(line) if points_equal(from, &line.end) => {
                            Some(ElementKind::Line(Line::new(line.start, *to)))
                        }
                        ElementKind::Arc(arc) => drag_arc(arc, PointType::EndPoint, from, to),
                        _ => None,
                    };
                    if let Some(kind) = next {
                        seg.kind = kind;
                        touched = true;
                    }
                }
                touched.then_some(ElementKind::Polyline(moved))
            }
            ElementKind::Polyline(_) | ElementKind::Rectangle(_) => {
                let on_element = self
                    .selection_points()
                    .iter()
                    .any(|(p, t)| *t == point_type && points_equal(p, from));
                if on_element {
                    let mut moved = self.clone();
                    moved.translate(&offset);
                    Some(moved.kind)
                } else {
                    None
                }
            }
        };

        match updated {
            Some(kind) => self.apply_checked(kind),
            None => false,
        }
    }
}
