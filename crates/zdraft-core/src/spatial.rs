//! 空间网格索引
//!
//! 画布被划分为统一大小的分区，每个分区记录几何经过它的叶子图元ID
//! （线段、圆弧、圆，以及多段线的子元素）。支持：
//! - 点查询、矩形范围查询、邻近元素查询
//! - 沿直线/圆弧方向逐个分区推进的遍历器，供延伸查找下一个相交元素

use crate::config::KernelConfig;
use crate::element::{Element, ElementId, ElementKind};
use crate::geometry::{Arc, Line};
use crate::intersect::Extension;
use crate::math::{
    ccw_angle_distance, normalize_angle, point_on_circle, BoundingBox2, OrderedF64, Point2,
    Vector2, EPSILON, TAU,
};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::f64::consts::PI;

/// 网格分区坐标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Division {
    pub x: i64,
    pub y: i64,
}

impl Division {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// 空间网格索引
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    /// 分区大小
    division_width: f64,
    division_height: f64,

    /// 画布覆盖的分区数
    x_divisions: i64,
    y_divisions: i64,

    /// 分区 -> 叶子图元
    divisions: HashMap<Division, HashSet<ElementId>>,

    /// 叶子图元 -> 所在分区
    memberships: HashMap<ElementId, HashSet<Division>>,

    /// 顶层元素 -> 叶子图元
    members: HashMap<ElementId, Vec<ElementId>>,

    /// 子元素 -> 所属元素
    groups: HashMap<ElementId, ElementId>,
}

impl SpatialGrid {
    pub fn new(config: &KernelConfig) -> Self {
        Self {
            division_width: config.division_width(),
            division_height: config.division_height(),
            x_divisions: i64::from(config.x_divisions),
            y_divisions: i64::from(config.y_divisions),
            divisions: HashMap::new(),
            memberships: HashMap::new(),
            members: HashMap::new(),
            groups: HashMap::new(),
        }
    }

    pub fn division_width(&self) -> f64 {
        self.division_width
    }

    pub fn division_height(&self) -> f64 {
        self.division_height
    }

    /// 将世界坐标转换为分区坐标
    pub fn division_of(&self, point: &Point2) -> Division {
        Division::new(
            (point.x / self.division_width).floor() as i64,
            (point.y / self.division_height).floor() as i64,
        )
    }

    /// 分区的范围
    pub fn division_bounds(&self, division: Division) -> BoundingBox2 {
        let min = Point2::new(
            division.x as f64 * self.division_width,
            division.y as f64 * self.division_height,
        );
        BoundingBox2::new(
            min,
            Point2::new(min.x + self.division_width, min.y + self.division_height),
        )
    }

    /// 获取包围盒覆盖的所有分区
    fn cells_for_bbox(&self, bbox: &BoundingBox2) -> Vec<Division> {
        let min = self.division_of(&bbox.min);
        let max = self.division_of(&bbox.max);

        let mut cells = Vec::new();
        for x in min.x..=max.x {
            for y in min.y..=max.y {
                cells.push(Division::new(x, y));
            }
        }
        cells
    }

    /// 圆与网格线的交点方向角
    fn crossing_angles(&self, center: &Point2, radius: f64, skip_tangent: bool) -> Vec<f64> {
        let mut angles = Vec::new();
        let tangent = |ratio: f64| (ratio.abs() - 1.0).abs() < EPSILON / radius.max(EPSILON);

        let x_from = ((center.x - radius) / self.division_width).ceil() as i64;
        let x_to = ((center.x + radius) / self.division_width).floor() as i64;
        for k in x_from..=x_to {
            let ratio = (k as f64 * self.division_width - center.x) / radius;
            if ratio.abs() > 1.0 + EPSILON || (skip_tangent && tangent(ratio)) {
                continue;
            }
            let a = ratio.clamp(-1.0, 1.0).acos();
            angles.push(normalize_angle(a));
            angles.push(normalize_angle(-a));
        }

        let y_from = ((center.y - radius) / self.division_height).ceil() as i64;
        let y_to = ((center.y + radius) / self.division_height).floor() as i64;
        for k in y_from..=y_to {
            let ratio = (k as f64 * self.division_height - center.y) / radius;
            if ratio.abs() > 1.0 + EPSILON || (skip_tangent && tangent(ratio)) {
                continue;
            }
            let a = ratio.clamp(-1.0, 1.0).asin();
            angles.push(normalize_angle(a));
            angles.push(normalize_angle(PI - a));
        }
        angles
    }

    /// 圆弧逆时针从 `start_angle` 扫过 `sweep` 经过的分区
    fn sweep_divisions(
        &self,
        center: &Point2,
        radius: f64,
        start_angle: f64,
        sweep: f64,
    ) -> HashSet<Division> {
        let mut cells = HashSet::new();
        let mut offsets = vec![0.0, sweep];
        for angle in self.crossing_angles(center, radius, false) {
            let d = ccw_angle_distance(start_angle, angle);
            if d <= sweep {
                offsets.push(d);
                cells.insert(self.division_of(&point_on_circle(center, radius, angle)));
            }
        }
        offsets.sort_by(|a, b| a.total_cmp(b));

        // 相邻交点之间的弧段完全落在同一个分区内，取其中点即可
        for pair in offsets.windows(2) {
            if pair[1] - pair[0] > f64::EPSILON {
                let mid = start_angle + (pair[0] + pair[1]) / 2.0;
                cells.insert(self.division_of(&point_on_circle(center, radius, mid)));
            }
        }
        cells.insert(self.division_of(&point_on_circle(center, radius, start_angle)));
        cells.insert(self.division_of(&point_on_circle(center, radius, start_angle + sweep)));
        cells
    }

    /// 叶子图元经过的分区：线段取包围盒，圆弧/圆取实际扫过的分区
    fn leaf_divisions(&self, kind: &ElementKind) -> HashSet<Division> {
        match kind {
            ElementKind::Line(line) => {
                self.cells_for_bbox(&line.bounding_box()).into_iter().collect()
            }
            ElementKind::Arc(arc) => {
                self.sweep_divisions(&arc.center, arc.radius, arc.start_angle, arc.sweep_angle())
            }
            ElementKind::Circle(circle) => {
                self.sweep_divisions(&circle.center, circle.radius, 0.0, TAU)
            }
            ElementKind::Polyline(pl) | ElementKind::Rectangle(pl) => pl
                .segments()
                .iter()
                .flat_map(|s| self.leaf_divisions(s.kind()))
                .collect(),
        }
    }

    fn insert_leaf(&mut self, id: ElementId, cells: HashSet<Division>) {
        for cell in &cells {
            self.divisions.entry(*cell).or_default().insert(id);
        }
        self.memberships.insert(id, cells);
    }

    fn remove_leaf(&mut self, id: &ElementId) {
        if let Some(cells) = self.memberships.remove(id) {
            for cell in cells {
                if let Some(ids) = self.divisions.get_mut(&cell) {
                    ids.remove(id);
                    if ids.is_empty() {
                        self.divisions.remove(&cell);
                    }
                }
            }
        }
        self.groups.remove(id);
    }

    /// 插入元素（组元素按子元素分别登记）
    pub fn add_elements<'a>(&mut self, elements: impl IntoIterator<Item = &'a Element>) {
        for element in elements {
            self.remove_elements([element.id()]);
            let mut leaf_ids = Vec::new();
            for leaf in element.leaves() {
                let cells = self.leaf_divisions(leaf.kind());
                self.insert_leaf(leaf.id(), cells);
                if leaf.id() != element.id() {
                    self.groups.insert(leaf.id(), element.id());
                }
                leaf_ids.push(leaf.id());
            }
            self.members.insert(element.id(), leaf_ids);
        }
    }

    /// 移除元素及其子元素
    pub fn remove_elements(&mut self, ids: impl IntoIterator<Item = ElementId>) {
        for id in ids {
            if let Some(leaf_ids) = self.members.remove(&id) {
                for leaf in leaf_ids {
                    self.remove_leaf(&leaf);
                }
            }
        }
    }

    /// 更新元素：新旧分区集合求对称差，只改动变化的分区
    pub fn change_elements<'a>(&mut self, elements: impl IntoIterator<Item = &'a Element>) {
        for element in elements {
            let new_leaves: Vec<&Element> = element.leaves();
            let old_leaves = self.members.remove(&element.id()).unwrap_or_default();
            for old in &old_leaves {
                if !new_leaves.iter().any(|l| l.id() == *old) {
                    self.remove_leaf(old);
                }
            }

            let mut leaf_ids = Vec::with_capacity(new_leaves.len());
            for leaf in new_leaves {
                let id = leaf.id();
                let cells = self.leaf_divisions(leaf.kind());
                let previous = self.memberships.remove(&id).unwrap_or_default();
                for cell in previous.difference(&cells) {
                    if let Some(ids) = self.divisions.get_mut(cell) {
                        ids.remove(&id);
                        if ids.is_empty() {
                            self.divisions.remove(cell);
                        }
                    }
                }
                for cell in cells.difference(&previous) {
                    self.divisions.entry(*cell).or_default().insert(id);
                }
                self.memberships.insert(id, cells);
                if id != element.id() {
                    self.groups.insert(id, element.id());
                }
                leaf_ids.push(id);
            }
            self.members.insert(element.id(), leaf_ids);
        }
    }

    /// 子元素所属的元素
    pub fn owner_of(&self, id: &ElementId) -> Option<ElementId> {
        self.groups.get(id).copied()
    }

    /// 叶子图元所在的分区
    pub fn divisions_of(&self, id: &ElementId) -> Option<&HashSet<Division>> {
        self.memberships.get(id)
    }

    /// 分区内的叶子图元
    pub fn division_contents(&self, division: &Division) -> Option<&HashSet<ElementId>> {
        self.divisions.get(division)
    }

    /// 已登记的叶子图元数量
    pub fn len(&self) -> usize {
        self.memberships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memberships.is_empty()
    }

    /// 包含该点的分区内的元素
    pub fn elements_near_point(&self, point: &Point2) -> HashSet<ElementId> {
        self.divisions
            .get(&self.division_of(point))
            .cloned()
            .unwrap_or_default()
    }

    /// 矩形 [p1, p2] 覆盖的所有分区内的元素
    pub fn elements_in_container(&self, p1: &Point2, p2: &Point2) -> HashSet<ElementId> {
        let mut result = HashSet::new();
        for cell in self.cells_for_bbox(&BoundingBox2::new(*p1, *p2)) {
            if let Some(ids) = self.divisions.get(&cell) {
                result.extend(ids.iter().copied());
            }
        }
        result
    }

    /// 与元素共享分区的其他元素；`skip_siblings` 时排除同组的子元素
    pub fn element_ids_near_element(
        &self,
        element: &Element,
        skip_siblings: bool,
    ) -> HashSet<ElementId> {
        let own: HashSet<ElementId> = element.leaves().iter().map(|l| l.id()).collect();
        let mut result = HashSet::new();
        for leaf in element.leaves() {
            // 尚未登记的元素（如正在编辑的副本）按几何计算
            let cells = match self.memberships.get(&leaf.id()) {
                Some(cells) => cells.clone(),
                None => self.leaf_divisions(leaf.kind()),
            };
            for cell in cells {
                if let Some(ids) = self.divisions.get(&cell) {
                    result.extend(ids.iter().copied());
                }
            }
        }
        result.retain(|id| {
            if own.contains(id) || *id == element.id() {
                return false;
            }
            if skip_siblings {
                if let Some(group) = element.group_id() {
                    return self.groups.get(id) != Some(&group);
                }
            }
            true
        });
        result
    }

    /// 画布与已占用分区的并集范围，遍历越过它即可停止
    fn extent(&self) -> (Division, Division) {
        let mut min = Division::new(0, 0);
        let mut max = Division::new(self.x_divisions - 1, self.y_divisions - 1);
        for cell in self.divisions.keys() {
            min.x = min.x.min(cell.x);
            min.y = min.y.min(cell.y);
            max.x = max.x.max(cell.x);
            max.y = max.y.max(cell.y);
        }
        (min, max)
    }

    fn batch(&self, division: Division, exclude: &HashSet<ElementId>) -> DivisionBatch {
        let mut element_ids: Vec<ElementId> = self
            .divisions
            .get(&division)
            .map(|ids| ids.iter().filter(|id| !exclude.contains(id)).copied().collect())
            .unwrap_or_default();
        element_ids.sort();
        DivisionBatch {
            division,
            element_ids,
            bounds: self.division_bounds(division),
        }
    }

    /// 沿线段方向逐个分区推进
    ///
    /// `from_start` 为真时从起点向起点之外推进，否则从终点向终点之外推进。
    pub fn next_elements_in_line_direction(
        &self,
        line: &Line,
        from_start: bool,
        exclude: &[ElementId],
    ) -> LineTraversal<'_> {
        let (origin, direction) = if from_start {
            (line.start, -line.direction())
        } else {
            (line.end, line.direction())
        };
        LineTraversal::new(self, origin, direction, exclude.iter().copied().collect())
    }

    /// 沿圆弧方向逐个分区推进（在圆弧缺口内）
    pub fn next_elements_in_arc_direction(
        &self,
        arc: &Arc,
        from_start: bool,
        exclude: &[ElementId],
    ) -> ArcTraversal<'_> {
        let (origin_angle, clockwise) = if from_start {
            (arc.start_angle, true)
        } else {
            (arc.end_angle, false)
        };
        ArcTraversal::new(
            self,
            arc.center,
            arc.radius,
            origin_angle,
            clockwise,
            TAU - arc.sweep_angle(),
            exclude.iter().copied().collect(),
        )
    }

    /// 按延伸几何选择遍历方式
    pub fn traverse(&self, extension: &Extension, exclude: HashSet<ElementId>) -> Traversal<'_> {
        match *extension {
            Extension::Ray { origin, direction } => {
                Traversal::Line(LineTraversal::new(self, origin, direction, exclude))
            }
            Extension::Sweep {
                center,
                radius,
                origin_angle,
                clockwise,
                limit,
            } => Traversal::Arc(ArcTraversal::new(
                self,
                center,
                radius,
                origin_angle,
                clockwise,
                limit,
                exclude,
            )),
        }
    }
}

/// 遍历产出的一个分区
#[derive(Debug, Clone, PartialEq)]
pub struct DivisionBatch {
    pub division: Division,
    /// 分区内的叶子图元（已排除自身），按ID排序
    pub element_ids: Vec<ElementId>,
    bounds: BoundingBox2,
}

impl DivisionBatch {
    /// 点是否落在本分区内（边界上的点同时属于相邻分区）
    pub fn contains_point(&self, point: &Point2) -> bool {
        self.bounds.contains(point)
    }

    pub fn bounds(&self) -> &BoundingBox2 {
        &self.bounds
    }
}

/// 网格线方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Axis {
    /// 竖直网格线，穿过后 x 分区变化
    Vertical,
    /// 水平网格线，穿过后 y 分区变化
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Crossing {
    t: OrderedF64,
    axis: Axis,
}

/// 射线与一族平行网格线的交点，按距离递增
#[derive(Debug, Clone)]
struct AxisCrossings {
    origin: f64,
    delta: f64,
    size: f64,
    next_line: i64,
    step: i64,
}

impl AxisCrossings {
    fn new(origin: f64, delta: f64, size: f64) -> Self {
        let cell = (origin / size).floor() as i64;
        let (next_line, step) = if delta > 0.0 { (cell + 1, 1) } else { (cell, -1) };
        Self {
            origin,
            delta,
            size,
            next_line,
            step,
        }
    }
}

impl Iterator for AxisCrossings {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.delta.abs() < EPSILON {
            return None;
        }
        let t = (self.next_line as f64 * self.size - self.origin) / self.delta;
        self.next_line += self.step;
        Some(t.max(0.0))
    }
}

/// 沿射线的分区遍历器
///
/// 两族网格线交点各自是递增序列，用最小堆合并；同时穿过两条网格线时为角点，
/// 两个方向的分区坐标一起步进。越过画布与已占用分区的范围后结束。
#[derive(Debug)]
pub struct LineTraversal<'a> {
    grid: &'a SpatialGrid,
    exclude: HashSet<ElementId>,
    direction: Vector2,
    current: Division,
    started: bool,
    finished: bool,
    vertical: AxisCrossings,
    horizontal: AxisCrossings,
    queue: BinaryHeap<Reverse<Crossing>>,
    extent: (Division, Division),
}

impl<'a> LineTraversal<'a> {
    pub fn new(
        grid: &'a SpatialGrid,
        origin: Point2,
        direction: Vector2,
        exclude: HashSet<ElementId>,
    ) -> Self {
        let mut traversal = Self {
            grid,
            exclude,
            direction,
            current: grid.division_of(&origin),
            started: false,
            finished: false,
            vertical: AxisCrossings::new(origin.x, direction.x, grid.division_width),
            horizontal: AxisCrossings::new(origin.y, direction.y, grid.division_height),
            queue: BinaryHeap::new(),
            extent: grid.extent(),
        };
        traversal.refill(Axis::Vertical);
        traversal.refill(Axis::Horizontal);
        traversal
    }

    fn refill(&mut self, axis: Axis) {
        let next = match axis {
            Axis::Vertical => self.vertical.next(),
            Axis::Horizontal => self.horizontal.next(),
        };
        if let Some(t) = next {
            self.queue.push(Reverse(Crossing {
                t: OrderedF64(t),
                axis,
            }));
        }
    }

    fn step(&mut self, axis: Axis) {
        match axis {
            Axis::Vertical => self.current.x += self.direction.x.signum() as i64,
            Axis::Horizontal => self.current.y += self.direction.y.signum() as i64,
        }
        self.refill(axis);
    }

    /// 已在范围之外且继续远离
    fn is_leaving(&self) -> bool {
        let (min, max) = self.extent;
        let (dx, dy) = (self.direction.x, self.direction.y);
        (self.current.x > max.x && dx >= 0.0)
            || (self.current.x < min.x && dx <= 0.0)
            || (self.current.y > max.y && dy >= 0.0)
            || (self.current.y < min.y && dy <= 0.0)
    }
}

impl Iterator for LineTraversal<'_> {
    type Item = DivisionBatch;

    fn next(&mut self) -> Option<DivisionBatch> {
        if self.finished {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(self.grid.batch(self.current, &self.exclude));
        }

        let Some(Reverse(crossing)) = self.queue.pop() else {
            self.finished = true;
            return None;
        };
        self.step(crossing.axis);

        // 角点：另一族网格线在同一位置穿过
        if let Some(Reverse(other)) = self.queue.peek().copied() {
            if other.axis != crossing.axis && (other.t.0 - crossing.t.0).abs() < EPSILON {
                self.queue.pop();
                self.step(other.axis);
            }
        }

        if self.is_leaving() {
            self.finished = true;
            return None;
        }
        tracing::trace!(
            "line traversal at division ({}, {}), t = {:.3}",
            self.current.x,
            self.current.y,
            crossing.t.0
        );
        Some(self.grid.batch(self.current, &self.exclude))
    }
}

/// 沿虚拟圆弧的分区遍历器
///
/// 预先求出圆与网格线的全部交点，按距延伸起点的角距离放入最小堆，
/// 每个交点根据圆弧在该处的切线方向确定进入的分区。
#[derive(Debug)]
pub struct ArcTraversal<'a> {
    grid: &'a SpatialGrid,
    exclude: HashSet<ElementId>,
    center: Point2,
    radius: f64,
    origin_angle: f64,
    clockwise: bool,
    queue: BinaryHeap<Reverse<(OrderedF64, OrderedF64)>>,
    last: Option<Division>,
}

impl<'a> ArcTraversal<'a> {
    pub fn new(
        grid: &'a SpatialGrid,
        center: Point2,
        radius: f64,
        origin_angle: f64,
        clockwise: bool,
        limit: f64,
        exclude: HashSet<ElementId>,
    ) -> Self {
        let tolerance = EPSILON / radius.max(EPSILON);
        let mut queue = BinaryHeap::new();
        for angle in grid.crossing_angles(&center, radius, true) {
            let d = if clockwise {
                ccw_angle_distance(angle, origin_angle)
            } else {
                ccw_angle_distance(origin_angle, angle)
            };
            // 起点所在的网格线由起始分区处理
            if d > tolerance && d < TAU - tolerance && d <= limit + tolerance {
                queue.push(Reverse((OrderedF64(d), OrderedF64(angle))));
            }
        }
        Self {
            grid,
            exclude,
            center,
            radius,
            origin_angle,
            clockwise,
            queue,
            last: None,
        }
    }

    /// 行进方向的切线
    fn tangent(&self, angle: f64) -> Vector2 {
        let ccw = Vector2::new(-angle.sin(), angle.cos());
        if self.clockwise {
            -ccw
        } else {
            ccw
        }
    }

    /// 网格线上的点按行进方向归入将要进入的分区
    fn resolve(&self, angle: f64) -> Division {
        let point = point_on_circle(&self.center, self.radius, angle);
        let tangent = self.tangent(angle);
        let index = |value: f64, size: f64, t: f64| {
            let v = value / size;
            let r = v.round();
            if (v - r).abs() < EPSILON / size.max(EPSILON) && t.abs() > EPSILON {
                if t > 0.0 {
                    r as i64
                } else {
                    r as i64 - 1
                }
            } else {
                v.floor() as i64
            }
        };
        Division::new(
            index(point.x, self.grid.division_width, tangent.x),
            index(point.y, self.grid.division_height, tangent.y),
        )
    }
}

impl Iterator for ArcTraversal<'_> {
    type Item = DivisionBatch;

    fn next(&mut self) -> Option<DivisionBatch> {
        let division = match self.last {
            None => self.resolve(self.origin_angle),
            Some(last) => loop {
                let Reverse((d, angle)) = self.queue.pop()?;
                let division = self.resolve(angle.0);
                if division != last {
                    tracing::trace!(
                        "arc traversal at division ({}, {}), sweep = {:.4}",
                        division.x,
                        division.y,
                        d.0
                    );
                    break division;
                }
            },
        };
        self.last = Some(division);
        Some(self.grid.batch(division, &self.exclude))
    }
}

/// 直线或圆弧遍历
#[derive(Debug)]
pub enum Traversal<'a> {
    Line(LineTraversal<'a>),
    Arc(ArcTraversal<'a>),
}

impl Iterator for Traversal<'_> {
    type Item = DivisionBatch;

    fn next(&mut self) -> Option<DivisionBatch> {
        match self {
            Traversal::Line(t) => t.next(),
            Traversal::Arc(t) => t.next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Movable;
    use crate::math::points_equal;

    fn grid() -> SpatialGrid {
        SpatialGrid::new(&KernelConfig::default())
    }

    #[test]
    fn test_division_of() {
        let grid = grid();
        assert_eq!(grid.division_of(&Point2::new(0.0, 0.0)), Division::new(0, 0));
        assert_eq!(grid.division_of(&Point2::new(39.9, 20.0)), Division::new(1, 1));
        assert_eq!(grid.division_of(&Point2::new(-0.1, -25.0)), Division::new(-1, -2));
    }

    #[test]
    fn test_line_present_along_geometry() {
        let mut grid = grid();
        let line = Element::line(Point2::new(-30.0, 5.0), Point2::new(170.0, 95.0)).unwrap();
        grid.add_elements([&line]);

        for i in 0..=50 {
            let t = i as f64 / 50.0;
            let p = Point2::new(-30.0 + 200.0 * t, 5.0 + 90.0 * t);
            assert!(grid.elements_near_point(&p).contains(&line.id()));
        }

        grid.remove_elements([line.id()]);
        assert!(grid.is_empty());
        assert!(grid.divisions.is_empty());
    }

    #[test]
    fn test_circle_occupies_exact_sweep() {
        let mut grid = grid();
        let circle = Element::circle(Point2::new(50.0, 50.0), 15.0).unwrap();
        grid.add_elements([&circle]);

        // 圆心所在分区的角点距圆心不足 15，圆不会经过它
        let cells = grid.divisions_of(&circle.id()).unwrap();
        assert!(!cells.contains(&Division::new(2, 2)));
        assert!(cells.contains(&Division::new(3, 2)));
        assert!(cells.contains(&Division::new(3, 3)));
        assert_eq!(cells.len(), 8);

        for i in 0..360 {
            let p = point_on_circle(&Point2::new(50.0, 50.0), 15.0, (i as f64).to_radians());
            assert!(grid.elements_near_point(&p).contains(&circle.id()));
        }
    }

    #[test]
    fn test_arc_occupies_only_its_sweep() {
        let mut grid = grid();
        let arc = Element::arc(Arc::new(Point2::new(50.0, 50.0), 15.0, 0.0, PI / 2.0)).unwrap();
        grid.add_elements([&arc]);
        let cells = grid.divisions_of(&arc.id()).unwrap();
        assert!(cells.iter().all(|c| c.x >= 2 && c.y >= 2));
    }

    #[test]
    fn test_polyline_segments_grouped() {
        let mut grid = grid();
        let pl = Element::polyline(
            &[Point2::new(5.0, 5.0), Point2::new(55.0, 5.0), Point2::new(55.0, 55.0)],
            false,
        )
        .unwrap();
        grid.add_elements([&pl]);
        assert_eq!(grid.len(), 2);
        for seg in pl.segments() {
            assert_eq!(grid.owner_of(&seg.id()), Some(pl.id()));
        }
        grid.remove_elements([pl.id()]);
        assert!(grid.is_empty());
    }

    #[test]
    fn test_change_elements_symmetric_difference() {
        let mut grid = grid();
        let mut line = Element::line(Point2::new(5.0, 5.0), Point2::new(15.0, 5.0)).unwrap();
        grid.add_elements([&line]);

        line.translate(&Vector2::new(100.0, 0.0));
        grid.change_elements([&line]);

        assert!(grid.elements_near_point(&Point2::new(10.0, 5.0)).is_empty());
        assert!(grid.elements_near_point(&Point2::new(110.0, 5.0)).contains(&line.id()));
        assert_eq!(grid.divisions.len(), 1);
    }

    #[test]
    fn test_elements_in_container() {
        let mut grid = grid();
        let a = Element::line(Point2::new(5.0, 5.0), Point2::new(15.0, 5.0)).unwrap();
        let b = Element::line(Point2::new(305.0, 305.0), Point2::new(315.0, 305.0)).unwrap();
        grid.add_elements([&a, &b]);
        let ids = grid.elements_in_container(&Point2::new(0.0, 0.0), &Point2::new(50.0, 50.0));
        assert!(ids.contains(&a.id()));
        assert!(!ids.contains(&b.id()));
    }

    #[test]
    fn test_element_ids_near_element_skip_siblings() {
        let mut grid = grid();
        let pl = Element::polyline(
            &[Point2::new(5.0, 5.0), Point2::new(15.0, 5.0), Point2::new(15.0, 15.0)],
            false,
        )
        .unwrap();
        let other = Element::line(Point2::new(2.0, 2.0), Point2::new(8.0, 8.0)).unwrap();
        grid.add_elements([&pl, &other]);

        let first = &pl.segments()[0];
        let with_siblings = grid.element_ids_near_element(first, false);
        assert!(with_siblings.contains(&pl.segments()[1].id()));
        assert!(with_siblings.contains(&other.id()));

        let without = grid.element_ids_near_element(first, true);
        assert!(!without.contains(&pl.segments()[1].id()));
        assert!(without.contains(&other.id()));

        // 顶层元素不返回自己的子元素
        let around_owner = grid.element_ids_near_element(&pl, false);
        assert_eq!(around_owner.len(), 1);
    }

    #[test]
    fn test_line_traversal_increasing_x() {
        let mut grid = grid();
        let line = Element::line(Point2::new(0.0, 0.0), Point2::new(100.0, 0.0)).unwrap();
        grid.add_elements([&line]);
        let geometry = Line::new(Point2::new(0.0, 0.0), Point2::new(100.0, 0.0));

        let batches: Vec<DivisionBatch> = grid
            .next_elements_in_line_direction(&geometry, false, &[line.id()])
            .collect();
        assert_eq!(batches[0].division, Division::new(5, 0));
        assert!(batches[0].element_ids.is_empty());
        assert!(batches.windows(2).all(|w| w[1].division.x > w[0].division.x));
        assert_eq!(batches.last().map(|b| b.division.x), Some(79));
    }

    #[test]
    fn test_line_traversal_corner_steps_diagonally() {
        let grid = grid();
        let geometry = Line::new(Point2::new(10.0, 10.0), Point2::new(30.0, 30.0));
        let divisions: Vec<Division> = grid
            .next_elements_in_line_direction(&geometry, false, &[])
            .take(4)
            .map(|b| b.division)
            .collect();
        assert_eq!(
            divisions,
            vec![
                Division::new(1, 1),
                Division::new(2, 2),
                Division::new(3, 3),
                Division::new(4, 4)
            ]
        );
    }

    #[test]
    fn test_line_traversal_backwards_from_start() {
        let grid = grid();
        let geometry = Line::new(Point2::new(100.0, 10.0), Point2::new(200.0, 10.0));
        let divisions: Vec<Division> = grid
            .next_elements_in_line_direction(&geometry, true, &[])
            .map(|b| b.division)
            .collect();
        // (100, 10) 恰在网格线上，向 -x 方向立即进入 4 号分区
        assert_eq!(divisions[0], Division::new(5, 0));
        assert_eq!(divisions[1], Division::new(4, 0));
        assert_eq!(divisions.last(), Some(&Division::new(0, 0)));
    }

    #[test]
    fn test_arc_traversal_follows_sweep() {
        let grid = grid();
        // 上半圆，从终点 (-15+50, 50) 逆时针进入下半圆
        let arc = Arc::new(Point2::new(50.0, 50.0), 15.0, 0.0, PI);
        let batches: Vec<DivisionBatch> =
            grid.next_elements_in_arc_direction(&arc, false, &[]).collect();
        let divisions: Vec<Division> = batches.iter().map(|b| b.division).collect();

        assert_eq!(divisions[0], Division::new(1, 2));
        assert!(divisions.iter().all(|d| d.y <= 2));
        assert!(divisions.contains(&Division::new(2, 1)));
        assert!(divisions.windows(2).all(|w| w[0] != w[1]));

        // 在缺口结束处回到圆弧起点所在分区
        let end = point_on_circle(&arc.center, arc.radius, 0.0);
        assert!(batches.last().unwrap().contains_point(&end));
        assert!(points_equal(&end, &Point2::new(65.0, 50.0)));
    }

    #[test]
    fn test_arc_traversal_from_start_is_clockwise() {
        let mut grid = grid();
        let below = Element::line(Point2::new(45.0, 25.0), Point2::new(55.0, 25.0)).unwrap();
        grid.add_elements([&below]);
        // 上半圆，从起点 (65, 50) 顺时针进入下半圆
        let arc = Arc::new(Point2::new(50.0, 50.0), 15.0, 0.0, PI);
        let batches: Vec<DivisionBatch> =
            grid.next_elements_in_arc_direction(&arc, true, &[]).collect();
        let divisions: Vec<Division> = batches.iter().map(|b| b.division).collect();

        assert_eq!(
            divisions,
            vec![
                Division::new(3, 2),
                Division::new(3, 1),
                Division::new(2, 1),
                Division::new(1, 1),
                Division::new(1, 2),
            ]
        );
        assert!(divisions.windows(2).all(|w| w[0] != w[1]));
        assert_eq!(batches[2].element_ids, vec![below.id()]);
        assert!(batches[1].element_ids.is_empty());

        // 在缺口结束处到达圆弧终点所在分区
        let end = point_on_circle(&arc.center, arc.radius, PI);
        assert!(batches.last().unwrap().contains_point(&end));
    }
}
