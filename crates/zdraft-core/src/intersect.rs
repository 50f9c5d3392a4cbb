//! 元素求交
//!
//! 先求两条承载曲线（无限直线/完整圆）的交点，再过滤掉不在图元上的点。
//! 延伸时使用"虚拟"几何：线段的射线延长、圆弧在缺口内的续弧。

use crate::element::{Element, ElementId, ElementKind};
use crate::geometry::{Arc, Carrier};
use crate::math::{angle_between, ccw_angle_distance, points_equal, Point2, Vector2, EPSILON, TAU};

/// 叶子图元（线段、圆弧、圆）的承载曲线
fn carrier_of(kind: &ElementKind) -> Option<Carrier> {
    match kind {
        ElementKind::Line(line) => Some(Carrier::of_line(line)),
        ElementKind::Arc(arc) => Some(Carrier::of_circle(arc.center, arc.radius)),
        ElementKind::Circle(circle) => Some(Carrier::of_circle(circle.center, circle.radius)),
        _ => None,
    }
}

fn leaf_contains(kind: &ElementKind, point: &Point2) -> bool {
    match kind {
        ElementKind::Line(line) => line.contains_point(point),
        ElementKind::Arc(arc) => arc.contains_point(point),
        ElementKind::Circle(circle) => circle.contains_point(point),
        _ => false,
    }
}

fn leaf_kinds(kind: &ElementKind) -> Vec<&ElementKind> {
    match kind {
        ElementKind::Polyline(pl) | ElementKind::Rectangle(pl) => {
            pl.segments().iter().map(|s| s.kind()).collect()
        }
        _ => vec![kind],
    }
}

fn push_distinct(points: &mut Vec<Point2>, point: Point2) {
    if !points.iter().any(|p| points_equal(p, &point)) {
        points.push(point);
    }
}

/// 两个几何的全部交点（去重）
pub fn intersect_kinds(a: &ElementKind, b: &ElementKind) -> Vec<Point2> {
    let mut points = Vec::new();
    for leaf_a in leaf_kinds(a) {
        let Some(carrier_a) = carrier_of(leaf_a) else {
            continue;
        };
        for leaf_b in leaf_kinds(b) {
            let Some(carrier_b) = carrier_of(leaf_b) else {
                continue;
            };
            for p in carrier_a.intersections(&carrier_b) {
                if leaf_contains(leaf_a, &p) && leaf_contains(leaf_b, &p) {
                    push_distinct(&mut points, p);
                }
            }
        }
    }
    points
}

/// 两个元素的全部交点
pub fn intersect_elements(a: &Element, b: &Element) -> Vec<Point2> {
    intersect_kinds(a.kind(), b.kind())
}

/// 从端点出发的延伸几何
#[derive(Debug, Clone, Copy)]
pub enum Extension {
    /// 射线
    Ray { origin: Point2, direction: Vector2 },
    /// 虚拟圆弧：从 `origin_angle` 出发沿给定转向扫过 `limit` 弧度
    Sweep {
        center: Point2,
        radius: f64,
        origin_angle: f64,
        clockwise: bool,
        limit: f64,
    },
}

impl Extension {
    /// 元素在指定端点处的延伸；闭合图形没有延伸
    pub fn of_element(element: &Element, from_start: bool) -> Option<(Extension, ElementId)> {
        match element.kind() {
            ElementKind::Polyline(pl) if !pl.is_joined() => {
                let flags = pl.orientations();
                let index = if from_start { 0 } else { pl.segment_count() - 1 };
                let leaf = pl.segments().get(index)?;
                // 路径方向与几何方向相反时，路径起点是几何终点
                let leaf_from_start = from_start != flags[index];
                Self::of_leaf(leaf.kind(), leaf_from_start).map(|ext| (ext, leaf.id()))
            }
            kind => Self::of_leaf(kind, from_start).map(|ext| (ext, element.id())),
        }
    }

    fn of_leaf(kind: &ElementKind, from_start: bool) -> Option<Extension> {
        match kind {
            ElementKind::Line(line) => {
                if line.length() < EPSILON {
                    return None;
                }
                let (origin, direction) = if from_start {
                    (line.start, -line.direction())
                } else {
                    (line.end, line.direction())
                };
                Some(Extension::Ray { origin, direction })
            }
            ElementKind::Arc(arc) => Some(Self::of_arc(arc, from_start)),
            _ => None,
        }
    }

    fn of_arc(arc: &Arc, from_start: bool) -> Extension {
        let (origin_angle, clockwise) = if from_start {
            (arc.start_angle, true)
        } else {
            (arc.end_angle, false)
        };
        Extension::Sweep {
            center: arc.center,
            radius: arc.radius,
            origin_angle,
            clockwise,
            limit: TAU - arc.sweep_angle(),
        }
    }

    /// 延伸起点
    pub fn origin(&self) -> Point2 {
        match *self {
            Extension::Ray { origin, .. } => origin,
            Extension::Sweep {
                center,
                radius,
                origin_angle,
                ..
            } => Point2::new(
                center.x + radius * origin_angle.cos(),
                center.y + radius * origin_angle.sin(),
            ),
        }
    }

    pub fn carrier(&self) -> Carrier {
        match *self {
            Extension::Ray { origin, direction } => Carrier::Line { origin, direction },
            Extension::Sweep { center, radius, .. } => Carrier::of_circle(center, radius),
        }
    }

    /// 沿延伸方向到点的距离（射线为长度，圆弧为弧度）；点不在延伸上时为 None
    pub fn parameter(&self, point: &Point2) -> Option<f64> {
        match *self {
            Extension::Ray { origin, direction } => {
                let t = (point - origin).dot(&direction);
                (t >= -EPSILON).then_some(t.max(0.0))
            }
            Extension::Sweep {
                center,
                radius,
                origin_angle,
                clockwise,
                limit,
            } => {
                let angle = angle_between(&center, point);
                let mut d = if clockwise {
                    ccw_angle_distance(angle, origin_angle)
                } else {
                    ccw_angle_distance(origin_angle, angle)
                };
                let tolerance = EPSILON / radius.max(EPSILON);
                if d > TAU - tolerance {
                    d = 0.0;
                }
                (d <= limit + tolerance).then_some(d)
            }
        }
    }
}

/// 最近交点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectHit {
    pub point: Point2,
    /// 被碰到的叶子图元
    pub element_id: ElementId,
    /// 沿延伸方向的距离
    pub distance: f64,
}

/// 沿 `element` 在指定端点的延伸方向，找到与候选元素最近的交点
///
/// `exclude_existing` 为真时忽略与元素现有端点重合的交点（元素已经接触的边界）；
/// `locality` 用于拒绝落在当前网格分区之外的交点。
pub fn find_closest_intersect_point(
    element: &Element,
    candidates: &[&Element],
    from_start: bool,
    exclude_existing: bool,
    locality: Option<&dyn Fn(&Point2) -> bool>,
) -> Option<IntersectHit> {
    let (extension, own_leaf) = Extension::of_element(element, from_start)?;
    let carrier = extension.carrier();
    // 元素现有的端点：延伸起点和另一端
    let mut existing = vec![extension.origin()];
    if let Some((start, end)) = element.endpoints() {
        existing.push(if from_start { end } else { start });
    }

    let mut best: Option<IntersectHit> = None;
    for candidate in candidates {
        if candidate.id() == element.id() || candidate.id() == own_leaf {
            continue;
        }
        for leaf in candidate.leaves() {
            if leaf.id() == own_leaf {
                continue;
            }
            let Some(leaf_carrier) = carrier_of(leaf.kind()) else {
                continue;
            };
            for p in carrier.intersections(&leaf_carrier) {
                if !leaf_contains(leaf.kind(), &p) {
                    continue;
                }
                if exclude_existing && existing.iter().any(|e| points_equal(&p, e)) {
                    continue;
                }
                let Some(distance) = extension.parameter(&p) else {
                    continue;
                };
                if let Some(check) = locality {
                    if !check(&p) {
                        continue;
                    }
                }
                let closer = best.map_or(true, |b| {
                    distance < b.distance - EPSILON
                        || ((distance - b.distance).abs() <= EPSILON && leaf.id() < b.element_id)
                });
                if closer {
                    best = Some(IntersectHit {
                        point: p,
                        element_id: leaf.id(),
                        distance,
                    });
                }
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Arc;
    use std::f64::consts::PI;

    fn line(x1: f64, y1: f64, x2: f64, y2: f64) -> Element {
        Element::line(Point2::new(x1, y1), Point2::new(x2, y2)).unwrap()
    }

    fn assert_symmetric(a: &Element, b: &Element, expected: usize) {
        let ab = intersect_elements(a, b);
        let ba = intersect_elements(b, a);
        assert_eq!(ab.len(), expected);
        assert_eq!(ba.len(), expected);
        for p in &ab {
            assert!(ba.iter().any(|q| points_equal(p, q)));
        }
    }

    #[test]
    fn test_line_line_symmetry() {
        let a = line(0.0, 0.0, 10.0, 10.0);
        let b = line(0.0, 10.0, 10.0, 0.0);
        assert_symmetric(&a, &b, 1);
        assert!(points_equal(&intersect_elements(&a, &b)[0], &Point2::new(5.0, 5.0)));
    }

    #[test]
    fn test_line_arc_symmetry() {
        let a = line(-20.0, 5.0, 20.0, 5.0);
        let arc = Element::arc(Arc::new(Point2::origin(), 10.0, 0.0, PI)).unwrap();
        assert_symmetric(&a, &arc, 2);

        // 下半平面没有弧
        let below = line(-20.0, -5.0, 20.0, -5.0);
        assert!(intersect_elements(&below, &arc).is_empty());
    }

    #[test]
    fn test_line_circle_symmetry() {
        let a = line(-20.0, 0.0, 0.0, 0.0);
        let circle = Element::circle(Point2::origin(), 10.0).unwrap();
        assert_symmetric(&a, &circle, 1);
    }

    #[test]
    fn test_segment_bounds_respected() {
        let a = line(0.0, 0.0, 4.0, 0.0);
        let b = line(5.0, -5.0, 5.0, 5.0);
        assert!(intersect_elements(&a, &b).is_empty());
    }

    #[test]
    fn test_polyline_intersections() {
        let square = Element::polyline(
            &[
                Point2::new(0.0, 0.0),
                Point2::new(100.0, 0.0),
                Point2::new(100.0, 100.0),
                Point2::new(0.0, 100.0),
            ],
            true,
        )
        .unwrap();
        let vertical = line(50.0, -20.0, 50.0, 120.0);
        assert_symmetric(&square, &vertical, 2);
    }

    #[test]
    fn test_closest_intersect_along_ray() {
        let target = line(0.0, 0.0, 10.0, 0.0);
        let near = line(20.0, -5.0, 20.0, 5.0);
        let far = line(40.0, -5.0, 40.0, 5.0);
        let behind = line(-10.0, -5.0, -10.0, 5.0);

        let hit = find_closest_intersect_point(&target, &[&far, &near, &behind], false, true, None)
            .unwrap();
        assert_eq!(hit.element_id, near.id());
        assert!((hit.distance - 10.0).abs() < EPSILON);

        let hit = find_closest_intersect_point(&target, &[&far, &near, &behind], true, true, None)
            .unwrap();
        assert_eq!(hit.element_id, behind.id());
    }

    #[test]
    fn test_closest_intersect_excludes_touching_boundary() {
        let target = line(0.0, 0.0, 10.0, 0.0);
        let touching = line(10.0, -5.0, 10.0, 5.0);
        assert!(
            find_closest_intersect_point(&target, &[&touching], false, true, None).is_none()
        );
        assert!(
            find_closest_intersect_point(&target, &[&touching], false, false, None).is_some()
        );
    }

    #[test]
    fn test_closest_intersect_excludes_far_endpoint() {
        // 圆弧终点一侧的续弧绕到起点 (150, 100)，墙只在那里接触
        let arc = Element::arc(Arc::new(Point2::new(100.0, 100.0), 50.0, 0.0, PI)).unwrap();
        let wall = line(150.0, 100.0, 170.0, 80.0);
        assert!(find_closest_intersect_point(&arc, &[&wall], false, true, None).is_none());
        let hit = find_closest_intersect_point(&arc, &[&wall], false, false, None).unwrap();
        assert!(points_equal(&hit.point, &Point2::new(150.0, 100.0)));
    }

    #[test]
    fn test_closest_intersect_locality() {
        let target = line(0.0, 0.0, 10.0, 0.0);
        let near = line(20.0, -5.0, 20.0, 5.0);
        let check = |p: &Point2| p.x < 15.0;
        assert!(
            find_closest_intersect_point(&target, &[&near], false, true, Some(&check)).is_none()
        );
    }

    #[test]
    fn test_arc_extension() {
        // 上半圆弧，从终点 (-10,0) 逆时针继续
        let arc = Element::arc(Arc::new(Point2::origin(), 10.0, 0.0, PI)).unwrap();
        let wall = line(-5.0, -20.0, -5.0, 0.0);
        let hit = find_closest_intersect_point(&arc, &[&wall], false, true, None).unwrap();
        let expected = Point2::new(-5.0, -(75.0_f64).sqrt());
        assert!(points_equal(&hit.point, &expected));

        // 从起点顺时针延伸碰不到左侧的墙
        let right_wall = line(5.0, -20.0, 5.0, 0.0);
        let hit = find_closest_intersect_point(&arc, &[&wall, &right_wall], true, true, None)
            .unwrap();
        assert_eq!(hit.element_id, right_wall.id());
    }

    #[test]
    fn test_open_polyline_extension_uses_terminal_segment() {
        let pl = Element::polyline(
            &[
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 0.0),
                Point2::new(10.0, 10.0),
            ],
            false,
        )
        .unwrap();
        let ceiling = line(0.0, 30.0, 20.0, 30.0);
        let hit = find_closest_intersect_point(&pl, &[&ceiling], false, true, None).unwrap();
        assert!(points_equal(&hit.point, &Point2::new(10.0, 30.0)));

        let wall = line(-5.0, -5.0, -5.0, 5.0);
        let hit = find_closest_intersect_point(&pl, &[&wall], true, true, None).unwrap();
        assert!(points_equal(&hit.point, &Point2::new(-5.0, 0.0)));
    }
}
