//! 几何图元定义
//!
//! 支持的基本图元：
//! - 线段 (Line)
//! - 圆弧 (Arc)，逆时针从起始角扫到终止角
//! - 圆 (Circle)
//!
//! 多段线/矩形由若干线段、圆弧子元素组成，定义在 [`crate::element`] 中。
//! 本模块还提供承载曲线（无限直线、完整圆）之间的求交计算。

use crate::math::{
    angle_between, ccw_angle_distance, normalize_angle, point_on_circle, points_equal,
    rotate_point, BoundingBox2, Point2, Vector2, EPSILON, TAU,
};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

/// 线段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub start: Point2,
    pub end: Point2,
}

impl Line {
    pub fn new(start: Point2, end: Point2) -> Self {
        Self { start, end }
    }

    /// 计算线段长度
    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    /// 计算线段方向向量（单位向量）
    pub fn direction(&self) -> Vector2 {
        (self.end - self.start).normalize()
    }

    /// 计算线段中点
    pub fn midpoint(&self) -> Point2 {
        Point2::new(
            (self.start.x + self.end.x) / 2.0,
            (self.start.y + self.end.y) / 2.0,
        )
    }

    /// 计算点到线段的最近点
    pub fn nearest_point(&self, point: &Point2) -> Point2 {
        let v = self.end - self.start;
        let w = point - self.start;

        let c1 = w.dot(&v);
        if c1 <= 0.0 {
            return self.start;
        }

        let c2 = v.dot(&v);
        if c2 <= c1 {
            return self.end;
        }

        self.start + v * (c1 / c2)
    }

    /// 计算点到线段的距离
    pub fn distance_to_point(&self, point: &Point2) -> f64 {
        (point - self.nearest_point(point)).norm()
    }

    /// 点在线段方向上距起点的有符号距离（投影）
    pub fn distance_from_start(&self, point: &Point2) -> f64 {
        let len = self.length();
        if len < EPSILON {
            return 0.0;
        }
        (point - self.start).dot(&(self.end - self.start)) / len
    }

    /// 沿线段方向距起点 `distance` 处的点（可超出线段）
    pub fn point_at_distance(&self, distance: f64) -> Point2 {
        self.start + self.direction() * distance
    }

    /// 点是否在线段上（容差内）
    pub fn contains_point(&self, point: &Point2) -> bool {
        self.distance_to_point(point) < EPSILON
    }

    pub fn translate(&mut self, offset: &Vector2) {
        self.start += *offset;
        self.end += *offset;
    }

    pub fn rotate_about(&mut self, pivot: &Point2, angle: f64) {
        self.start = rotate_point(&self.start, pivot, angle);
        self.end = rotate_point(&self.end, pivot, angle);
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        BoundingBox2::from_points([self.start, self.end])
    }
}

/// 圆
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Point2,
    pub radius: f64,
}

impl Circle {
    pub fn new(center: Point2, radius: f64) -> Self {
        Self { center, radius }
    }

    /// 计算周长
    pub fn circumference(&self) -> f64 {
        TAU * self.radius
    }

    /// 获取圆上指定角度的点
    pub fn point_at_angle(&self, angle: f64) -> Point2 {
        point_on_circle(&self.center, self.radius, angle)
    }

    /// 边界端点：0°, 90°, 180°, 270° 四个象限点
    pub fn boundary_points(&self) -> [Point2; 4] {
        [
            self.point_at_angle(0.0),
            self.point_at_angle(FRAC_PI_2),
            self.point_at_angle(PI),
            self.point_at_angle(3.0 * FRAC_PI_2),
        ]
    }

    /// 圆上距离给定点最近的点；给定点恰为圆心时取 0° 方向
    pub fn nearest_point(&self, point: &Point2) -> Point2 {
        if points_equal(point, &self.center) {
            return self.point_at_angle(0.0);
        }
        self.point_at_angle(angle_between(&self.center, point))
    }

    /// 点到圆周的距离
    pub fn distance_to_point(&self, point: &Point2) -> f64 {
        ((point - self.center).norm() - self.radius).abs()
    }

    pub fn contains_point(&self, point: &Point2) -> bool {
        self.distance_to_point(point) < EPSILON
    }

    pub fn translate(&mut self, offset: &Vector2) {
        self.center += *offset;
    }

    pub fn rotate_about(&mut self, pivot: &Point2, angle: f64) {
        self.center = rotate_point(&self.center, pivot, angle);
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        BoundingBox2::new(
            Point2::new(self.center.x - self.radius, self.center.y - self.radius),
            Point2::new(self.center.x + self.radius, self.center.y + self.radius),
        )
    }
}

/// 圆弧（逆时针）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    pub center: Point2,
    pub radius: f64,
    /// 起始角度（弧度）
    pub start_angle: f64,
    /// 终止角度（弧度）
    pub end_angle: f64,
}

impl Arc {
    pub fn new(center: Point2, radius: f64, start_angle: f64, end_angle: f64) -> Self {
        Self {
            center,
            radius,
            start_angle: normalize_angle(start_angle),
            end_angle: normalize_angle(end_angle),
        }
    }

    /// 由圆心、起点方向、终点方向创建，半径取圆心到起点的距离
    pub fn from_center_and_points(center: Point2, start: Point2, end: Point2) -> Self {
        let radius = (start - center).norm();
        Self::new(
            center,
            radius,
            angle_between(&center, &start),
            angle_between(&center, &end),
        )
    }

    /// 从三点创建圆弧，`p2` 为弧上经过的点
    pub fn from_three_points(p1: Point2, p2: Point2, p3: Point2) -> Option<Self> {
        // 计算圆心
        let d = 2.0 * (p1.x * (p2.y - p3.y) + p2.x * (p3.y - p1.y) + p3.x * (p1.y - p2.y));

        if d.abs() < EPSILON {
            return None; // 三点共线
        }

        let ux = ((p1.x * p1.x + p1.y * p1.y) * (p2.y - p3.y)
            + (p2.x * p2.x + p2.y * p2.y) * (p3.y - p1.y)
            + (p3.x * p3.x + p3.y * p3.y) * (p1.y - p2.y))
            / d;
        let uy = ((p1.x * p1.x + p1.y * p1.y) * (p3.x - p2.x)
            + (p2.x * p2.x + p2.y * p2.y) * (p1.x - p3.x)
            + (p3.x * p3.x + p3.y * p3.y) * (p2.x - p1.x))
            / d;

        let center = Point2::new(ux, uy);
        let radius = (p1 - center).norm();
        let a1 = angle_between(&center, &p1);
        let a2 = angle_between(&center, &p2);
        let a3 = angle_between(&center, &p3);

        // 经过点不在逆时针范围内时，反向即可
        if ccw_angle_distance(a1, a2) <= ccw_angle_distance(a1, a3) {
            Some(Self::new(center, radius, a1, a3))
        } else {
            Some(Self::new(center, radius, a3, a1))
        }
    }

    /// 计算扫过的角度，范围 (0, 2π)
    pub fn sweep_angle(&self) -> f64 {
        ccw_angle_distance(self.start_angle, self.end_angle)
    }

    /// 计算弧长
    pub fn length(&self) -> f64 {
        self.sweep_angle() * self.radius
    }

    /// 获取起点
    pub fn start_point(&self) -> Point2 {
        point_on_circle(&self.center, self.radius, self.start_angle)
    }

    /// 获取终点
    pub fn end_point(&self) -> Point2 {
        point_on_circle(&self.center, self.radius, self.end_angle)
    }

    /// 弧的中点
    pub fn mid_point(&self) -> Point2 {
        point_on_circle(
            &self.center,
            self.radius,
            self.start_angle + self.sweep_angle() / 2.0,
        )
    }

    /// 点所在方向相对起始角的逆时针角距离
    pub fn angular_distance(&self, point: &Point2) -> f64 {
        ccw_angle_distance(self.start_angle, angle_between(&self.center, point))
    }

    /// 距起始角 `angle` 弧度处的点
    pub fn point_at_angular_distance(&self, angle: f64) -> Point2 {
        point_on_circle(&self.center, self.radius, self.start_angle + angle)
    }

    /// 检查角度是否在弧的范围内（端点含容差）
    pub fn contains_angle(&self, angle: f64) -> bool {
        let tolerance = EPSILON / self.radius.max(EPSILON);
        let d = ccw_angle_distance(self.start_angle, angle);
        d <= self.sweep_angle() + tolerance || d >= TAU - tolerance
    }

    /// 点是否在弧上（容差内）
    pub fn contains_point(&self, point: &Point2) -> bool {
        ((point - self.center).norm() - self.radius).abs() < EPSILON
            && self.contains_angle(angle_between(&self.center, point))
    }

    /// 弧上距离给定点最近的点
    pub fn nearest_point(&self, point: &Point2) -> Point2 {
        if !points_equal(point, &self.center) {
            let angle = angle_between(&self.center, point);
            if self.contains_angle(angle) {
                return point_on_circle(&self.center, self.radius, angle);
            }
        }
        let start = self.start_point();
        let end = self.end_point();
        if (point - start).norm() <= (point - end).norm() {
            start
        } else {
            end
        }
    }

    /// 计算点到圆弧的距离
    pub fn distance_to_point(&self, point: &Point2) -> f64 {
        (point - self.nearest_point(point)).norm()
    }

    pub fn translate(&mut self, offset: &Vector2) {
        self.center += *offset;
    }

    pub fn rotate_about(&mut self, pivot: &Point2, angle: f64) {
        self.center = rotate_point(&self.center, pivot, angle);
        self.start_angle = normalize_angle(self.start_angle + angle);
        self.end_angle = normalize_angle(self.end_angle + angle);
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        let mut bbox = BoundingBox2::from_points([self.start_point(), self.end_point()]);

        // 检查象限点
        for angle in [0.0, FRAC_PI_2, PI, 3.0 * FRAC_PI_2] {
            if self.contains_angle(angle) {
                bbox.expand_to_include(&point_on_circle(&self.center, self.radius, angle));
            }
        }

        bbox
    }
}

/// 承载曲线：图元所在的无限直线或完整圆
#[derive(Debug, Clone, Copy)]
pub enum Carrier {
    /// 过 `origin`、方向为单位向量 `direction` 的无限直线
    Line { origin: Point2, direction: Vector2 },
    Circle { center: Point2, radius: f64 },
}

impl Carrier {
    pub fn of_line(line: &Line) -> Self {
        Carrier::Line {
            origin: line.start,
            direction: line.direction(),
        }
    }

    pub fn of_circle(center: Point2, radius: f64) -> Self {
        Carrier::Circle { center, radius }
    }

    /// 两条承载曲线的交点（平行/同心时无交点）
    pub fn intersections(&self, other: &Carrier) -> Vec<Point2> {
        match (self, other) {
            (
                Carrier::Line { origin: o1, direction: d1 },
                Carrier::Line { origin: o2, direction: d2 },
            ) => line_line_intersection(o1, d1, o2, d2).into_iter().collect(),
            (Carrier::Line { origin, direction }, Carrier::Circle { center, radius })
            | (Carrier::Circle { center, radius }, Carrier::Line { origin, direction }) => {
                line_circle_intersection(origin, direction, center, *radius)
            }
            (
                Carrier::Circle { center: c1, radius: r1 },
                Carrier::Circle { center: c2, radius: r2 },
            ) => circle_circle_intersection(c1, *r1, c2, *r2),
        }
    }
}

/// 无限直线-无限直线交点
fn line_line_intersection(o1: &Point2, d1: &Vector2, o2: &Point2, d2: &Vector2) -> Option<Point2> {
    let cross = d1.x * d2.y - d1.y * d2.x;

    // 平行
    if cross.abs() < EPSILON * EPSILON {
        return None;
    }

    let d = o2 - o1;
    let t = (d.x * d2.y - d.y * d2.x) / cross;
    Some(o1 + d1 * t)
}

/// 无限直线-圆交点
fn line_circle_intersection(
    origin: &Point2,
    direction: &Vector2,
    center: &Point2,
    radius: f64,
) -> Vec<Point2> {
    let f = origin - center;
    let b = f.dot(direction);
    let c = f.dot(&f) - radius * radius;
    let discriminant = b * b - c;

    if discriminant < -EPSILON {
        return vec![];
    }

    if discriminant.abs() <= EPSILON {
        // 一个交点（相切）
        return vec![origin + direction * -b];
    }

    let sqrt_disc = discriminant.sqrt();
    vec![
        origin + direction * (-b - sqrt_disc),
        origin + direction * (-b + sqrt_disc),
    ]
}

/// 圆-圆交点
fn circle_circle_intersection(c1: &Point2, r1: f64, c2: &Point2, r2: f64) -> Vec<Point2> {
    let d = (c2 - c1).norm();

    // 不相交或同心
    if d < EPSILON || d > r1 + r2 + EPSILON || d < (r1 - r2).abs() - EPSILON {
        return vec![];
    }

    let a = (r1 * r1 - r2 * r2 + d * d) / (2.0 * d);
    let h = (r1 * r1 - a * a).max(0.0).sqrt();

    let p = c1 + (c2 - c1) * (a / d);
    let dir = (c2 - c1) / d;
    let perp = Vector2::new(-dir.y, dir.x);

    if h < EPSILON {
        // 一个交点（相切）
        vec![p]
    } else {
        vec![p + perp * h, p - perp * h]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_length() {
        let line = Line::new(Point2::new(0.0, 0.0), Point2::new(3.0, 4.0));
        assert!((line.length() - 5.0).abs() < EPSILON);
    }

    #[test]
    fn test_nearest_point_on_line() {
        let line = Line::new(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0));

        let nearest = line.nearest_point(&Point2::new(5.0, 5.0));
        assert!(points_equal(&nearest, &Point2::new(5.0, 0.0)));

        // 线段外的点返回起点
        let nearest = line.nearest_point(&Point2::new(-5.0, 0.0));
        assert!(points_equal(&nearest, &line.start));
    }

    #[test]
    fn test_circle_boundary_points() {
        let circle = Circle::new(Point2::origin(), 50.0);
        let [p0, p1, p2, p3] = circle.boundary_points();
        assert!(points_equal(&p0, &Point2::new(50.0, 0.0)));
        assert!(points_equal(&p1, &Point2::new(0.0, 50.0)));
        assert!(points_equal(&p2, &Point2::new(-50.0, 0.0)));
        assert!(points_equal(&p3, &Point2::new(0.0, -50.0)));
    }

    #[test]
    fn test_arc_from_three_points_orientation() {
        // 经过 (0,10) 的上半圆
        let arc = Arc::from_three_points(
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 10.0),
            Point2::new(-10.0, 0.0),
        )
        .unwrap();
        assert!((arc.sweep_angle() - PI).abs() < EPSILON);
        assert!(arc.contains_point(&Point2::new(0.0, 10.0)));
        assert!(!arc.contains_point(&Point2::new(0.0, -10.0)));

        // 经过 (0,-10) 的下半圆
        let arc = Arc::from_three_points(
            Point2::new(10.0, 0.0),
            Point2::new(0.0, -10.0),
            Point2::new(-10.0, 0.0),
        )
        .unwrap();
        assert!(arc.contains_point(&Point2::new(0.0, -10.0)));
        assert!(!arc.contains_point(&Point2::new(0.0, 10.0)));
    }

    #[test]
    fn test_arc_wraparound_contains_angle() {
        let arc = Arc::new(Point2::origin(), 5.0, 1.5 * PI, 0.5 * PI);
        assert!(arc.contains_angle(0.0));
        assert!(!arc.contains_angle(PI));
        assert!((arc.length() - 5.0 * PI).abs() < EPSILON);
    }

    #[test]
    fn test_arc_bounding_box() {
        let arc = Arc::new(Point2::origin(), 10.0, 0.0, PI);
        let bbox = arc.bounding_box();
        assert!((bbox.max.y - 10.0).abs() < EPSILON);
        assert!(bbox.min.y.abs() < EPSILON);
    }

    #[test]
    fn test_carrier_line_circle() {
        let line = Carrier::of_line(&Line::new(Point2::new(-20.0, 0.0), Point2::new(20.0, 0.0)));
        let circle = Carrier::of_circle(Point2::origin(), 10.0);
        let points = line.intersections(&circle);
        assert_eq!(points.len(), 2);
        assert!(points.iter().any(|p| points_equal(p, &Point2::new(10.0, 0.0))));
        assert!(points.iter().any(|p| points_equal(p, &Point2::new(-10.0, 0.0))));
    }

    #[test]
    fn test_carrier_parallel_lines() {
        let l1 = Carrier::of_line(&Line::new(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)));
        let l2 = Carrier::of_line(&Line::new(Point2::new(0.0, 5.0), Point2::new(10.0, 5.0)));
        assert!(l1.intersections(&l2).is_empty());
    }

    #[test]
    fn test_carrier_circle_circle() {
        let c1 = Carrier::of_circle(Point2::new(0.0, 0.0), 5.0);
        let c2 = Carrier::of_circle(Point2::new(8.0, 0.0), 5.0);
        let points = c1.intersections(&c2);
        assert_eq!(points.len(), 2);
        for p in points {
            assert!((p.x - 4.0).abs() < EPSILON);
            assert!((p.y.abs() - 3.0).abs() < EPSILON);
        }
    }
}
