//! 基础数学类型与工具函数
//!
//! 点、向量使用 nalgebra 类型；角度统一使用弧度，逆时针为正方向。

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// 2D点
pub type Point2 = nalgebra::Point2<f64>;

/// 2D向量
pub type Vector2 = nalgebra::Vector2<f64>;

/// 几何比较容差
pub const EPSILON: f64 = 1e-6;

/// 2π
pub const TAU: f64 = 2.0 * PI;

/// 轴对齐包围盒
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox2 {
    pub min: Point2,
    pub max: Point2,
}

impl BoundingBox2 {
    /// 由两个任意角点创建（自动排序）
    pub fn new(p1: Point2, p2: Point2) -> Self {
        Self {
            min: Point2::new(p1.x.min(p2.x), p1.y.min(p2.y)),
            max: Point2::new(p1.x.max(p2.x), p1.y.max(p2.y)),
        }
    }

    /// 空包围盒（min > max）
    pub fn empty() -> Self {
        Self {
            min: Point2::new(f64::MAX, f64::MAX),
            max: Point2::new(f64::MIN, f64::MIN),
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = Point2>) -> Self {
        let mut bbox = Self::empty();
        for p in points {
            bbox.expand_to_include(&p);
        }
        bbox
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    pub fn expand_to_include(&mut self, point: &Point2) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
    }

    /// 合并另一个包围盒
    pub fn union(&self, other: &BoundingBox2) -> BoundingBox2 {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        BoundingBox2 {
            min: Point2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// 点是否在包围盒内（含边界容差）
    pub fn contains(&self, point: &Point2) -> bool {
        point.x >= self.min.x - EPSILON
            && point.x <= self.max.x + EPSILON
            && point.y >= self.min.y - EPSILON
            && point.y <= self.max.y + EPSILON
    }

    /// 另一个包围盒是否完全在内部
    pub fn contains_box(&self, other: &BoundingBox2) -> bool {
        self.contains(&other.min) && self.contains(&other.max)
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// 四个角点，逆时针，从 min 开始
    pub fn corners(&self) -> [Point2; 4] {
        [
            self.min,
            Point2::new(self.max.x, self.min.y),
            self.max,
            Point2::new(self.min.x, self.max.y),
        ]
    }
}

/// 两点距离
pub fn distance(p1: &Point2, p2: &Point2) -> f64 {
    (p2 - p1).norm()
}

/// 两点在容差内重合
pub fn points_equal(p1: &Point2, p2: &Point2) -> bool {
    distance(p1, p2) < EPSILON
}

/// 将角度归一化到 [0, 2π)
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle.rem_euclid(TAU);
    // rem_euclid 可能因舍入返回 TAU
    if a >= TAU - EPSILON * EPSILON {
        0.0
    } else {
        a
    }
}

/// 从 `from` 指向 `to` 的方向角，范围 [0, 2π)
pub fn angle_between(from: &Point2, to: &Point2) -> f64 {
    normalize_angle((to.y - from.y).atan2(to.x - from.x))
}

/// 从 `from` 逆时针转到 `to` 的角距离，范围 [0, 2π)
pub fn ccw_angle_distance(from: f64, to: f64) -> f64 {
    normalize_angle(to - from)
}

/// 绕基点旋转
pub fn rotate_point(point: &Point2, pivot: &Point2, angle: f64) -> Point2 {
    let (sin, cos) = angle.sin_cos();
    let dx = point.x - pivot.x;
    let dy = point.y - pivot.y;
    Point2::new(pivot.x + dx * cos - dy * sin, pivot.y + dx * sin + dy * cos)
}

/// 点在无限直线上的垂足
pub fn perpendicular_foot(point: &Point2, line_start: &Point2, line_end: &Point2) -> Point2 {
    let v = line_end - line_start;
    let len_sq = v.dot(&v);
    if len_sq < EPSILON * EPSILON {
        return *line_start;
    }
    let t = (point - line_start).dot(&v) / len_sq;
    line_start + v * t
}

/// 圆上指定角度的点
pub fn point_on_circle(center: &Point2, radius: f64, angle: f64) -> Point2 {
    Point2::new(
        center.x + radius * angle.cos(),
        center.y + radius * angle.sin(),
    )
}

/// 用于堆排序的全序 f64 包装
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderedF64(pub f64);

impl Eq for OrderedF64 {}

impl PartialOrd for OrderedF64 {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedF64 {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(-PI / 2.0) - 1.5 * PI).abs() < EPSILON);
        assert!((normalize_angle(5.0 * PI) - PI).abs() < EPSILON);
        assert_eq!(normalize_angle(TAU), 0.0);
    }

    #[test]
    fn test_angle_between() {
        let o = Point2::origin();
        assert!((angle_between(&o, &Point2::new(0.0, 1.0)) - PI / 2.0).abs() < EPSILON);
        assert!((angle_between(&o, &Point2::new(0.0, -1.0)) - 1.5 * PI).abs() < EPSILON);
    }

    #[test]
    fn test_rotate_point() {
        let p = rotate_point(&Point2::new(2.0, 1.0), &Point2::new(1.0, 1.0), PI / 2.0);
        assert!(points_equal(&p, &Point2::new(1.0, 2.0)));
    }

    #[test]
    fn test_perpendicular_foot() {
        let foot = perpendicular_foot(
            &Point2::new(5.0, 5.0),
            &Point2::new(0.0, 0.0),
            &Point2::new(10.0, 0.0),
        );
        assert!(points_equal(&foot, &Point2::new(5.0, 0.0)));
    }

    #[test]
    fn test_bounding_box() {
        let bbox = BoundingBox2::from_points([Point2::new(3.0, -1.0), Point2::new(-2.0, 4.0)]);
        assert!(bbox.contains(&Point2::new(0.0, 0.0)));
        assert!(!bbox.contains(&Point2::new(5.0, 0.0)));
        assert!((bbox.width() - 5.0).abs() < EPSILON);
    }
}
