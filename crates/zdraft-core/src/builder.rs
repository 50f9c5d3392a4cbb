//! 元素构造过程
//!
//! 绘图命令逐个确定元素的属性点：`define_next_attribute` 固定一个属性，
//! `set_last_attribute` 设置待定的下一个属性（用于跟随光标预览），
//! 属性齐全后调用 `build` 生成带ID的元素。

use crate::element::{Element, ElementKind, Polyline};
use crate::error::{KernelError, Result};
use crate::geometry::{Arc, Circle, Line};
use crate::math::{BoundingBox2, Point2};
use serde::{Deserialize, Serialize};

/// 待构造的元素类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuilderKind {
    /// 起点 → 终点
    Line,
    /// 圆心 → 起点 → 终点
    Arc,
    /// 圆心 → 圆上一点
    Circle,
    /// 依次给出顶点
    Polyline,
    /// 角点 → 对角点
    Rectangle,
}

impl BuilderKind {
    /// 完全定义所需的属性点个数；多段线不定长
    fn required_points(&self) -> Option<usize> {
        match self {
            BuilderKind::Line | BuilderKind::Circle | BuilderKind::Rectangle => Some(2),
            BuilderKind::Arc => Some(3),
            BuilderKind::Polyline => None,
        }
    }
}

/// 构造中的元素
#[derive(Debug, Clone)]
pub struct ElementBuilder {
    kind: BuilderKind,
    points: Vec<Point2>,
    pending: Option<Point2>,
    closed: bool,
    finished: bool,
}

impl ElementBuilder {
    pub fn new(kind: BuilderKind) -> Self {
        Self {
            kind,
            points: Vec::new(),
            pending: None,
            closed: false,
            finished: false,
        }
    }

    pub fn kind(&self) -> BuilderKind {
        self.kind
    }

    /// 已确定的属性点
    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    /// 确定下一个属性
    pub fn define_next_attribute(&mut self, point: Point2) -> Result<()> {
        if self.is_fully_defined() {
            return Err(KernelError::invalid(format!(
                "{:?} is already fully defined",
                self.kind
            )));
        }
        self.points.push(point);
        self.pending = None;
        Ok(())
    }

    /// 设置待定的最后一个属性
    pub fn set_last_attribute(&mut self, point: Point2) -> Result<()> {
        if self.points.is_empty() {
            return Err(KernelError::invalid("no base point defined yet"));
        }
        self.pending = Some(point);
        Ok(())
    }

    /// 结束多段线输入（开放）
    pub fn finish(&mut self) -> Result<()> {
        if self.kind != BuilderKind::Polyline {
            return Err(KernelError::invalid("only polylines can be finished"));
        }
        if self.points.len() < 2 {
            return Err(KernelError::invalid("polyline needs at least two vertices"));
        }
        self.finished = true;
        self.pending = None;
        Ok(())
    }

    /// 闭合多段线
    pub fn close(&mut self) -> Result<()> {
        if self.kind != BuilderKind::Polyline {
            return Err(KernelError::invalid("only polylines can be closed"));
        }
        if self.points.len() < 3 {
            return Err(KernelError::invalid("closed polyline needs three vertices"));
        }
        self.closed = true;
        self.finish()
    }

    pub fn is_fully_defined(&self) -> bool {
        match self.kind.required_points() {
            Some(n) => self.points.len() >= n,
            None => self.finished,
        }
    }

    /// 只差最后一个属性
    pub fn is_almost_defined(&self) -> bool {
        match self.kind.required_points() {
            Some(n) => self.points.len() + 1 == n,
            None => !self.finished && !self.points.is_empty(),
        }
    }

    /// 已定义属性与待定属性组成的几何，用于预览
    pub fn preview(&self) -> Option<ElementKind> {
        let mut points = self.points.clone();
        if let Some(p) = self.pending {
            points.push(p);
        }
        Self::shape(self.kind, &points, self.closed)
    }

    /// 生成元素；只差一个属性且设置了待定属性时，以待定属性补全
    pub fn build(&self) -> Result<Element> {
        let points = if self.is_fully_defined() {
            self.points.clone()
        } else {
            match self.pending {
                Some(p) if self.is_almost_defined() && self.kind.required_points().is_some() => {
                    let mut points = self.points.clone();
                    points.push(p);
                    points
                }
                _ => {
                    return Err(KernelError::invalid(format!(
                        "{:?} is not fully defined",
                        self.kind
                    )))
                }
            }
        };

        match self.kind {
            BuilderKind::Rectangle => Element::rectangle(points[0], points[1]),
            _ => {
                let kind = Self::shape(self.kind, &points, self.closed)
                    .ok_or_else(|| KernelError::degenerate("not enough attributes"))?;
                Element::new(kind)
            }
        }
    }

    fn shape(kind: BuilderKind, points: &[Point2], closed: bool) -> Option<ElementKind> {
        match (kind, points) {
            (BuilderKind::Line, [start, end, ..]) => {
                Some(ElementKind::Line(Line::new(*start, *end)))
            }
            (BuilderKind::Circle, [center, on_circle, ..]) => Some(ElementKind::Circle(
                Circle::new(*center, (on_circle - center).norm()),
            )),
            (BuilderKind::Arc, [center, start, end, ..]) => Some(ElementKind::Arc(
                Arc::from_center_and_points(*center, *start, *end),
            )),
            // 只有起点时预览整圆
            (BuilderKind::Arc, [center, start]) => Some(ElementKind::Circle(Circle::new(
                *center,
                (start - center).norm(),
            ))),
            (BuilderKind::Rectangle, [corner, opposite, ..]) => {
                let bbox = BoundingBox2::new(*corner, *opposite);
                Some(ElementKind::Rectangle(Polyline::from_points(
                    &bbox.corners(),
                    true,
                )))
            }
            (BuilderKind::Polyline, points) if points.len() >= 2 => Some(ElementKind::Polyline(
                Polyline::from_points(points, closed),
            )),
            _ => None,
        }
    }
}
