//! 选择点索引
//!
//! 按 x 坐标预先切分的静态二叉树，叶子存放端点、中点、圆心等特征点。
//! 树在创建时按画布宽度一次性划分，不做平衡调整；画布之外的点落在最外侧的叶子里。

use crate::element::{Element, ElementId, PointOwning, PointType};
use crate::error::{KernelError, Result};
use crate::math::{Point2, EPSILON};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static POINT_COUNTER: AtomicU64 = AtomicU64::new(1);

/// 选择点唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointId(u64);

impl PointId {
    pub fn new() -> Self {
        Self(POINT_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for PointId {
    fn default() -> Self {
        Self::new()
    }
}

/// 选择/捕捉点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionPoint {
    pub point: Point2,
    pub point_id: PointId,
    /// 所属的顶层元素
    pub element_id: ElementId,
    pub point_type: PointType,
}

impl SelectionPoint {
    pub fn new(point: Point2, element_id: ElementId, point_type: PointType) -> Self {
        Self {
            point,
            point_id: PointId::new(),
            element_id,
            point_type,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Branch { split: f64, left: usize, right: usize },
    Leaf { points: Vec<SelectionPoint> },
}

/// 选择点索引
#[derive(Debug, Clone)]
pub struct SelectionPointIndex {
    nodes: Vec<Node>,
    /// 元素 -> 已登记的选择点
    by_element: HashMap<ElementId, Vec<SelectionPoint>>,
    len: usize,
}

impl SelectionPointIndex {
    /// 在 [0, width] 上按 `depth` 层划分
    pub fn new(width: f64, depth: u32) -> Self {
        let mut index = Self {
            nodes: Vec::new(),
            by_element: HashMap::new(),
            len: 0,
        };
        index.build(0.0, width, depth);
        index
    }

    fn build(&mut self, lo: f64, hi: f64, depth: u32) -> usize {
        let slot = self.nodes.len();
        if depth == 0 {
            self.nodes.push(Node::Leaf { points: Vec::new() });
            return slot;
        }
        let split = (lo + hi) / 2.0;
        // 先占位，子节点建好后回填
        self.nodes.push(Node::Leaf { points: Vec::new() });
        let left = self.build(lo, split, depth - 1);
        let right = self.build(split, hi, depth - 1);
        self.nodes[slot] = Node::Branch { split, left, right };
        slot
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 插入点：放入 x 所在的叶子
    pub fn insert(&mut self, point: SelectionPoint) {
        let mut node = 0;
        loop {
            match &mut self.nodes[node] {
                Node::Branch { split, left, right } => {
                    node = if point.point.x < *split { *left } else { *right };
                }
                Node::Leaf { points } => {
                    points.push(point);
                    self.len += 1;
                    return;
                }
            }
        }
    }

    /// 可能存放 [min_x, max_x] 内点的叶子
    fn leaves_in_range(&self, min_x: f64, max_x: f64) -> Vec<usize> {
        let mut leaves = Vec::new();
        let mut stack = vec![0];
        while let Some(node) = stack.pop() {
            match &self.nodes[node] {
                Node::Branch { split, left, right } => {
                    if min_x < *split + EPSILON {
                        stack.push(*left);
                    }
                    if max_x >= *split - EPSILON {
                        stack.push(*right);
                    }
                }
                Node::Leaf { .. } => leaves.push(node),
            }
        }
        leaves
    }

    /// 移除 x 坐标为 `x`、标识为 `point_id` 的点
    pub fn remove(&mut self, x: f64, point_id: PointId) -> Result<SelectionPoint> {
        for leaf in self.leaves_in_range(x, x) {
            if let Node::Leaf { points } = &mut self.nodes[leaf] {
                if let Some(pos) = points.iter().position(|p| p.point_id == point_id) {
                    self.len -= 1;
                    return Ok(points.swap_remove(pos));
                }
            }
        }
        Err(KernelError::consistency(format!(
            "selection point {} not found at x = {}",
            point_id.raw(),
            x
        )))
    }

    /// 替换点：按旧 x 坐标移除，再按新坐标插入
    pub fn replace(
        &mut self,
        old_x: f64,
        point_id: PointId,
        new_point: SelectionPoint,
    ) -> Result<()> {
        self.remove(old_x, point_id)?;
        self.insert(new_point);
        Ok(())
    }

    /// x 在 [min_x, max_x] 内且满足过滤条件的点
    pub fn find(
        &self,
        min_x: f64,
        max_x: f64,
        filter: Option<&dyn Fn(&SelectionPoint) -> bool>,
    ) -> Vec<SelectionPoint> {
        let mut found = Vec::new();
        if min_x > max_x {
            return found;
        }
        for leaf in self.leaves_in_range(min_x, max_x) {
            if let Node::Leaf { points } = &self.nodes[leaf] {
                found.extend(points.iter().filter(|p| {
                    p.point.x >= min_x - EPSILON
                        && p.point.x <= max_x + EPSILON
                        && filter.map_or(true, |f| f(p))
                }));
            }
        }
        found
    }

    /// (x, y) 周围 `delta` 范围内的点，按距离排序
    pub fn find_nearby_points(&self, x: f64, y: f64, delta: f64) -> Vec<SelectionPoint> {
        if delta < 0.0 {
            return Vec::new();
        }
        let within_y = |p: &SelectionPoint| (p.point.y - y).abs() <= delta + EPSILON;
        let mut found = self.find(x - delta, x + delta, Some(&within_y));
        let target = Point2::new(x, y);
        found.sort_by(|a, b| {
            let da = (a.point - target).norm();
            let db = (b.point - target).norm();
            da.total_cmp(&db).then(a.point_id.cmp(&b.point_id))
        });
        found
    }

    /// 登记元素的全部特征点
    pub fn insert_element_points(&mut self, element: &Element) {
        let points: Vec<SelectionPoint> = element
            .selection_points()
            .into_iter()
            .map(|(p, t)| SelectionPoint::new(p, element.id(), t))
            .collect();
        for point in &points {
            self.insert(*point);
        }
        self.by_element.insert(element.id(), points);
    }

    /// 移除元素的全部特征点
    pub fn remove_element_points(&mut self, id: ElementId) -> Result<()> {
        let points = self.by_element.remove(&id).ok_or_else(|| {
            KernelError::consistency(format!("no selection points registered for {}", id))
        })?;
        for point in points {
            self.remove(point.point.x, point.point_id)?;
        }
        Ok(())
    }

    /// 元素几何变化后更新特征点；数量不变时原地替换并保留点标识
    pub fn replace_element_points(&mut self, element: &Element) -> Result<()> {
        let old = self.by_element.remove(&element.id()).ok_or_else(|| {
            KernelError::consistency(format!("no selection points registered for {}", element.id()))
        })?;
        let fresh = element.selection_points();
        if fresh.len() != old.len() {
            for point in old {
                self.remove(point.point.x, point.point_id)?;
            }
            self.insert_element_points(element);
            return Ok(());
        }

        let mut points = Vec::with_capacity(fresh.len());
        for (previous, (p, t)) in old.into_iter().zip(fresh) {
            let updated = SelectionPoint {
                point: p,
                point_type: t,
                ..previous
            };
            self.replace(previous.point.x, previous.point_id, updated)?;
            points.push(updated);
        }
        self.by_element.insert(element.id(), points);
        Ok(())
    }

    /// 元素已登记的特征点
    pub fn element_points(&self, id: &ElementId) -> Option<&[SelectionPoint]> {
        self.by_element.get(id).map(|p| p.as_slice())
    }
}
