//! 元素容器
//!
//! 持有元素存储与空间网格，负责二者的同步，并按归属策略整理查询结果：
//! 网格里登记的是叶子图元，调用方可以选择拿到叶子本身、所属的组元素，
//! 或把组元素展开成全部子元素。

use crate::config::KernelConfig;
use crate::element::{Element, ElementId, ElementKind, Polyline};
use crate::error::{KernelError, Result};
use crate::intersect::intersect_kinds;
use crate::math::{BoundingBox2, Point2, EPSILON};
use crate::spatial::SpatialGrid;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// 查询结果的归属策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReturnGroup {
    /// 原始命中（叶子图元）
    #[default]
    Individual,
    /// 子元素替换为所属的组元素
    Owner,
    /// 组元素展开为全部子元素
    Members,
}

/// 点选查询选项
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointQuery {
    pub max_points_diff: f64,
    pub return_group: ReturnGroup,
}

impl Default for PointQuery {
    fn default() -> Self {
        Self {
            max_points_diff: KernelConfig::default().max_points_diff,
            return_group: ReturnGroup::Owner,
        }
    }
}

/// 框选查询选项
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContainerQuery {
    /// 只要完全在框内的元素
    pub should_skip_partial: bool,
    pub return_group: ReturnGroup,
}

/// 邻近元素查询选项
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NearElementQuery {
    pub skip_siblings: bool,
    pub return_group: ReturnGroup,
}

/// 叶子图元与选择框的关系
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Containment {
    Inside,
    Partial,
    Outside,
}

/// 元素容器
#[derive(Debug, Clone)]
pub struct ElementContainer {
    /// 顶层元素
    elements: HashMap<ElementId, Element>,
    /// 子元素 -> 所属元素
    owners: HashMap<ElementId, ElementId>,
    grid: SpatialGrid,
}

impl ElementContainer {
    pub fn new(config: &KernelConfig) -> Self {
        Self {
            elements: HashMap::new(),
            owners: HashMap::new(),
            grid: SpatialGrid::new(config),
        }
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// 全部顶层元素，按ID排序
    pub fn elements(&self) -> Vec<&Element> {
        let mut all: Vec<&Element> = self.elements.values().collect();
        all.sort_by_key(|e| e.id());
        all
    }

    pub fn contains(&self, id: &ElementId) -> bool {
        self.elements.contains_key(id)
    }

    fn register_members(&mut self, element: &Element) {
        for seg in element.segments() {
            self.owners.insert(seg.id(), element.id());
        }
    }

    fn unregister_members(&mut self, element: &Element) {
        for seg in element.segments() {
            self.owners.remove(&seg.id());
        }
    }

    /// 添加元素
    pub fn add_elements(&mut self, elements: Vec<Element>) -> Result<()> {
        if let Some(dup) = elements.iter().find(|e| self.elements.contains_key(&e.id())) {
            return Err(KernelError::invalid(format!("element {} already exists", dup.id())));
        }
        self.grid.add_elements(elements.iter());
        for element in elements {
            self.register_members(&element);
            self.elements.insert(element.id(), element);
        }
        Ok(())
    }

    /// 移除元素，返回被移除的元素
    pub fn remove_elements(&mut self, ids: &[ElementId]) -> Result<Vec<Element>> {
        if let Some(missing) = ids.iter().find(|id| !self.elements.contains_key(id)) {
            return Err(KernelError::ElementNotFound(*missing));
        }
        self.grid.remove_elements(ids.iter().copied());
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(element) = self.elements.remove(id) {
                self.unregister_members(&element);
                removed.push(element);
            }
        }
        Ok(removed)
    }

    /// 替换元素的几何，返回修改前的元素
    pub fn change_elements(&mut self, elements: Vec<Element>) -> Result<Vec<Element>> {
        if let Some(missing) = elements.iter().find(|e| !self.elements.contains_key(&e.id())) {
            return Err(KernelError::ElementNotFound(missing.id()));
        }
        self.grid.change_elements(elements.iter());
        let mut previous = Vec::with_capacity(elements.len());
        for element in elements {
            if let Some(old) = self.elements.remove(&element.id()) {
                self.unregister_members(&old);
                previous.push(old);
            }
            self.register_members(&element);
            self.elements.insert(element.id(), element);
        }
        Ok(previous)
    }

    /// 顶层元素
    pub fn get_element_by_id(&self, id: &ElementId) -> Option<&Element> {
        self.elements.get(id)
    }

    /// 顶层元素或子元素；网格中的ID在存储里找不到属于一致性错误
    pub fn resolve(&self, id: &ElementId) -> Result<&Element> {
        if let Some(element) = self.elements.get(id) {
            return Ok(element);
        }
        self.owners
            .get(id)
            .and_then(|owner| self.elements.get(owner))
            .and_then(|owner| owner.segment(*id))
            .ok_or_else(|| {
                KernelError::consistency(format!(
                    "indexed element {} is missing from the store",
                    id
                ))
            })
    }

    /// 叶子图元所属的顶层元素
    pub fn owner_of<'a>(&'a self, leaf: &'a Element) -> Result<&'a Element> {
        match leaf.group_id() {
            Some(owner) => self.elements.get(&owner).ok_or_else(|| {
                KernelError::consistency(format!("owner {} of {} is missing", owner, leaf.id()))
            }),
            None => Ok(leaf),
        }
    }

    /// 按归属策略整理叶子命中，保持首次出现的顺序并去重
    fn apply_group<'a>(
        &'a self,
        hits: Vec<&'a Element>,
        policy: ReturnGroup,
    ) -> Result<Vec<&'a Element>> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for hit in hits {
            match policy {
                ReturnGroup::Individual => {
                    if seen.insert(hit.id()) {
                        result.push(hit);
                    }
                }
                ReturnGroup::Owner => {
                    let owner = self.owner_of(hit)?;
                    if seen.insert(owner.id()) {
                        result.push(owner);
                    }
                }
                ReturnGroup::Members => {
                    let owner = self.owner_of(hit)?;
                    for leaf in owner.leaves() {
                        if seen.insert(leaf.id()) {
                            result.push(leaf);
                        }
                    }
                }
            }
        }
        Ok(result)
    }

    /// 距离 (x, y) 不超过 `max_points_diff` 的元素，按距离排序
    pub fn elements_containing_point(
        &self,
        x: f64,
        y: f64,
        query: PointQuery,
    ) -> Result<Vec<&Element>> {
        let point = Point2::new(x, y);
        let d = query.max_points_diff.max(0.0);
        let ids = self
            .grid
            .elements_in_container(&Point2::new(x - d, y - d), &Point2::new(x + d, y + d));

        let mut hits = Vec::new();
        for id in ids {
            let leaf = self.resolve(&id)?;
            let distance = leaf.distance_to_point(&point);
            if distance <= d + EPSILON {
                hits.push((distance, leaf));
            }
        }
        hits.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.id().cmp(&b.1.id())));
        self.apply_group(hits.into_iter().map(|(_, leaf)| leaf).collect(), query.return_group)
    }

    fn classify(
        &self,
        leaf: &Element,
        bbox: &BoundingBox2,
        frame: &Option<ElementKind>,
    ) -> Containment {
        if bbox.contains_box(&leaf.bounding_box()) {
            return Containment::Inside;
        }
        match frame {
            Some(frame) if !intersect_kinds(leaf.kind(), frame).is_empty() => Containment::Partial,
            _ => Containment::Outside,
        }
    }

    /// 框 [p1, p2] 选中的元素
    ///
    /// 完全在框内的元素总会返回；`should_skip_partial` 为假时还返回与框边相交的元素。
    /// 按 `Owner` 返回时，组元素只有在全部子元素都在框内时才算完全在框内。
    pub fn elements_in_container(
        &self,
        p1: &Point2,
        p2: &Point2,
        query: ContainerQuery,
    ) -> Result<Vec<&Element>> {
        let bbox = BoundingBox2::new(*p1, *p2);
        // 框的边界，用于判断部分相交
        let frame = (bbox.width() > EPSILON && bbox.height() > EPSILON)
            .then(|| ElementKind::Rectangle(Polyline::from_points(&bbox.corners(), true)));

        let mut ids: Vec<ElementId> = self.grid.elements_in_container(p1, p2).into_iter().collect();
        ids.sort();

        let mut leaves = Vec::new();
        for id in ids {
            let leaf = self.resolve(&id)?;
            let containment = self.classify(leaf, &bbox, &frame);
            leaves.push((leaf, containment));
        }

        let accepted = |c: Containment| match c {
            Containment::Inside => true,
            Containment::Partial => !query.should_skip_partial,
            Containment::Outside => false,
        };

        match query.return_group {
            ReturnGroup::Individual => Ok(leaves
                .into_iter()
                .filter(|(_, c)| accepted(*c))
                .map(|(leaf, _)| leaf)
                .collect()),
            ReturnGroup::Owner | ReturnGroup::Members => {
                let mut hits = Vec::new();
                let mut checked = HashSet::new();
                for (leaf, _) in &leaves {
                    let owner = self.owner_of(leaf)?;
                    if !checked.insert(owner.id()) {
                        continue;
                    }
                    let states: Vec<Containment> = owner
                        .leaves()
                        .iter()
                        .map(|l| {
                            leaves
                                .iter()
                                .find(|(hit, _)| hit.id() == l.id())
                                .map(|(_, c)| *c)
                                .unwrap_or_else(|| self.classify(l, &bbox, &frame))
                        })
                        .collect();
                    let selected = if query.should_skip_partial {
                        states.iter().all(|c| *c == Containment::Inside)
                    } else {
                        states.iter().any(|c| *c != Containment::Outside)
                    };
                    if selected {
                        hits.push(owner);
                    }
                }
                self.apply_group(hits, query.return_group)
            }
        }
    }

    /// 与元素共享网格分区的其他元素
    pub fn elements_near_element(
        &self,
        element: &Element,
        query: NearElementQuery,
    ) -> Result<Vec<&Element>> {
        let mut ids: Vec<ElementId> = self
            .grid
            .element_ids_near_element(element, query.skip_siblings)
            .into_iter()
            .collect();
        ids.sort();

        let mut hits = Vec::with_capacity(ids.len());
        for id in ids {
            hits.push(self.resolve(&id)?);
        }
        let own_owner = element.group_id();
        Ok(self
            .apply_group(hits, query.return_group)?
            .into_iter()
            .filter(|e| e.id() != element.id() && Some(e.id()) != own_owner)
            .collect())
    }
}
