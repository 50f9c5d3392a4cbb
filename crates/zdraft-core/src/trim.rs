//! 修剪与延伸
//!
//! 修剪：求出目标元素与邻近元素的全部交点，换算成沿路径的距离（切点），
//! 拾取点两侧最近的切点之间的部分被剪掉，其余部分生成新元素。
//! 圆与闭合多段线是环形路径，剪掉的部分可能跨过路径起点。
//!
//! 延伸：从离拾取点较近的端点出发，沿网格逐个分区查找第一个真实交点，
//! 把端点移到交点处。

use crate::container::{ElementContainer, NearElementQuery, PointQuery, ReturnGroup};
use crate::element::{Element, ElementId, ElementKind, Polyline};
use crate::error::{KernelError, Result};
use crate::geometry::{Arc, Line};
use crate::intersect::{find_closest_intersect_point, intersect_kinds, Extension};
use crate::math::{angle_between, distance, Point2, EPSILON};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 替换方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplaceMode {
    Trim,
    Extend,
}

/// 一次修剪/延伸的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Replacement {
    pub mode: ReplaceMode,
    /// 被替换的顶层元素
    pub target: ElementId,
    pub removed: Vec<Element>,
    pub added: Vec<Element>,
    /// 被剪掉的几何，仅供预览
    pub removed_section: Vec<ElementKind>,
}

/// 拾取 (x, y) 处的元素并计算替换结果；没有可操作的元素时返回 None
pub fn compute_replacement(
    container: &ElementContainer,
    mode: ReplaceMode,
    x: f64,
    y: f64,
    max_points_diff: f64,
) -> Result<Option<Replacement>> {
    let hits = container.elements_containing_point(
        x,
        y,
        PointQuery {
            max_points_diff,
            return_group: ReturnGroup::Owner,
        },
    )?;
    let Some(target) = hits.first() else {
        return Ok(None);
    };
    let pick = Point2::new(x, y);
    match mode {
        ReplaceMode::Trim => trim_element(container, target, &pick),
        ReplaceMode::Extend => extend_element(container, target, &pick),
    }
}

/// 路径上点到起点的距离；圆从 0° 方向起算
fn path_position(element: &Element, point: &Point2) -> f64 {
    match element.kind() {
        ElementKind::Line(_) | ElementKind::Arc(_) => element.kind().path_distance(point, false),
        ElementKind::Circle(circle) => angle_between(&circle.center, point) * circle.radius,
        ElementKind::Polyline(pl) | ElementKind::Rectangle(pl) => pl.distance_along(point),
    }
}

/// 路径距离 [from, to] 的几何（from < to）
fn section(element: &Element, from: f64, to: f64) -> Vec<ElementKind> {
    match element.kind() {
        ElementKind::Line(_) | ElementKind::Arc(_) => {
            element.kind().clip(false, from, to).into_iter().collect()
        }
        ElementKind::Circle(circle) if to - from > EPSILON => vec![ElementKind::Arc(Arc::new(
            circle.center,
            circle.radius,
            from / circle.radius,
            to / circle.radius,
        ))],
        ElementKind::Circle(_) => Vec::new(),
        ElementKind::Polyline(pl) | ElementKind::Rectangle(pl) => pl.section(from, to),
    }
}

/// 环形路径上从 `from` 前进到 `to` 的几何，可跨过起点
fn wrapping_section(element: &Element, from: f64, to: f64) -> Vec<ElementKind> {
    if let ElementKind::Circle(circle) = element.kind() {
        // 圆上跨过 0° 的部分仍是一段圆弧
        return vec![ElementKind::Arc(Arc::new(
            circle.center,
            circle.radius,
            from / circle.radius,
            to / circle.radius,
        ))];
    }
    if from < to {
        section(element, from, to)
    } else {
        let mut kinds = section(element, from, element.length());
        kinds.extend(section(element, 0.0, to));
        kinds
    }
}

/// 由片段生成新元素：单个线段/圆弧保持原类型，多段线的片段重新组成多段线
fn build_piece(element: &Element, kinds: Vec<ElementKind>) -> Result<Option<Element>> {
    if kinds.is_empty() {
        return Ok(None);
    }
    let piece = if element.is_group() {
        Element::new(ElementKind::Polyline(Polyline::from_kinds(kinds)))?
    } else {
        let mut kinds = kinds;
        match kinds.pop() {
            Some(kind) => Element::new(kind)?,
            None => return Ok(None),
        }
    };
    Ok(Some(piece))
}

/// 目标与邻近元素的交点在路径上的位置，升序去重
fn cut_positions(container: &ElementContainer, target: &Element) -> Result<Vec<f64>> {
    // 取目标占据的全部分区中的元素，拾取点两侧的切点一次求出
    let neighbors = container.elements_near_element(
        target,
        NearElementQuery {
            skip_siblings: false,
            return_group: ReturnGroup::Individual,
        },
    )?;
    let mut cuts: Vec<f64> = Vec::new();
    for neighbor in neighbors {
        for p in intersect_kinds(target.kind(), neighbor.kind()) {
            cuts.push(path_position(target, &p));
        }
    }
    cuts.sort_by(|a, b| a.total_cmp(b));
    cuts.dedup_by(|a, b| (*a - *b).abs() < EPSILON);
    Ok(cuts)
}

fn remove_whole(target: &Element) -> Replacement {
    Replacement {
        mode: ReplaceMode::Trim,
        target: target.id(),
        removed: vec![target.clone()],
        added: Vec::new(),
        removed_section: vec![target.kind().clone()],
    }
}

/// 修剪目标元素中包含拾取点的部分
pub fn trim_element(
    container: &ElementContainer,
    target: &Element,
    pick: &Point2,
) -> Result<Option<Replacement>> {
    let total = target.length();
    let position = path_position(target, pick);
    let cuts = cut_positions(container, target)?;

    if target.is_closed() {
        // 环形路径上终点与起点重合
        let mut cuts: Vec<f64> = cuts
            .into_iter()
            .map(|c| if c > total - EPSILON { 0.0 } else { c })
            .collect();
        cuts.sort_by(|a, b| a.total_cmp(b));
        cuts.dedup_by(|a, b| (*a - *b).abs() < EPSILON);

        match cuts.len() {
            0 => return Ok(Some(remove_whole(target))),
            // 一个切点无法把环分开
            1 => return Ok(None),
            _ => {}
        }
        let (first, last) = (cuts[0], cuts[cuts.len() - 1]);
        let lower = cuts.iter().rev().find(|c| **c < position).copied().unwrap_or(last);
        let upper = cuts.iter().find(|c| **c > position).copied().unwrap_or(first);

        let kept = build_piece(target, wrapping_section(target, upper, lower))?;
        let replacement = Replacement {
            mode: ReplaceMode::Trim,
            target: target.id(),
            removed: vec![target.clone()],
            added: kept.into_iter().collect(),
            removed_section: wrapping_section(target, lower, upper),
        };
        return Ok(Some(replacement));
    }

    let inner: Vec<f64> = cuts
        .into_iter()
        .filter(|c| *c > EPSILON && *c < total - EPSILON)
        .collect();
    if inner.is_empty() {
        return Ok(Some(remove_whole(target)));
    }
    let lower = inner.iter().rev().find(|c| **c < position).copied().unwrap_or(0.0);
    let upper = inner.iter().find(|c| **c > position).copied().unwrap_or(total);

    let mut added = Vec::new();
    if lower > EPSILON {
        added.extend(build_piece(target, section(target, 0.0, lower))?);
    }
    if upper < total - EPSILON {
        added.extend(build_piece(target, section(target, upper, total))?);
    }
    Ok(Some(Replacement {
        mode: ReplaceMode::Trim,
        target: target.id(),
        removed: vec![target.clone()],
        added,
        removed_section: section(target, lower, upper),
    }))
}

/// 把线段/圆弧在指定端点延伸到 `point`
fn extend_leaf(kind: &ElementKind, from_start: bool, point: &Point2) -> Option<ElementKind> {
    match kind {
        ElementKind::Line(line) => Some(ElementKind::Line(if from_start {
            Line::new(*point, line.end)
        } else {
            Line::new(line.start, *point)
        })),
        ElementKind::Arc(arc) => {
            let angle = angle_between(&arc.center, point);
            Some(ElementKind::Arc(if from_start {
                Arc::new(arc.center, arc.radius, angle, arc.end_angle)
            } else {
                Arc::new(arc.center, arc.radius, arc.start_angle, angle)
            }))
        }
        _ => None,
    }
}

fn extended_element(target: &Element, from_start: bool, point: &Point2) -> Result<Element> {
    let kind = match target.kind() {
        ElementKind::Polyline(pl) => {
            let flags = pl.orientations();
            let index = if from_start { 0 } else { pl.segment_count() - 1 };
            let mut kinds: Vec<ElementKind> =
                pl.segments().iter().map(|s| s.kind().clone()).collect();
            let leaf_from_start = from_start != flags[index];
            kinds[index] = extend_leaf(&kinds[index], leaf_from_start, point)
                .ok_or_else(|| KernelError::invalid("polyline segment cannot be extended"))?;
            ElementKind::Polyline(Polyline::from_kinds(kinds))
        }
        kind => extend_leaf(kind, from_start, point)
            .ok_or_else(|| {
                KernelError::invalid(format!("{} cannot be extended", kind.type_name()))
            })?,
    };
    Element::new(kind)
}

/// 延伸目标元素离拾取点较近的一端
pub fn extend_element(
    container: &ElementContainer,
    target: &Element,
    pick: &Point2,
) -> Result<Option<Replacement>> {
    let Some((start, end)) = target.endpoints() else {
        return Ok(None);
    };
    let from_start = distance(pick, &start) <= distance(pick, &end);
    let Some((extension, own_leaf)) = Extension::of_element(target, from_start) else {
        return Ok(None);
    };

    let exclude: HashSet<ElementId> = [target.id(), own_leaf].into_iter().collect();
    for batch in container.grid().traverse(&extension, exclude) {
        if batch.element_ids.is_empty() {
            continue;
        }
        let mut candidates = Vec::with_capacity(batch.element_ids.len());
        for id in &batch.element_ids {
            candidates.push(container.resolve(id)?);
        }
        let locality = |p: &Point2| batch.contains_point(p);
        let Some(hit) =
            find_closest_intersect_point(target, &candidates, from_start, true, Some(&locality))
        else {
            continue;
        };

        tracing::trace!(
            "extend {} to ({:.3}, {:.3}) at division ({}, {})",
            target.id(),
            hit.point.x,
            hit.point.y,
            batch.division.x,
            batch.division.y
        );
        let extended = match extended_element(target, from_start, &hit.point) {
            Ok(extended) => extended,
            // 延伸后的几何无效时继续寻找更远的边界
            Err(KernelError::DegenerateGeometry(_)) => continue,
            Err(e) => return Err(e),
        };
        return Ok(Some(Replacement {
            mode: ReplaceMode::Extend,
            target: target.id(),
            removed: vec![target.clone()],
            added: vec![extended],
            removed_section: Vec::new(),
        }));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;
    use crate::math::points_equal;
    use std::f64::consts::PI;

    fn container_with(elements: Vec<Element>) -> ElementContainer {
        let mut container = ElementContainer::new(&KernelConfig::default());
        container.add_elements(elements).unwrap();
        container
    }

    fn line(x1: f64, y1: f64, x2: f64, y2: f64) -> Element {
        Element::line(Point2::new(x1, y1), Point2::new(x2, y2)).unwrap()
    }

    #[test]
    fn test_trim_line_between_two_cuts() {
        let target = line(0.0, 100.0, 100.0, 100.0);
        let c = container_with(vec![
            target.clone(),
            line(30.0, 50.0, 30.0, 150.0),
            line(70.0, 50.0, 70.0, 150.0),
        ]);
        let r = compute_replacement(&c, ReplaceMode::Trim, 50.0, 100.0, 5.0)
            .unwrap()
            .unwrap();
        assert_eq!(r.target, target.id());
        assert_eq!(r.added.len(), 2);
        let kept: f64 = r.added.iter().map(|e| e.length()).sum();
        let removed: f64 = r.removed_section.iter().map(|k| k.path_length()).sum();
        assert!((kept - 60.0).abs() < EPSILON);
        assert!((removed - 40.0).abs() < EPSILON);
        assert!(r.added.iter().all(|e| e.type_name() == "Line"));
    }

    #[test]
    fn test_trim_cuts_in_distant_divisions() {
        let target = line(0.0, 100.0, 1000.0, 100.0);
        let c = container_with(vec![
            target.clone(),
            line(5.0, 90.0, 5.0, 110.0),
            line(995.0, 90.0, 995.0, 110.0),
            // 不与目标相交的邻居
            line(500.0, 105.0, 520.0, 105.0),
        ]);
        let r = trim_element(&c, &target, &Point2::new(500.0, 100.0))
            .unwrap()
            .unwrap();
        assert_eq!(r.added.len(), 2);
        let kept: f64 = r.added.iter().map(|e| e.length()).sum();
        let removed: f64 = r.removed_section.iter().map(|k| k.path_length()).sum();
        assert!((kept - 10.0).abs() < EPSILON);
        assert!((removed - 990.0).abs() < EPSILON);
    }

    #[test]
    fn test_trim_line_end_section() {
        let target = line(0.0, 0.0, 100.0, 0.0);
        let c = container_with(vec![target.clone(), line(40.0, -10.0, 40.0, 10.0)]);
        let r = trim_element(&c, &target, &Point2::new(80.0, 0.0)).unwrap().unwrap();
        assert_eq!(r.added.len(), 1);
        assert!((r.added[0].length() - 40.0).abs() < EPSILON);
    }

    #[test]
    fn test_trim_without_cuts_removes_whole_element() {
        let target = line(0.0, 0.0, 100.0, 0.0);
        let c = container_with(vec![target.clone()]);
        let r = trim_element(&c, &target, &Point2::new(50.0, 0.0)).unwrap().unwrap();
        assert!(r.added.is_empty());
        assert_eq!(r.removed, vec![target]);
    }

    #[test]
    fn test_trim_circle_between_two_cuts() {
        let circle = Element::circle(Point2::new(100.0, 100.0), 50.0).unwrap();
        let c = container_with(vec![circle.clone(), line(100.0, 0.0, 100.0, 200.0)]);
        // 拾取右半圆
        let r = trim_element(&c, &circle, &Point2::new(150.0, 100.0)).unwrap().unwrap();
        assert_eq!(r.added.len(), 1);
        match r.added[0].kind() {
            ElementKind::Arc(arc) => {
                assert!((arc.sweep_angle() - PI).abs() < EPSILON);
                assert!(arc.contains_point(&Point2::new(50.0, 100.0)));
            }
            other => panic!("expected arc, got {:?}", other),
        }
        let removed: f64 = r.removed_section.iter().map(|k| k.path_length()).sum();
        assert!((removed - 50.0 * PI).abs() < 1e-4);
    }

    #[test]
    fn test_trim_circle_with_single_cut_is_noop() {
        let circle = Element::circle(Point2::new(100.0, 100.0), 50.0).unwrap();
        let c = container_with(vec![circle.clone(), line(100.0, 100.0, 100.0, 200.0)]);
        assert!(trim_element(&c, &circle, &Point2::new(150.0, 100.0))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_trim_arc() {
        let arc = Element::arc(Arc::new(Point2::new(100.0, 100.0), 50.0, 0.0, PI)).unwrap();
        let c = container_with(vec![arc.clone(), line(100.0, 50.0, 100.0, 200.0)]);
        let r = trim_element(&c, &arc, &Point2::new(150.0, 100.0)).unwrap().unwrap();
        assert_eq!(r.added.len(), 1);
        assert!((r.added[0].length() - 25.0 * PI).abs() < 1e-4);
    }

    #[test]
    fn test_extend_line_to_boundary() {
        let target = line(0.0, 10.0, 100.0, 10.0);
        let near = line(300.0, 0.0, 300.0, 50.0);
        let far = line(600.0, 0.0, 600.0, 50.0);
        let c = container_with(vec![target.clone(), near, far]);
        let r = extend_element(&c, &target, &Point2::new(90.0, 10.0)).unwrap().unwrap();
        assert_eq!(r.mode, ReplaceMode::Extend);
        let (start, end) = r.added[0].endpoints().unwrap();
        assert!(points_equal(&start, &Point2::new(0.0, 10.0)));
        assert!(points_equal(&end, &Point2::new(300.0, 10.0)));
    }

    #[test]
    fn test_extend_ignores_geometry_outside_division() {
        // 斜线的包围盒覆盖近处的分区，但交点在更远的分区
        let target = line(0.0, 10.0, 100.0, 10.0);
        let slanted = line(150.0, 70.0, 500.0, 10.0);
        let c = container_with(vec![target.clone(), slanted]);
        let r = extend_element(&c, &target, &Point2::new(90.0, 10.0)).unwrap().unwrap();
        let (_, end) = r.added[0].endpoints().unwrap();
        assert!(points_equal(&end, &Point2::new(500.0, 10.0)));
    }

    #[test]
    fn test_extend_without_boundary() {
        let target = line(0.0, 10.0, 100.0, 10.0);
        let c = container_with(vec![target.clone()]);
        assert!(extend_element(&c, &target, &Point2::new(90.0, 10.0))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_extend_closed_element_is_noop() {
        let circle = Element::circle(Point2::new(100.0, 100.0), 50.0).unwrap();
        let c = container_with(vec![circle.clone(), line(0.0, 0.0, 300.0, 300.0)]);
        assert!(extend_element(&c, &circle, &Point2::new(150.0, 100.0))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_extend_arc() {
        let arc = Element::arc(Arc::new(Point2::new(100.0, 100.0), 50.0, 0.0, PI / 2.0)).unwrap();
        let wall = line(20.0, 100.0, 80.0, 100.0);
        let c = container_with(vec![arc.clone(), wall]);
        // 终点 (100, 150) 一侧
        let r = extend_element(&c, &arc, &Point2::new(100.0, 149.0)).unwrap().unwrap();
        match r.added[0].kind() {
            ElementKind::Arc(a) => assert!((a.sweep_angle() - PI).abs() < EPSILON),
            other => panic!("expected arc, got {:?}", other),
        }
    }

    #[test]
    fn test_extend_arc_ignores_boundary_at_far_endpoint() {
        // 墙只在圆弧起点 (150, 100) 处接触，从终点一侧延伸会绕回起点
        let arc = Element::arc(Arc::new(Point2::new(100.0, 100.0), 50.0, 0.0, PI)).unwrap();
        let wall = line(150.0, 100.0, 170.0, 80.0);
        let c = container_with(vec![arc.clone(), wall]);
        let r = extend_element(&c, &arc, &Point2::new(51.0, 101.0)).unwrap();
        assert!(r.is_none());
    }

    #[test]
    fn test_extend_arc_from_start() {
        let arc = Element::arc(Arc::new(Point2::new(100.0, 100.0), 50.0, 0.0, PI)).unwrap();
        let wall = line(120.0, 20.0, 120.0, 80.0);
        let c = container_with(vec![arc.clone(), wall]);
        // 起点 (150, 100) 一侧，顺时针进入下半圆
        let r = extend_element(&c, &arc, &Point2::new(149.0, 101.0)).unwrap().unwrap();
        match r.added[0].kind() {
            ElementKind::Arc(a) => {
                let expected = 2.0 * PI - (0.4f64).acos();
                assert!((a.start_angle - expected).abs() < 1e-6);
                assert!((a.end_angle - PI).abs() < EPSILON);
                let hit = Point2::new(120.0, 100.0 - 50.0 * (0.84f64).sqrt());
                assert!(points_equal(&a.start_point(), &hit));
            }
            other => panic!("expected arc, got {:?}", other),
        }
    }

    #[test]
    fn test_extend_open_polyline() {
        let pl = Element::polyline(
            &[
                Point2::new(10.0, 10.0),
                Point2::new(60.0, 10.0),
                Point2::new(60.0, 60.0),
            ],
            false,
        )
        .unwrap();
        let ceiling = line(0.0, 200.0, 100.0, 200.0);
        let c = container_with(vec![pl.clone(), ceiling]);
        let r = extend_element(&c, &pl, &Point2::new(60.0, 55.0)).unwrap().unwrap();
        let extended = &r.added[0];
        assert_eq!(extended.segments().len(), 2);
        assert!((extended.length() - 240.0).abs() < EPSILON);
    }
}
