//! 绘图会话
//!
//! `DrawingSession` 独占元素容器、空间网格与特征点索引，所有修改都经由它完成，
//! 以保证三者同步。编辑、复制、修剪/延伸是互斥的交互状态；同一时刻最多一个处于活动中。

use crate::config::KernelConfig;
use crate::container::{ContainerQuery, ElementContainer, NearElementQuery, PointQuery};
use crate::element::{Element, ElementId, Movable, PointOwning, PointType};
use crate::error::{KernelError, Result};
use crate::history::{History, HistoryEvent};
use crate::math::{Point2, Vector2};
use crate::point_index::{SelectionPoint, SelectionPointIndex};
use crate::replace::{ReplacementLedger, ReplacementStep};
use crate::trim::{compute_replacement, ReplaceMode, Replacement};

/// 对正在编辑的元素施加的变化
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditChange {
    Translate(Vector2),
    Rotate { pivot: Point2, angle: f64 },
    DragPoint { point_type: PointType, from: Point2, to: Point2 },
}

#[derive(Debug, Clone)]
struct EditingState {
    originals: Vec<Element>,
    /// 影子副本，ID 与原元素相同
    shadows: Vec<Element>,
}

#[derive(Debug, Clone)]
struct CopyingState {
    sources: Vec<Element>,
    base: Point2,
    offset: Vector2,
    copies: Vec<Element>,
}

#[derive(Debug, Clone)]
struct ReplacingState {
    mode: ReplaceMode,
    ledger: ReplacementLedger,
    /// 鼠标悬停时的预览，尚未应用
    staged: Option<Replacement>,
}

/// 绘图会话
#[derive(Debug, Clone)]
pub struct DrawingSession {
    config: KernelConfig,
    container: ElementContainer,
    points: SelectionPointIndex,
    history: History<HistoryEvent>,
    editing: Option<EditingState>,
    copying: Option<CopyingState>,
    replacing: Option<ReplacingState>,
    snapped_point: Option<Point2>,
}

impl DrawingSession {
    pub fn new(config: KernelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            container: ElementContainer::new(&config),
            points: SelectionPointIndex::new(config.canvas_width, config.point_index_depth),
            history: History::new(),
            editing: None,
            copying: None,
            replacing: None,
            snapped_point: None,
            config,
        })
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn container(&self) -> &ElementContainer {
        &self.container
    }

    pub fn point_index(&self) -> &SelectionPointIndex {
        &self.points
    }

    pub fn history(&self) -> &History<HistoryEvent> {
        &self.history
    }

    // ========== 底层同步修改 ==========

    fn apply_add(&mut self, elements: Vec<Element>) -> Result<()> {
        let ids: Vec<ElementId> = elements.iter().map(|e| e.id()).collect();
        self.container.add_elements(elements)?;
        for id in &ids {
            let element = self.container.resolve(id)?;
            self.points.insert_element_points(element);
        }
        Ok(())
    }

    fn apply_remove(&mut self, ids: &[ElementId]) -> Result<Vec<Element>> {
        let removed = self.container.remove_elements(ids)?;
        for element in &removed {
            self.points.remove_element_points(element.id())?;
        }
        Ok(removed)
    }

    fn apply_change(&mut self, elements: Vec<Element>) -> Result<Vec<Element>> {
        let ids: Vec<ElementId> = elements.iter().map(|e| e.id()).collect();
        let previous = self.container.change_elements(elements)?;
        for id in &ids {
            let element = self.container.resolve(id)?;
            self.points.replace_element_points(element)?;
        }
        Ok(previous)
    }

    /// 先移除再添加
    fn apply_swap(&mut self, removed: &[Element], added: &[Element]) -> Result<()> {
        let ids: Vec<ElementId> = removed.iter().map(|e| e.id()).collect();
        self.apply_remove(&ids)?;
        self.apply_add(added.to_vec())
    }

    fn apply_event(&mut self, event: &HistoryEvent) -> Result<()> {
        match event {
            HistoryEvent::Add(elements) => self.apply_add(elements.clone()),
            HistoryEvent::Delete(elements) => {
                let ids: Vec<ElementId> = elements.iter().map(|e| e.id()).collect();
                self.apply_remove(&ids).map(|_| ())
            }
            HistoryEvent::Edit { after, .. } => self.apply_change(after.clone()).map(|_| ()),
            HistoryEvent::Replace { added, removed } => self.apply_swap(removed, added),
        }
    }

    fn ensure_idle(&self, action: &str) -> Result<()> {
        if self.editing.is_some() || self.copying.is_some() || self.replacing.is_some() {
            return Err(KernelError::invalid(format!(
                "cannot start {} while another session is active",
                action
            )));
        }
        Ok(())
    }

    // ========== 元素增删改查 ==========

    /// 添加元素并记录历史
    pub fn add_elements(&mut self, elements: Vec<Element>) -> Result<()> {
        if elements.is_empty() {
            return Ok(());
        }
        self.apply_add(elements.clone())?;
        self.history.push(HistoryEvent::Add(elements));
        Ok(())
    }

    /// 删除元素并记录历史，返回被删除的元素
    pub fn remove_elements(&mut self, ids: &[ElementId]) -> Result<Vec<Element>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let removed = self.apply_remove(ids)?;
        self.history.push(HistoryEvent::Delete(removed.clone()));
        Ok(removed)
    }

    /// 以同 ID 的新版本替换元素并记录历史
    pub fn change_elements(&mut self, elements: Vec<Element>) -> Result<()> {
        if elements.is_empty() {
            return Ok(());
        }
        let before = self.apply_change(elements.clone())?;
        self.history.push(HistoryEvent::Edit {
            before,
            after: elements,
        });
        Ok(())
    }

    pub fn get_element_by_id(&self, id: &ElementId) -> Option<&Element> {
        self.container.get_element_by_id(id)
    }

    pub fn elements_containing_point(
        &self,
        x: f64,
        y: f64,
        query: PointQuery,
    ) -> Result<Vec<&Element>> {
        self.container.elements_containing_point(x, y, query)
    }

    pub fn elements_in_container(
        &self,
        p1: Point2,
        p2: Point2,
        query: ContainerQuery,
    ) -> Result<Vec<&Element>> {
        self.container.elements_in_container(&p1, &p2, query)
    }

    pub fn elements_near_element(
        &self,
        element: &Element,
        query: NearElementQuery,
    ) -> Result<Vec<&Element>> {
        self.container.elements_near_element(element, query)
    }

    // ========== 编辑 ==========

    /// 为选中元素建立影子副本；修改只作用于副本，直到完成编辑
    pub fn start_editing_elements(&mut self, ids: &[ElementId]) -> Result<()> {
        self.ensure_idle("editing")?;
        if ids.is_empty() {
            return Err(KernelError::invalid("no elements to edit"));
        }
        let originals = ids
            .iter()
            .map(|id| {
                self.container
                    .get_element_by_id(id)
                    .cloned()
                    .ok_or(KernelError::ElementNotFound(*id))
            })
            .collect::<Result<Vec<_>>>()?;
        let shadows = originals.iter().map(|e| e.copy_element(false)).collect();
        tracing::debug!("editing started for {} elements", ids.len());
        self.editing = Some(EditingState { originals, shadows });
        Ok(())
    }

    /// 修改影子副本；返回是否有副本发生了变化
    pub fn change_editing_elements(&mut self, change: EditChange) -> Result<bool> {
        let state = self
            .editing
            .as_mut()
            .ok_or_else(|| KernelError::invalid("no editing session"))?;
        let mut changed = false;
        for shadow in &mut state.shadows {
            match change {
                EditChange::Translate(offset) => {
                    shadow.translate(&offset);
                    changed = true;
                }
                EditChange::Rotate { pivot, angle } => {
                    shadow.rotate_about(&pivot, angle);
                    changed = true;
                }
                EditChange::DragPoint { point_type, from, to } => {
                    changed |= shadow.drag_point(point_type, &from, &to);
                }
            }
        }
        Ok(changed)
    }

    /// 当前的影子副本
    pub fn editing_elements(&self) -> &[Element] {
        self.editing.as_ref().map(|s| s.shadows.as_slice()).unwrap_or_default()
    }

    /// 放弃编辑
    pub fn stop_editing_elements(&mut self) {
        if self.editing.take().is_some() {
            tracing::debug!("editing cancelled");
        }
    }

    /// 把影子副本写回容器并记录历史
    pub fn complete_editing_elements(&mut self) -> Result<()> {
        let state = self
            .editing
            .take()
            .ok_or_else(|| KernelError::invalid("no editing session"))?;
        if state.shadows == state.originals {
            tracing::debug!("editing completed without changes");
            return Ok(());
        }
        self.apply_change(state.shadows.clone())?;
        tracing::debug!("editing completed for {} elements", state.shadows.len());
        self.history.push(HistoryEvent::Edit {
            before: state.originals,
            after: state.shadows,
        });
        Ok(())
    }

    /// 元素（或其子元素）是否正在编辑
    pub fn is_editing_element(&self, id: &ElementId) -> bool {
        self.editing.as_ref().is_some_and(|state| {
            state
                .shadows
                .iter()
                .any(|e| e.id() == *id || e.segment(*id).is_some())
        })
    }

    // ========== 复制 ==========

    /// 以 `base` 为基点开始复制
    pub fn start_copying_elements(&mut self, ids: &[ElementId], base: Point2) -> Result<()> {
        self.ensure_idle("copying")?;
        if ids.is_empty() {
            return Err(KernelError::invalid("no elements to copy"));
        }
        let sources = ids
            .iter()
            .map(|id| {
                self.container
                    .get_element_by_id(id)
                    .cloned()
                    .ok_or(KernelError::ElementNotFound(*id))
            })
            .collect::<Result<Vec<_>>>()?;
        let copies = sources.iter().map(|e| e.copy_element(true)).collect();
        tracing::debug!("copying started for {} elements", ids.len());
        self.copying = Some(CopyingState {
            sources,
            base,
            offset: Vector2::zeros(),
            copies,
        });
        Ok(())
    }

    /// 副本跟随光标
    pub fn move_copying_elements(&mut self, to: Point2) -> Result<()> {
        let state = self
            .copying
            .as_mut()
            .ok_or_else(|| KernelError::invalid("no copying session"))?;
        let offset = to - state.base;
        let delta = offset - state.offset;
        for copy in &mut state.copies {
            copy.translate(&delta);
        }
        state.offset = offset;
        Ok(())
    }

    /// 当前的副本
    pub fn copying_elements(&self) -> &[Element] {
        self.copying.as_ref().map(|s| s.copies.as_slice()).unwrap_or_default()
    }

    fn commit_copies(&mut self) -> Result<Vec<ElementId>> {
        let copies = self
            .copying
            .as_ref()
            .ok_or_else(|| KernelError::invalid("no copying session"))?
            .copies
            .clone();
        let ids = copies.iter().map(|e| e.id()).collect();
        self.add_elements(copies)?;
        Ok(ids)
    }

    /// 放下当前副本并继续复制下一份
    pub fn continue_copying_elements(&mut self) -> Result<Vec<ElementId>> {
        let ids = self.commit_copies()?;
        if let Some(state) = self.copying.as_mut() {
            state.copies = state
                .sources
                .iter()
                .map(|source| {
                    let mut copy = source.copy_element(true);
                    copy.translate(&state.offset);
                    copy
                })
                .collect();
        }
        tracing::debug!("copying continued, {} elements placed", ids.len());
        Ok(ids)
    }

    /// 放下当前副本并结束复制
    pub fn complete_copying_elements(&mut self) -> Result<Vec<ElementId>> {
        let ids = self.commit_copies()?;
        self.copying = None;
        tracing::debug!("copying completed");
        Ok(ids)
    }

    /// 放弃尚未放下的副本
    pub fn stop_copying_elements(&mut self) {
        if self.copying.take().is_some() {
            tracing::debug!("copying cancelled");
        }
    }

    // ========== 修剪 / 延伸 ==========

    pub fn start_replacing_elements(&mut self, mode: ReplaceMode) -> Result<()> {
        self.ensure_idle("replacing")?;
        tracing::debug!("replacing started in {:?} mode", mode);
        self.replacing = Some(ReplacingState {
            mode,
            ledger: ReplacementLedger::new(),
            staged: None,
        });
        Ok(())
    }

    fn replacing_state(&self) -> Result<&ReplacingState> {
        self.replacing
            .as_ref()
            .ok_or_else(|| KernelError::invalid("no replacing session"))
    }

    /// 计算 (x, y) 处的替换预览，不修改容器
    pub fn stage_replacement(&mut self, x: f64, y: f64) -> Result<Option<&Replacement>> {
        let mode = self.replacing_state()?.mode;
        let max_points_diff = self.config.max_points_diff;
        let staged = compute_replacement(&self.container, mode, x, y, max_points_diff)?;
        let state = self
            .replacing
            .as_mut()
            .ok_or_else(|| KernelError::invalid("no replacing session"))?;
        state.staged = staged;
        Ok(state.staged.as_ref())
    }

    pub fn staged_replacement(&self) -> Option<&Replacement> {
        self.replacing.as_ref().and_then(|s| s.staged.as_ref())
    }

    /// 在 (x, y) 处执行一次修剪/延伸并记为一步；没有可操作的元素时返回 false
    pub fn continue_replacing_elements(&mut self, x: f64, y: f64) -> Result<bool> {
        let mode = self.replacing_state()?.mode;
        let max_points_diff = self.config.max_points_diff;
        let replacement = compute_replacement(&self.container, mode, x, y, max_points_diff)?;
        let Some(replacement) = replacement else {
            if let Some(state) = self.replacing.as_mut() {
                state.staged = None;
            }
            return Ok(false);
        };
        self.apply_swap(&replacement.removed, &replacement.added)?;
        if let Some(state) = self.replacing.as_mut() {
            state.staged = None;
            state
                .ledger
                .add_step(ReplacementStep::new(replacement.added, replacement.removed));
        }
        Ok(true)
    }

    /// 会话内撤销或重做一步；没有可走的步骤时返回 false
    pub fn update_replacement_steps(&mut self, should_undo: bool) -> Result<bool> {
        let state = self
            .replacing
            .as_mut()
            .ok_or_else(|| KernelError::invalid("no replacing session"))?;
        state.staged = None;
        let step = if should_undo {
            state.ledger.undo().cloned()
        } else {
            state.ledger.redo().cloned()
        };
        let Some(step) = step else {
            return Ok(false);
        };
        let added: Vec<Element> = step.added.into_values().collect();
        let removed: Vec<Element> = step.removed.into_values().collect();
        if should_undo {
            self.apply_swap(&added, &removed)?;
        } else {
            self.apply_swap(&removed, &added)?;
        }
        Ok(true)
    }

    /// 结束会话，把净效果作为一条历史记录
    pub fn complete_replacing_elements(&mut self) -> Result<()> {
        let state = self
            .replacing
            .take()
            .ok_or_else(|| KernelError::invalid("no replacing session"))?;
        let aggregate = state.ledger.aggregate();
        if aggregate.added.is_empty() && aggregate.removed.is_empty() {
            tracing::debug!("replacing completed without changes");
            return Ok(());
        }
        tracing::debug!(
            "replacing completed: {} added, {} removed, {} archived",
            aggregate.added.len(),
            aggregate.removed.len(),
            aggregate.archived.len()
        );
        self.history.push(HistoryEvent::Replace {
            added: aggregate.added.values().cloned().collect(),
            removed: aggregate.removed.values().cloned().collect(),
        });
        Ok(())
    }

    /// 放弃会话，撤回全部已应用的步骤
    pub fn clear_replacing_elements(&mut self) -> Result<()> {
        let Some(mut state) = self.replacing.take() else {
            return Ok(());
        };
        while let Some(step) = state.ledger.undo().cloned() {
            let added: Vec<Element> = step.added.into_values().collect();
            let removed: Vec<Element> = step.removed.into_values().collect();
            self.apply_swap(&added, &removed)?;
        }
        tracing::debug!("replacing cleared");
        Ok(())
    }

    /// 元素是否会被当前预览的替换移除
    pub fn is_replacing_element(&self, id: &ElementId) -> bool {
        self.staged_replacement().is_some_and(|r| {
            r.removed
                .iter()
                .any(|e| e.id() == *id || e.segment(*id).is_some())
        })
    }

    pub fn replacement_ledger(&self) -> Option<&ReplacementLedger> {
        self.replacing.as_ref().map(|s| &s.ledger)
    }

    // ========== 捕捉 ==========

    pub fn set_snapped_point(&mut self, point: Point2) {
        self.snapped_point = Some(point);
    }

    pub fn clear_snapped_point(&mut self) {
        self.snapped_point = None;
    }

    pub fn snapped_point(&self) -> Option<Point2> {
        self.snapped_point
    }

    /// 附近的特征点，排除正在编辑的元素
    pub fn find_nearby_points(&self, x: f64, y: f64, delta: f64) -> Vec<SelectionPoint> {
        let mut found = self.points.find_nearby_points(x, y, delta);
        found.retain(|p| !self.is_editing_element(&p.element_id));
        found
    }

    /// 按配置的 `snap_delta` 查找可捕捉的特征点
    pub fn find_snap_points(&self, x: f64, y: f64) -> Vec<SelectionPoint> {
        self.find_nearby_points(x, y, self.config.snap_delta)
    }

    // ========== 撤销 / 重做 ==========

    /// 修剪/延伸会话中撤销作用于会话内的步骤
    pub fn undo(&mut self) -> Result<bool> {
        if self.replacing.is_some() {
            return self.update_replacement_steps(true);
        }
        self.ensure_idle("undo")?;
        let Some(event) = self.history.undo().cloned() else {
            return Ok(false);
        };
        tracing::debug!("undo {}", event.name());
        self.apply_event(&event.inverse())?;
        Ok(true)
    }

    pub fn redo(&mut self) -> Result<bool> {
        if self.replacing.is_some() {
            return self.update_replacement_steps(false);
        }
        self.ensure_idle("redo")?;
        let Some(event) = self.history.redo().cloned() else {
            return Ok(false);
        };
        tracing::debug!("redo {}", event.name());
        self.apply_event(&event)?;
        Ok(true)
    }
}
