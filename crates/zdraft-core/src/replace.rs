//! 替换账本
//!
//! 一次修剪/延伸会话中的每次确认记为一步 `{added, removed}`，
//! 同时维护整个会话的净效果（aggregate）。先被添加、后又被移除的元素
//! 进入 `archived`，撤销时据此原样恢复，不必重新计算几何。
//!
//! 撤销/重做总是生成新的 aggregate，旧的引用在外部仍然有效。

use crate::element::{Element, ElementId};
use std::collections::BTreeMap;
use std::rc::Rc;

/// 单步替换
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplacementStep {
    pub added: BTreeMap<ElementId, Element>,
    pub removed: BTreeMap<ElementId, Element>,
}

impl ReplacementStep {
    pub fn new(added: Vec<Element>, removed: Vec<Element>) -> Self {
        Self {
            added: added.into_iter().map(|e| (e.id(), e)).collect(),
            removed: removed.into_iter().map(|e| (e.id(), e)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// 会话的净效果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplacementAggregate {
    pub added: BTreeMap<ElementId, Element>,
    pub removed: BTreeMap<ElementId, Element>,
    /// 会话内先添加后移除的元素
    pub archived: BTreeMap<ElementId, Element>,
}

impl ReplacementAggregate {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.archived.is_empty()
    }

    fn apply(&mut self, step: &ReplacementStep) {
        for (id, element) in &step.removed {
            match self.added.remove(id) {
                Some(added) => {
                    self.archived.insert(*id, added);
                }
                None => {
                    self.removed.insert(*id, element.clone());
                }
            }
        }
        for (id, element) in &step.added {
            self.added.insert(*id, element.clone());
        }
    }

    fn revert(&mut self, step: &ReplacementStep) {
        for id in step.added.keys() {
            self.added.remove(id);
        }
        for id in step.removed.keys() {
            match self.archived.remove(id) {
                Some(archived) => {
                    self.added.insert(*id, archived);
                }
                None => {
                    self.removed.remove(id);
                }
            }
        }
    }
}

/// 替换账本
#[derive(Debug, Default)]
pub struct ReplacementLedger {
    steps: Vec<ReplacementStep>,
    /// 已生效的步数
    index: usize,
    aggregate: Rc<ReplacementAggregate>,
}

impl ReplacementLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一步；撤销后追加会丢弃重做分支
    pub fn add_step(&mut self, step: ReplacementStep) {
        self.steps.truncate(self.index);
        let mut aggregate = (*self.aggregate).clone();
        aggregate.apply(&step);
        self.aggregate = Rc::new(aggregate);
        self.steps.push(step);
        self.index = self.steps.len();
        tracing::debug!("replacement step {} recorded", self.index);
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index < self.steps.len()
    }

    /// 撤销一步，返回被撤销的步骤
    pub fn undo(&mut self) -> Option<&ReplacementStep> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        let step = &self.steps[self.index];
        let mut aggregate = (*self.aggregate).clone();
        aggregate.revert(step);
        self.aggregate = Rc::new(aggregate);
        tracing::debug!("replacement step {} undone", self.index + 1);
        Some(step)
    }

    /// 重做一步，返回被重做的步骤
    pub fn redo(&mut self) -> Option<&ReplacementStep> {
        if !self.can_redo() {
            return None;
        }
        let step = &self.steps[self.index];
        let mut aggregate = (*self.aggregate).clone();
        aggregate.apply(step);
        self.aggregate = Rc::new(aggregate);
        self.index += 1;
        tracing::debug!("replacement step {} redone", self.index);
        Some(step)
    }

    /// 当前净效果
    pub fn aggregate(&self) -> Rc<ReplacementAggregate> {
        Rc::clone(&self.aggregate)
    }

    pub fn steps(&self) -> &[ReplacementStep] {
        &self.steps
    }

    /// 已生效的步骤
    pub fn applied_steps(&self) -> &[ReplacementStep] {
        &self.steps[..self.index]
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Clone for ReplacementLedger {
    /// 深拷贝：快照不与原账本共享 aggregate
    fn clone(&self) -> Self {
        Self {
            steps: self.steps.clone(),
            index: self.index,
            aggregate: Rc::new((*self.aggregate).clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Point2;

    fn line(x: f64) -> Element {
        Element::line(Point2::new(x, 0.0), Point2::new(x, 10.0)).unwrap()
    }

    #[test]
    fn test_added_then_removed_is_archived() {
        let original = line(0.0);
        let first = line(1.0);
        let second = line(2.0);

        let mut ledger = ReplacementLedger::new();
        ledger.add_step(ReplacementStep::new(vec![first.clone()], vec![original.clone()]));
        ledger.add_step(ReplacementStep::new(vec![second.clone()], vec![first.clone()]));

        let aggregate = ledger.aggregate();
        assert!(aggregate.removed.contains_key(&original.id()));
        assert!(aggregate.archived.contains_key(&first.id()));
        assert!(!aggregate.removed.contains_key(&first.id()));
        assert!(aggregate.added.contains_key(&second.id()));

        ledger.undo();
        let after_undo = ledger.aggregate();
        assert!(after_undo.added.contains_key(&first.id()));
        assert!(after_undo.archived.is_empty());
        // 撤销前取得的快照不受影响
        assert!(aggregate.archived.contains_key(&first.id()));
    }

    #[test]
    fn test_n_steps_then_n_undos_is_empty() {
        let mut ledger = ReplacementLedger::new();
        let mut current = line(0.0);
        for i in 1..=6 {
            let next = line(i as f64);
            let extra = line(100.0 + i as f64);
            ledger.add_step(ReplacementStep::new(
                vec![next.clone(), extra],
                vec![current.clone()],
            ));
            current = next;
        }
        for _ in 0..6 {
            assert!(ledger.undo().is_some());
        }
        assert!(ledger.undo().is_none());
        assert!(ledger.aggregate().is_empty());

        // 重做回到同样的净效果
        for _ in 0..6 {
            assert!(ledger.redo().is_some());
        }
        let aggregate = ledger.aggregate();
        assert_eq!(aggregate.removed.len(), 1);
        assert_eq!(aggregate.archived.len(), 5);
        assert_eq!(aggregate.added.len(), 7);
    }

    #[test]
    fn test_add_step_after_undo_truncates_redo() {
        let mut ledger = ReplacementLedger::new();
        ledger.add_step(ReplacementStep::new(vec![line(1.0)], vec![line(0.0)]));
        ledger.add_step(ReplacementStep::new(vec![line(3.0)], vec![line(2.0)]));
        ledger.undo();
        assert!(ledger.can_redo());

        ledger.add_step(ReplacementStep::new(vec![line(5.0)], vec![line(4.0)]));
        assert_eq!(ledger.len(), 2);
        assert!(!ledger.can_redo());
    }

    #[test]
    fn test_clone_is_deep() {
        let mut ledger = ReplacementLedger::new();
        ledger.add_step(ReplacementStep::new(vec![line(1.0)], vec![line(0.0)]));
        let snapshot = ledger.clone();
        assert!(!Rc::ptr_eq(&snapshot.aggregate, &ledger.aggregate));

        ledger.undo();
        assert!(ledger.aggregate().is_empty());
        assert!(!snapshot.aggregate().is_empty());
        assert_eq!(snapshot.applied_steps().len(), 1);
    }
}
