//! 操作历史
//!
//! 线性撤销/重做栈。撤销后再压入新事件会截断重做分支。

use crate::element::Element;

/// 会话级可撤销事件
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEvent {
    Add(Vec<Element>),
    Edit { before: Vec<Element>, after: Vec<Element> },
    Delete(Vec<Element>),
    /// 一次修剪/延伸会话的净效果
    Replace { added: Vec<Element>, removed: Vec<Element> },
}

impl HistoryEvent {
    /// 逆事件：应用它即撤销原事件
    pub fn inverse(&self) -> HistoryEvent {
        match self {
            HistoryEvent::Add(elements) => HistoryEvent::Delete(elements.clone()),
            HistoryEvent::Delete(elements) => HistoryEvent::Add(elements.clone()),
            HistoryEvent::Edit { before, after } => HistoryEvent::Edit {
                before: after.clone(),
                after: before.clone(),
            },
            HistoryEvent::Replace { added, removed } => HistoryEvent::Replace {
                added: removed.clone(),
                removed: added.clone(),
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HistoryEvent::Add(_) => "add",
            HistoryEvent::Edit { .. } => "edit",
            HistoryEvent::Delete(_) => "delete",
            HistoryEvent::Replace { .. } => "replace",
        }
    }
}

/// 通用历史管理器
#[derive(Debug, Clone)]
pub struct History<T: Clone> {
    items: Vec<T>,
    /// 已生效的条目数
    index: usize,
}

impl<T: Clone> History<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            index: 0,
        }
    }

    pub fn push(&mut self, item: T) {
        // 截断 redo 历史
        self.items.truncate(self.index);
        self.items.push(item);
        self.index = self.items.len();
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index < self.items.len()
    }

    pub fn undo(&mut self) -> Option<&T> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        Some(&self.items[self.index])
    }

    pub fn redo(&mut self) -> Option<&T> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        Some(&self.items[self.index - 1])
    }

    /// 最近一次生效的条目
    pub fn current(&self) -> Option<&T> {
        self.index.checked_sub(1).map(|i| &self.items[i])
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Clone> Default for History<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Point2;

    #[test]
    fn test_undo_redo_order() {
        let mut history = History::new();
        history.push(1);
        history.push(2);
        history.push(3);

        assert_eq!(history.undo(), Some(&3));
        assert_eq!(history.undo(), Some(&2));
        assert_eq!(history.current(), Some(&1));
        assert_eq!(history.redo(), Some(&2));
        assert_eq!(history.current(), Some(&2));
    }

    #[test]
    fn test_push_truncates_redo() {
        let mut history = History::new();
        history.push("a");
        history.push("b");
        history.undo();
        history.push("c");

        assert_eq!(history.len(), 2);
        assert!(!history.can_redo());
        assert_eq!(history.undo(), Some(&"c"));
        assert_eq!(history.undo(), Some(&"a"));
        assert_eq!(history.undo(), None);
    }

    #[test]
    fn test_inverse_of_inverse() {
        let a = Element::line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)).unwrap();
        let b = Element::line(Point2::new(0.0, 0.0), Point2::new(2.0, 0.0)).unwrap();
        let event = HistoryEvent::Replace {
            added: vec![b.clone()],
            removed: vec![a.clone()],
        };
        assert_eq!(
            event.inverse(),
            HistoryEvent::Replace {
                added: vec![a],
                removed: vec![b],
            }
        );
        assert_eq!(event.inverse().inverse(), event);
        assert_eq!(HistoryEvent::Add(vec![]).inverse().name(), "delete");
    }
}
