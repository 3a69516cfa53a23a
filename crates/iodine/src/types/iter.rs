//! Iterators over built-in containers.
//!
//! Instances of user classes take part in iteration through their own
//! `__iterReset__`, `__iterMoveNext__` and `__iterGetNext__` methods; the VM
//! dispatches those directly and never wraps them in an [`Iter`].

use std::{cell::RefCell, rc::Rc};

use crate::{
    exception_private::{ExcType, RunError, RunResult},
    value::Value,
};

#[derive(Debug)]
pub enum Iter {
    /// Walks a list by index, so elements appended during iteration are visited.
    List {
        list: Rc<RefCell<Vec<Value>>>,
        index: usize,
        current: Value,
    },
    /// Walks a snapshot: tuple items, string characters or map keys.
    Items {
        items: Rc<[Value]>,
        index: usize,
        current: Value,
    },
    Range {
        start: i64,
        end: i64,
        step: i64,
        next: i64,
        current: Value,
    },
}

impl Iter {
    #[must_use]
    pub fn over_list(list: Rc<RefCell<Vec<Value>>>) -> Self {
        Self::List {
            list,
            index: 0,
            current: Value::Null,
        }
    }

    #[must_use]
    pub fn over_items(items: Rc<[Value]>) -> Self {
        Self::Items {
            items,
            index: 0,
            current: Value::Null,
        }
    }

    pub fn range(start: i64, end: i64, step: i64) -> RunResult<Self> {
        if step == 0 {
            return Err(RunError::new(ExcType::ValueError, "range() step must not be zero"));
        }
        Ok(Self::Range {
            start,
            end,
            step,
            next: start,
            current: Value::Null,
        })
    }

    pub fn reset(&mut self) {
        match self {
            Self::List { index, current, .. } | Self::Items { index, current, .. } => {
                *index = 0;
                *current = Value::Null;
            }
            Self::Range {
                start, next, current, ..
            } => {
                *next = *start;
                *current = Value::Null;
            }
        }
    }

    /// Advances to the next element, returning `false` once exhausted.
    pub fn move_next(&mut self) -> bool {
        match self {
            Self::List { list, index, current } => {
                let item = list.borrow().get(*index).cloned();
                advance(item, index, current)
            }
            Self::Items { items, index, current } => {
                let item = items.get(*index).cloned();
                advance(item, index, current)
            }
            Self::Range {
                end,
                step,
                next,
                current,
                ..
            } => {
                let in_range = if *step > 0 { *next < *end } else { *next > *end };
                if !in_range {
                    return false;
                }
                *current = Value::Int(*next);
                match next.checked_add(*step) {
                    Some(n) => *next = n,
                    // stepping past i64 bounds ends the range
                    None => *next = *end,
                }
                true
            }
        }
    }

    /// The element the last successful `move_next` landed on.
    #[must_use]
    pub fn current(&self) -> Value {
        match self {
            Self::List { current, .. } | Self::Items { current, .. } | Self::Range { current, .. } => current.clone(),
        }
    }
}

fn advance(item: Option<Value>, index: &mut usize, current: &mut Value) -> bool {
    match item {
        Some(item) => {
            *current = item;
            *index += 1;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn drain(iter: &mut Iter) -> Vec<i64> {
        let mut out = Vec::new();
        while iter.move_next() {
            if let Value::Int(i) = iter.current() {
                out.push(i);
            }
        }
        out
    }

    #[test]
    fn range_counts_up_and_down() {
        assert_eq!(drain(&mut Iter::range(0, 4, 1).unwrap()), vec![0, 1, 2, 3]);
        assert_eq!(drain(&mut Iter::range(3, 0, -1).unwrap()), vec![3, 2, 1]);
        assert!(Iter::range(0, 1, 0).is_err());
    }

    #[test]
    fn list_iteration_sees_appended_items() {
        let list = Rc::new(RefCell::new(vec![Value::Int(1)]));
        let mut iter = Iter::over_list(list.clone());
        assert!(iter.move_next());
        list.borrow_mut().push(Value::Int(2));
        assert!(iter.move_next());
        assert!(!iter.move_next());
    }

    #[test]
    fn reset_restarts() {
        let mut iter = Iter::over_items(vec![Value::Int(7)].into());
        assert_eq!(drain(&mut iter), vec![7]);
        iter.reset();
        assert_eq!(drain(&mut iter), vec![7]);
    }
}
