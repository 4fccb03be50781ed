//! Finds allocations that are kept alive only by reference cycles.
//!
//! Every tracked allocation becomes a graph node. Edges are the strong
//! references one tracked allocation holds to another. Whatever part of a
//! node's strong count is not explained by those edges must come from outside
//! the graph (a Rust-side holder, a callback table, a running call), so such
//! nodes seed the mark phase together with the explicit roots. Unmarked nodes
//! are cycle garbage.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::debug;

use crate::runner::ds::heap::{Heap, HeapEntry};
use crate::runner::ds::scope::Scope;
use crate::runner::ds::value::{ArrayObject, DynamicObject, FunctionObject, NativeObjectRef};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Live tracked allocations looked at.
    pub scanned: usize,
    pub reachable: usize,
    /// Allocations only reachable through cycles.
    pub cyclic: usize,
}

impl CycleReport {
    pub fn has_cycles(&self) -> bool {
        self.cyclic > 0
    }
}

enum Node {
    Object(Arc<DynamicObject>),
    Array(Arc<ArrayObject>),
    Function(Arc<FunctionObject>),
    Scope(Arc<Scope>),
    Native(NativeObjectRef),
}

fn arc_id<T: ?Sized>(a: &Arc<T>) -> usize {
    Arc::as_ptr(a) as *const () as usize
}

impl Node {
    fn upgrade(entry: &HeapEntry) -> Option<Node> {
        Some(match entry {
            HeapEntry::Object(w) => Node::Object(w.upgrade()?),
            HeapEntry::Array(w) => Node::Array(w.upgrade()?),
            HeapEntry::Function(w) => Node::Function(w.upgrade()?),
            HeapEntry::Scope(w) => Node::Scope(w.upgrade()?),
            HeapEntry::Native(w) => Node::Native(w.upgrade()?),
        })
    }

    fn id(&self) -> usize {
        match self {
            Node::Object(o) => arc_id(o),
            Node::Array(a) => arc_id(a),
            Node::Function(f) => arc_id(f),
            Node::Scope(s) => arc_id(s),
            Node::Native(n) => arc_id(n),
        }
    }

    /// Strong references not held by this checker.
    fn strong_count(&self) -> usize {
        let count = match self {
            Node::Object(o) => Arc::strong_count(o),
            Node::Array(a) => Arc::strong_count(a),
            Node::Function(f) => Arc::strong_count(f),
            Node::Scope(s) => Arc::strong_count(s),
            Node::Native(n) => Arc::strong_count(n),
        };
        count.saturating_sub(1)
    }

    /// Identities of everything this node references strongly, one per edge.
    fn children(&self) -> Vec<usize> {
        let mut out = vec![];
        match self {
            Node::Object(o) => o.for_each_value(|v| out.extend(v.ptr_id())),
            Node::Array(a) => a.with_elements(|elements| {
                out.extend(elements.iter().filter_map(|v| v.ptr_id()));
            }),
            Node::Function(f) => f.visit_references(|scope, this| {
                out.extend(scope.map(arc_id));
                out.extend(this.and_then(|v| v.ptr_id()));
            }),
            Node::Scope(s) => {
                s.for_each_value(|v| out.extend(v.ptr_id()));
                out.extend(s.parent().map(arc_id));
            }
            Node::Native(n) => n.trace(&mut |v| out.extend(v.ptr_id())),
        }
        out
    }

    fn clear(&self) {
        match self {
            Node::Object(o) => o.clear(),
            Node::Array(a) => a.clear(),
            Node::Function(f) => f.clear_references(),
            Node::Scope(s) => s.clear(),
            Node::Native(n) => n.clear_references(),
        }
    }
}

/// Marks everything reachable from outside the tracked graph or from `roots`.
/// With `break_cycles`, clears every unreachable node so reference counting
/// can free it.
pub fn check_cycles(heap: &Heap, roots: &[Arc<Scope>], break_cycles: bool) -> CycleReport {
    let nodes: Vec<Node> = heap.entries().iter().filter_map(Node::upgrade).collect();
    let index: HashMap<usize, usize> = nodes.iter().enumerate().map(|(i, n)| (n.id(), i)).collect();

    let edges: Vec<Vec<usize>> = nodes
        .iter()
        .map(|n| {
            n.children()
                .into_iter()
                .filter_map(|id| index.get(&id).copied())
                .collect()
        })
        .collect();

    let mut internal = vec![0usize; nodes.len()];
    for targets in &edges {
        for &t in targets {
            internal[t] += 1;
        }
    }

    let mut marked = vec![false; nodes.len()];
    let mut queue = VecDeque::new();
    for (i, node) in nodes.iter().enumerate() {
        if node.strong_count() > internal[i] {
            marked[i] = true;
            queue.push_back(i);
        }
    }
    for root in roots {
        if let Some(&i) = index.get(&arc_id(root)) {
            if !marked[i] {
                marked[i] = true;
                queue.push_back(i);
            }
        }
    }
    while let Some(i) = queue.pop_front() {
        for &t in &edges[i] {
            if !marked[t] {
                marked[t] = true;
                queue.push_back(t);
            }
        }
    }

    let reachable = marked.iter().filter(|m| **m).count();
    let report = CycleReport {
        scanned: nodes.len(),
        reachable,
        cyclic: nodes.len() - reachable,
    };
    debug!(
        "cycle check: {} scanned, {} reachable, {} cyclic",
        report.scanned, report.reachable, report.cyclic
    );

    if break_cycles && report.cyclic > 0 {
        for (i, node) in nodes.iter().enumerate() {
            if !marked[i] {
                node.clear();
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::value::{DynamicValue, ObjectRef};

    fn object_value(o: &Arc<DynamicObject>) -> DynamicValue {
        DynamicValue::Object(ObjectRef::Script(o.clone()))
    }

    #[test]
    fn test_two_object_cycle_is_found_and_broken() {
        let mut heap = Heap::default();
        let global = Scope::new_global();
        heap.track_scope(&global).unwrap();
        let a = Arc::new(DynamicObject::new());
        let b = Arc::new(DynamicObject::new());
        heap.track_object(&a).unwrap();
        heap.track_object(&b).unwrap();
        a.set("other", object_value(&b));
        b.set("other", object_value(&a));
        let weak_a = Arc::downgrade(&a);
        drop(a);
        drop(b);
        assert!(weak_a.upgrade().is_some());

        let report = check_cycles(&heap, &[global.clone()], false);
        assert_eq!(report, CycleReport { scanned: 3, reachable: 1, cyclic: 2 });
        assert!(weak_a.upgrade().is_some());

        let report = check_cycles(&heap, &[global], true);
        assert_eq!(report.cyclic, 2);
        assert!(weak_a.upgrade().is_none());
    }

    #[test]
    fn test_externally_held_cycle_is_reachable() {
        let mut heap = Heap::default();
        let a = Arc::new(DynamicObject::new());
        let b = Arc::new(DynamicObject::new());
        heap.track_object(&a).unwrap();
        heap.track_object(&b).unwrap();
        a.set("other", object_value(&b));
        b.set("other", object_value(&a));
        let report = check_cycles(&heap, &[], true);
        assert_eq!(report.cyclic, 0);
        assert_eq!(report.reachable, 2);
        assert!(a.has("other"));
        a.clear();
    }

    #[test]
    fn test_values_in_rooted_scope_are_reachable() {
        let mut heap = Heap::default();
        let global = Scope::new_global();
        heap.track_scope(&global).unwrap();
        let arr = Arc::new(ArrayObject::new(vec![]));
        heap.track_array(&arr).unwrap();
        arr.push(DynamicValue::Array(arr.clone()));
        global
            .declare(
                "arr",
                DynamicValue::Array(arr.clone()),
                crate::runner::ds::scope::BindingKind::Var,
            )
            .unwrap();
        drop(arr);
        let report = check_cycles(&heap, &[global.clone()], true);
        assert_eq!(report.cyclic, 0);
        assert_eq!(report.reachable, 2);
        global.clear();
    }
}
