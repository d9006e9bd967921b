use std::collections::{BTreeSet, HashMap};

use crate::process::ProcessRecord;
use crate::rows::RowStore;

#[derive(Debug, Clone)]
struct Node {
    record: ProcessRecord,
    visible: bool,
    children: Vec<usize>,
}

/// A flattened tree line, ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub record: ProcessRecord,
    pub depth: usize,
    pub prefix: String,
    /// False for a hidden ancestor shown only to give a visible row context.
    pub matched: bool,
    pub selected: bool,
}

/// Forest of process rows indexed by pid.
///
/// Parents are resolved against rows already inserted, so a child listed
/// before its parent stays a root.
#[derive(Debug, Clone, Default)]
pub struct ProcessTree {
    nodes: Vec<Node>,
    roots: Vec<usize>,
    index: HashMap<u32, usize>,
    selected: BTreeSet<u32>,
}

impl ProcessTree {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn is_visible(&self, pid: u32) -> bool {
        self.index
            .get(&pid)
            .is_some_and(|idx| self.nodes[*idx].visible)
    }

    #[cfg(test)]
    pub fn roots(&self) -> Vec<u32> {
        self.roots
            .iter()
            .map(|idx| self.nodes[*idx].record.pid)
            .collect()
    }

    #[cfg(test)]
    pub fn children(&self, pid: u32) -> Vec<u32> {
        self.index
            .get(&pid)
            .map(|idx| {
                self.nodes[*idx]
                    .children
                    .iter()
                    .map(|child| self.nodes[*child].record.pid)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn toggle_selection(&mut self, pid: u32) {
        if !self.selected.remove(&pid) {
            self.selected.insert(pid);
        }
    }

    pub fn is_selected(&self, pid: u32) -> bool {
        self.selected.contains(&pid)
    }

    pub fn selected_pids(&self) -> Vec<u32> {
        self.selected.iter().copied().collect()
    }

    /// Depth-first display rows.
    ///
    /// Hidden rows are skipped and their visible descendants move up to the
    /// nearest shown ancestor. With `show_context`, a hidden row that has a
    /// visible descendant is kept as an unmatched context row instead.
    ///
    /// Walks use explicit stacks, so tree depth is not bounded by the call
    /// stack.
    pub fn rows(&self, show_context: bool) -> Vec<TreeRow> {
        let has_match = self.subtree_matches();
        let keep = |idx: usize| self.nodes[idx].visible || (show_context && has_match[idx]);

        let mut rows = Vec::new();
        let mut branch_stack: Vec<bool> = Vec::new();
        // (node, depth, last among its shown siblings)
        let mut pending: Vec<(usize, usize, bool)> = self
            .shown(&self.roots, &keep)
            .into_iter()
            .rev()
            .map(|idx| (idx, 0, false))
            .collect();

        while let Some((idx, depth, is_last)) = pending.pop() {
            branch_stack.truncate(depth.saturating_sub(1));
            if depth > 0 {
                branch_stack.push(is_last);
            }

            let node = &self.nodes[idx];
            rows.push(TreeRow {
                record: node.record.clone(),
                depth,
                prefix: build_tree_prefix(&branch_stack),
                matched: node.visible,
                selected: self.selected.contains(&node.record.pid),
            });

            let children = self.shown(&node.children, &keep);
            let count = children.len();
            pending.extend(
                children
                    .into_iter()
                    .enumerate()
                    .rev()
                    .map(|(pos, child)| (child, depth + 1, pos + 1 == count)),
            );
        }
        rows
    }

    /// Per node: is it, or anything below it, visible.
    fn subtree_matches(&self) -> Vec<bool> {
        let mut has_match: Vec<bool> = self.nodes.iter().map(|node| node.visible).collect();
        // children are always inserted after their parent
        for idx in (0..self.nodes.len()).rev() {
            if has_match[idx] {
                continue;
            }
            has_match[idx] = self.nodes[idx].children.iter().any(|child| has_match[*child]);
        }
        has_match
    }

    /// The nearest kept nodes at or below `candidates`, in order.
    fn shown(&self, candidates: &[usize], keep: &impl Fn(usize) -> bool) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = candidates.iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            if keep(idx) {
                out.push(idx);
            } else {
                stack.extend(self.nodes[idx].children.iter().rev());
            }
        }
        out
    }
}

impl RowStore for ProcessTree {
    type Record = ProcessRecord;

    fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
        self.index.clear();
    }

    fn insert(&mut self, record: ProcessRecord) {
        let idx = self.nodes.len();
        let parent = if record.is_root() {
            None
        } else {
            self.index.get(&record.parent_pid).copied()
        };

        match parent {
            Some(parent_idx) => self.nodes[parent_idx].children.push(idx),
            None => self.roots.push(idx),
        }
        self.index.insert(record.pid, idx);
        self.nodes.push(Node {
            record,
            visible: true,
            children: Vec::new(),
        });
    }

    fn filter<P>(&mut self, mut predicate: P) -> usize
    where
        P: FnMut(&ProcessRecord) -> bool,
    {
        let mut count = 0;
        for node in &mut self.nodes {
            node.visible = predicate(&node.record);
            if node.visible {
                count += 1;
            }
        }
        count
    }

    fn reselect_rows(&mut self) {
        let index = &self.index;
        self.selected.retain(|pid| {
            let present = index.contains_key(pid);
            if !present {
                log::debug!("pid {pid} is gone, dropping it from the selection");
            }
            present
        });
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }
}

/// Branch art for a row whose ancestors' "last sibling" flags are `stack`.
fn build_tree_prefix(stack: &[bool]) -> String {
    let Some((own, ancestors)) = stack.split_last() else {
        return String::new();
    };
    let mut prefix: String = ancestors
        .iter()
        .map(|closed| if *closed { "   " } else { "│  " })
        .collect();
    prefix.push_str(if *own { "└─ " } else { "├─ " });
    prefix
}
