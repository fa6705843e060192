//! The goal outline: a flat list of nodes viewed as an expandable tree.
//!
//! Children are found by scanning the whole list, so the order of the
//! fetched rows is the order siblings are shown in.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tracing::warn;

use crate::data::UserID;
use crate::internal_error::InternalResult;

use super::data::*;

#[derive(Debug, Clone)]
pub struct GoalTree {
    nodes: Vec<GoalNode>,
    expanded: HashSet<GoalNodeID>,
}

impl GoalTree {
    /// A fresh view shows the root's children.
    pub fn new(nodes: Vec<GoalNode>) -> GoalTree {
        let mut tree = GoalTree {
            nodes,
            expanded: HashSet::new(),
        };
        if let Some(root_id) = tree.root().map(|root| root.id) {
            tree.expanded.insert(root_id);
        }
        tree
    }

    pub fn with_expanded(nodes: Vec<GoalNode>, expanded: HashSet<GoalNodeID>) -> GoalTree {
        GoalTree { nodes, expanded }
    }

    pub fn expanded(&self) -> &HashSet<GoalNodeID> {
        &self.expanded
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The parentless node flagged as root, else the first parentless node.
    pub fn root(&self) -> Option<&GoalNode> {
        self.nodes
            .iter()
            .find(|node| node.is_root && node.parent_id.is_none())
            .or_else(|| self.nodes.iter().find(|node| node.parent_id.is_none()))
    }

    pub fn get(&self, node_id: GoalNodeID) -> Option<&GoalNode> {
        self.nodes.iter().find(|node| node.id == node_id)
    }

    pub fn children(&self, node_id: GoalNodeID) -> Vec<&GoalNode> {
        self.nodes
            .iter()
            .filter(|node| node.parent_id == Some(node_id))
            .collect()
    }

    pub fn is_expanded(&self, node_id: GoalNodeID) -> bool {
        self.expanded.contains(&node_id)
    }

    /// Returns whether the node is expanded afterwards.
    pub fn toggle_expand(&mut self, node_id: GoalNodeID) -> bool {
        if self.expanded.remove(&node_id) {
            false
        } else {
            self.expanded.insert(node_id);
            true
        }
    }

    /// Appends an already stored node and opens its parent.
    pub fn insert_child(&mut self, node: GoalNode) {
        if let Some(parent_id) = node.parent_id {
            self.expanded.insert(parent_id);
        }
        self.nodes.push(node);
    }

    fn reachable(&self) -> HashSet<GoalNodeID> {
        let mut seen = HashSet::new();
        let mut stack: Vec<GoalNodeID> = self.root().map(|root| root.id).into_iter().collect();

        while let Some(node_id) = stack.pop() {
            if seen.insert(node_id) {
                stack.extend(self.children(node_id).iter().map(|child| child.id));
            }
        }
        seen
    }

    /// Nodes that cannot be reached from the root.
    pub fn orphans(&self) -> Vec<&GoalNode> {
        let reachable = self.reachable();
        self.nodes
            .iter()
            .filter(|node| !reachable.contains(&node.id))
            .collect()
    }

    /// Visible rows in pre-order; collapsed nodes hide their subtree.
    pub fn render(&self) -> Vec<RenderedNode> {
        let mut rendered = vec![];
        let mut seen = HashSet::new();
        let mut stack: Vec<(&GoalNode, usize)> =
            self.root().map(|root| (root, 0)).into_iter().collect();

        while let Some((node, depth)) = stack.pop() {
            if !seen.insert(node.id) {
                continue;
            }

            let children = self.children(node.id);
            let expanded = self.is_expanded(node.id);

            rendered.push(RenderedNode {
                node: node.clone(),
                depth,
                child_count: children.len(),
                expanded,
            });

            if expanded {
                stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
            }
        }

        rendered
    }

    pub fn response(&self, goal_id: GoalID) -> GoalTreeResponse {
        let root = match self.root() {
            Some(root) => root,
            None => {
                if !self.is_empty() {
                    warn!(goal_id = %goal_id, nodes = self.nodes.len(), "Goal tree has no root node");
                }
                return GoalTreeResponse::Empty { goal_id };
            }
        };

        for orphan in self.orphans() {
            warn!(goal_id = %goal_id, node_id = %orphan.id, parent_id = ?orphan.parent_id, "Orphaned goal node");
        }

        GoalTreeResponse::Loaded {
            root_id: root.id,
            nodes: self.render(),
        }
    }
}

/// Expand/collapse state per user and goal, kept for the lifetime of the server.
/// Ids of nodes that are no longer in the tree are dropped on the next `open`.
#[derive(Default)]
pub struct TreeViews {
    views: Mutex<HashMap<(UserID, GoalID), HashSet<GoalNodeID>>>,
}

impl TreeViews {
    pub fn open(&self, user_id: UserID, goal_id: GoalID, nodes: Vec<GoalNode>) -> InternalResult<GoalTree> {
        let mut views = self.views.lock()?;
        Ok(match views.get_mut(&(user_id, goal_id)) {
            Some(expanded) => {
                expanded.retain(|id| nodes.iter().any(|node| node.id == *id));
                GoalTree::with_expanded(nodes, expanded.clone())
            }
            None => GoalTree::new(nodes),
        })
    }

    pub fn save(&self, user_id: UserID, goal_id: GoalID, tree: &GoalTree) -> InternalResult<()> {
        let mut views = self.views.lock()?;
        views.insert((user_id, goal_id), tree.expanded().clone());
        Ok(())
    }
}
