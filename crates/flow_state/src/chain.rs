//! State chain - the back-pointer stack of flows a user is in
//!
//! The chain is an arena of nodes addressed by [`StateId`]. Node 0 is the root;
//! every other node points at the node below it, so `previous` links can only
//! point downwards and the chain can never contain a cycle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::Context;
use crate::flow::FlowName;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("state chain has no nodes")]
    Empty,

    #[error("node {index} links to {previous:?}, expected the node below it")]
    BrokenLink {
        index: usize,
        previous: Option<StateId>,
    },
}

/// Index of a node in the chain arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(pub u32);

/// One step position: which flow, which step, and the context built so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateNode {
    pub flow: FlowName,
    /// Signed so out-of-range values in stored documents stay representable.
    pub step: i32,
    #[serde(default)]
    pub context: Context,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<StateId>,
}

impl StateNode {
    pub fn new(flow: FlowName, context: Context) -> Self {
        Self {
            flow,
            step: 0,
            context,
            previous: None,
        }
    }

    /// `(main_menu, 0)` with an empty context.
    pub fn main_menu() -> Self {
        Self::new(FlowName::MAIN_MENU, Context::default())
    }

    pub fn is_at(&self, flow: &FlowName, step: i32) -> bool {
        &self.flow == flow && self.step == step
    }
}

/// The live chain of a session. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<StateNode>", into = "Vec<StateNode>")]
pub struct StateChain {
    root: StateNode,
    stack: Vec<StateNode>,
}

impl Default for StateChain {
    fn default() -> Self {
        Self::new()
    }
}

impl StateChain {
    /// A chain holding only `(main_menu, 0)`.
    pub fn new() -> Self {
        Self {
            root: StateNode::main_menu(),
            stack: Vec::new(),
        }
    }

    /// Build a chain from stored nodes, checking every back link.
    pub fn from_nodes(nodes: Vec<StateNode>) -> Result<Self, ChainError> {
        for (index, node) in nodes.iter().enumerate() {
            let expected = index.checked_sub(1).map(|below| StateId(below as u32));
            if node.previous != expected {
                return Err(ChainError::BrokenLink {
                    index,
                    previous: node.previous,
                });
            }
        }

        let mut nodes = nodes.into_iter();
        let root = nodes.next().ok_or(ChainError::Empty)?;
        Ok(Self {
            root,
            stack: nodes.collect(),
        })
    }

    /// Nodes from the root up to the current one.
    pub fn nodes(&self) -> impl Iterator<Item = &StateNode> {
        std::iter::once(&self.root).chain(self.stack.iter())
    }

    pub fn node(&self, id: StateId) -> Option<&StateNode> {
        match id.0 as usize {
            0 => Some(&self.root),
            n => self.stack.get(n - 1),
        }
    }

    pub fn current(&self) -> &StateNode {
        self.stack.last().unwrap_or(&self.root)
    }

    pub fn current_mut(&mut self) -> &mut StateNode {
        match self.stack.last_mut() {
            Some(node) => node,
            None => &mut self.root,
        }
    }

    pub fn current_id(&self) -> StateId {
        StateId(self.stack.len() as u32)
    }

    /// The node a pop would return to.
    pub fn parent(&self) -> Option<&StateNode> {
        self.current().previous.and_then(|id| self.node(id))
    }

    /// Number of nodes, root included.
    pub fn depth(&self) -> usize {
        self.stack.len() + 1
    }

    pub fn flow(&self) -> &FlowName {
        &self.current().flow
    }

    pub fn step(&self) -> i32 {
        self.current().step
    }

    pub fn is_main_menu(&self) -> bool {
        self.stack.is_empty() && self.root.is_at(&FlowName::MAIN_MENU, 0)
    }

    /// Enter `flow` at step 0 on top of the current node.
    pub fn push(&mut self, flow: FlowName, context: Context) {
        let mut node = StateNode::new(flow, context);
        node.previous = Some(self.current_id());
        self.stack.push(node);
    }

    /// Leave the current flow after it finished, resuming the parent exactly
    /// where it was. At the root this falls back to `(main_menu, 0)`.
    /// Returns whether a parent was resumed.
    pub fn pop(&mut self) -> bool {
        if self.stack.pop().is_some() {
            true
        } else {
            self.root = StateNode::main_menu();
            false
        }
    }

    /// Abandon the current flow: resume the parent at its step 0, or reset to
    /// `(main_menu, 0)` when there is no parent.
    pub fn cancel(&mut self) {
        if self.stack.pop().is_some() {
            self.current_mut().step = 0;
        } else {
            self.root = StateNode::main_menu();
        }
    }

    /// Replace the current node with `flow` at step 0, keeping its parent.
    pub fn goto(&mut self, flow: FlowName, context: Context) {
        let node = self.current_mut();
        node.flow = flow;
        node.step = 0;
        node.context = context;
    }

    pub fn advance(&mut self) {
        self.advance_by(1);
    }

    pub fn advance_by(&mut self, steps: i32) {
        let node = self.current_mut();
        node.step = node.step.saturating_add(steps);
    }

    pub fn set_step(&mut self, step: i32) {
        self.current_mut().step = step;
    }

    /// Drop every node and start over at `(main_menu, 0)`.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.root = StateNode::main_menu();
    }
}

impl From<Vec<StateNode>> for StateChain {
    fn from(nodes: Vec<StateNode>) -> Self {
        match StateChain::from_nodes(nodes) {
            Ok(chain) => chain,
            Err(error) => {
                tracing::warn!(%error, "discarding malformed state chain");
                StateChain::new()
            }
        }
    }
}

impl From<StateChain> for Vec<StateNode> {
    fn from(chain: StateChain) -> Self {
        let mut nodes = Vec::with_capacity(chain.depth());
        nodes.push(chain.root);
        nodes.extend(chain.stack);
        nodes
    }
}
