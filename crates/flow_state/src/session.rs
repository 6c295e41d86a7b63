//! Per-user session document

use band_core::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::{StateChain, StateNode};
use crate::context::Context;
use crate::flow::FlowName;

/// Everything the bot remembers about one user's conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    /// Store revision this copy was read at. 0 means never persisted.
    #[serde(default)]
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub states: StateChain,
}

impl Session {
    /// A fresh session at `(main_menu, 0)`.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            version: 0,
            updated_at: Utc::now(),
            states: StateChain::new(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.version > 0
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn current(&self) -> &StateNode {
        self.states.current()
    }

    pub fn flow(&self) -> &FlowName {
        self.states.flow()
    }

    pub fn step(&self) -> i32 {
        self.states.step()
    }

    pub fn context(&self) -> &Context {
        &self.states.current().context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.states.current_mut().context
    }

    /// Context of the node a pop would return to.
    pub fn parent_context(&self) -> Option<&Context> {
        self.states.parent().map(|node| &node.context)
    }

    pub fn push(&mut self, flow: FlowName, context: Context) {
        self.states.push(flow, context);
    }

    pub fn pop(&mut self) -> bool {
        self.states.pop()
    }

    pub fn cancel(&mut self) {
        self.states.cancel();
    }

    pub fn goto(&mut self, flow: FlowName, context: Context) {
        self.states.goto(flow, context);
    }

    pub fn advance(&mut self) {
        self.states.advance();
    }

    pub fn advance_by(&mut self, steps: i32) {
        self.states.advance_by(steps);
    }

    pub fn set_step(&mut self, step: i32) {
        self.states.set_step(step);
    }

    pub fn reset(&mut self) {
        self.states.reset();
    }
}
