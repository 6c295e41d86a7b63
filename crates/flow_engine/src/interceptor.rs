//! Global interceptors
//!
//! Interceptors run before normal dispatch, in registration order. Each is a
//! pure predicate plus a transform of the session; when any of them fires, the
//! message counts as consumed and the resulting current step only re-renders.

use band_core::InboundEvent;
use flow_state::{Context, FlowName, Session};

pub trait Interceptor: Send + Sync {
    fn name(&self) -> &'static str;

    fn matches(&self, event: &InboundEvent, session: &Session) -> bool;

    fn apply(&self, event: &InboundEvent, session: &mut Session);

    /// Whether the prompts tracked by the current node are removed before
    /// [`Interceptor::apply`]. Only interceptors that abandon the node do so;
    /// a node that is merely interrupted keeps its prompts for when it resumes.
    fn retracts_stale(&self) -> bool {
        false
    }
}

/// Cancel command: pop to the previous flow (restarting it at step 0) or go
/// back to the main menu.
#[derive(Debug, Clone)]
pub struct CancelInterceptor {
    labels: Vec<String>,
}

impl CancelInterceptor {
    pub const COMMAND: &'static str = "/cancel";

    /// Matches `/cancel` and the given button label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            labels: vec![label.into(), Self::COMMAND.to_string()],
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl Interceptor for CancelInterceptor {
    fn name(&self) -> &'static str {
        "cancel"
    }

    fn matches(&self, event: &InboundEvent, _session: &Session) -> bool {
        event.text_payload().is_some_and(|text| {
            self.labels
                .iter()
                .any(|label| label.eq_ignore_ascii_case(text))
        })
    }

    fn apply(&self, _event: &InboundEvent, session: &mut Session) {
        session.cancel();
    }

    fn retracts_stale(&self) -> bool {
        true
    }
}

/// Out-of-band media capture: a voice note or audio clip enters `target`
/// from wherever the user is, and the interrupted flow resumes once it pops.
#[derive(Debug, Clone)]
pub struct CaptureInterceptor {
    target: FlowName,
    carried: Vec<&'static str>,
}

impl CaptureInterceptor {
    pub fn new(target: FlowName) -> Self {
        Self {
            target,
            carried: Vec::new(),
        }
    }

    /// Copy a named field from the interrupted context into the capture
    /// context, e.g. the song the user was looking at.
    pub fn carry(mut self, field: &'static str) -> Self {
        self.carried.push(field);
        self
    }

    pub fn target(&self) -> &FlowName {
        &self.target
    }
}

impl Interceptor for CaptureInterceptor {
    fn name(&self) -> &'static str {
        "capture"
    }

    fn matches(&self, event: &InboundEvent, _session: &Session) -> bool {
        event.media().is_some()
    }

    fn apply(&self, event: &InboundEvent, session: &mut Session) {
        let Some(media) = event.media() else {
            return;
        };

        let mut context = Context::new().with_media(media.clone());
        for field in &self.carried {
            if let Some(value) = session.context().get(field) {
                context.set(*field, value.clone());
            }
        }

        // A second clip while already capturing restarts the capture.
        if session.flow() == &self.target {
            session.goto(self.target.clone(), context);
        } else {
            session.push(self.target.clone(), context);
        }
    }
}
