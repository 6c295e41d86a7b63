//! Dispatcher - the per-message state machine driver
//!
//! Per inbound message:
//! 1. check out the user's session (waiting for any dispatch already running
//!    for that user),
//! 2. run the interceptors,
//! 3. resolve and run the current step, resetting invalid positions,
//! 4. save the returned session with an optimistic version check.
//!
//! Nothing escapes as an error: every failure leaves the stored session as it
//! was, sends the user a generic notice and goes to the audit sink.

use band_core::{ChatId, InboundEvent, OutboundMessage, Services, UserId};
use flow_state::FlowName;
use serde::Serialize;
use session_store::SessionManager;
use std::sync::Arc;

use crate::audit::{AuditReport, AuditSink, FailureStage, LogAudit};
use crate::interceptor::Interceptor;
use crate::registry::FlowRegistry;
use crate::turn::Turn;

pub const DEFAULT_FAILURE_NOTICE: &str = "Something went wrong, please try again.";

/// Result of one dispatch, for the transport adapter and for tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Completed {
        flow: FlowName,
        step: i32,
        depth: usize,
        version: u64,
    },
    /// The step failed; the stored session is unchanged.
    StepFailed,
    /// No session could be established for the user.
    LoadFailed,
    /// Another dispatch saved this user's session first.
    Conflict,
    SaveFailed,
}

impl DispatchOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, DispatchOutcome::Completed { .. })
    }
}

pub struct Dispatcher {
    sessions: Arc<SessionManager>,
    services: Arc<Services>,
    registry: Arc<FlowRegistry>,
    interceptors: Vec<Box<dyn Interceptor>>,
    audit: Arc<dyn AuditSink>,
    failure_notice: String,
}

impl Dispatcher {
    pub fn new(
        sessions: Arc<SessionManager>,
        services: Arc<Services>,
        registry: Arc<FlowRegistry>,
    ) -> Self {
        Self {
            sessions,
            services,
            registry,
            interceptors: Vec::new(),
            audit: Arc::new(LogAudit),
            failure_notice: DEFAULT_FAILURE_NOTICE.to_string(),
        }
    }

    pub fn with_interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Box::new(interceptor));
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_failure_notice(mut self, notice: impl Into<String>) -> Self {
        self.failure_notice = notice.into();
        self
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn registry(&self) -> &Arc<FlowRegistry> {
        &self.registry
    }

    pub async fn dispatch(&self, event: InboundEvent) -> DispatchOutcome {
        let user_id = event.user_id;
        let chat_id = event.chat_id;

        let checkout = match self.sessions.checkout(user_id).await {
            Ok(checkout) => checkout,
            Err(error) => {
                self.fail(user_id, chat_id, FailureStage::Load, None, error.to_string())
                    .await;
                return DispatchOutcome::LoadFailed;
            }
        };
        let lane = checkout.lane;
        let mut session = checkout.session;
        let position = (session.flow().clone(), session.step());

        let mut turn = Turn::new(event, self.services.clone(), self.registry.clone());

        let mut fired = Vec::new();
        for interceptor in &self.interceptors {
            if interceptor.matches(turn.event(), &session) {
                if interceptor.retracts_stale() {
                    turn.retract_stale(session.context_mut()).await;
                }
                interceptor.apply(turn.event(), &mut session);
                fired.push(interceptor.name());
            }
        }
        if !fired.is_empty() {
            tracing::debug!(
                user_id = %user_id,
                interceptors = ?fired,
                flow = %session.flow(),
                step = session.step(),
                "interceptors fired"
            );
            turn = turn.consumed();
        }

        let mut next = match turn.run(session).await {
            Ok(next) => next,
            Err(error) => {
                self.fail(
                    user_id,
                    chat_id,
                    FailureStage::Step,
                    Some(position),
                    error.to_string(),
                )
                .await;
                return DispatchOutcome::StepFailed;
            }
        };

        match self.sessions.commit(&lane, &mut next).await {
            Ok(version) => {
                tracing::debug!(
                    user_id = %user_id,
                    flow = %next.flow(),
                    step = next.step(),
                    depth = next.states.depth(),
                    version,
                    "dispatch completed"
                );
                DispatchOutcome::Completed {
                    flow: next.flow().clone(),
                    step: next.step(),
                    depth: next.states.depth(),
                    version,
                }
            }
            Err(error) if error.is_conflict() => {
                tracing::warn!(user_id = %user_id, %error, "session save rejected");
                self.notify(chat_id).await;
                DispatchOutcome::Conflict
            }
            Err(error) => {
                self.fail(
                    user_id,
                    chat_id,
                    FailureStage::Save,
                    Some(position),
                    error.to_string(),
                )
                .await;
                DispatchOutcome::SaveFailed
            }
        }
    }

    async fn fail(
        &self,
        user_id: UserId,
        chat_id: ChatId,
        stage: FailureStage,
        position: Option<(FlowName, i32)>,
        error: String,
    ) {
        self.audit
            .report(AuditReport {
                user_id,
                stage,
                position,
                error,
            })
            .await;
        self.notify(chat_id).await;
    }

    async fn notify(&self, chat_id: ChatId) {
        let notice = OutboundMessage::text(self.failure_notice.clone());
        if let Err(error) = self.services.messenger.send(chat_id, notice).await {
            tracing::warn!(%error, "could not deliver failure notice");
        }
    }
}
