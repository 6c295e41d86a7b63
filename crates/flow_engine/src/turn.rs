//! One inbound message's trip through the flows

use band_core::{
    Callback, ChatId, InboundEvent, Keyboard, MediaRef, MessageId, OutboundMessage, Services,
    UserId,
};
use flow_state::{Context, FlowName, Session};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::FlowError;
use crate::registry::FlowRegistry;

/// Upper bound on step invocations per inbound message. Steps hand control to
/// each other through [`Turn::enter`] and [`Turn::forward`]; a flow graph that
/// loops would otherwise never return.
pub const MAX_HOPS: u32 = 8;

/// Everything a step can see while handling one message.
///
/// A turn whose input was consumed (after an interceptor fired, or after
/// [`Turn::enter`]) reports no text, callback or media, so the step it reaches
/// renders its prompt instead of acting on stale input.
#[derive(Clone)]
pub struct Turn {
    event: Arc<InboundEvent>,
    services: Arc<Services>,
    registry: Arc<FlowRegistry>,
    input_consumed: bool,
    hops: Arc<AtomicU32>,
}

impl Turn {
    pub fn new(event: InboundEvent, services: Arc<Services>, registry: Arc<FlowRegistry>) -> Self {
        Self {
            event: Arc::new(event),
            services,
            registry,
            input_consumed: false,
            hops: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.event.user_id
    }

    pub fn chat_id(&self) -> ChatId {
        self.event.chat_id
    }

    pub fn user_name(&self) -> Option<&str> {
        self.event.user_name.as_deref()
    }

    pub fn event(&self) -> &InboundEvent {
        &self.event
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn registry(&self) -> &FlowRegistry {
        &self.registry
    }

    pub fn input_consumed(&self) -> bool {
        self.input_consumed
    }

    /// Non-empty text input.
    pub fn text(&self) -> Option<&str> {
        if self.input_consumed {
            return None;
        }
        self.event.text_payload().filter(|text| !text.is_empty())
    }

    /// Decoded inline-button token. Tokens this build does not understand count
    /// as no input.
    pub fn callback(&self) -> Option<Callback> {
        if self.input_consumed {
            return None;
        }
        let data = self.event.callback_data()?;
        match data.parse() {
            Ok(callback) => Some(callback),
            Err(error) => {
                tracing::debug!(user_id = %self.user_id(), %error, "ignoring callback");
                None
            }
        }
    }

    /// Message carrying the pressed button.
    pub fn callback_message(&self) -> Option<MessageId> {
        if self.input_consumed {
            return None;
        }
        self.event.callback_message()
    }

    pub fn media(&self) -> Option<&MediaRef> {
        if self.input_consumed {
            return None;
        }
        self.event.media()
    }

    pub fn has_input(&self) -> bool {
        self.text().is_some() || self.callback().is_some() || self.media().is_some()
    }

    /// Send a reply to the user's chat.
    pub async fn reply(&self, message: OutboundMessage) -> Result<MessageId, FlowError> {
        let chat = self.chat_id();
        Ok(self.services.messenger.send(chat, message).await?)
    }

    pub async fn say(&self, text: impl Into<String>) -> Result<MessageId, FlowError> {
        self.reply(OutboundMessage::text(text)).await
    }

    pub async fn ask(
        &self,
        text: impl Into<String>,
        keyboard: Keyboard,
    ) -> Result<MessageId, FlowError> {
        self.reply(OutboundMessage::text(text).with_keyboard(keyboard))
            .await
    }

    /// Send a prompt that goes stale once the flow moves on, and remember it
    /// in `context` for [`Turn::retract_stale`].
    pub async fn prompt(
        &self,
        context: &mut Context,
        message: OutboundMessage,
    ) -> Result<MessageId, FlowError> {
        let id = self.reply(message).await?;
        context.track(id);
        Ok(id)
    }

    /// Remove the prompts tracked in `context`. Failures are logged and
    /// otherwise ignored.
    pub async fn retract_stale(&self, context: &mut Context) {
        for message in std::mem::take(&mut context.retract) {
            if let Err(error) = self.services.messenger.retract(self.chat_id(), message).await {
                tracing::warn!(
                    user_id = %self.user_id(),
                    message = message.0,
                    %error,
                    "could not retract stale prompt"
                );
            }
        }
    }

    /// Run the session's current step with the input consumed, so it renders
    /// its prompt. Used after pushing, popping or jumping.
    pub async fn enter(&self, session: Session) -> Result<Session, FlowError> {
        self.consumed().run(session).await
    }

    /// Run the session's current step with the same input. Used when a step
    /// hands the message on, e.g. free text typed in the menu becoming a query.
    pub async fn forward(&self, session: Session) -> Result<Session, FlowError> {
        self.run(session).await
    }

    /// Push `flow` and enter it.
    pub async fn start(
        &self,
        mut session: Session,
        flow: FlowName,
        context: Context,
    ) -> Result<Session, FlowError> {
        session.push(flow, context);
        self.enter(session).await
    }

    /// Pop the finished flow and re-render the step it returns to.
    pub async fn finish(&self, mut session: Session) -> Result<Session, FlowError> {
        session.pop();
        self.enter(session).await
    }

    pub(crate) fn consumed(&self) -> Self {
        Self {
            input_consumed: true,
            ..self.clone()
        }
    }

    /// Resolve and run the current step. An unknown flow or an out-of-range
    /// step resets the chain to the main menu first.
    pub(crate) async fn run(&self, mut session: Session) -> Result<Session, FlowError> {
        let hop = self.hops.fetch_add(1, Ordering::SeqCst) + 1;
        if hop > MAX_HOPS {
            return Err(FlowError::TooManyHops(MAX_HOPS));
        }

        let step = match self.registry.resolve(session.flow(), session.step()) {
            Some(step) => step,
            None => {
                tracing::warn!(
                    user_id = %self.user_id(),
                    flow = %session.flow(),
                    step = session.step(),
                    "invalid state position, resetting to main menu"
                );
                session.reset();
                self.registry
                    .resolve(&FlowName::MAIN_MENU, 0)
                    .ok_or_else(|| anyhow::anyhow!("main menu flow is not registered"))?
            }
        };

        tracing::debug!(
            user_id = %self.user_id(),
            flow = %session.flow(),
            step = session.step(),
            consumed = self.input_consumed,
            "running step"
        );
        step.call(self, session).await
    }
}
