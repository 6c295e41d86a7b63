//! Step functions
//!
//! A step takes the current turn and the session, and returns the session it
//! wants persisted. Plain `async fn`s work out of the box:
//!
//! ```ignore
//! async fn ask_name(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
//!     turn.say("What is the band called?").await?;
//!     session.advance();
//!     Ok(session)
//! }
//! ```

use flow_state::Session;
use futures::future::BoxFuture;
use std::future::Future;

use crate::error::FlowError;
use crate::turn::Turn;

pub type StepFuture<'t> = BoxFuture<'t, Result<Session, FlowError>>;

/// One handler at one position of a flow.
pub trait Step: Send + Sync {
    fn call<'t>(&'t self, turn: &'t Turn, session: Session) -> StepFuture<'t>;
}

/// Bridge that lets `async fn(&Turn, Session)` items implement [`Step`].
pub trait StepFn<'t>: Send + Sync {
    type Future: Future<Output = Result<Session, FlowError>> + Send + 't;

    fn invoke(&self, turn: &'t Turn, session: Session) -> Self::Future;
}

impl<'t, F, Fut> StepFn<'t> for F
where
    F: Fn(&'t Turn, Session) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Session, FlowError>> + Send + 't,
{
    type Future = Fut;

    fn invoke(&self, turn: &'t Turn, session: Session) -> Fut {
        self(turn, session)
    }
}

impl<F> Step for F
where
    F: for<'t> StepFn<'t>,
{
    fn call<'t>(&'t self, turn: &'t Turn, session: Session) -> StepFuture<'t> {
        Box::pin(self.invoke(turn, session))
    }
}
