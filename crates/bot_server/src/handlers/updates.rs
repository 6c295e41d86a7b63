use actix_web::{web, HttpResponse, Responder};
use band_core::InboundEvent;
use flow_engine::DispatchOutcome;
use serde::Serialize;

use crate::outbox::Delivery;
use crate::state::AppState;

#[derive(Serialize)]
struct UpdateResponse {
    outcome: DispatchOutcome,
    messages: Vec<Delivery>,
}

/// Dispatch one inbound event and return what the bot sent to that chat.
///
/// Failed dispatches still answer 200: the user already got the failure
/// notice, and the outcome says what happened.
pub async fn handler(state: web::Data<AppState>, event: web::Json<InboundEvent>) -> impl Responder {
    let event = event.into_inner();
    let chat = event.chat_id;
    tracing::debug!(user_id = %event.user_id, "inbound update");

    let (outcome, messages) = state
        .outbox
        .exchange(chat, state.dispatcher.dispatch(event))
        .await;
    HttpResponse::Ok().json(UpdateResponse { outcome, messages })
}
