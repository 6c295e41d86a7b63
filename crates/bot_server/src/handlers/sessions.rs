use actix_web::{web, HttpResponse, Responder};
use band_core::UserId;
use serde_json::json;

use crate::state::AppState;

/// Current position of a user's conversation.
pub async fn handler(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    let user_id = UserId(path.into_inner());

    match state.dispatcher.sessions().peek(user_id).await {
        Ok(Some(session)) => HttpResponse::Ok().json(json!({
            "user_id": user_id,
            "flow": session.flow(),
            "step": session.step(),
            "depth": session.states.depth(),
            "version": session.version,
        })),
        Ok(None) => HttpResponse::NotFound().json(json!({
            "error": "Session not found"
        })),
        Err(error) => {
            tracing::error!(%user_id, %error, "failed to load session");
            HttpResponse::InternalServerError().json(json!({
                "error": "Failed to load session"
            }))
        }
    }
}
