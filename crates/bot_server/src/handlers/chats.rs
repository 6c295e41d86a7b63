use actix_web::{web, HttpResponse, Responder};
use band_core::ChatId;
use serde_json::json;

use crate::state::AppState;

/// Collect what the bot queued for a chat outside any update, such as audit
/// reports for the log channel.
pub async fn messages(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    let chat = ChatId(path.into_inner());
    let ((), messages) = state.outbox.exchange(chat, async {}).await;
    HttpResponse::Ok().json(json!({
        "chat_id": chat,
        "messages": messages,
    }))
}
