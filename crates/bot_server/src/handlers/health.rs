use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use crate::state::AppState;

pub async fn handler(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "flows": state.dispatcher.registry().flow_names().len(),
        "active_lanes": state.dispatcher.sessions().active_lanes(),
    }))
}
