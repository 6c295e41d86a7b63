use actix_web::{web, App, HttpServer};
use std::io;

use crate::config::BotConfig;
use crate::handlers;
use crate::state::AppState;

pub fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/updates", web::post().to(handlers::updates::handler))
            .route(
                "/sessions/{user_id}",
                web::get().to(handlers::sessions::handler),
            )
            .route(
                "/chats/{chat_id}/messages",
                web::get().to(handlers::chats::messages),
            )
            .route("/health", web::get().to(handlers::health::handler)),
    );
}

pub async fn run(config: BotConfig) -> io::Result<()> {
    let state = AppState::build(&config)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("{e:#}")))?;
    let state = web::Data::new(state);

    let port = config.port;
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(app_config)
    })
    .bind(format!("0.0.0.0:{port}"))?
    .run();

    tracing::info!("Listening on http://0.0.0.0:{port}");
    if let Err(e) = server.await {
        tracing::error!("Server error: {}", e);
        return Err(e);
    }
    Ok(())
}
