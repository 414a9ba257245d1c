use crate::controllers::{self, sentence, word};
use crate::media;
use crate::models::{Sentence, Word};
use crate::state::AppState;
use axum::routing::{delete, get, post};
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn router(app_state: AppState, cors_permissive: bool) -> Router {
    let app = Router::new()
        .route("/health", get(controllers::health))
        // Sentences
        .route("/api/sentence", post(sentence::create))
        .route(
            "/api/sentence/random",
            get(controllers::random::<Sentence>),
        )
        .route(
            "/api/sentence/:id",
            get(controllers::retrieve::<Sentence>)
                .put(sentence::update)
                .delete(controllers::delete::<Sentence>),
        )
        .route("/api/sentence/:id/image", get(media::image::<Sentence>))
        .route("/api/sentence/:id/audio", get(media::audio::<Sentence>))
        .route("/api/search/sentence", get(controllers::search::<Sentence>))
        // Words
        .route("/api/word", post(word::create))
        .route("/api/word/random", get(controllers::random::<Word>))
        .route(
            "/api/word/:id",
            get(word::retrieve)
                .put(word::update)
                .delete(controllers::delete::<Word>),
        )
        .route("/api/word/:id/related", post(word::add_related))
        .route("/api/word/:id/related/:related_id", delete(word::remove_related))
        .route("/api/word/:id/sentence", post(word::attach_sentence))
        .route(
            "/api/word/:id/sentence/:sentence_id",
            delete(word::detach_sentence),
        )
        .route("/api/word/:id/image", get(media::image::<Word>))
        .route("/api/word/:id/audio", get(media::audio::<Word>))
        .route("/api/search/word", get(controllers::search::<Word>))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    if cors_permissive {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Binds `addr` and serves in a background task. Returns the bound address,
/// which differs from `addr` when port 0 was requested.
pub async fn start_server(app: Router, addr: SocketAddr) -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;

    tracing::info!(%local, "dictionary server started");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "dictionary server stopped");
        }
    });

    Ok(local)
}

/// Serves on `addr` until Ctrl-C.
pub async fn serve(app: Router, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(local = %listener.local_addr()?, "dictionary server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutting down");
        })
        .await
}
