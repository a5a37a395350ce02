mod handlers;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::Database;

pub fn create_router(db: Database) -> Router {
    let api = Router::new()
        .route(
            "/organizations/{organization}/features",
            get(handlers::list_features).post(handlers::create_feature),
        )
        .route(
            "/organizations/{organization}/features/{id}",
            get(handlers::get_feature)
                .patch(handlers::update_feature)
                .delete(handlers::delete_feature),
        )
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(db)
}
