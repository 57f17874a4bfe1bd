use crate::api::handlers::{auth, health, users};
use crate::auth::middleware::{require_admin, require_auth};
use crate::types::AppError;
use crate::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};

/// Routes mounted under `/api/v1`.
pub fn create_router(state: &AppState) -> Router<AppState> {
    let public_routes = Router::new()
        // Public routes (no auth required)
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh_token))
        .route("/auth/logout", post(auth::logout));

    let admin_routes = Router::new()
        .route("/users/{id}", get(users::get_user))
        .layer(middleware::from_fn(require_admin));

    let protected_routes = Router::new()
        // Protected routes (auth required)
        .route("/users/me", get(users::me))
        .merge(admin_routes)
        .layer(middleware::from_fn_with_state(
            state.signer.clone(),
            require_auth,
        ));

    public_routes.merge(protected_routes)
}

/// The whole application: probes, the versioned API and the OpenAPI
/// document, with a JSON 404 for anything else.
pub fn app(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready));

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", crate::api::openapi()),
    );

    #[cfg(not(feature = "swagger-ui"))]
    let router = router.route(
        "/api-docs/openapi.json",
        get(|| async { Json(crate::api::openapi()) }),
    );

    router
        .nest("/api/v1", create_router(&state))
        .fallback(route_not_found)
        .with_state(state)
}

async fn route_not_found() -> AppError {
    AppError::NotFound("route".to_string())
}
