//! Route table of the mock backend

pub mod account;
pub mod auth;
pub mod pages;

use crate::error::{MockError, MockResult};
use crate::state::MockState;
use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use rand::Rng;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Bearer token from the `Authorization` header
pub(crate) fn bearer(headers: &HeaderMap) -> MockResult<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| MockError::Unauthorized("Token is invalid or expired".into()))
}

/// Injects the configured latency and random failures; logout is never failed
async fn simulate_network(State(state): State<MockState>, request: Request, next: Next) -> Response {
    let config = state.config();
    let (delay, fail) = {
        let mut rng = rand::thread_rng();
        let delay = if config.simulate_delay && config.max_delay_ms > 0 {
            let low = config.min_delay_ms.min(config.max_delay_ms);
            Some(Duration::from_millis(rng.gen_range(low..=config.max_delay_ms)))
        } else {
            None
        };
        let fail = config.failure_rate > 0.0 && rng.gen_bool(config.failure_rate.clamp(0.0, 1.0));
        (delay, fail)
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let path = request.uri().path().to_string();
    if fail && !path.ends_with("/logout") {
        debug!(%path, "Injecting simulated failure");
        return MockError::SimulatedFailure.into_response();
    }

    debug!(method = %request.method(), %path, "Mock request");
    next.run(request).await
}

fn api_routes() -> Router<MockState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/logout", post(auth::logout))
        .route("/token/validate", post(auth::validate_token))
        .route("/token/refresh", post(auth::refresh_token))
        .route("/password/forgot", post(auth::forgot_password))
        .route("/password/reset", post(auth::reset_password))
        .route("/password/reset/validate", post(auth::validate_reset_token))
        .route("/password/reset/complete", post(auth::reset_password))
        .route("/password/change", post(account::change_password))
        .route(
            "/user/profile",
            get(account::profile).post(account::update_profile),
        )
        .route("/user/roles-permissions", get(account::roles_and_permissions))
        .route("/user/account", axum::routing::delete(account::delete_account))
        .route("/user/activity", get(account::activity_log))
        .route(
            "/user/preferences",
            get(account::preferences).put(account::update_preferences),
        )
        .route(
            "/otherlinks",
            get(pages::list_otherlinks).post(pages::create_otherlink),
        )
        .route(
            "/otherlinks/{id}",
            get(pages::get_otherlink)
                .put(pages::update_otherlink)
                .delete(pages::delete_otherlink),
        )
        .route("/otherlinks/public/{display_name}", get(pages::public_otherlink))
        .route(
            "/otherlinks/check-display-name/{display_name}",
            get(pages::check_display_name),
        )
        .route(
            "/links/otherlink/{otherlink_id}",
            get(pages::list_links).post(pages::create_link),
        )
        .route(
            "/links/otherlink/{otherlink_id}/{link_id}",
            get(pages::get_link)
                .put(pages::update_link)
                .delete(pages::delete_link),
        )
        .route(
            "/links/otherlink/{otherlink_id}/recent",
            get(pages::recent_links),
        )
        .route(
            "/links/otherlink/{otherlink_id}/check-shortcode/{shortcode}",
            get(pages::check_shortcode),
        )
        .route(
            "/links/otherlink/{otherlink_id}/generate-shortcode",
            post(pages::generate_shortcode),
        )
}

/// Full router, with every endpoint under `/api`
pub fn router(state: MockState) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(middleware::from_fn_with_state(state.clone(), simulate_network))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
