//! The HTTP surface: session bootstrap plus the WebSocket upgrade.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use mitos_core::world::manager::WorldSummary;
use mitos_protocol::GameplayConfig;
use serde::{Deserialize, Serialize};

use crate::GatewayContext;
use crate::error::GatewayError;
use crate::session;

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: String,
}

#[derive(Debug, Deserialize)]
struct CreateWorldRequest {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: String,
    player_name: String,
}

/// Builds the router serving the REST endpoints and the game socket.
pub fn router(ctx: Arc<GatewayContext>) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/config", get(current_config))
        .route("/worlds", get(list_worlds).post(create_world))
        .route("/ws/world/{world_id}", get(world_socket))
        .with_state(ctx)
}

async fn login(
    State(ctx): State<Arc<GatewayContext>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, GatewayError> {
    let user = ctx
        .accounts
        .authenticate(&payload.username, &payload.password)
        .await?
        .ok_or(GatewayError::Unauthorized)?;
    let token = ctx.tokens.issue(&user.username, user.id);
    Ok(Json(LoginResponse {
        token,
        username: user.username,
    }))
}

async fn current_config(State(ctx): State<Arc<GatewayContext>>) -> Json<GameplayConfig> {
    Json(ctx.config.snapshot())
}

async fn list_worlds(
    State(ctx): State<Arc<GatewayContext>>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Vec<WorldSummary>>, GatewayError> {
    ctx.tokens
        .validate(&query.token)
        .ok_or(GatewayError::Unauthorized)?;
    Ok(Json(ctx.manager.list_worlds()))
}

async fn create_world(
    State(ctx): State<Arc<GatewayContext>>,
    Query(query): Query<TokenQuery>,
    Json(payload): Json<CreateWorldRequest>,
) -> Result<Json<WorldSummary>, GatewayError> {
    ctx.tokens
        .validate(&query.token)
        .ok_or(GatewayError::Unauthorized)?;
    Ok(Json(ctx.manager.create_world(&payload.name)))
}

async fn world_socket(
    State(ctx): State<Arc<GatewayContext>>,
    Path(world_id): Path<String>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| {
        session::run(socket, ctx, world_id, query.token, query.player_name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::context;

    #[tokio::test]
    async fn login_issues_a_token_for_valid_credentials() {
        let (ctx, store) = context();
        store.add_user("alice", "hunter2");

        let response = login(
            State(Arc::clone(&ctx)),
            Json(LoginRequest {
                username: "alice".to_owned(),
                password: "hunter2".to_owned(),
            }),
        )
        .await
        .expect("login succeeds")
        .0;

        assert_eq!(response.username, "alice");
        let identity = ctx.tokens.validate(&response.token).expect("token valid");
        assert_eq!(identity.username, "alice");
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let (ctx, store) = context();
        store.add_user("alice", "hunter2");

        let result = login(
            State(ctx),
            Json(LoginRequest {
                username: "alice".to_owned(),
                password: "wrong".to_owned(),
            }),
        )
        .await;
        assert!(matches!(result, Err(GatewayError::Unauthorized)));
    }

    #[tokio::test]
    async fn worlds_endpoints_require_a_valid_token() {
        let (ctx, store) = context();
        store.add_user("alice", "hunter2");
        let token = ctx.tokens.issue("alice", 1);

        let result = list_worlds(
            State(Arc::clone(&ctx)),
            Query(TokenQuery {
                token: "bogus".to_owned(),
            }),
        )
        .await;
        assert!(matches!(result, Err(GatewayError::Unauthorized)));

        let created = create_world(
            State(Arc::clone(&ctx)),
            Query(TokenQuery {
                token: token.clone(),
            }),
            Json(CreateWorldRequest {
                name: "arena".to_owned(),
            }),
        )
        .await
        .expect("create succeeds")
        .0;
        assert_eq!(created.name, "arena");

        let listed = list_worlds(State(ctx), Query(TokenQuery { token }))
            .await
            .expect("list succeeds")
            .0;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);
    }
}
