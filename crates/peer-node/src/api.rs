//! HTTP/JSON read-and-command surface for the local UI.
//!
//! The API never talks to other peers: commands go through the same
//! `GameCore` entry points the coordinator uses, and reads are point-in-time
//! snapshots under the shared lock.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use holdem_core::game::GameCore;
use holdem_core::phase::PlayerAction;
use holdem_core::Chips;

use crate::node::{save_snapshot, Node};

#[derive(Clone)]
pub struct ApiContext {
    game: Arc<RwLock<GameCore>>,
    snapshot_path: PathBuf,
}

impl ApiContext {
    #[must_use]
    pub fn new(node: &Node) -> Self {
        Self {
            game: node.game(),
            snapshot_path: node.snapshot_path().clone(),
        }
    }
}

/// Input-validation and rejected-action errors surface as HTTP 400.
struct ApiError(String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": self.0 }))).into_response()
    }
}

impl From<holdem_core::betting::ActionError> for ApiError {
    fn from(err: holdem_core::betting::ActionError) -> Self {
        Self(err.to_string())
    }
}

#[must_use]
pub fn router(ctx: ApiContext) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/table", get(table))
        .route("/api/players", get(players))
        .route("/api/ready", post(ready))
        .route("/api/fold", post(fold))
        .route("/api/check", post(check))
        .route("/api/call", post(call))
        .route("/api/bet", post(bet))
        .route("/api/raise", post(raise))
        .with_state(ctx)
}

pub async fn serve(ctx: ApiContext, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct TableView {
    pub status: String,
    pub my_hand: Vec<String>,
    pub community_cards: Vec<String>,
    pub pot: u32,
    pub highest_bet: u32,
    pub min_raise: u32,
    pub valid_actions: Vec<String>,
    pub is_my_turn: bool,
    pub my_stack: u32,
    pub current_turn_id: usize,
    pub dealer_id: usize,
    pub small_blind: u32,
    pub big_blind: u32,
}

#[derive(Debug, Serialize)]
pub struct PlayerView {
    pub addr: String,
    pub rotation_id: Option<usize>,
    pub stack: u32,
    pub current_bet: u32,
    pub is_active: bool,
    pub is_folded: bool,
    pub is_all_in: bool,
    pub is_dealer: bool,
    pub is_small_blind: bool,
    pub is_big_blind: bool,
    pub is_turn: bool,
}

pub(crate) fn table_view(game: &GameCore) -> TableView {
    TableView {
        status: game.status().to_string(),
        my_hand: game.my_hand().iter().map(ToString::to_string).collect(),
        community_cards: game
            .community_cards()
            .iter()
            .map(ToString::to_string)
            .collect(),
        pot: game.pot().amount(),
        highest_bet: game.highest_bet().amount(),
        min_raise: game.min_raise().amount(),
        valid_actions: game
            .valid_actions()
            .iter()
            .map(ToString::to_string)
            .collect(),
        is_my_turn: game.is_my_turn(),
        my_stack: game.my_stack().amount(),
        current_turn_id: game.turn_id(),
        dealer_id: game.dealer_id(),
        small_blind: holdem_core::SMALL_BLIND.amount(),
        big_blind: holdem_core::BIG_BLIND.amount(),
    }
}

pub(crate) fn players_view(game: &GameCore) -> Vec<PlayerView> {
    let (sb, bb) = game.blind_ids();
    game.players()
        .into_iter()
        .map(|p| PlayerView {
            is_dealer: p.rotation_id == Some(game.dealer_id()),
            is_small_blind: p.rotation_id == Some(sb),
            is_big_blind: p.rotation_id == Some(bb),
            is_turn: p.rotation_id == Some(game.turn_id()),
            addr: p.addr,
            rotation_id: p.rotation_id,
            stack: p.stack.amount(),
            current_bet: p.current_round_bet.amount(),
            is_active: p.is_active,
            is_folded: p.is_folded,
            is_all_in: p.is_all_in,
        })
        .collect()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn table(State(ctx): State<ApiContext>) -> Json<TableView> {
    Json(table_view(&ctx.game.read()))
}

async fn players(State(ctx): State<ApiContext>) -> Json<Vec<PlayerView>> {
    Json(players_view(&ctx.game.read()))
}

async fn ready(State(ctx): State<ApiContext>) -> Json<serde_json::Value> {
    ctx.game.write().ready_up();
    Json(json!({ "status": "READY" }))
}

fn act(
    ctx: &ApiContext,
    action: PlayerAction,
    value: Chips,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.game.write().take_action(action, value)?;
    save_snapshot(&ctx.game, &ctx.snapshot_path);
    Ok(Json(json!({ "status": action.to_string() })))
}

async fn fold(State(ctx): State<ApiContext>) -> Result<Json<serde_json::Value>, ApiError> {
    act(&ctx, PlayerAction::Fold, Chips::ZERO)
}

async fn check(State(ctx): State<ApiContext>) -> Result<Json<serde_json::Value>, ApiError> {
    act(&ctx, PlayerAction::Check, Chips::ZERO)
}

async fn call(State(ctx): State<ApiContext>) -> Result<Json<serde_json::Value>, ApiError> {
    act(&ctx, PlayerAction::Call, Chips::ZERO)
}

#[derive(Debug, Deserialize)]
struct ValueBody {
    value: u32,
}

async fn bet(
    State(ctx): State<ApiContext>,
    Json(body): Json<ValueBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.value == 0 {
        return Err(ApiError("bet value must be positive".to_string()));
    }
    act(&ctx, PlayerAction::Bet, Chips::new(body.value))
}

async fn raise(
    State(ctx): State<ApiContext>,
    Json(body): Json<ValueBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.value == 0 {
        return Err(ApiError("raise value must be positive".to_string()));
    }
    act(&ctx, PlayerAction::Raise, Chips::new(body.value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn views_reflect_game_state() {
        let (tx, _rx) = mpsc::channel(100);
        let game = GameCore::new("127.0.0.1:9000".to_string(), tx);

        let table = table_view(&game);
        assert_eq!(table.status, "WAITING");
        assert_eq!(table.my_stack, 1_000);
        assert_eq!(table.small_blind, 10);
        assert_eq!(table.big_blind, 20);
        assert!(table.valid_actions.is_empty());
        assert!(!table.is_my_turn);

        let players = players_view(&game);
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].addr, "127.0.0.1:9000");
        assert_eq!(players[0].rotation_id, None);
        assert!(players[0].is_active);
    }
}
