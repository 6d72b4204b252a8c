//! HTTP server for the giveaway bot.
//!
//! Read-only: contests are driven through Telegram, this surface exists for
//! probes and inspection.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns 200 if server is running
//! - `GET /api/v1/contests` - Active contests as JSON
//! - `GET /api/v1/contests/{id}` - One contest with participants and winners

use std::sync::Arc;

pub mod contests;
pub mod health;

pub use contests::{ContestDetail, ServerError, contest_handler, contests_handler};
pub use health::health_handler;

use crate::lifecycle::Engine;
use crate::store::Store;
use crate::transport::Transport;

/// Shared application state, passed to handlers via Axum's `State` extractor.
pub struct AppState<S, T> {
    engine: Arc<Engine<S, T>>,
}

impl<S, T> Clone for AppState<S, T> {
    fn clone(&self) -> Self {
        AppState {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<S: Store, T: Transport> AppState<S, T> {
    pub fn new(engine: Arc<Engine<S, T>>) -> Self {
        AppState { engine }
    }

    pub fn engine(&self) -> &Arc<Engine<S, T>> {
        &self.engine
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router<S: Store, T: Transport>(app_state: AppState<S, T>) -> axum::Router {
    use axum::routing::get;

    axum::Router::new()
        .route("/api/v1/contests", get(contests_handler::<S, T>))
        .route("/api/v1/contests/{id}", get(contest_handler::<S, T>))
        .route("/health", get(health_handler))
        .with_state(app_state)
}
