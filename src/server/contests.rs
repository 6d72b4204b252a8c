//! Read-only contest inspection endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppState;
use crate::store::{Store, StoreError};
use crate::transport::Transport;
use crate::types::{Contest, ContestId, Participant, Winner};

/// Errors that can occur when serving contest state.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("contest {0} not found")]
    NotFound(ContestId),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::NotFound(_) | ServerError::Store(StoreError::NotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            ServerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// One contest with its roster and recorded winners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestDetail {
    pub contest: Contest,
    pub participants: Vec<Participant>,
    pub winners: Vec<Winner>,
}

/// Lists every non-terminal contest.
///
/// ```ignore
/// GET /api/v1/contests HTTP/1.1
///
/// HTTP/1.1 200 OK
/// Content-Type: application/json
///
/// [{"id": 3, "kind": "random_draw", "status": "collecting", ...}]
/// ```
pub async fn contests_handler<S: Store, T: Transport>(
    State(app_state): State<AppState<S, T>>,
) -> Result<Json<Vec<Contest>>, ServerError> {
    Ok(Json(app_state.engine().active_contests().await?))
}

/// Returns one contest, active or ended.
///
/// - 200 OK with a [`ContestDetail`] body
/// - 404 Not Found if the id is unknown
pub async fn contest_handler<S: Store, T: Transport>(
    State(app_state): State<AppState<S, T>>,
    Path(id): Path<u64>,
) -> Result<Json<ContestDetail>, ServerError> {
    let id = ContestId(id);
    let store = app_state.engine().store();
    let contest = store.contest(id).await?.ok_or(ServerError::NotFound(id))?;
    let participants = store.participants(id).await?;
    let winners = store.winners(id).await?;

    Ok(Json(ContestDetail {
        contest,
        participants,
        winners,
    }))
}
