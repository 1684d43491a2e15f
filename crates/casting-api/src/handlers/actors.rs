//! Actor handlers.
//!
//! - `GET /actors` - List actors (`get:actors`)
//! - `POST /actors` - Create an actor (`post:actor`)
//! - `GET /actors/:id` - Fetch one actor (`get:actors`)
//! - `PATCH /actors/:id` - Update an actor (`update:actor`)
//! - `DELETE /actors/:id` - Delete an actor (`delete:actor`)
//!
//! Reads answer under `actors`, writes under `actor`; both are lists.

use crate::auth::ClaimSet;
use crate::errors::ApiError;
use crate::handlers::{json_body, resource_id};
use crate::models::{ActorPayload, ActorResponse, ActorsResponse, DeletedResponse};
use crate::routes::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Extension, Json,
};
use std::sync::Arc;
use tracing::{info, instrument};

/// Handler for GET /actors
///
/// # Response
///
/// - 200 OK: `{"success": true, "actors": [...]}`
/// - 404 Not Found: no actors stored
#[instrument(skip_all, name = "casting.handlers.list_actors")]
pub async fn list_actors(
    State(state): State<Arc<AppState>>,
    Extension(_claims): Extension<ClaimSet>,
) -> Result<Json<ActorsResponse>, ApiError> {
    let actors = state.repository.list_actors().await?;

    if actors.is_empty() {
        return Err(ApiError::NotFound("actors".to_string()));
    }

    Ok(Json(ActorsResponse {
        success: true,
        actors,
    }))
}

/// Handler for GET /actors/:id
#[instrument(skip_all, name = "casting.handlers.get_actor")]
pub async fn get_actor(
    State(state): State<Arc<AppState>>,
    Extension(_claims): Extension<ClaimSet>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<ActorsResponse>, ApiError> {
    let id = resource_id("actor", id)?;

    let actor = state
        .repository
        .get_actor(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("actor {id}")))?;

    Ok(Json(ActorsResponse {
        success: true,
        actors: vec![actor],
    }))
}

/// Handler for POST /actors
///
/// # Request Body
///
/// ```json
/// {"name": "Amy Adams", "age": 49, "gender": "female"}
/// ```
///
/// `age` defaults to 35, `gender` may be omitted.
///
/// # Response
///
/// - 200 OK: `{"success": true, "actor": [...]}`
/// - 400 Bad Request: body is not JSON
/// - 422 Unprocessable Entity: missing name or invalid fields
#[instrument(skip_all, name = "casting.handlers.create_actor")]
pub async fn create_actor(
    State(state): State<Arc<AppState>>,
    Extension(_claims): Extension<ClaimSet>,
    payload: Result<Json<ActorPayload>, JsonRejection>,
) -> Result<Json<ActorResponse>, ApiError> {
    let new_actor = json_body(payload)?
        .into_new_actor()
        .map_err(|e| ApiError::Unprocessable(e.to_string()))?;

    let actor = state.repository.create_actor(new_actor).await?;

    info!(target: "casting.handlers.actors", actor_id = actor.id, "Actor created");

    Ok(Json(ActorResponse {
        success: true,
        actor: vec![actor],
    }))
}

/// Handler for PATCH /actors/:id
#[instrument(skip_all, name = "casting.handlers.update_actor")]
pub async fn update_actor(
    State(state): State<Arc<AppState>>,
    Extension(_claims): Extension<ClaimSet>,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<ActorPayload>, JsonRejection>,
) -> Result<Json<ActorResponse>, ApiError> {
    let id = resource_id("actor", id)?;
    let changes = json_body(payload)?
        .into_changes()
        .map_err(|e| ApiError::Unprocessable(e.to_string()))?;

    let actor = state
        .repository
        .update_actor(id, changes)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("actor {id}")))?;

    info!(target: "casting.handlers.actors", actor_id = id, "Actor updated");

    Ok(Json(ActorResponse {
        success: true,
        actor: vec![actor],
    }))
}

/// Handler for DELETE /actors/:id
#[instrument(skip_all, name = "casting.handlers.delete_actor")]
pub async fn delete_actor(
    State(state): State<Arc<AppState>>,
    Extension(_claims): Extension<ClaimSet>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let id = resource_id("actor", id)?;

    if !state.repository.delete_actor(id).await? {
        return Err(ApiError::NotFound(format!("actor {id}")));
    }

    info!(target: "casting.handlers.actors", actor_id = id, "Actor deleted");

    Ok(Json(DeletedResponse {
        success: true,
        deleted: id,
    }))
}
