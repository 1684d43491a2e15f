//! Movie handlers.
//!
//! - `GET /movies` - List movies (`get:movies`)
//! - `POST /movies` - Create a movie (`post:movie`)
//! - `GET /movies/:id` - Fetch one movie (`get:movies`)
//! - `PATCH /movies/:id` - Update a movie (`update:movie`)
//! - `DELETE /movies/:id` - Delete a movie (`delete:movie`)
//!
//! Every route is wrapped by the permission guard, so each handler runs with
//! a verified `ClaimSet` and only after authorization succeeded.

use crate::auth::ClaimSet;
use crate::errors::ApiError;
use crate::handlers::{json_body, resource_id};
use crate::models::{DeletedResponse, Movie, MoviePayload, MoviesResponse};
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

fn movies_response(movies: Vec<Movie>) -> Json<MoviesResponse> {
    Json(MoviesResponse {
        success: true,
        movies,
    })
}

/// Handler for GET /movies
///
/// # Response
///
/// - 200 OK: `{"success": true, "movies": [...]}`
/// - 404 Not Found: no movies stored
#[instrument(skip_all, name = "casting.handlers.list_movies")]
pub async fn list_movies(
    State(state): State<Arc<AppState>>,
    Extension(_claims): Extension<ClaimSet>,
) -> Result<Json<MoviesResponse>, ApiError> {
    let movies = state.repository.list_movies().await?;

    if movies.is_empty() {
        return Err(ApiError::NotFound("movies".to_string()));
    }

    Ok(movies_response(movies))
}

/// Handler for GET /movies/:id
#[instrument(skip_all, name = "casting.handlers.get_movie")]
pub async fn get_movie(
    State(state): State<Arc<AppState>>,
    Extension(_claims): Extension<ClaimSet>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<MoviesResponse>, ApiError> {
    let id = resource_id("movie", id)?;

    let movie = state
        .repository
        .get_movie(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("movie {id}")))?;

    Ok(movies_response(vec![movie]))
}

/// Handler for POST /movies
///
/// # Request Body
///
/// ```json
/// {"title": "Arrival", "release_date": "2016-11-11 00:00:00"}
/// ```
///
/// # Response
///
/// - 200 OK: the created movie in a one-element `movies` list
/// - 400 Bad Request: body is not JSON
/// - 422 Unprocessable Entity: missing or invalid fields
#[instrument(skip_all, name = "casting.handlers.create_movie")]
pub async fn create_movie(
    State(state): State<Arc<AppState>>,
    Extension(_claims): Extension<ClaimSet>,
    payload: Result<Json<MoviePayload>, JsonRejection>,
) -> Result<Json<MoviesResponse>, ApiError> {
    let new_movie = json_body(payload)?
        .into_new_movie()
        .map_err(|e| ApiError::Unprocessable(e.to_string()))?;

    let movie = state.repository.create_movie(new_movie).await?;

    info!(
        target: "casting.handlers.movies",
        movie_id = movie.id,
        "Movie created"
    );

    Ok(movies_response(vec![movie]))
}

/// Handler for PATCH /movies/:id
///
/// Absent fields are left unchanged; an empty object is a no-op that still
/// returns the movie.
#[instrument(skip_all, name = "casting.handlers.update_movie")]
pub async fn update_movie(
    State(state): State<Arc<AppState>>,
    Extension(_claims): Extension<ClaimSet>,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<MoviePayload>, JsonRejection>,
) -> Result<Json<MoviesResponse>, ApiError> {
    let id = resource_id("movie", id)?;
    let changes = json_body(payload)?
        .into_changes()
        .map_err(|e| ApiError::Unprocessable(e.to_string()))?;

    let movie = state
        .repository
        .update_movie(id, changes)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("movie {id}")))?;

    info!(
        target: "casting.handlers.movies",
        movie_id = id,
        "Movie updated"
    );

    Ok(movies_response(vec![movie]))
}

/// Handler for DELETE /movies/:id
///
/// # Response
///
/// - 200 OK: `{"success": true, "deleted": <id>}`
/// - 404 Not Found: no such movie
#[instrument(skip_all, name = "casting.handlers.delete_movie")]
pub async fn delete_movie(
    State(state): State<Arc<AppState>>,
    Extension(_claims): Extension<ClaimSet>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let id = resource_id("movie", id)?;

    if !state.repository.delete_movie(id).await? {
        return Err(ApiError::NotFound(format!("movie {id}")));
    }

    info!(
        target: "casting.handlers.movies",
        movie_id = id,
        "Movie deleted"
    );

    Ok(Json(DeletedResponse {
        success: true,
        deleted: id,
    }))
}
