//! Postgres-backed catalog repository.
//!
//! # Security
//!
//! - All queries use parameterized statements (SQL injection safe)
//! - Database error details are logged server-side, never returned

use crate::errors::ApiError;
use crate::models::{Actor, ActorChanges, Movie, MovieChanges, NewActor, NewMovie};
use crate::observability::metrics::record_db_query;
use crate::repositories::catalog::CatalogRepository;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::time::Instant;
use tracing::instrument;

/// Catalog repository over a Postgres pool.
#[derive(Clone)]
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Record the query outcome and convert the error.
fn observe<T>(
    operation: &'static str,
    start: Instant,
    result: Result<T, sqlx::Error>,
) -> Result<T, ApiError> {
    match result {
        Ok(value) => {
            record_db_query(operation, "success", start.elapsed());
            Ok(value)
        }
        Err(e) => {
            record_db_query(operation, "error", start.elapsed());
            Err(ApiError::from(e))
        }
    }
}

fn map_row_to_movie(row: &PgRow) -> Result<Movie, sqlx::Error> {
    Ok(Movie {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        release_date: row.try_get("release_date")?,
    })
}

fn map_row_to_actor(row: &PgRow) -> Result<Actor, sqlx::Error> {
    Ok(Actor {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        age: row.try_get("age")?,
        gender: row.try_get("gender")?,
    })
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    #[instrument(skip_all, name = "casting.repo.list_movies")]
    async fn list_movies(&self) -> Result<Vec<Movie>, ApiError> {
        let start = Instant::now();
        let result = sqlx::query("SELECT id, title, release_date FROM movies ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .and_then(|rows| rows.iter().map(map_row_to_movie).collect());
        observe("list_movies", start, result)
    }

    #[instrument(skip_all, name = "casting.repo.get_movie", fields(movie_id = id))]
    async fn get_movie(&self, id: i32) -> Result<Option<Movie>, ApiError> {
        let start = Instant::now();
        let result = sqlx::query("SELECT id, title, release_date FROM movies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .and_then(|row| row.as_ref().map(map_row_to_movie).transpose());
        observe("get_movie", start, result)
    }

    #[instrument(skip_all, name = "casting.repo.insert_movie")]
    async fn create_movie(&self, movie: NewMovie) -> Result<Movie, ApiError> {
        let start = Instant::now();
        let result = sqlx::query(
            r#"
            INSERT INTO movies (title, release_date)
            VALUES ($1, $2)
            RETURNING id, title, release_date
            "#,
        )
        .bind(&movie.title) // $1
        .bind(movie.release_date) // $2
        .fetch_one(&self.pool)
        .await
        .and_then(|row| map_row_to_movie(&row));
        observe("insert_movie", start, result)
    }

    #[instrument(skip_all, name = "casting.repo.update_movie", fields(movie_id = id))]
    async fn update_movie(
        &self,
        id: i32,
        changes: MovieChanges,
    ) -> Result<Option<Movie>, ApiError> {
        let start = Instant::now();
        let result = sqlx::query(
            r#"
            UPDATE movies
            SET title = COALESCE($2, title),
                release_date = COALESCE($3, release_date)
            WHERE id = $1
            RETURNING id, title, release_date
            "#,
        )
        .bind(id) // $1
        .bind(changes.title) // $2
        .bind(changes.release_date) // $3
        .fetch_optional(&self.pool)
        .await
        .and_then(|row| row.as_ref().map(map_row_to_movie).transpose());
        observe("update_movie", start, result)
    }

    #[instrument(skip_all, name = "casting.repo.delete_movie", fields(movie_id = id))]
    async fn delete_movie(&self, id: i32) -> Result<bool, ApiError> {
        let start = Instant::now();
        let result = sqlx::query("DELETE FROM movies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|done| done.rows_affected() > 0);
        observe("delete_movie", start, result)
    }

    #[instrument(skip_all, name = "casting.repo.list_actors")]
    async fn list_actors(&self) -> Result<Vec<Actor>, ApiError> {
        let start = Instant::now();
        let result = sqlx::query("SELECT id, name, age, gender FROM actors ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .and_then(|rows| rows.iter().map(map_row_to_actor).collect());
        observe("list_actors", start, result)
    }

    #[instrument(skip_all, name = "casting.repo.get_actor", fields(actor_id = id))]
    async fn get_actor(&self, id: i32) -> Result<Option<Actor>, ApiError> {
        let start = Instant::now();
        let result = sqlx::query("SELECT id, name, age, gender FROM actors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .and_then(|row| row.as_ref().map(map_row_to_actor).transpose());
        observe("get_actor", start, result)
    }

    #[instrument(skip_all, name = "casting.repo.insert_actor")]
    async fn create_actor(&self, actor: NewActor) -> Result<Actor, ApiError> {
        let start = Instant::now();
        let result = sqlx::query(
            r#"
            INSERT INTO actors (name, age, gender)
            VALUES ($1, $2, $3)
            RETURNING id, name, age, gender
            "#,
        )
        .bind(&actor.name) // $1
        .bind(actor.age) // $2
        .bind(&actor.gender) // $3
        .fetch_one(&self.pool)
        .await
        .and_then(|row| map_row_to_actor(&row));
        observe("insert_actor", start, result)
    }

    #[instrument(skip_all, name = "casting.repo.update_actor", fields(actor_id = id))]
    async fn update_actor(
        &self,
        id: i32,
        changes: ActorChanges,
    ) -> Result<Option<Actor>, ApiError> {
        let start = Instant::now();
        let result = sqlx::query(
            r#"
            UPDATE actors
            SET name = COALESCE($2, name),
                age = COALESCE($3, age),
                gender = COALESCE($4, gender)
            WHERE id = $1
            RETURNING id, name, age, gender
            "#,
        )
        .bind(id) // $1
        .bind(changes.name) // $2
        .bind(changes.age) // $3
        .bind(changes.gender) // $4
        .fetch_optional(&self.pool)
        .await
        .and_then(|row| row.as_ref().map(map_row_to_actor).transpose());
        observe("update_actor", start, result)
    }

    #[instrument(skip_all, name = "casting.repo.delete_actor", fields(actor_id = id))]
    async fn delete_actor(&self, id: i32) -> Result<bool, ApiError> {
        let start = Instant::now();
        let result = sqlx::query("DELETE FROM actors WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|done| done.rows_affected() > 0);
        observe("delete_actor", start, result)
    }
}
