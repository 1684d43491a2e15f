//! Catalog repository trait and its in-memory implementation.

use crate::errors::ApiError;
use crate::models::{Actor, ActorChanges, Movie, MovieChanges, NewActor, NewMovie};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Persistence for movies and actors.
///
/// Lookups return `Ok(None)` / `Ok(false)` for unknown ids; `Err` is reserved
/// for storage failures.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// All movies ordered by id.
    async fn list_movies(&self) -> Result<Vec<Movie>, ApiError>;

    async fn get_movie(&self, id: i32) -> Result<Option<Movie>, ApiError>;

    async fn create_movie(&self, movie: NewMovie) -> Result<Movie, ApiError>;

    async fn update_movie(
        &self,
        id: i32,
        changes: MovieChanges,
    ) -> Result<Option<Movie>, ApiError>;

    /// Returns whether a movie was deleted.
    async fn delete_movie(&self, id: i32) -> Result<bool, ApiError>;

    /// All actors ordered by id.
    async fn list_actors(&self) -> Result<Vec<Actor>, ApiError>;

    async fn get_actor(&self, id: i32) -> Result<Option<Actor>, ApiError>;

    async fn create_actor(&self, actor: NewActor) -> Result<Actor, ApiError>;

    async fn update_actor(
        &self,
        id: i32,
        changes: ActorChanges,
    ) -> Result<Option<Actor>, ApiError>;

    /// Returns whether an actor was deleted.
    async fn delete_actor(&self, id: i32) -> Result<bool, ApiError>;
}

#[derive(Default)]
struct CatalogData {
    movies: BTreeMap<i32, Movie>,
    actors: BTreeMap<i32, Actor>,
    next_movie_id: i32,
    next_actor_id: i32,
}

/// In-memory catalog with SERIAL-like ids starting at 1.
#[derive(Default)]
pub struct InMemoryCatalogRepository {
    data: RwLock<CatalogData>,
    failing: AtomicBool,
}

impl InMemoryCatalogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repository whose every call fails like an unreachable database.
    pub fn failing() -> Self {
        let repo = Self::default();
        repo.set_failing(true);
        repo
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), ApiError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ApiError::Database(
                "in-memory catalog is marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

fn next_id(counter: &mut i32) -> Result<i32, ApiError> {
    *counter = counter
        .checked_add(1)
        .ok_or_else(|| ApiError::Database("id sequence exhausted".to_string()))?;
    Ok(*counter)
}

#[async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn list_movies(&self) -> Result<Vec<Movie>, ApiError> {
        self.check_available()?;
        Ok(self.data.read().await.movies.values().cloned().collect())
    }

    async fn get_movie(&self, id: i32) -> Result<Option<Movie>, ApiError> {
        self.check_available()?;
        Ok(self.data.read().await.movies.get(&id).cloned())
    }

    async fn create_movie(&self, movie: NewMovie) -> Result<Movie, ApiError> {
        self.check_available()?;
        let mut data = self.data.write().await;
        let id = next_id(&mut data.next_movie_id)?;
        let movie = Movie {
            id,
            title: movie.title,
            release_date: movie.release_date,
        };
        data.movies.insert(id, movie.clone());
        Ok(movie)
    }

    async fn update_movie(
        &self,
        id: i32,
        changes: MovieChanges,
    ) -> Result<Option<Movie>, ApiError> {
        self.check_available()?;
        let mut data = self.data.write().await;
        let Some(movie) = data.movies.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            movie.title = title;
        }
        if let Some(release_date) = changes.release_date {
            movie.release_date = release_date;
        }
        Ok(Some(movie.clone()))
    }

    async fn delete_movie(&self, id: i32) -> Result<bool, ApiError> {
        self.check_available()?;
        Ok(self.data.write().await.movies.remove(&id).is_some())
    }

    async fn list_actors(&self) -> Result<Vec<Actor>, ApiError> {
        self.check_available()?;
        Ok(self.data.read().await.actors.values().cloned().collect())
    }

    async fn get_actor(&self, id: i32) -> Result<Option<Actor>, ApiError> {
        self.check_available()?;
        Ok(self.data.read().await.actors.get(&id).cloned())
    }

    async fn create_actor(&self, actor: NewActor) -> Result<Actor, ApiError> {
        self.check_available()?;
        let mut data = self.data.write().await;
        let id = next_id(&mut data.next_actor_id)?;
        let actor = Actor {
            id,
            name: actor.name,
            age: actor.age,
            gender: actor.gender,
        };
        data.actors.insert(id, actor.clone());
        Ok(actor)
    }

    async fn update_actor(
        &self,
        id: i32,
        changes: ActorChanges,
    ) -> Result<Option<Actor>, ApiError> {
        self.check_available()?;
        let mut data = self.data.write().await;
        let Some(actor) = data.actors.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            actor.name = name;
        }
        if let Some(age) = changes.age {
            actor.age = age;
        }
        if let Some(gender) = changes.gender {
            actor.gender = Some(gender);
        }
        Ok(Some(actor.clone()))
    }

    async fn delete_actor(&self, id: i32) -> Result<bool, ApiError> {
        self.check_available()?;
        Ok(self.data.write().await.actors.remove(&id).is_some())
    }
}
