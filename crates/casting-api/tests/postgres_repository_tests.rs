//! Postgres catalog repository tests.
//!
//! Run against a real database with `DATABASE_URL` set:
//!
//! ```text
//! cargo test -p casting-api --test postgres_repository_tests -- --ignored
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use casting_api::models::{ActorChanges, MovieChanges, NewActor, NewMovie, DEFAULT_ACTOR_AGE};
use casting_api::repositories::{CatalogRepository, PgCatalogRepository};
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::PgPool;

fn datetime(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(20, 15, 0))
        .unwrap()
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_movie_crud(pool: PgPool) {
    let repo = PgCatalogRepository::new(pool);

    assert!(repo.list_movies().await.unwrap().is_empty());

    let created = repo
        .create_movie(NewMovie {
            title: "Arrival".to_string(),
            release_date: datetime(2016, 11, 11),
        })
        .await
        .unwrap();
    assert!(created.id > 0);
    assert_eq!(repo.get_movie(created.id).await.unwrap(), Some(created.clone()));

    let updated = repo
        .update_movie(
            created.id,
            MovieChanges {
                title: Some("Sicario".to_string()),
                release_date: None,
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.title, "Sicario");
    assert_eq!(updated.release_date, created.release_date);

    assert!(repo.update_movie(created.id + 1000, MovieChanges::default()).await.unwrap().is_none());

    assert!(repo.delete_movie(created.id).await.unwrap());
    assert!(!repo.delete_movie(created.id).await.unwrap());
    assert!(repo.get_movie(created.id).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_movies_listed_in_id_order(pool: PgPool) {
    let repo = PgCatalogRepository::new(pool);

    for title in ["Enemy", "Prisoners", "Incendies"] {
        repo.create_movie(NewMovie {
            title: title.to_string(),
            release_date: datetime(2013, 9, 20),
        })
        .await
        .unwrap();
    }

    let titles: Vec<String> = repo
        .list_movies()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.title)
        .collect();
    assert_eq!(titles, ["Enemy", "Prisoners", "Incendies"]);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_actor_crud(pool: PgPool) {
    let repo = PgCatalogRepository::new(pool);

    let created = repo
        .create_actor(NewActor {
            name: "Amy Adams".to_string(),
            age: DEFAULT_ACTOR_AGE,
            gender: None,
        })
        .await
        .unwrap();
    assert_eq!(created.age, 35);
    assert!(created.gender.is_none());

    let updated = repo
        .update_actor(
            created.id,
            ActorChanges {
                name: None,
                age: Some(49),
                gender: Some("female".to_string()),
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.name, "Amy Adams");
    assert_eq!(updated.age, 49);

    // The update was committed
    let fetched = repo.get_actor(created.id).await.unwrap().unwrap();
    assert_eq!(fetched, updated);
    assert_eq!(repo.list_actors().await.unwrap(), vec![updated]);

    assert!(repo.delete_actor(created.id).await.unwrap());
    assert!(repo.list_actors().await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_schema_defaults_actor_age(pool: PgPool) {
    sqlx::query("INSERT INTO actors (name) VALUES ('Jeremy Renner')")
        .execute(&pool)
        .await
        .unwrap();

    let repo = PgCatalogRepository::new(pool);
    let actors = repo.list_actors().await.unwrap();
    assert_eq!(actors.len(), 1);
    assert_eq!(actors[0].age, DEFAULT_ACTOR_AGE);
}
