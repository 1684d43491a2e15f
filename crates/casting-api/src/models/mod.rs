//! Casting API models.
//!
//! Row types for movies and actors, the JSON payloads that create or update
//! them, and the validation that turns a payload into a repository input.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};

/// Maximum length of a movie title or actor name (VARCHAR(255)).
pub const MAX_NAME_LENGTH: usize = 255;

/// Maximum length of an actor's gender (VARCHAR(10)).
pub const MAX_GENDER_LENGTH: usize = 10;

/// Age stored when a new actor omits it.
pub const DEFAULT_ACTOR_AGE: i32 = 35;

/// Wire format of `release_date`.
pub const RELEASE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// Rows
// ============================================================================

/// Movie as stored and returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Movie {
    pub id: i32,
    pub title: String,
    #[serde(serialize_with = "serialize_release_date")]
    pub release_date: NaiveDateTime,
}

/// Actor as stored and returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub id: i32,
    pub name: String,
    pub age: i32,
    pub gender: Option<String>,
}

fn serialize_release_date<S: Serializer>(
    value: &NaiveDateTime,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&value.format(RELEASE_DATE_FORMAT))
}

/// Parse a release date.
///
/// Accepts `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`, RFC 3339 (converted
/// to UTC), or a bare `YYYY-MM-DD` (midnight).
pub fn parse_release_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    NaiveDateTime::parse_from_str(value, RELEASE_DATE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

// ============================================================================
// Repository inputs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMovie {
    pub title: String,
    pub release_date: NaiveDateTime,
}

/// Fields to change on a movie; `None` leaves the column as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovieChanges {
    pub title: Option<String>,
    pub release_date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActor {
    pub name: String,
    pub age: i32,
    pub gender: Option<String>,
}

/// Fields to change on an actor; `None` leaves the column as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorChanges {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
}

// ============================================================================
// Request payloads
// ============================================================================

/// Body of `POST /movies` and `PATCH /movies/:id`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MoviePayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
}

/// Body of `POST /actors` and `PATCH /actors/:id`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActorPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default)]
    pub gender: Option<String>,
}

/// A payload failed validation. The message is for logs, not clients.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

fn validate_name(field: &str, value: String) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError(format!(
            "{field} must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_release_date(value: &str) -> Result<NaiveDateTime, ValidationError> {
    parse_release_date(value)
        .ok_or_else(|| ValidationError(format!("release_date '{value}' is not a valid date")))
}

fn validate_age(age: i32) -> Result<i32, ValidationError> {
    if age < 0 {
        return Err(ValidationError(format!("age must not be negative, got {age}")));
    }
    Ok(age)
}

fn validate_gender(gender: String) -> Result<String, ValidationError> {
    if gender.chars().count() > MAX_GENDER_LENGTH {
        return Err(ValidationError(format!(
            "gender must be at most {MAX_GENDER_LENGTH} characters"
        )));
    }
    Ok(gender)
}

impl MoviePayload {
    /// Validate a create request; `title` and `release_date` are required.
    pub fn into_new_movie(self) -> Result<NewMovie, ValidationError> {
        let (Some(title), Some(release_date)) = (self.title, self.release_date) else {
            return Err(ValidationError(
                "title and release_date are required".to_string(),
            ));
        };

        Ok(NewMovie {
            title: validate_name("title", title)?,
            release_date: validate_release_date(&release_date)?,
        })
    }

    /// Validate an update request; absent fields are left unchanged.
    pub fn into_changes(self) -> Result<MovieChanges, ValidationError> {
        Ok(MovieChanges {
            title: self.title.map(|t| validate_name("title", t)).transpose()?,
            release_date: self
                .release_date
                .as_deref()
                .map(validate_release_date)
                .transpose()?,
        })
    }
}

impl ActorPayload {
    /// Validate a create request; `name` is required, `age` defaults to 35.
    pub fn into_new_actor(self) -> Result<NewActor, ValidationError> {
        let Some(name) = self.name else {
            return Err(ValidationError("name is required".to_string()));
        };

        Ok(NewActor {
            name: validate_name("name", name)?,
            age: validate_age(self.age.unwrap_or(DEFAULT_ACTOR_AGE))?,
            gender: self.gender.map(validate_gender).transpose()?,
        })
    }

    /// Validate an update request; absent fields are left unchanged.
    pub fn into_changes(self) -> Result<ActorChanges, ValidationError> {
        Ok(ActorChanges {
            name: self.name.map(|n| validate_name("name", n)).transpose()?,
            age: self.age.map(validate_age).transpose()?,
            gender: self.gender.map(validate_gender).transpose()?,
        })
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Body of every successful movie read or write.
#[derive(Debug, Clone, Serialize)]
pub struct MoviesResponse {
    pub success: bool,
    pub movies: Vec<Movie>,
}

/// Body of actor reads.
#[derive(Debug, Clone, Serialize)]
pub struct ActorsResponse {
    pub success: bool,
    pub actors: Vec<Actor>,
}

/// Body of actor writes (`POST` and `PATCH`), keyed `actor` but still a list.
#[derive(Debug, Clone, Serialize)]
pub struct ActorResponse {
    pub success: bool,
    pub actor: Vec<Actor>,
}

/// Body of `DELETE /movies/:id` and `DELETE /actors/:id`.
#[derive(Debug, Clone, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
    pub deleted: i32,
}
