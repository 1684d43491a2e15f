//! Public greeting and liveness endpoints.

use crate::routes::AppState;
use axum::extract::State;
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /
///
/// Returns `Hello`, or `Hello!!!!!` when `EXCITED` is set.
#[instrument(skip_all, name = "casting.handlers.greeting")]
pub async fn greeting(State(state): State<Arc<AppState>>) -> &'static str {
    greeting_text(state.config.excited)
}

fn greeting_text(excited: bool) -> &'static str {
    if excited {
        "Hello!!!!!"
    } else {
        "Hello"
    }
}

/// Handler for GET /health
///
/// Liveness only; does not touch the database or the key set.
pub async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_text() {
        assert_eq!(greeting_text(false), "Hello");
        assert_eq!(greeting_text(true), "Hello!!!!!");
    }

    #[tokio::test]
    async fn test_health_check() {
        assert_eq!(health_check().await, "OK");
    }
}
