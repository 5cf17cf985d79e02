pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the conversion route tree.
///
/// ```text
/// /artists                 list artist models (GET)
/// /convert                 submit an upload for conversion (POST, multipart)
/// /result/{job_id}         poll status or download the result (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/artists", get(handlers::artists::list_artists))
        .route("/convert", post(handlers::convert::post_convert))
        .route("/result/{job_id}", get(handlers::result::get_result))
}
