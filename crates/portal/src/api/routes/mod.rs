pub mod pages;
pub mod registration;

pub use pages::*;
pub use registration::*;

use axum::Json;
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "OK" }))
}
