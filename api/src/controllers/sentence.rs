use super::{from_object, missing_fields, ok_json, parse_object, ApiResult};
use crate::error::ApiError;
use crate::models::{NewSentence, SentenceUpdate};
use crate::search::Projection;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};

const REQUIRED_FIELDS: [&str; 2] = ["english", "paiute"];

/// `POST /api/sentence`
pub async fn create(State(state): State<AppState>, body: Bytes) -> ApiResult {
    let object = parse_object(&body)?;
    let missing = missing_fields(&object, &REQUIRED_FIELDS);
    if !missing.is_empty() {
        return Err(ApiError::missing_params(&missing));
    }

    let new: NewSentence = from_object(object)?;
    let sentence = state.store()?.create_sentence(&new)?;
    tracing::info!(id = %sentence.id, "sentence created");
    ok_json(&sentence, &Projection::all())
}

/// `PUT /api/sentence/:id`. Fields outside english/paiute/image/audio are ignored.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let update: SentenceUpdate = from_object(parse_object(&body)?)?;
    let sentence = state
        .store()?
        .update_sentence(&id, &update)?
        .ok_or_else(|| ApiError::NoSuchRecord("No such sentence exists".to_string()))?;
    ok_json(&sentence, &Projection::all())
}
