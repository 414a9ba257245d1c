use super::{from_object, missing_fields, ok_json, parse_object, split_list, ApiResult};
use crate::error::ApiError;
use crate::models::{NewWord, ReferenceList, Word, WordUpdate};
use crate::search::Projection;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::Value;

const REQUIRED_FIELDS: [&str; 2] = ["text", "part_of_speech"];

#[derive(Debug, Default, Deserialize)]
pub struct WordQuery {
    pub fields: Option<String>,
    #[serde(default)]
    pub populate: bool,
}

/// `POST /api/word`. Reference lists in the body are ignored; they are built
/// through the reference endpoints.
pub async fn create(State(state): State<AppState>, body: Bytes) -> ApiResult {
    let object = parse_object(&body)?;
    let missing = missing_fields(&object, &REQUIRED_FIELDS);
    if !missing.is_empty() {
        return Err(ApiError::missing_params(&missing));
    }

    let new: NewWord = from_object(object)?;
    let word = state.store()?.create_word(&new)?;
    tracing::info!(id = %word.id, text = %word.text, "word created");
    ok_json(&word, &Projection::all())
}

/// `PUT /api/word/:id`
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let update: WordUpdate = from_object(parse_object(&body)?)?;
    let word = state
        .store()?
        .update_word(&id, &update)?
        .ok_or_else(|| ApiError::NoSuchRecord("No such word exists".to_string()))?;
    ok_json(&word, &Projection::all())
}

/// `GET /api/word/:id?fields=&populate=true`
pub async fn retrieve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<WordQuery>,
) -> ApiResult {
    let projection =
        split_list(query.fields.as_deref()).map_or_else(Projection::all, Projection::only);

    let store = state.store()?;
    let Some(word) = store.find::<Word>(&id)? else {
        return Err(ApiError::NotFound(Value::Null));
    };
    if query.populate {
        let populated = store.populate(word)?;
        ok_json(&populated, &projection)
    } else {
        ok_json(&word, &projection)
    }
}

/// `POST /api/word/:id/related` with `{"word": <id>}`
pub async fn add_related(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let target = reference_target(&body, "word")?;
    add_reference(&state, &id, ReferenceList::Words, &target)
}

/// `POST /api/word/:id/sentence` with `{"sentence": <id>}`
pub async fn attach_sentence(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let target = reference_target(&body, "sentence")?;
    add_reference(&state, &id, ReferenceList::Sentences, &target)
}

/// `DELETE /api/word/:id/related/:related_id`
pub async fn remove_related(
    State(state): State<AppState>,
    Path((id, related_id)): Path<(String, String)>,
) -> ApiResult {
    remove_reference(&state, &id, ReferenceList::Words, &related_id)
}

/// `DELETE /api/word/:id/sentence/:sentence_id`
pub async fn detach_sentence(
    State(state): State<AppState>,
    Path((id, sentence_id)): Path<(String, String)>,
) -> ApiResult {
    remove_reference(&state, &id, ReferenceList::Sentences, &sentence_id)
}

fn reference_target(body: &Bytes, key: &str) -> Result<String, ApiError> {
    let object = parse_object(body)?;
    if !missing_fields(&object, &[key]).is_empty() {
        return Err(ApiError::missing_params(&[key]));
    }
    match object.get(key) {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        _ => Err(ApiError::Validation(format!("'{key}' must be a non-empty id"))),
    }
}

fn add_reference(state: &AppState, id: &str, list: ReferenceList, target: &str) -> ApiResult {
    let word = state
        .store()?
        .add_reference(id, list, target)?
        .ok_or_else(|| ApiError::not_found("No word with ID found"))?;
    ok_json(&word, &Projection::all())
}

fn remove_reference(state: &AppState, id: &str, list: ReferenceList, target: &str) -> ApiResult {
    let word = state
        .store()?
        .remove_reference(id, list, target)?
        .ok_or_else(|| ApiError::not_found("No word with ID found"))?;
    ok_json(&word, &Projection::all())
}
