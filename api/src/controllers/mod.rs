//! HTTP handlers. Each translates request input into one store call and
//! wraps the outcome in the `{success, result}` envelope.
//!
//! Retrieve, random, delete and search behave the same for every
//! [`Document`] kind and are generic; create/update and the word reference
//! operations live in the per-entity modules.

pub mod sentence;
pub mod word;

use crate::config::SearchConfig;
use crate::database::Document;
use crate::error::ApiError;
use crate::models::Envelope;
use crate::search::{build_search_pipeline, Projection, SearchMode, SearchPipeline};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type ApiResult = Result<Json<Envelope<Value>>, ApiError>;

/// Parses a JSON object body. An empty body reads as `{}`.
pub(crate) fn parse_object(body: &Bytes) -> Result<Map<String, Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(ApiError::Validation(
            "Request body must be a JSON object".to_string(),
        )),
        Err(e) => Err(ApiError::Validation(format!("Invalid JSON body: {e}"))),
    }
}

/// Names from `required` absent from `object`; a `null` value counts as absent.
pub(crate) fn missing_fields<'a>(object: &Map<String, Value>, required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|name| object.get(*name).map_or(true, Value::is_null))
        .collect()
}

pub(crate) fn from_object<T: DeserializeOwned>(object: Map<String, Value>) -> Result<T, ApiError> {
    serde_json::from_value(Value::Object(object))
        .map_err(|e| ApiError::Validation(format!("Invalid request body: {e}")))
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Storage(e.into()))
}

pub(crate) fn ok_json<T: Serialize>(value: &T, projection: &Projection) -> ApiResult {
    Ok(Json(Envelope::ok(projection.apply(to_json(value)?))))
}

/// Splits a comma-separated query value; `None` when absent or empty.
pub(crate) fn split_list(raw: Option<&str>) -> Option<Vec<String>> {
    let items: Vec<String> = raw?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    (!items.is_empty()).then_some(items)
}

fn parse_count(name: &str, raw: Option<&str>) -> Result<Option<u64>, ApiError> {
    raw.map(|value| {
        value
            .trim()
            .parse::<u64>()
            .map_err(|_| ApiError::Validation(format!("Invalid {name}: {value}")))
    })
    .transpose()
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FieldsQuery {
    pub fields: Option<String>,
}

impl FieldsQuery {
    pub fn projection(&self) -> Projection {
        split_list(self.fields.as_deref()).map_or_else(Projection::all, Projection::only)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub query: Option<String>,
    pub mode: Option<String>,
    pub search_fields: Option<String>,
    pub fields: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl SearchQuery {
    pub fn pipeline<D: Document>(&self, config: &SearchConfig) -> Result<SearchPipeline, ApiError> {
        let limit = parse_count("limit", self.limit.as_deref())?.unwrap_or(config.default_limit);
        if limit == 0 {
            return Err(ApiError::Validation("limit must be at least 1".to_string()));
        }
        let offset = parse_count("offset", self.offset.as_deref())?.unwrap_or(0);

        let search_fields = split_list(self.search_fields.as_deref())
            .unwrap_or_else(|| D::DEFAULT_SEARCH.iter().map(|s| s.to_string()).collect());
        let projection = FieldsQuery {
            fields: self.fields.clone(),
        }
        .projection();

        Ok(build_search_pipeline(
            self.query.as_deref().unwrap_or(""),
            SearchMode::parse(self.mode.as_deref()),
            &search_fields,
            limit.min(config.max_limit),
            offset,
            projection,
        ))
    }
}

pub async fn retrieve<D: Document>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<FieldsQuery>,
) -> ApiResult {
    let doc = state.store()?.find::<D>(&id)?;
    match doc {
        Some(doc) => ok_json(&doc, &query.projection()),
        None => Err(ApiError::NotFound(Value::Null)),
    }
}

pub async fn random<D: Document>(
    State(state): State<AppState>,
    Query(query): Query<FieldsQuery>,
) -> ApiResult {
    let doc = state.store()?.sample::<D>()?;
    match doc {
        Some(doc) => ok_json(&doc, &query.projection()),
        None => Err(ApiError::not_found(format!(
            "{}s is empty",
            capitalize(D::NAME)
        ))),
    }
}

pub async fn delete<D: Document>(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let removed = state.store()?.delete::<D>(&id)?;
    match removed {
        Some(doc) => {
            tracing::info!(%id, kind = D::NAME, "deleted");
            ok_json(&doc, &Projection::all())
        }
        None => Err(ApiError::not_found(format!("No {} with ID found", D::NAME))),
    }
}

pub async fn search<D: Document>(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult {
    let pipeline = query.pipeline::<D>(&state.search)?;
    let page = state.store()?.search::<D>(&pipeline)?;

    let result = page
        .result
        .iter()
        .map(|doc| to_json(doc).map(|v| pipeline.projection.apply(v)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(Envelope::page(Value::Array(result), page.total)))
}

pub async fn health() -> Json<Envelope<&'static str>> {
    Json(Envelope::ok("ok"))
}
