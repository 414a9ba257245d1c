//! Serves embedded image/audio assets as raw bytes, with single-range
//! support so audio players can seek.

use crate::database::{Document, StoreError};
use crate::error::ApiError;
use crate::models::Asset;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Image,
    Audio,
}

impl AssetKind {
    fn select<D: Document>(self, doc: &D) -> Option<&Asset> {
        match self {
            AssetKind::Image => doc.image(),
            AssetKind::Audio => doc.audio(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Audio => "audio",
        }
    }
}

/// `GET /api/{kind}/:id/image`
pub async fn image<D: Document>(
    state: State<AppState>,
    id: Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    serve_asset::<D>(&state, &id, &headers, AssetKind::Image)
}

/// `GET /api/{kind}/:id/audio`
pub async fn audio<D: Document>(
    state: State<AppState>,
    id: Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    serve_asset::<D>(&state, &id, &headers, AssetKind::Audio)
}

fn serve_asset<D: Document>(
    state: &AppState,
    id: &str,
    headers: &HeaderMap,
    kind: AssetKind,
) -> Result<Response, ApiError> {
    let doc = state
        .store()?
        .find::<D>(id)?
        .ok_or_else(|| ApiError::not_found(format!("No {} with ID found", D::NAME)))?;
    let asset = kind
        .select(&doc)
        .ok_or_else(|| ApiError::not_found(format!("No {} attached", kind.name())))?;

    let (declared_mime, bytes) = decode_asset(asset)?;
    let mime = declared_mime.unwrap_or_else(|| guess_mime(&asset.filename).to_string());
    let total_len = bytes.len() as u64;

    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .map_or(ByteRange::Full, |value| parse_range(value, total_len));

    let response = match range {
        ByteRange::Full => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, mime),
                (header::ACCEPT_RANGES, "bytes".to_string()),
            ],
            bytes,
        )
            .into_response(),
        ByteRange::Partial { start, end } => {
            let chunk = bytes[start as usize..=end as usize].to_vec();
            (
                StatusCode::PARTIAL_CONTENT,
                [
                    (header::CONTENT_TYPE, mime),
                    (
                        header::CONTENT_RANGE,
                        format!("bytes {start}-{end}/{total_len}"),
                    ),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                ],
                chunk,
            )
                .into_response()
        }
        ByteRange::Unsatisfiable => (
            StatusCode::RANGE_NOT_SATISFIABLE,
            [(header::CONTENT_RANGE, format!("bytes */{total_len}"))],
        )
            .into_response(),
    };
    Ok(response)
}

/// Decodes an asset's base64 payload. A `data:<mime>;base64,` prefix is
/// stripped and its MIME type returned.
pub fn decode_asset(asset: &Asset) -> Result<(Option<String>, Vec<u8>), StoreError> {
    let (mime, payload) = match asset.data.strip_prefix("data:") {
        Some(rest) => match rest.split_once(',') {
            Some((meta, payload)) => {
                let mime = meta.trim_end_matches(";base64");
                ((!mime.is_empty()).then(|| mime.to_string()), payload)
            }
            None => (None, asset.data.as_str()),
        },
        None => (None, asset.data.as_str()),
    };

    let bytes = STANDARD.decode(payload.trim()).map_err(|e| {
        StoreError::InvalidData(format!("asset {} is not valid base64: {e}", asset.filename))
    })?;
    Ok((mime, bytes))
}

/// Simple mime type guessing based on extension
pub fn guess_mime(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "webm" => "audio/webm",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    Full,
    Partial { start: u64, end: u64 },
    Unsatisfiable,
}

/// Parses `bytes=start-end` (either bound optional, suffix form `-n`
/// included) against a body of `total_len` bytes. Headers in other units and
/// multi-range requests are ignored.
pub fn parse_range(value: &str, total_len: u64) -> ByteRange {
    let Some(ranges) = value.trim().strip_prefix("bytes=") else {
        return ByteRange::Full;
    };
    if ranges.contains(',') {
        return ByteRange::Full;
    }
    let Some((start, end)) = ranges.split_once('-') else {
        return ByteRange::Unsatisfiable;
    };
    if total_len == 0 {
        return ByteRange::Unsatisfiable;
    }
    let last = total_len - 1;

    let (start, end) = match (start.trim(), end.trim()) {
        ("", "") => return ByteRange::Unsatisfiable,
        ("", suffix) => match suffix.parse::<u64>() {
            Ok(0) | Err(_) => return ByteRange::Unsatisfiable,
            Ok(n) => (total_len.saturating_sub(n), last),
        },
        (start, "") => match start.parse::<u64>() {
            Ok(s) => (s, last),
            Err(_) => return ByteRange::Unsatisfiable,
        },
        (start, end) => match (start.parse::<u64>(), end.parse::<u64>()) {
            (Ok(s), Ok(e)) => (s, e.min(last)),
            _ => return ByteRange::Unsatisfiable,
        },
    };

    if start <= end && start < total_len {
        ByteRange::Partial { start, end }
    } else {
        ByteRange::Unsatisfiable
    }
}
