use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::StreamExt;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use tokio_util::io::ReaderStream;

use super::error::{ApiError, INVALID_REQUEST};
use super::AppState;
use crate::acquisition::{MediaFormat, MediaInfo};
use crate::utils::{build_content_disposition, content_type_for_path, format_file_size};

/// Body of `POST /download`. Both fields are optional on the wire.
#[derive(Debug, Default, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: Option<String>,
    /// Outer `None` when the key is absent, inner `None` for an explicit `null`
    #[serde(default, deserialize_with = "present")]
    pub format: Option<Option<String>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl DownloadRequest {
    /// Anything that is not a JSON object of the right shape is an empty request
    pub fn parse(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    pub fn validate(self) -> Result<(String, MediaFormat), ApiError> {
        let url = self
            .url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ApiError::bad_request(INVALID_REQUEST))?;

        let format = match self.format {
            None => MediaFormat::default(),
            Some(value) => value
                .as_deref()
                .unwrap_or_default()
                .parse::<MediaFormat>()
                .map_err(|_| ApiError::bad_request(INVALID_REQUEST))?,
        };

        Ok((url, format))
    }
}

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    pub url: Option<String>,
}

impl UrlQuery {
    fn require(self) -> Result<String, ApiError> {
        self.url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ApiError::bad_request(INVALID_REQUEST))
    }
}

/// GET / - endpoint index
pub async fn index() -> impl IntoResponse {
    Json(json!({
        "message": "media-fetch API",
        "endpoints": {
            "POST /download": "Fetch a URL as mp4 or mp3 and stream the file back",
            "GET /info": "Media metadata for ?url=",
            "GET /formats": "Muxed formats available for ?url=",
        }
    }))
}

/// POST /download - fetch, stream, then delete the staged file
pub async fn download(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let (url, format) = DownloadRequest::parse(&body).validate()?;

    let staged = {
        let _permit = state
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ApiError::internal("acquisition capacity unavailable"))?;

        state.acquirer.acquire(&url, format).await.map_err(|err| {
            tracing::warn!(error = %err, %format, "Acquisition failed");
            ApiError::from(err)
        })?
    };

    let file = tokio::fs::File::open(staged.path())
        .await
        .map_err(|e| ApiError::internal(format!("Failed to open staged file: {}", e)))?;
    let length = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to read staged file: {}", e)))?
        .len();

    let filename = staged.file_name();
    let disposition = HeaderValue::from_str(&build_content_disposition(&filename))
        .map_err(|_| ApiError::internal("Failed to build download header"))?;
    let content_type = content_type_for_path(staged.path());

    tracing::info!(file = %filename, size = %format_file_size(length), "Streaming staged file");

    // The guard rides along with the body and deletes the file once the stream is dropped
    let stream = ReaderStream::new(file).map(move |chunk| {
        let _staged = &staged;
        chunk
    });

    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
        (header::CONTENT_LENGTH, HeaderValue::from(length)),
        (header::CONTENT_DISPOSITION, disposition),
    ];

    Ok((StatusCode::OK, headers, Body::from_stream(stream)).into_response())
}

/// GET /info?url= - metadata without downloading
pub async fn info(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<MediaInfo>, ApiError> {
    let url = query.require()?;

    let info = state.acquirer.probe(&url).await.map_err(|err| {
        tracing::warn!(error = %err, "Media info lookup failed");
        ApiError::from(err)
    })?;

    Ok(Json(info))
}

/// GET /formats?url= - muxed renditions only, nothing is negotiated from this list
pub async fn formats(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<Value>, ApiError> {
    let url = query.require()?;

    let info = state.acquirer.probe(&url).await.map_err(|err| {
        tracing::warn!(error = %err, "Format listing failed");
        ApiError::from(err)
    })?;

    Ok(Json(json!({ "formats": info.formats })))
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("endpoint not found")
}
