use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};

use failure::Fail;

use serde_derive::{Deserialize, Serialize};

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use tokio_util::io::ReaderStream;

use crate::pipeline::{Pipeline, PipelineError};

const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Fail)]
pub enum ServerError {
  #[fail(display = "Failed to bind {}: {}", address, cause)]
  Bind { address: String, cause: String },

  #[fail(display = "Server stopped: {}", cause)]
  Serve { cause: String },
}

#[derive(Clone)]
pub struct AppState {
  pipeline: Arc<Pipeline>,
  static_dir: Arc<PathBuf>,
}

impl AppState {
  pub fn new(pipeline: Pipeline, static_dir: PathBuf) -> AppState {
    AppState {
      pipeline: Arc::new(pipeline),
      static_dir: Arc::new(static_dir),
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct CombineRequest {
  #[serde(default)]
  pub instruments: Vec<String>,

  #[serde(default, alias = "htdemucs_output")]
  pub stem_output_id: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
  error: String,

  #[serde(skip_serializing_if = "Option::is_none")]
  details: Option<String>,
}

/// An error as the client sees it.
#[derive(Debug)]
pub struct ApiError {
  status: StatusCode,
  error: String,
  details: Option<String>,
}

impl ApiError {
  pub fn new<T: Into<String>>(status: StatusCode, error: T) -> ApiError {
    ApiError {
      status,
      error: error.into(),
      details: None,
    }
  }

  pub fn status(&self) -> StatusCode {
    self.status
  }
}

impl From<PipelineError> for ApiError {
  fn from(err: PipelineError) -> Self {
    let status = match err {
      PipelineError::NothingSelected | PipelineError::InvalidPath { .. } => StatusCode::BAD_REQUEST,
      PipelineError::MissingSource { .. } | PipelineError::NotFound { .. } => StatusCode::NOT_FOUND,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
      warn!("{}", err);
    } else {
      info!("{}", err);
    }

    ApiError {
      status,
      error: err.to_string(),
      details: err.details().map(str::to_string),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let body = ErrorBody {
      error: self.error,
      details: self.details,
    };
    (self.status, Json(body)).into_response()
  }
}

pub type ApiResult = Result<Response, ApiError>;

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
  Router::new()
    .route("/", get(index))
    .route("/style.css", get(style))
    .route("/script.js", get(script))
    .route("/convert", post(convert))
    .route("/download_combined", post(download_combined))
    .route("/download_combined_midi", post(download_combined_midi))
    .route("/download/*path", get(download))
    .layer(DefaultBodyLimit::max(max_upload_bytes))
    .with_state(state)
}

pub async fn serve(address: &str, router: Router) -> Result<(), ServerError> {
  let listener = tokio::net::TcpListener::bind(address)
    .await
    .map_err(|err| ServerError::Bind {
      address: address.to_string(),
      cause: err.to_string(),
    })?;

  info!("Listening on http://{} ...", address);

  axum::serve(listener, router)
    .await
    .map_err(|err| ServerError::Serve {
      cause: err.to_string(),
    })
}

async fn index(State(state): State<AppState>) -> ApiResult {
  static_asset(&state, "index.html").await
}

async fn style(State(state): State<AppState>) -> ApiResult {
  static_asset(&state, "style.css").await
}

async fn script(State(state): State<AppState>) -> ApiResult {
  static_asset(&state, "script.js").await
}

async fn convert(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult {
  let (file_name, data) = read_upload(&mut multipart).await?;
  info!("Received {} ({} bytes) for conversion", file_name, data.len());

  let pipeline = state.pipeline.clone();
  let report = run_blocking(move || pipeline.convert(&file_name, &data)).await?;

  Ok(Json(report).into_response())
}

async fn download_combined(
  State(state): State<AppState>,
  Json(request): Json<CombineRequest>,
) -> ApiResult {
  info!(
    "Combining audio of {:?} from {}",
    request.instruments, request.stem_output_id
  );

  let pipeline = state.pipeline.clone();
  let data = run_blocking(move || {
    pipeline.combine_audio(&request.stem_output_id, &request.instruments)
  })
  .await?;

  Ok(attachment("combined.mp3", "audio/mpeg", data))
}

async fn download_combined_midi(
  State(state): State<AppState>,
  Json(request): Json<CombineRequest>,
) -> ApiResult {
  info!(
    "Combining notes of {:?} from {}",
    request.instruments, request.stem_output_id
  );

  let pipeline = state.pipeline.clone();
  let data = run_blocking(move || {
    pipeline.combine_notes(&request.stem_output_id, &request.instruments)
  })
  .await?;

  Ok(attachment("combined.midi", "audio/midi", data))
}

async fn download(State(state): State<AppState>, Path(path): Path<String>) -> ApiResult {
  let file_path = state.pipeline.resolve_download(&path)?;
  let file = tokio::fs::File::open(&file_path).await.map_err(|err| {
    warn!("Failed to open {:?}: {}", file_path, err);
    ApiError::new(StatusCode::NOT_FOUND, "File not found")
  })?;

  let file_name = file_path
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_default();

  let body = Body::from_stream(ReaderStream::new(file));
  Ok(attachment(&file_name, content_type(&file_path), body))
}

async fn read_upload(multipart: &mut Multipart) -> Result<(String, Vec<u8>), ApiError> {
  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|err| ApiError::new(StatusCode::BAD_REQUEST, err.to_string()))?
  {
    if field.name() != Some(UPLOAD_FIELD) {
      debug!("Ignoring multipart field {:?}", field.name());
      continue;
    }

    let file_name = field.file_name().unwrap_or_default().to_string();
    if file_name.is_empty() {
      return Err(ApiError::new(StatusCode::BAD_REQUEST, "No selected file"));
    }

    let data = field
      .bytes()
      .await
      .map_err(|err| ApiError::new(StatusCode::BAD_REQUEST, err.to_string()))?;

    return Ok((file_name, data.to_vec()));
  }

  Err(ApiError::new(StatusCode::BAD_REQUEST, "No file part"))
}

async fn run_blocking<F, T>(task: F) -> Result<T, ApiError>
where
  F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
  T: Send + 'static,
{
  tokio::task::spawn_blocking(task)
    .await
    .map_err(|err| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
    .map_err(ApiError::from)
}

async fn static_asset(state: &AppState, file_name: &str) -> ApiResult {
  let path = state.static_dir.join(file_name);
  let data = read_file(&path).await?;
  Ok(([(header::CONTENT_TYPE, content_type(&path))], data).into_response())
}

async fn read_file(path: &FsPath) -> Result<Vec<u8>, ApiError> {
  tokio::fs::read(path).await.map_err(|err| {
    warn!("Failed to read {:?}: {}", path, err);
    ApiError::new(StatusCode::NOT_FOUND, "File not found")
  })
}

fn attachment<B>(file_name: &str, content_type: &'static str, body: B) -> Response
where
  B: IntoResponse,
{
  let disposition = format!("attachment; filename=\"{}\"", file_name.replace('"', ""));
  (
    [
      (header::CONTENT_TYPE, content_type.to_string()),
      (header::CONTENT_DISPOSITION, disposition),
    ],
    body,
  )
    .into_response()
}

fn content_type(path: &FsPath) -> &'static str {
  let extension = path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(str::to_ascii_lowercase)
    .unwrap_or_default();

  match extension.as_str() {
    "mp3" => "audio/mpeg",
    "wav" => "audio/wav",
    "mid" | "midi" => "audio/midi",
    "html" => "text/html; charset=utf-8",
    "css" => "text/css",
    "js" => "application/javascript",
    _ => "application/octet-stream",
  }
}
