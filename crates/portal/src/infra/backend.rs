//! HTTP client for the remote event backend
//!
//! The backend owns competitions and registrations; the portal is only a
//! client. The trait seam exists so the workflow and the cached readers can
//! be exercised against a fake backend in tests.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use log::debug;
use portal_core::{Attachment, Competition};
use reqwest_middleware::{
    reqwest::{
        multipart::{Form, Part},
        Body, StatusCode,
    },
    ClientWithMiddleware,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors from the read endpoints.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("problem sending request to backend: {0}")]
    Send(#[from] reqwest_middleware::Error),

    #[error("problem reading backend response: {0}")]
    Http(#[from] reqwest_middleware::reqwest::Error),

    #[error("backend returned {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("problem requesting backend: {0}")]
    Request(String),
}

/// Errors from the registration write, classified the way they are shown to
/// the user.
#[derive(Error, Debug)]
pub enum SubmitError {
    /// The backend responded and rejected the registration; the message is
    /// the backend's own.
    #[error("{0}")]
    Rejected(String),

    /// The request never got an answer.
    #[error("no response from server, please check your connection")]
    NoResponse,

    /// Anything that went wrong on our side of the wire.
    #[error("failed to submit registration: {0}")]
    Client(String),
}

/// Fractional upload progress, 0.0 ..= 1.0.
pub type ProgressObserver = Arc<dyn Fn(f64) + Send + Sync>;

/// One file slot in the multipart payload.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub attachment: Attachment,
}

/// The registration write payload: scalar fields plus one file per document
/// slot per person. Built by [`crate::infra::registrations`].
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

/// Server acknowledgement of a stored registration.
#[derive(Debug, Clone)]
pub struct SubmitAck {
    /// Token consumed by the payment widget.
    pub snap_token: String,
    /// Everything else the backend echoed back.
    pub echo: Value,
}

/// A previously stored registration, as listed by the backend. Fields are
/// lenient: the endpoint predates this portal and its shape drifts.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegistrationRecord {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub competition_id: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

#[async_trait::async_trait]
pub trait EventBackend: Send + Sync {
    async fn fetch_competitions(&self) -> Result<Vec<Competition>, ApiError>;
    async fn fetch_registrations(&self) -> Result<Vec<RegistrationRecord>, ApiError>;
    async fn submit_registration(
        &self,
        request: SubmitRequest,
        progress: Option<ProgressObserver>,
    ) -> Result<SubmitAck, SubmitError>;
}

#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    client: ClientWithMiddleware,
    fetch_timeout: Duration,
    submit_timeout: Duration,
}

impl BackendClient {
    pub fn new(
        client: ClientWithMiddleware,
        base_url: &str,
        fetch_timeout: Duration,
        submit_timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            fetch_timeout,
            submit_timeout,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait::async_trait]
impl EventBackend for BackendClient {
    async fn fetch_competitions(&self) -> Result<Vec<Competition>, ApiError> {
        let response = self
            .client
            .get(self.endpoint("competitions"))
            .timeout(self.fetch_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, message });
        }

        let raw: CompetitionsResponse = response.json().await?;
        Ok(normalize_competitions(raw))
    }

    async fn fetch_registrations(&self) -> Result<Vec<RegistrationRecord>, ApiError> {
        let response = self
            .client
            .get(self.endpoint("registrationdata"))
            .timeout(self.fetch_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, message });
        }

        Ok(response.json().await?)
    }

    async fn submit_registration(
        &self,
        request: SubmitRequest,
        progress: Option<ProgressObserver>,
    ) -> Result<SubmitAck, SubmitError> {
        let total_bytes: usize = request
            .files
            .iter()
            .map(|file| file.attachment.len())
            .sum();
        let sent = Arc::new(AtomicUsize::new(0));

        let mut form = Form::new();
        for (field, value) in request.fields {
            form = form.text(field, value);
        }
        for file in request.files {
            let part = match progress.clone() {
                Some(observer) => progress_part(
                    file.attachment,
                    total_bytes.max(1),
                    sent.clone(),
                    observer,
                )?,
                None => plain_part(file.attachment)?,
            };
            form = form.part(file.field, part);
        }

        let response = self
            .client
            .post(self.endpoint("registrationdata"))
            .multipart(form)
            .timeout(self.submit_timeout)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SubmitError::Rejected(rejection_message(status, &body)));
        }

        let ack: RawAck = response
            .json()
            .await
            .map_err(|e| SubmitError::Client(format!("unreadable backend response: {e}")))?;
        ack_from_raw(ack)
    }
}

fn plain_part(attachment: Attachment) -> Result<Part, SubmitError> {
    let content_type = attachment.content_type.clone();
    Part::bytes(attachment.bytes)
        .file_name(attachment.file_name)
        .mime_str(&content_type)
        .map_err(|e| SubmitError::Client(format!("invalid attachment mime type: {e}")))
}

/// Streams the attachment in chunks so cumulative progress can be reported
/// as the body leaves the process.
fn progress_part(
    attachment: Attachment,
    total_bytes: usize,
    sent: Arc<AtomicUsize>,
    observer: ProgressObserver,
) -> Result<Part, SubmitError> {
    const CHUNK: usize = 64 * 1024;

    let length = attachment.bytes.len() as u64;
    let chunks: Vec<Vec<u8>> = attachment
        .bytes
        .chunks(CHUNK)
        .map(|chunk| chunk.to_vec())
        .collect();

    let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
        let done = sent.fetch_add(chunk.len(), Ordering::Relaxed) + chunk.len();
        observer((done as f64 / total_bytes as f64).min(1.0));
        Ok::<_, std::io::Error>(chunk)
    }));

    Part::stream_with_length(Body::wrap_stream(stream), length)
        .file_name(attachment.file_name)
        .mime_str(&attachment.content_type)
        .map_err(|e| SubmitError::Client(format!("invalid attachment mime type: {e}")))
}

fn classify_send_error(err: reqwest_middleware::Error) -> SubmitError {
    match &err {
        reqwest_middleware::Error::Reqwest(e) if e.is_timeout() || e.is_connect() => {
            SubmitError::NoResponse
        }
        _ => SubmitError::Client(err.to_string()),
    }
}

/// Prefers the backend's own `error` field, falling back to the raw body.
fn rejection_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        if let Some(Value::String(message)) = map.get("error") {
            return message.clone();
        }
    }
    if body.trim().is_empty() {
        format!("registration failed ({status})")
    } else {
        body.trim().to_string()
    }
}

#[derive(Deserialize)]
struct RawAck {
    #[serde(default)]
    snap_token: Option<String>,
    #[serde(flatten)]
    extra: serde_json::Map<String, Value>,
}

fn ack_from_raw(raw: RawAck) -> Result<SubmitAck, SubmitError> {
    match raw.snap_token {
        Some(token) if !token.is_empty() => Ok(SubmitAck {
            snap_token: token,
            echo: Value::Object(raw.extra),
        }),
        _ => Err(SubmitError::Client(
            "no payment token in backend response".into(),
        )),
    }
}

/// The catalog endpoint answers in three historical shapes; all are
/// accepted and normalized right here, never re-checked downstream.
#[derive(Deserialize)]
#[serde(untagged)]
enum CompetitionsResponse {
    List(Vec<RawCompetition>),
    Keyed { competitions: Vec<RawCompetition> },
    Data { data: Vec<RawCompetition> },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCompetition {
    Entry {
        #[serde(default)]
        id: Option<i64>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        fee: Option<u64>,
        #[serde(default)]
        max_team_size: Option<usize>,
    },
    Name(String),
}

fn normalize_competitions(raw: CompetitionsResponse) -> Vec<Competition> {
    let items = match raw {
        CompetitionsResponse::List(items) => items,
        CompetitionsResponse::Keyed { competitions } => competitions,
        CompetitionsResponse::Data { data } => data,
    };

    let competitions: Vec<Competition> = items
        .into_iter()
        .filter_map(|item| match item {
            RawCompetition::Entry {
                id,
                name,
                title,
                fee,
                max_team_size,
            } => {
                let name = name.or(title)?;
                Some(Competition {
                    id,
                    name,
                    fee: fee.unwrap_or(0),
                    max_team_size,
                })
            }
            RawCompetition::Name(name) => Some(Competition::named(name, 0)),
        })
        .collect();

    debug!("normalized {} catalog entries", competitions.len());
    competitions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Vec<Competition> {
        normalize_competitions(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_bare_array_shape() {
        let list = parse(r#"[{"id": 3, "name": "Band", "fee": 150000}]"#);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, Some(3));
        assert_eq!(list[0].name, "Band");
        assert_eq!(list[0].fee, 150_000);
    }

    #[test]
    fn test_keyed_shapes() {
        let keyed = parse(r#"{"competitions": [{"title": "KIR", "fee": 50000}]}"#);
        assert_eq!(keyed[0].name, "KIR");

        let data = parse(r#"{"data": [{"name": "Short Movie"}]}"#);
        assert_eq!(data[0].name, "Short Movie");
        assert_eq!(data[0].fee, 0);
    }

    #[test]
    fn test_bare_string_entries_become_names() {
        let list = parse(r#"["Modern Dance", {"name": "Band", "fee": 1}]"#);
        assert_eq!(list[0].name, "Modern Dance");
        assert_eq!(list[0].fee, 0);
        assert_eq!(list[1].name, "Band");
    }

    #[test]
    fn test_entries_without_any_name_are_dropped() {
        let list = parse(r#"[{"fee": 5}, {"name": "Band"}]"#);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_ack_requires_snap_token() {
        let raw: RawAck =
            serde_json::from_str(r#"{"id": 9, "snap_token": "tok-1"}"#).unwrap();
        let ack = ack_from_raw(raw).unwrap();
        assert_eq!(ack.snap_token, "tok-1");
        assert_eq!(ack.echo["id"], 9);

        let raw: RawAck = serde_json::from_str(r#"{"id": 9}"#).unwrap();
        assert!(matches!(ack_from_raw(raw), Err(SubmitError::Client(_))));
    }

    #[test]
    fn test_rejection_message_prefers_backend_error_field() {
        let message = rejection_message(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"error": "duplicate team name"}"#,
        );
        assert_eq!(message, "duplicate team name");

        let fallback = rejection_message(StatusCode::BAD_GATEWAY, "");
        assert!(fallback.contains("502"));
    }
}
