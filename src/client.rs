use crate::data::{GeneratedTimetable, TimetableRequest};
use crate::error::GenerationError;
use log::{info, trace, warn};
use serde_json::Value;
use std::future::Future;
use std::time::{Duration, Instant};

const GENERIC_REJECTION: &str = "The timetable generator could not produce a timetable.";

/// The external service that turns a request into a timetable.
///
/// One call per submission: no retries, no streaming, no cancellation.
pub trait GenerationService: Send + Sync + 'static {
    fn generate(
        &self,
        request: &TimetableRequest,
    ) -> impl Future<Output = Result<GeneratedTimetable, GenerationError>> + Send;
}

/// Talks to the generator over HTTP with a JSON body.
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    client: reqwest::Client,
    url: String,
}

impl HttpGenerator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl GenerationService for HttpGenerator {
    async fn generate(
        &self,
        request: &TimetableRequest,
    ) -> Result<GeneratedTimetable, GenerationError> {
        let started = Instant::now();
        trace!("POST {}", self.url);

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = rejection_message(&body);
            warn!("Generator rejected the request with {status}: {message}");
            return Err(GenerationError::Rejected(message));
        }

        let timetable: GeneratedTimetable =
            serde_json::from_slice(&body).map_err(|e| GenerationError::Decode(e.to_string()))?;
        info!(
            "Generator answered in {:.2?} with {} section schedules",
            started.elapsed(),
            timetable.schedules.len()
        );
        Ok(timetable)
    }
}

/// Pulls the human-readable reason out of an error body.
///
/// Understands `{"detail": "..."}`, validation lists of the form
/// `{"detail": [{"msg": "..."}]}`, `{"error": "..."}` and `{"message": "..."}`.
pub fn rejection_message(body: &[u8]) -> String {
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return GENERIC_REJECTION.to_string();
    };
    ["detail", "error", "message"]
        .iter()
        .find_map(|field| match value.get(field)? {
            Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
            Value::Array(items) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg")?.as_str())
                    .collect();
                (!messages.is_empty()).then(|| messages.join("; "))
            }
            _ => None,
        })
        .unwrap_or_else(|| GENERIC_REJECTION.to_string())
}
