//! # adq-remote: remote solve client
//!
//! Sends a study to a remote solve service and polls until the dispatch is
//! computed. The wire format is the JSON study/result of `adq-core`.
//!
//! Protocol:
//!
//! 1. `POST {url}/api/v1/study?token=...` with the study JSON. The server
//!    answers with a job id and an initial status.
//! 2. `GET {url}/api/v1/result/{job}?token=...` every 500 ms while the
//!    status is `QUEUED` or `COMPUTING`.
//! 3. `TERMINATED` carries the result; `ERROR` carries a message.
//!
//! HTTP 404 means the url is invalid, 403 the token was refused and 500 a
//! remote infrastructure failure. All failures surface as
//! [`AdqError::Remote`] with the wire step attached.

use std::thread;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use adq_core::{AdqError, AdqResult, Study, StudyResult};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Remote job lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Queued,
    Computing,
    Terminated,
    Error,
}

#[derive(Debug, Deserialize)]
struct JobEnvelope {
    #[serde(default)]
    job: Option<String>,
    status: JobStatus,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<StudyResult>,
}

/// Client for a remote solve service.
#[derive(Debug, Clone)]
pub struct RemoteOptimizer {
    url: String,
    token: String,
    poll_interval: Duration,
}

impl RemoteOptimizer {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        RemoteOptimizer {
            url: url.into(),
            token: token.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the default 500 ms poll cadence.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Submit the study, poll until the job leaves the queue and return
    /// the computed result.
    pub fn solve(&self, study: &Study) -> AdqResult<StudyResult> {
        let submit_url = format!("{}/api/v1/study", self.url);
        let response = ureq::post(&submit_url)
            .query("token", &self.token)
            .send_json(study)
            .map_err(|e| map_http_error("submitting study", e))?;
        let mut envelope: JobEnvelope = response
            .into_json()
            .map_err(|e| AdqError::Remote(format!("submitting study: invalid response: {}", e)))?;
        let job = envelope.job.clone().ok_or_else(|| {
            AdqError::Remote("submitting study: server returned no job id".to_string())
        })?;
        info!(job = job.as_str(), "study submitted");

        let result_url = format!("{}/api/v1/result/{}", self.url, job);
        while matches!(envelope.status, JobStatus::Queued | JobStatus::Computing) {
            thread::sleep(self.poll_interval);
            let response = ureq::get(&result_url)
                .query("token", &self.token)
                .call()
                .map_err(|e| map_http_error("polling result", e))?;
            envelope = response
                .into_json()
                .map_err(|e| AdqError::Remote(format!("polling result: invalid response: {}", e)))?;
            debug!(status = ?envelope.status, progress = ?envelope.progress, "job polled");
        }

        match envelope.status {
            JobStatus::Error => Err(AdqError::Remote(
                envelope
                    .message
                    .unwrap_or_else(|| "remote computation failed".to_string()),
            )),
            _ => envelope.result.ok_or_else(|| {
                AdqError::Remote("terminated job carried no result".to_string())
            }),
        }
    }
}

/// Solve a study on a remote service with the default poll cadence.
pub fn solve_remote(study: &Study, url: &str, token: &str) -> AdqResult<StudyResult> {
    RemoteOptimizer::new(url, token).solve(study)
}

fn map_http_error(step: &str, err: ureq::Error) -> AdqError {
    match err {
        ureq::Error::Status(404, _) => AdqError::Remote(format!("{}: url invalid (404)", step)),
        ureq::Error::Status(403, _) => AdqError::Remote(format!("{}: wrong token (403)", step)),
        ureq::Error::Status(500, _) => {
            AdqError::Remote(format!("{}: remote infrastructure error (500)", step))
        }
        ureq::Error::Status(code, _) => {
            AdqError::Remote(format!("{}: unexpected http status {}", step, code))
        }
        ureq::Error::Transport(transport) => AdqError::Remote(format!("{}: {}", step, transport)),
    }
}
