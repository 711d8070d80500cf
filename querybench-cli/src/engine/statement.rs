//! HTTP statement protocol executor
//!
//! Presto/Trino style: the query is POSTed to `/v1/statement`, and the client
//! follows `nextUri` until the chain ends. An `error` object on any page fails
//! the attempt. The engine-assigned query id is reported as the job id.

use querybench_core::{
    ExecutionResult, ExecutorError, JobInfo, QueryExecutor, QueryRecord, Stopwatch,
};
use reqwest::blocking::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One page of a statement response
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementPage {
    /// Engine-assigned query id
    pub id: String,
    /// Next page to fetch; absent once the query is done
    #[serde(default)]
    pub next_uri: Option<String>,
    /// Present when the query failed
    #[serde(default)]
    pub error: Option<StatementError>,
    /// Progress information
    #[serde(default)]
    pub stats: Option<StatementStats>,
}

/// Error object of a failed statement
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementError {
    /// Human-readable message
    pub message: String,
    /// Symbolic error name, e.g. `TABLE_NOT_FOUND`
    #[serde(default)]
    pub error_name: Option<String>,
}

impl StatementError {
    fn describe(&self) -> String {
        let message = self.message.trim();
        match self.error_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() && !message.is_empty() => {
                format!("{}: {}", name, message)
            }
            Some(name) if !name.is_empty() => name.to_string(),
            _ => message.to_string(),
        }
    }
}

/// Query state reported on each page
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementStats {
    /// e.g. `QUEUED`, `RUNNING`, `FINISHED`
    #[serde(default)]
    pub state: String,
    /// Engine-side elapsed time of the query so far
    #[serde(default)]
    pub elapsed_time_millis: Option<u64>,
}

/// Which clock provides the duration of a successful attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimingSource {
    /// Submit-to-completion time measured by querybench
    #[default]
    Client,
    /// Elapsed time reported by the engine on the final page; falls back to
    /// the client clock when the engine reports none
    Engine,
}

/// How a statement chain ended
struct Completion {
    job_id: String,
    engine_elapsed: Option<Duration>,
}

/// Moves pages between the executor and the engine
pub trait StatementTransport: Send + Sync {
    /// Submit query text, returning the first page
    fn submit(&self, query: &str) -> Result<StatementPage, String>;

    /// Fetch the page at `next_uri`
    fn advance(&self, next_uri: &str) -> Result<StatementPage, String>;
}

/// Connection settings of [`HttpTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    /// Coordinator base URL
    pub url: String,
    /// Session user
    pub user: String,
    /// Basic auth password; empty disables basic auth
    pub password: String,
    /// Sent as `X-Trino-Catalog`
    pub catalog: Option<String>,
    /// Sent as `X-Trino-Schema`
    pub schema: Option<String>,
}

/// Blocking HTTP transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    settings: HttpSettings,
}

impl HttpTransport {
    /// Build the HTTP client
    pub fn new(settings: HttpSettings) -> Result<Self, ExecutorError> {
        let client = Client::builder()
            .user_agent(concat!("querybench/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExecutorError::Client(e.to_string()))?;
        Ok(Self { client, settings })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("X-Trino-User", &self.settings.user);
        if self.settings.password.is_empty() {
            request
        } else {
            request.basic_auth(&self.settings.user, Some(&self.settings.password))
        }
    }

    fn fetch(&self, request: RequestBuilder) -> Result<StatementPage, String> {
        let response = self.authorize(request).send().map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(format!("HTTP {}: {}", status, body.trim()));
        }
        response
            .json::<StatementPage>()
            .map_err(|e| format!("Invalid statement response: {}", e))
    }
}

impl StatementTransport for HttpTransport {
    fn submit(&self, query: &str) -> Result<StatementPage, String> {
        let url = format!("{}/v1/statement", self.settings.url.trim_end_matches('/'));
        let mut request = self.client.post(url).body(query.to_string());
        if let Some(catalog) = &self.settings.catalog {
            request = request.header("X-Trino-Catalog", catalog);
        }
        if let Some(schema) = &self.settings.schema {
            request = request.header("X-Trino-Schema", schema);
        }
        request = request.header("X-Trino-Source", "querybench");
        self.fetch(request)
    }

    fn advance(&self, next_uri: &str) -> Result<StatementPage, String> {
        self.fetch(self.client.get(next_uri))
    }
}

/// Submits queries and waits for their completion by polling
#[derive(Debug, Clone)]
pub struct StatementExecutor<T = HttpTransport> {
    transport: T,
    poll_interval: Duration,
    timing: TimingSource,
}

impl<T: StatementTransport> StatementExecutor<T> {
    /// Executor polling every `poll_interval`
    pub fn new(transport: T, poll_interval: Duration) -> Self {
        Self {
            transport,
            poll_interval,
            timing: TimingSource::default(),
        }
    }

    /// Choose the clock used for successful attempts
    pub fn with_timing_source(mut self, timing: TimingSource) -> Self {
        self.timing = timing;
        self
    }

    /// Follow the page chain. Err carries the failure and the query id when
    /// one was assigned.
    fn run_to_completion(&self, query: &str) -> Result<Completion, (Option<String>, String)> {
        let mut page = self.transport.submit(query).map_err(|e| (None, e))?;
        let job_id = page.id.clone();

        loop {
            if let Some(error) = &page.error {
                return Err((Some(job_id), error.describe()));
            }
            let Some(next_uri) = page.next_uri.take() else {
                let engine_elapsed = page
                    .stats
                    .as_ref()
                    .and_then(|s| s.elapsed_time_millis)
                    .map(Duration::from_millis);
                return Ok(Completion {
                    job_id,
                    engine_elapsed,
                });
            };
            debug!(
                query_id = %job_id,
                state = page.stats.as_ref().map(|s| s.state.as_str()).unwrap_or(""),
                "Waiting for statement"
            );
            std::thread::sleep(self.poll_interval);
            page = self
                .transport
                .advance(&next_uri)
                .map_err(|e| (Some(job_id.clone()), e))?;
        }
    }
}

impl<T: StatementTransport> QueryExecutor for StatementExecutor<T> {
    fn execute_once(&self, record: &Arc<QueryRecord>) -> Result<ExecutionResult, ExecutorError> {
        let watch = Stopwatch::start();
        let outcome = self.run_to_completion(record.query());
        let timing = watch.stop();

        let (result, job_id) = match outcome {
            Ok(done) => {
                let duration = match (self.timing, done.engine_elapsed) {
                    (TimingSource::Engine, Some(elapsed)) => elapsed,
                    _ => timing.duration,
                };
                (
                    ExecutionResult::success(record.clone(), duration),
                    Some(done.job_id),
                )
            }
            Err((job_id, message)) => (ExecutionResult::fail(record.clone(), message), job_id),
        };

        let result = result.with_timing(Some(timing.started_at), Some(timing.finished_at));
        Ok(match job_id {
            Some(job_id) => result.with_job(JobInfo {
                job_id,
                created_at: timing.started_at,
            }),
            None => result,
        })
    }
}
