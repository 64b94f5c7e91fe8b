//! Scripted network behind the native XHR.

use indexmap::IndexMap;
use reprise_core::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use tracing::trace;

/// A scripted response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// HTTP status; 0 is a network failure
    pub status: u16,
    /// Reason phrase
    pub status_text: String,
    /// Response headers
    pub headers: IndexMap<String, String>,
    /// Response body
    pub body: String,
    /// Milliseconds before headers arrive
    pub latency: u64,
}

impl Response {
    /// Response with status and reason phrase
    #[must_use]
    pub fn new(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers: IndexMap::new(),
            body: String::new(),
            latency: 0,
        }
    }

    /// `200 OK` with `body`
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, "OK").with_body(body)
    }

    /// `404 Not Found`
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(404, "Not Found")
    }

    /// Connection failure
    #[must_use]
    pub fn failure() -> Self {
        Self::new(0, "")
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the latency
    #[must_use]
    pub fn with_latency(mut self, latency: u64) -> Self {
        self.latency = latency;
        self
    }

    /// Whether the connection failed
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status == 0
    }
}

/// A request as it reached the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Upper-cased method
    pub method: String,
    /// Target URL
    pub url: String,
    /// Request headers
    pub headers: IndexMap<String, String>,
    /// Request body
    pub body: Option<String>,
}

/// Route table plus a record of every request sent
#[derive(Debug, Default)]
pub struct Network {
    routes: RefCell<IndexMap<(String, String), Response>>,
    requests: RefCell<Vec<Request>>,
}

impl Network {
    /// Network with no routes; every request gets a 404
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method url` with `response`
    ///
    /// # Errors
    ///
    /// Returns error if called while the route table is borrowed
    pub fn route(&self, method: &str, url: &str, response: Response) -> EngineResult<()> {
        self.routes
            .try_borrow_mut()
            .map_err(|_| busy())?
            .insert((method.to_ascii_uppercase(), url.to_string()), response);
        Ok(())
    }

    /// Send a request and look up its response
    ///
    /// # Errors
    ///
    /// Returns error if called while the network is borrowed
    pub fn fetch(&self, request: Request) -> EngineResult<Response> {
        let response = self
            .routes
            .try_borrow()
            .map_err(|_| busy())?
            .get(&(request.method.clone(), request.url.clone()))
            .cloned()
            .unwrap_or_else(Response::not_found);
        trace!(method = %request.method, url = %request.url, status = response.status, "fetch");
        self.requests
            .try_borrow_mut()
            .map_err(|_| busy())?
            .push(request);
        Ok(response)
    }

    /// Every request sent so far
    #[must_use]
    pub fn requests(&self) -> Vec<Request> {
        self.requests
            .try_borrow()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

fn busy() -> EngineError {
    EngineError::invalid_state("network is busy")
}
