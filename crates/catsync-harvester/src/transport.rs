//! HTTP transport for the remote product search.
//!
//! [`PageTransport`] is the seam between the retry logic and the network:
//! it performs exactly one attempt and reports how it ended as a
//! [`RequestOutcome`]. [`SearchTransport`] is the `reqwest` implementation.

use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::sync::Mutex;

use catsync_core::RemoteSettings;
use reqwest::{header, Client, StatusCode, Url};

use crate::error::TransportError;
use crate::outcome::{AttemptTimeouts, RequestOutcome};
use crate::request::{search_body, PageRequest};
use crate::types::SearchPayload;

pub trait PageTransport: Send + Sync {
    /// Performs one attempt for `request` bounded by `timeouts`.
    fn send(
        &self,
        request: &PageRequest,
        timeouts: AttemptTimeouts,
    ) -> impl Future<Output = RequestOutcome> + Send;
}

/// `reqwest`-backed transport posting persisted-query bodies to the search
/// endpoint.
///
/// Connect timeouts are a client-level setting in `reqwest`, so one client is
/// built per distinct [`AttemptTimeouts`] and reused. The ladder yields only a
/// handful of combinations.
pub struct SearchTransport {
    endpoint: Url,
    remote: RemoteSettings,
    clients: Mutex<HashMap<AttemptTimeouts, Client>>,
}

impl SearchTransport {
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidEndpoint`] if the configured endpoint
    /// is not an absolute URL.
    pub fn new(remote: RemoteSettings) -> Result<Self, TransportError> {
        let endpoint =
            Url::parse(&remote.endpoint).map_err(|e| TransportError::InvalidEndpoint {
                endpoint: remote.endpoint.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            endpoint,
            remote,
            clients: Mutex::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn client_for(&self, timeouts: AttemptTimeouts) -> Result<Client, reqwest::Error> {
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(client) = clients.get(&timeouts) {
            return Ok(client.clone());
        }

        let client = Client::builder()
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.read)
            .timeout(timeouts.connect + timeouts.read)
            .user_agent(&self.remote.user_agent)
            .build()?;
        clients.insert(timeouts, client.clone());
        Ok(client)
    }
}

impl PageTransport for SearchTransport {
    async fn send(&self, request: &PageRequest, timeouts: AttemptTimeouts) -> RequestOutcome {
        let client = match self.client_for(timeouts) {
            Ok(client) => client,
            Err(e) => return RequestOutcome::Unexpected(format!("client build failed: {e}")),
        };

        let body = search_body(&self.remote, request);
        let response = match client
            .post(self.endpoint.clone())
            .header(header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return classify_send_error(&e),
        };

        let status = response.status();
        if let Some(outcome) = classify_status(status) {
            return outcome;
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return classify_send_error(&e),
        };

        match serde_json::from_str::<SearchPayload>(&text) {
            Ok(payload) => RequestOutcome::Success(payload),
            Err(e) => RequestOutcome::Malformed(e.to_string()),
        }
    }
}

/// Maps non-success statuses to their outcome; `None` means read the body.
fn classify_status(status: StatusCode) -> Option<RequestOutcome> {
    if status.is_success() {
        None
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Some(RequestOutcome::RateLimited)
    } else if status.is_server_error() {
        Some(RequestOutcome::ServerError(status.as_u16()))
    } else {
        Some(RequestOutcome::ClientError(status.as_u16()))
    }
}

/// Refused, reset and half-closed sockets are all connection failures,
/// whichever phase of the exchange they hit.
fn classify_send_error(err: &reqwest::Error) -> RequestOutcome {
    if err.is_timeout() {
        RequestOutcome::Timeout
    } else if err.is_connect() || err.is_request() || err.is_body() || has_socket_error(err) {
        RequestOutcome::ConnectionError
    } else {
        RequestOutcome::Unexpected(err.to_string())
    }
}

fn has_socket_error(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                ErrorKind::ConnectionRefused
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        source = inner.source();
    }
    false
}
