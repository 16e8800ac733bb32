//! Request gateway: single egress for backend calls
//!
//! Every request carries the access token currently in durable storage. A 401
//! on a request that was not retried yet triggers at most one renewal; requests
//! failing while it is in flight wait in a FIFO queue and replay with the
//! renewed token once it settles.

use crate::error::{ClientError, Result};
use crate::session::SessionManager;
use parking_lot::Mutex;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// A replayable backend call
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_json(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_json(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PATCH, path).with_json(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// True once the request has been replayed after a renewal
    pub fn is_retried(&self) -> bool {
        self.retried
    }
}

/// Successful backend response; the body shape is opaque to the gateway
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Renewed access token, or the failure message shared by every waiter
type RenewalOutcome = std::result::Result<String, String>;

/// The queue only exists while a renewal is in flight.
enum RenewalState {
    Idle,
    Refreshing {
        queue: VecDeque<oneshot::Sender<RenewalOutcome>>,
    },
}

enum Ticket {
    /// This request dispatches the renewal
    Leader(String),
    /// Another request already did; wait for its outcome
    Queued(oneshot::Receiver<RenewalOutcome>),
    /// The token was renewed after this request was sent; replay with it
    Renewed(String),
}

/// Returns the gate to `Idle` on every exit path of the leading request,
/// including the leader's future being dropped mid-renewal.
struct RenewalGuard<'a> {
    renewal: &'a Mutex<RenewalState>,
    settled: bool,
}

impl RenewalGuard<'_> {
    fn settle(mut self, outcome: RenewalOutcome) -> usize {
        self.settled = true;
        drain(self.renewal, outcome)
    }
}

impl Drop for RenewalGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let abandoned = drain(self.renewal, Err("token renewal was abandoned".to_string()));
            warn!(waiters = abandoned, "Token renewal abandoned");
        }
    }
}

fn drain(renewal: &Mutex<RenewalState>, outcome: RenewalOutcome) -> usize {
    let previous = std::mem::replace(&mut *renewal.lock(), RenewalState::Idle);
    let RenewalState::Refreshing { queue } = previous else {
        return 0;
    };
    let count = queue.len();
    for waiter in queue {
        // A waiter that went away simply misses the outcome
        let _ = waiter.send(outcome.clone());
    }
    count
}

/// Uniform HTTP egress with credential attachment and renewal-on-expiry
pub struct RequestGateway {
    session: Arc<SessionManager>,
    http_client: Client,
    renewal: Mutex<RenewalState>,
}

impl RequestGateway {
    pub fn new(session: Arc<SessionManager>) -> Arc<Self> {
        let http_client = session.auth_api().http_client().clone();
        Arc::new(Self {
            session,
            http_client,
            renewal: Mutex::new(RenewalState::Idle),
        })
    }

    /// True while a renewal is in flight
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.renewal.lock(), RenewalState::Refreshing { .. })
    }

    /// Number of requests waiting on the in-flight renewal
    pub fn queued(&self) -> usize {
        match &*self.renewal.lock() {
            RenewalState::Refreshing { queue } => queue.len(),
            RenewalState::Idle => 0,
        }
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        Ok(self.execute(ApiRequest::get(path)).await?.body)
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Value> {
        Ok(self.execute(ApiRequest::post(path, body)).await?.body)
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<Value> {
        Ok(self.execute(ApiRequest::put(path, body)).await?.body)
    }

    pub async fn patch(&self, path: &str, body: Value) -> Result<Value> {
        Ok(self.execute(ApiRequest::patch(path, body)).await?.body)
    }

    pub async fn delete(&self, path: &str) -> Result<Value> {
        Ok(self.execute(ApiRequest::delete(path)).await?.body)
    }

    /// Send `request`, renewing the access token once if the backend answers 401.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Api`] for any other non-success status, body untouched
    /// - [`ClientError::SessionExpired`] when no refresh token exists or renewal fails
    /// - [`ClientError::HttpRequest`] on transport failure
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        // Read per request: another session handle may have written a newer token
        let access_token = self.session.tokens().access_token();
        let response = self.dispatch(&request, access_token.as_deref()).await?;

        if response.status == StatusCode::UNAUTHORIZED && !request.retried {
            return self.recover(request, access_token.as_deref()).await;
        }
        into_result(response)
    }

    async fn recover(&self, mut request: ApiRequest, sent: Option<&str>) -> Result<ApiResponse> {
        request.retried = true;

        let access_token = match self.join_or_lead(sent)? {
            Ticket::Leader(refresh_token) => self.lead_renewal(&refresh_token).await?,
            Ticket::Renewed(access_token) => {
                debug!(path = %request.path, "Token already renewed, replaying");
                access_token
            }
            Ticket::Queued(waiter) => {
                debug!(path = %request.path, "Waiting for in-flight token renewal");
                waiter
                    .await
                    .map_err(|_| ClientError::SessionExpired("token renewal was abandoned".into()))?
                    .map_err(ClientError::SessionExpired)?
            }
        };

        let response = self.dispatch(&request, Some(&access_token)).await?;
        into_result(response)
    }

    /// Check-and-set of the renewal gate.
    ///
    /// `sent` is the access token the failed request carried. A renewal that
    /// settled after it was sent has already stored a newer token, which
    /// belongs to the same expiry event.
    fn join_or_lead(&self, sent: Option<&str>) -> Result<Ticket> {
        let mut state = self.renewal.lock();
        if let RenewalState::Refreshing { queue } = &mut *state {
            let (tx, rx) = oneshot::channel();
            queue.push_back(tx);
            return Ok(Ticket::Queued(rx));
        }

        // Renewal writes storage before the gate returns to `Idle`
        if let Some(current) = self.session.tokens().access_token() {
            if sent != Some(current.as_str()) {
                return Ok(Ticket::Renewed(current));
            }
        }

        let Some(refresh_token) = self.session.tokens().refresh_token() else {
            warn!("Refresh token not found, session cannot be renewed");
            return Err(ClientError::SessionExpired(
                "refresh token not found".to_string(),
            ));
        };
        *state = RenewalState::Refreshing {
            queue: VecDeque::new(),
        };
        Ok(Ticket::Leader(refresh_token))
    }

    async fn lead_renewal(&self, refresh_token: &str) -> Result<String> {
        let guard = RenewalGuard {
            renewal: &self.renewal,
            settled: false,
        };

        // Storage is updated (or purged) inside `renew` before any waiter is released
        match self.session.renew(refresh_token).await {
            Ok(access_token) => {
                let released = guard.settle(Ok(access_token.clone()));
                info!(released = released, "Token renewed, replaying queued requests");
                Ok(access_token)
            }
            Err(e) => {
                let message = match e {
                    ClientError::SessionExpired(message) => message,
                    other => other.to_string(),
                };
                let rejected = guard.settle(Err(message.clone()));
                warn!(rejected = rejected, "Token renewal failed, forcing re-authentication");
                self.session
                    .navigator()
                    .hard_redirect(self.session.config().login_path());
                Err(ClientError::SessionExpired(message))
            }
        }
    }

    async fn dispatch(&self, request: &ApiRequest, access_token: Option<&str>) -> Result<ApiResponse> {
        let url = self.session.config().resource_url(&request.path)?;
        let mut builder = self.http_client.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = access_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(
            method = %request.method,
            path = %request.path,
            retried = request.retried,
            authenticated = access_token.is_some(),
            "Dispatching request"
        );
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(ApiResponse { status, body })
    }
}

fn into_result(response: ApiResponse) -> Result<ApiResponse> {
    if response.status.is_success() {
        Ok(response)
    } else {
        Err(ClientError::Api {
            status: response.status,
            body: response.body,
        })
    }
}
