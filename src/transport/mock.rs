//! Scripted in-memory transport for tests.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::{AuthTransport, Method, TransportError, TransportRequest, TransportResponse};

/// One scripted reaction to a request.
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(TransportResponse),
    Fail(TransportError),
    /// Sleep before responding; used to exercise deadlines.
    Delay(Duration, TransportResponse),
}

/// Routes requests by `(method, path)` to queued replies and records every call.
///
/// The last reply queued on a route is repeated once the queue drains, so a
/// single scripted success answers any number of keep-alive calls.
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<MockReply>>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, method: Method, path: impl Into<String>, reply: MockReply) -> &Self {
        self.routes
            .lock()
            .entry((method, path.into()))
            .or_default()
            .push_back(reply);
        self
    }

    pub fn respond(&self, method: Method, path: impl Into<String>, status: u16, body: Value) -> &Self {
        self.reply(
            method,
            path,
            MockReply::Respond(TransportResponse::new(status, body)),
        )
    }

    pub fn fail(&self, method: Method, path: impl Into<String>, error: TransportError) -> &Self {
        self.reply(method, path, MockReply::Fail(error))
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Number of calls made to `path` with any method.
    pub fn calls_to(&self, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.endpoint.path() == path)
            .count()
    }

    fn next_reply(&self, method: Method, path: &str) -> Option<MockReply> {
        let mut routes = self.routes.lock();
        let queue = routes.get_mut(&(method, path.to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl AuthTransport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let method = request.method;
        let path = request.endpoint.path().to_string();
        self.requests.lock().push(request);

        match self.next_reply(method, &path) {
            Some(MockReply::Respond(response)) => Ok(response),
            Some(MockReply::Fail(error)) => Err(error),
            Some(MockReply::Delay(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            None => Ok(TransportResponse::new(404, Value::Null)),
        }
    }
}
