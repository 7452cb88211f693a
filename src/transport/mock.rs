//! Mock transport for testing.
//!
//! A programmable transport that simulates an agent without a network:
//! queue fixed responses, timeouts, I/O errors, or responder closures
//! that compute a reply from the recorded request bytes (needed for v3
//! flows where message IDs and engine state come from the request).

use super::Transport;
use crate::error::{Error, Result};
use bytes::Bytes;
use std::collections::VecDeque;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A scripted response.
pub enum MockResponse {
    /// Return these bytes; for v1/v2c messages the request-id is patched
    /// to match the recorded request.
    Data(Bytes),
    /// Return these bytes exactly as given.
    RawData(Bytes),
    /// Compute the response from the request bytes.
    Handler(Box<dyn Fn(&[u8]) -> Bytes + Send + Sync>),
    /// Simulate a timeout.
    Timeout,
    /// Simulate an I/O error.
    IoError(String),
}

/// A request recorded by the mock.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    /// Raw request bytes.
    pub data: Bytes,
    /// Request ID extracted from the message, when parseable.
    pub request_id: Option<i32>,
}

struct MockTransportInner {
    target: SocketAddr,
    responses: VecDeque<MockResponse>,
    requests: Vec<RecordedRequest>,
    last_request: Option<Bytes>,
}

/// Mock transport for exercising the client without a network.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

impl MockTransport {
    /// Create a mock pretending to be the agent at `target`.
    pub fn new(target: SocketAddr) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockTransportInner {
                target,
                responses: VecDeque::new(),
                requests: Vec::new(),
                last_request: None,
            })),
        }
    }

    /// Queue a response; v1/v2c request-ids are patched to match the
    /// request that triggers it.
    pub fn queue_response(&self, data: impl Into<Bytes>) {
        self.queue(MockResponse::Data(data.into()));
    }

    /// Queue a response returned byte-for-byte (for request-id mismatch
    /// scenarios).
    pub fn queue_raw_response(&self, data: impl Into<Bytes>) {
        self.queue(MockResponse::RawData(data.into()));
    }

    /// Queue a responder closure computing the reply from the request.
    pub fn queue_handler(&self, handler: impl Fn(&[u8]) -> Bytes + Send + Sync + 'static) {
        self.queue(MockResponse::Handler(Box::new(handler)));
    }

    /// Queue a timeout.
    pub fn queue_timeout(&self) {
        self.queue(MockResponse::Timeout);
    }

    /// Queue an I/O error.
    pub fn queue_io_error(&self, msg: impl Into<String>) {
        self.queue(MockResponse::IoError(msg.into()));
    }

    fn queue(&self, response: MockResponse) {
        self.inner.lock().unwrap().responses.push_back(response);
    }

    /// All recorded requests, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.lock().unwrap().requests.clone()
    }

    /// Number of responses still queued.
    pub fn queued_response_count(&self) -> usize {
        self.inner.lock().unwrap().responses.len()
    }

    /// Best-effort request-id extraction for recording.
    fn extract_request_id(data: &[u8]) -> Option<i32> {
        use crate::message::Message;

        let msg = Message::decode(Bytes::copy_from_slice(data)).ok()?;
        match &msg {
            Message::Community(m) => Some(m.pdu.request_id),
            Message::V3(m) => Some(m.msg_id()),
        }
    }

    /// Patch the request-id in a queued v1/v2c response to match the
    /// live request so fixtures don't have to predict allocator state.
    fn patch_request_id(data: Bytes, new_id: i32) -> Bytes {
        use crate::message::Message;

        match Message::decode(data.clone()) {
            Ok(Message::Community(mut cm)) => {
                cm.pdu.request_id = new_id;
                cm.encode()
            }
            // V3 messages are authenticated; hand them back untouched
            _ => data,
        }
    }
}

impl Transport for MockTransport {
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<()>> + Send {
        let data = Bytes::copy_from_slice(data);
        let request_id = Self::extract_request_id(&data);

        let mut inner = self.inner.lock().unwrap();
        inner.requests.push(RecordedRequest {
            data: data.clone(),
            request_id,
        });
        inner.last_request = Some(data);

        async { Ok(()) }
    }

    fn recv(
        &self,
        _request_id: i32,
        timeout: Duration,
    ) -> impl Future<Output = Result<Bytes>> + Send {
        let inner = self.inner.clone();

        async move {
            let (response, target, last_request) = {
                let mut guard = inner.lock().unwrap();
                (
                    guard.responses.pop_front(),
                    guard.target,
                    guard.last_request.clone(),
                )
            };

            let last_id = last_request
                .as_deref()
                .and_then(Self::extract_request_id);

            match response {
                Some(MockResponse::Data(data)) => Ok(match last_id {
                    Some(id) => Self::patch_request_id(data, id),
                    None => data,
                }),
                Some(MockResponse::RawData(data)) => Ok(data),
                Some(MockResponse::Handler(handler)) => {
                    let request = last_request.unwrap_or_default();
                    Ok(handler(&request))
                }
                Some(MockResponse::IoError(msg)) => Err(Error::Io {
                    target: Some(target),
                    source: std::io::Error::other(msg),
                }),
                Some(MockResponse::Timeout) | None => Err(Error::Timeout {
                    target: Some(target),
                    elapsed: timeout,
                }),
            }
        }
    }

    fn peer_addr(&self) -> SocketAddr {
        self.inner.lock().unwrap().target
    }
}

/// Builder producing valid SNMP response bytes for tests without
/// hand-crafted BER.
pub struct ResponseBuilder {
    request_id: i32,
    varbinds: Vec<(crate::oid::Oid, crate::value::Value)>,
    error_status: i32,
    error_index: i32,
}

impl ResponseBuilder {
    /// Start a response with the given request ID (usually patched by
    /// the mock anyway).
    pub fn new(request_id: i32) -> Self {
        Self {
            request_id,
            varbinds: Vec::new(),
            error_status: 0,
            error_index: 0,
        }
    }

    /// Append a varbind.
    pub fn varbind(mut self, oid: crate::oid::Oid, value: crate::value::Value) -> Self {
        self.varbinds.push((oid, value));
        self
    }

    /// Set the error status.
    pub fn error_status(mut self, status: i32) -> Self {
        self.error_status = status;
        self
    }

    /// Set the error index.
    pub fn error_index(mut self, index: i32) -> Self {
        self.error_index = index;
        self
    }

    fn build_pdu(self) -> crate::pdu::Pdu {
        use crate::pdu::{Pdu, PduType};
        use crate::varbind::VarBind;

        Pdu {
            pdu_type: PduType::Response,
            request_id: self.request_id,
            error_status: self.error_status,
            error_index: self.error_index,
            varbinds: self
                .varbinds
                .into_iter()
                .map(|(oid, value)| VarBind::new(oid, value))
                .collect(),
        }
    }

    /// Build a v2c response message.
    pub fn build_v2c(self, community: &[u8]) -> Bytes {
        use crate::message::CommunityMessage;
        CommunityMessage::v2c(Bytes::copy_from_slice(community), self.build_pdu()).encode()
    }

    /// Build a v1 response message.
    pub fn build_v1(self, community: &[u8]) -> Bytes {
        use crate::message::CommunityMessage;
        CommunityMessage::v1(Bytes::copy_from_slice(community), self.build_pdu()).encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::value::Value;

    #[tokio::test]
    async fn test_queue_and_recv() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());

        let response = ResponseBuilder::new(1)
            .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("test"))
            .build_v2c(b"public");
        mock.queue_response(response.clone());

        mock.send(b"dummy request").await.unwrap();
        let data = mock.recv(1, Duration::from_secs(1)).await.unwrap();
        assert_eq!(data, response);
    }

    #[tokio::test]
    async fn test_timeout_and_empty_queue() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_timeout();

        let result = mock.recv(1, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::Timeout { .. }));

        // Exhausted queue also behaves as a timeout
        let result = mock.recv(1, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_records_requests() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.send(b"request 1").await.unwrap();
        mock.send(b"request 2").await.unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].data.as_ref(), b"request 1");
        assert_eq!(requests[1].data.as_ref(), b"request 2");
    }

    #[tokio::test]
    async fn test_handler_sees_request() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_handler(|request| {
            let mut reply = request.to_vec();
            reply.reverse();
            Bytes::from(reply)
        });

        mock.send(b"abc").await.unwrap();
        let data = mock.recv(1, Duration::from_secs(1)).await.unwrap();
        assert_eq!(data.as_ref(), b"cba");
    }
}
