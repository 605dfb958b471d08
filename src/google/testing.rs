//! Scripted transport for unit tests.

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::credentials::ClientContext;
use super::transport::{Credential, VendorReply, VendorRequest, VendorTransport};
use crate::error::UpstreamError;
use crate::models::Backend;

/// Replays queued replies in order and records every request it sees.
/// Once the script runs out the last reply is repeated.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<VendorReply, UpstreamError>>>,
    last: Mutex<Option<Result<VendorReply, UpstreamError>>>,
    seen: Mutex<Vec<VendorRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, status: u16, body: Value) -> Self {
        self.push(Ok(VendorReply::new(status, body)))
    }

    pub fn fail(self, err: UpstreamError) -> Self {
        self.push(Err(err))
    }

    fn push(self, reply: Result<VendorReply, UpstreamError>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<VendorRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl VendorTransport for ScriptedTransport {
    async fn send(&self, request: VendorRequest) -> Result<VendorReply, UpstreamError> {
        self.seen.lock().unwrap().push(request);
        let next = self.replies.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(reply) => {
                *last = Some(reply.clone());
                reply
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(UpstreamError::Network("script exhausted".into()))),
        }
    }
}

pub fn studio_context() -> ClientContext {
    ClientContext::new(
        Backend::Studio,
        Credential::ApiKey(SecretString::from("test-key".to_string())),
        "http://studio.test",
    )
}

pub fn vertex_context() -> ClientContext {
    ClientContext::new(
        Backend::Vertex,
        Credential::Bearer(SecretString::from("test-token".to_string())),
        "http://vertex.test",
    )
    .with_project("demo-project")
}
