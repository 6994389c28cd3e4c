//! Scripted transport for tests.
//!
//! Lets tests drive the resilience layer and the pipeline without network
//! access: each `send` consumes the next scripted step (or asks a responder
//! closure) and the transport records every request it saw.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::request::{ModelRequest, ModelResponse};
use super::transport::{ModelTransport, TransportError, TransportResult};

/// What the transport does for one attempt.
#[derive(Debug, Clone)]
pub enum Step {
    Respond(String),
    Fail(TransportError),
    /// Never completes; the caller's timeout or cancellation must end it.
    Hang,
    /// Sleep (on tokio time) then respond.
    Delay(Duration, String),
}

impl Step {
    pub fn respond(text: impl Into<String>) -> Self {
        Self::Respond(text.into())
    }

    pub fn status(status: u16) -> Self {
        Self::Fail(TransportError::Status {
            status,
            body: format!("scripted HTTP {status}"),
        })
    }

    pub fn connection_reset() -> Self {
        Self::Fail(TransportError::Connection("connection reset by peer".into()))
    }
}

type Responder = Box<dyn Fn(&ModelRequest) -> Step + Send + Sync>;

enum Script {
    Queue {
        steps: Mutex<VecDeque<Step>>,
        fallback: Option<Step>,
    },
    Responder(Responder),
}

pub struct ScriptedTransport {
    script: Script,
    attempts: AtomicU32,
    requests: Mutex<Vec<ModelRequest>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedTransport {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            attempts: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Play `steps` in order, then fail every later attempt with a
    /// protocol error.
    pub fn sequence(steps: impl IntoIterator<Item = Step>) -> Self {
        Self::with_script(Script::Queue {
            steps: Mutex::new(steps.into_iter().collect()),
            fallback: None,
        })
    }

    /// Play `steps` in order, then repeat `fallback` forever.
    pub fn sequence_then(steps: impl IntoIterator<Item = Step>, fallback: Step) -> Self {
        Self::with_script(Script::Queue {
            steps: Mutex::new(steps.into_iter().collect()),
            fallback: Some(fallback),
        })
    }

    pub fn always(step: Step) -> Self {
        Self::sequence_then([], step)
    }

    /// Decide each step from the request itself.
    pub fn from_fn(f: impl Fn(&ModelRequest) -> Step + Send + Sync + 'static) -> Self {
        Self::with_script(Script::Responder(Box::new(f)))
    }

    /// Number of `send` calls observed.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        lock(&self.requests).clone()
    }

    fn next_step(&self, request: &ModelRequest) -> Step {
        match &self.script {
            Script::Queue { steps, fallback } => lock(steps)
                .pop_front()
                .or_else(|| fallback.clone())
                .unwrap_or_else(|| {
                    Step::Fail(TransportError::Protocol("script exhausted".into()))
                }),
            Script::Responder(f) => f(request),
        }
    }
}

#[async_trait]
impl ModelTransport for ScriptedTransport {
    async fn send(&self, request: &ModelRequest) -> TransportResult<ModelResponse> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request.clone());
        match self.next_step(request) {
            Step::Respond(text) => Ok(ModelResponse::text(text)),
            Step::Fail(err) => Err(err),
            Step::Hang => std::future::pending().await,
            Step::Delay(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(ModelResponse::text(text))
            }
        }
    }
}
