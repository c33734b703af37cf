//! In-process source that plays a fixed list of messages.
//!
//! Used by tests and demos to drive the worker without a socket.

use std::time::Duration;

use tokio::task::JoinHandle;

use super::{InboundDatagram, InboundMessage, SampleSource, SourceContext};
use crate::error::TransportError;

#[derive(Debug, Clone)]
enum Step {
    Payload(String),
    Message(InboundMessage),
    Pause(Duration),
}

/// Plays its steps in order, then ends (closing the worker channel).
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    steps: Vec<Step>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue payloads; each is stamped with the clock when it is sent.
    pub fn payloads<I, S>(mut self, payloads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps
            .extend(payloads.into_iter().map(|p| Step::Payload(p.into())));
        self
    }

    pub fn message(mut self, message: InboundMessage) -> Self {
        self.steps.push(Step::Message(message));
        self
    }

    pub fn pause(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Pause(duration));
        self
    }
}

impl SampleSource for ScriptedSource {
    fn describe(&self) -> String {
        format!("scripted ({} steps)", self.steps.len())
    }

    fn spawn(self: Box<Self>, ctx: SourceContext) -> JoinHandle<Result<(), TransportError>> {
        tokio::spawn(async move {
            for step in self.steps {
                if ctx.is_shutting_down() {
                    break;
                }
                match step {
                    Step::Payload(payload) => ctx.forward(InboundDatagram {
                        payload,
                        source: None,
                        received_at: ctx.clock.now(),
                    })?,
                    Step::Message(message) => ctx.notify(message).await?,
                    Step::Pause(duration) => tokio::time::sleep(duration).await,
                }
            }
            Ok(())
        })
    }
}
