//! Codec adapters
//!
//! A codec session (decoder, encoder) is a stateful coder with internal
//! latency: input goes in with `send`, output comes out with `receive`, and
//! the two are not one-to-one. [`CodecAdapter`] wraps a session with the
//! open → running → flushing → closed lifecycle used by the pipeline:
//!
//! - every `push` drains all available output into a sink,
//! - back-pressure from the session is resolved by draining and retrying a
//!   bounded number of times,
//! - `finish` sends end-of-stream exactly once and drains to exhaustion.

pub mod params;

use crate::error::{CodecError, Result};

/// Retries for a send refused with "drain output first"
const MAX_SEND_ATTEMPTS: usize = 8;

/// Outcome of submitting input to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Accepted,
    /// Output must be drained before more input is accepted
    Again,
}

/// Outcome of polling a session for output
#[derive(Debug)]
pub enum Received<T> {
    Item(T),
    /// More input is needed
    Again,
    /// End of stream reached after a flush
    Eof,
}

/// A backend coder session.
///
/// `send(None)` signals end of stream. After that, `receive` yields the
/// buffered tail and then `Eof`.
pub trait CodecSession: Send {
    type Input;
    type Output;

    fn send(&mut self, input: Option<&Self::Input>) -> std::result::Result<SendStatus, CodecError>;

    fn receive(&mut self) -> std::result::Result<Received<Self::Output>, CodecError>;

    /// Discard buffered state (after a seek) so the session accepts input again.
    fn reset(&mut self) -> std::result::Result<(), CodecError>;

    /// Short label for logs, e.g. `h264 decoder`
    fn name(&self) -> &str;
}

pub type BoxedSession<I, O> = Box<dyn CodecSession<Input = I, Output = O>>;

/// Lifecycle of a [`CodecAdapter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Open,
    Running,
    Flushing,
    Closed,
}

/// Lifecycle wrapper around one codec session
pub struct CodecAdapter<I, O> {
    session: Option<BoxedSession<I, O>>,
    state: AdapterState,
    drained: bool,
    label: String,
}

impl<I, O> CodecAdapter<I, O> {
    pub fn new(session: BoxedSession<I, O>) -> Self {
        let label = session.name().to_string();
        Self {
            session: Some(session),
            state: AdapterState::Open,
            drained: false,
            label,
        }
    }

    pub fn state(&self) -> AdapterState {
        self.state
    }

    /// True once the session reported end of stream after a flush.
    pub fn is_drained(&self) -> bool {
        self.drained
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn session_mut(&mut self) -> Result<&mut BoxedSession<I, O>> {
        let label = &self.label;
        self.session
            .as_mut()
            .ok_or_else(|| CodecError::InvalidState(format!("{} is closed", label)).into())
    }

    /// Submit one input and forward every output it makes available to `sink`.
    ///
    /// Returns the number of outputs forwarded.
    pub fn push(&mut self, input: &I, sink: &mut dyn FnMut(O) -> Result<()>) -> Result<usize> {
        if matches!(self.state, AdapterState::Flushing | AdapterState::Closed) {
            return Err(CodecError::InvalidState(format!(
                "{}: input after end of stream",
                self.label
            ))
            .into());
        }
        self.state = AdapterState::Running;

        let mut forwarded = 0;
        for _ in 0..MAX_SEND_ATTEMPTS {
            match self.session_mut()?.send(Some(input))? {
                SendStatus::Accepted => {
                    forwarded += self.drain(sink)?;
                    return Ok(forwarded);
                }
                SendStatus::Again => {
                    let n = self.drain(sink)?;
                    if n == 0 {
                        return Err(CodecError::Stalled(self.label.clone()).into());
                    }
                    forwarded += n;
                }
            }
        }

        Err(CodecError::Stalled(self.label.clone()).into())
    }

    /// Forward all currently available output to `sink`.
    pub fn drain(&mut self, sink: &mut dyn FnMut(O) -> Result<()>) -> Result<usize> {
        let mut forwarded = 0;
        loop {
            match self.session_mut()?.receive()? {
                Received::Item(out) => {
                    sink(out)?;
                    forwarded += 1;
                }
                Received::Again => break,
                Received::Eof => {
                    self.drained = true;
                    break;
                }
            }
        }
        Ok(forwarded)
    }

    /// Signal end of stream and drain the session to exhaustion.
    ///
    /// Only the first call flushes; later calls return `Ok(0)`.
    pub fn finish(&mut self, sink: &mut dyn FnMut(O) -> Result<()>) -> Result<usize> {
        if matches!(self.state, AdapterState::Flushing | AdapterState::Closed) {
            return Ok(0);
        }
        self.state = AdapterState::Flushing;

        let mut forwarded = 0;
        let mut accepted = false;
        for _ in 0..MAX_SEND_ATTEMPTS {
            match self.session_mut()?.send(None)? {
                SendStatus::Accepted => {
                    accepted = true;
                    break;
                }
                SendStatus::Again => {
                    let n = self.drain(sink)?;
                    if n == 0 {
                        return Err(CodecError::Stalled(self.label.clone()).into());
                    }
                    forwarded += n;
                }
            }
        }
        if !accepted {
            return Err(CodecError::Stalled(self.label.clone()).into());
        }

        while !self.drained {
            let n = self.drain(sink)?;
            if n == 0 && !self.drained {
                return Err(CodecError::Stalled(self.label.clone()).into());
            }
            forwarded += n;
        }

        tracing::trace!(codec = %self.label, forwarded, "codec flushed");
        Ok(forwarded)
    }

    /// Discard buffered state; the adapter accepts input again.
    pub fn reset(&mut self) -> Result<()> {
        self.session_mut()?.reset()?;
        self.state = AdapterState::Open;
        self.drained = false;
        Ok(())
    }

    /// Release the session. Idempotent.
    pub fn close(&mut self) {
        if self.session.take().is_some() {
            tracing::trace!(codec = %self.label, "codec closed");
        }
        self.state = AdapterState::Closed;
    }
}
