use std::sync::Arc;
use std::time::{Duration, Instant};

use filmlab_core::ImageBuf;
use filmlab_core::config::PreviewConfig;
use filmlab_core::params::{Fingerprint, ParameterSet};
use tracing::{debug, warn};

use crate::remote::RemoteRequest;

/// A request the orchestrator has decided to send, tagged with its
/// sequence id.
#[derive(Clone, Debug)]
pub struct IssuedRequest {
    pub seq: u64,
    pub fingerprint: Fingerprint,
    pub request: RemoteRequest,
}

/// What the caller should put on screen.
#[derive(Clone, Debug, PartialEq)]
pub enum Display {
    /// The high-precision frame matches the current parameters.
    Server(Arc<ImageBuf>),
    /// Show the local GPU/CPU render.
    Local,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseOutcome {
    Accepted,
    /// A newer request was issued after this one.
    Stale,
    /// The latest request failed; the previous frame stays.
    Failed,
}

struct ServerFrame {
    fingerprint: Fingerprint,
    image: Arc<ImageBuf>,
}

/// Debounces parameter changes into high-precision render requests and
/// drops responses that a newer request has superseded.
///
/// Time is passed in by the caller, so the state machine is driven the
/// same way by the tokio driver and by tests.
pub struct PreviewOrchestrator {
    photo_id: String,
    debounce: Duration,
    max_width: u32,

    current: Option<(Fingerprint, ParameterSet)>,
    deadline: Option<Instant>,

    next_seq: u64,
    in_flight: Option<(u64, Fingerprint)>,
    server: Option<ServerFrame>,
}

impl PreviewOrchestrator {
    pub fn new(photo_id: impl Into<String>, config: &PreviewConfig) -> Self {
        Self {
            photo_id: photo_id.into(),
            debounce: Duration::from_millis(config.debounce_ms),
            max_width: config.max_width,
            current: None,
            deadline: None,
            next_seq: 1,
            in_flight: None,
            server: None,
        }
    }

    /// Record a parameter change and restart the debounce window.
    pub fn params_changed(&mut self, params: &ParameterSet, now: Instant) {
        let fingerprint = params.fingerprint();
        if self
            .current
            .as_ref()
            .is_some_and(|(fp, _)| *fp == fingerprint)
        {
            return;
        }
        self.current = Some((fingerprint, params.clone()));
        self.deadline = Some(now + self.debounce);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Issue a request once the debounce window has elapsed. Nothing is
    /// issued when the server frame already matches, or when a request
    /// for the same parameters is in flight.
    pub fn poll_due(&mut self, now: Instant) -> Option<IssuedRequest> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        self.deadline = None;

        let (fingerprint, params) = self.current.as_ref()?;
        if self.matches_server() {
            debug!("server frame already current, skipping request");
            return None;
        }
        if self.in_flight.is_some_and(|(_, fp)| fp == *fingerprint) {
            return None;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight = Some((seq, *fingerprint));
        debug!(seq, "issuing preview request");

        Some(IssuedRequest {
            seq,
            fingerprint: *fingerprint,
            request: RemoteRequest::new(self.photo_id.clone(), params.clone(), self.max_width),
        })
    }

    /// Feed back a response. Only the latest issued sequence id is
    /// accepted; failures keep the last good frame.
    pub fn accept_response(
        &mut self,
        seq: u64,
        result: anyhow::Result<ImageBuf>,
    ) -> ResponseOutcome {
        let Some((latest, fingerprint)) = self.in_flight else {
            debug!(seq, "response with nothing in flight dropped");
            return ResponseOutcome::Stale;
        };
        if seq != latest {
            debug!(seq, latest, "stale preview response dropped");
            return ResponseOutcome::Stale;
        }
        self.in_flight = None;

        match result {
            Ok(image) => {
                self.server = Some(ServerFrame {
                    fingerprint,
                    image: Arc::new(image),
                });
                ResponseOutcome::Accepted
            }
            Err(err) => {
                warn!(seq, error = %err, "preview render failed, keeping last frame");
                ResponseOutcome::Failed
            }
        }
    }

    /// True when the last accepted server frame was rendered from
    /// parameters structurally equal to the current ones.
    pub fn matches_server(&self) -> bool {
        match (&self.current, &self.server) {
            (Some((fp, _)), Some(frame)) => *fp == frame.fingerprint,
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some() || self.in_flight.is_some()
    }

    pub fn display(&self) -> Display {
        match &self.server {
            Some(frame) if self.matches_server() => Display::Server(frame.image.clone()),
            _ => Display::Local,
        }
    }

    /// The most recent accepted server frame, current or not.
    pub fn last_server_frame(&self) -> Option<Arc<ImageBuf>> {
        self.server.as_ref().map(|f| f.image.clone())
    }
}
