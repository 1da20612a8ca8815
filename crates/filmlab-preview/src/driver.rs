//! Runs a [`PreviewOrchestrator`] on a tokio task: parameter updates come
//! in over a channel, remote renders run as spawned tasks and accepted
//! frames go back out as events.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use filmlab_core::ImageBuf;
use filmlab_core::params::ParameterSet;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use crate::orchestrator::{PreviewOrchestrator, ResponseOutcome};
use crate::remote::RemoteRenderer;

#[derive(Clone, Debug)]
pub enum PreviewEvent {
    /// A high-precision frame for the latest parameters.
    Frame { seq: u64, image: Arc<ImageBuf> },
    /// The latest request failed; keep showing the previous frame.
    Failed { seq: u64, error: String },
}

pub struct PreviewHandle {
    params: mpsc::UnboundedSender<ParameterSet>,
    events: mpsc::UnboundedReceiver<PreviewEvent>,
    task: JoinHandle<()>,
}

impl PreviewHandle {
    pub fn update(&self, params: &ParameterSet) -> Result<()> {
        self.params
            .send(params.clone())
            .map_err(|_| anyhow!("preview driver has stopped"))
    }

    pub async fn next_event(&mut self) -> Option<PreviewEvent> {
        self.events.recv().await
    }

    /// Stop accepting updates and wait for the driver to exit.
    pub async fn shutdown(self) {
        drop(self.params);
        if let Err(err) = self.task.await {
            warn!(error = %err, "preview driver task failed");
        }
    }
}

/// Spawn the driver loop on the current tokio runtime.
pub fn spawn<R: RemoteRenderer>(renderer: Arc<R>, orchestrator: PreviewOrchestrator) -> PreviewHandle {
    let (params_tx, params_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(renderer, orchestrator, params_rx, events_tx));
    PreviewHandle {
        params: params_tx,
        events: events_rx,
        task,
    }
}

async fn run<R: RemoteRenderer>(
    renderer: Arc<R>,
    mut orchestrator: PreviewOrchestrator,
    mut params_rx: mpsc::UnboundedReceiver<ParameterSet>,
    events_tx: mpsc::UnboundedSender<PreviewEvent>,
) {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(u64, Result<ImageBuf>)>();

    loop {
        let deadline = orchestrator.deadline();
        let wake = deadline.map(Instant::from_std).unwrap_or_else(Instant::now);

        tokio::select! {
            msg = params_rx.recv() => match msg {
                Some(params) => orchestrator.params_changed(&params, Instant::now().into_std()),
                None => {
                    debug!("preview parameter channel closed; stopping driver");
                    break;
                }
            },
            _ = sleep_until(wake), if deadline.is_some() => {
                if let Some(issued) = orchestrator.poll_due(Instant::now().into_std()) {
                    let renderer = renderer.clone();
                    let done_tx = done_tx.clone();
                    tokio::spawn(async move {
                        let result = renderer.render(issued.request).await;
                        let _ = done_tx.send((issued.seq, result));
                    });
                }
            }
            Some((seq, result)) = done_rx.recv() => {
                let error = result.as_ref().err().map(|e| format!("{e:#}"));
                let event = match orchestrator.accept_response(seq, result) {
                    ResponseOutcome::Accepted => orchestrator
                        .last_server_frame()
                        .map(|image| PreviewEvent::Frame { seq, image }),
                    ResponseOutcome::Failed => error.map(|error| PreviewEvent::Failed { seq, error }),
                    ResponseOutcome::Stale => None,
                };
                if let Some(event) = event
                    && events_tx.send(event).is_err()
                {
                    debug!("preview event receiver dropped; stopping driver");
                    break;
                }
            }
        }
    }
}
