use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use filmlab_core::params::{ParameterSet, SourceType};
use filmlab_core::{FilmProfiles, ImageBuf, RenderTarget, render_with};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Body of a high-precision render request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRequest {
    pub photo_id: String,
    pub params: ParameterSet,
    pub max_width: u32,
    pub source_type: SourceType,
}

impl RemoteRequest {
    pub fn new(photo_id: String, params: ParameterSet, max_width: u32) -> Self {
        let source_type = params.source_type;
        Self {
            photo_id,
            params,
            max_width,
            source_type,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("serialize preview request")
    }
}

/// A renderer that answers preview requests with a bitmap, typically
/// over the network.
pub trait RemoteRenderer: Send + Sync + 'static {
    fn render(&self, request: RemoteRequest) -> impl Future<Output = Result<ImageBuf>> + Send;
}

/// Answers requests locally with the CPU path, for use without a
/// render server.
pub struct InProcessRenderer {
    source: Arc<ImageBuf>,
    profiles: FilmProfiles,
}

impl InProcessRenderer {
    pub fn new(source: Arc<ImageBuf>, profiles: FilmProfiles) -> Self {
        Self { source, profiles }
    }
}

impl RemoteRenderer for InProcessRenderer {
    fn render(&self, request: RemoteRequest) -> impl Future<Output = Result<ImageBuf>> + Send {
        let source = self.source.clone();
        let profiles = self.profiles.clone();
        async move {
            let RemoteRequest {
                photo_id,
                mut params,
                max_width,
                source_type,
            } = request;
            params.set_source_type(source_type);
            debug!(photo_id, max_width, "in-process preview render");

            let width = max_width.min(source.width);
            let output = tokio::task::spawn_blocking(move || {
                render_with(&params, &profiles, &source, RenderTarget::export(width))
            })
            .await
            .context("preview render task panicked")?;
            Ok(output.image)
        }
    }
}
