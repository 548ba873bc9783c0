//! Admission-controlled render pipeline
//!
//! Every render request is one unit of work:
//!
//! 1. wait for an admission permit (at most `max_connections` in flight)
//! 2. validate the raw parameters
//! 3. serve from the disk cache when possible
//! 4. otherwise render inline (small, medium) or via the heavy worker (big, ultra)
//! 5. encode to PNG and hand the bytes back to the caller
//! 6. write the bytes to the cache, best-effort, after the caller has them
//!
//! Each unit of work runs in its own task and holds its permit until the cache
//! write finishes. A caller that stops waiting does not cancel the work; the
//! render still completes and still populates the cache.

use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Semaphore, oneshot};
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::errors::{AppError, AppResult};
use crate::heavy_queue::HeavyRequestScheduler;
use crate::models::{Fingerprint, RenderRequest};
use crate::render::{Bitmap, RenderEngine, encode_png};
use crate::utils::validation::{RawRenderParams, validate_render_params};

/// Where the response bytes came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }
}

/// A successfully served render
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub fingerprint: Fingerprint,
    pub png: Bytes,
    pub cache_status: CacheStatus,
}

/// The front door of the render pipeline
#[derive(Clone)]
pub struct RenderService {
    admission: Arc<Semaphore>,
    max_connections: usize,
    cache: CacheStore,
    engine: Arc<dyn RenderEngine>,
    scheduler: HeavyRequestScheduler,
}

impl RenderService {
    pub fn new(
        cache: CacheStore,
        engine: Arc<dyn RenderEngine>,
        scheduler: HeavyRequestScheduler,
        max_connections: usize,
    ) -> Self {
        Self {
            admission: Arc::new(Semaphore::new(max_connections)),
            max_connections,
            cache,
            engine,
            scheduler,
        }
    }

    /// Run one render request through the pipeline.
    ///
    /// Waits for an admission slot first. Returns once the PNG bytes are
    /// available; the cache write continues in the background.
    ///
    /// # Errors
    /// - `AppError::Validation` for bad parameters
    /// - `AppError::Scheduler` if the heavy worker is gone
    /// - `AppError::Encode` / `AppError::Internal` for render or encode failures
    pub async fn handle(&self, raw: RawRenderParams) -> AppResult<RenderOutcome> {
        let permit = self
            .admission
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AppError::internal("admission control is closed"))?;

        let (reply, result) = oneshot::channel();
        let service = self.clone();
        tokio::spawn(async move {
            let _permit = permit;
            service.serve(raw, reply).await;
        });

        result
            .await
            .map_err(|_| AppError::internal("render task ended without a result"))?
    }

    /// Admission ceiling
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Free admission slots right now
    pub fn available_permits(&self) -> usize {
        self.admission.available_permits()
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn scheduler(&self) -> &HeavyRequestScheduler {
        &self.scheduler
    }

    async fn serve(
        &self,
        raw: RawRenderParams,
        reply: oneshot::Sender<AppResult<RenderOutcome>>,
    ) {
        let result = self.process(&raw).await;

        let pending_store = match &result {
            Ok(outcome) if outcome.cache_status == CacheStatus::Miss => {
                Some((outcome.fingerprint.clone(), outcome.png.clone()))
            }
            _ => None,
        };

        if reply.send(result).is_err() {
            debug!("Requester went away before the render finished");
        }

        if let Some((fingerprint, png)) = pending_store {
            self.cache.store(&fingerprint, &png).await;
        }
    }

    async fn process(&self, raw: &RawRenderParams) -> AppResult<RenderOutcome> {
        let request = validate_render_params(raw).inspect_err(|e| {
            info!(field = e.field(), "Rejected render request: {}", e);
        })?;
        let fingerprint = Fingerprint::of(&request);

        if let Some(png) = self.cache.lookup(&fingerprint).await {
            return Ok(RenderOutcome {
                fingerprint,
                png,
                cache_status: CacheStatus::Hit,
            });
        }

        let bitmap = if request.is_heavy() {
            self.scheduler.submit(request).await?
        } else {
            self.render_inline(request).await?
        };

        let png = tokio::task::spawn_blocking(move || encode_png(&bitmap))
            .await
            .map_err(|e| AppError::internal(format!("encode task failed: {e}")))?
            .inspect_err(|e| {
                warn!(fingerprint = %fingerprint, "Failed to encode image: {}", e);
            })?;

        Ok(RenderOutcome {
            fingerprint,
            png,
            cache_status: CacheStatus::Miss,
        })
    }

    async fn render_inline(&self, request: RenderRequest) -> AppResult<Bitmap> {
        let engine = self.engine.clone();
        tokio::task::spawn_blocking(move || engine.render(&request))
            .await
            .map_err(|e| AppError::internal(format!("render task failed: {e}")))
    }
}
