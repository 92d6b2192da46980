//! Application context: the state every request handler shares.
//!
//! Created once at startup and handed to the HTTP layer. The model handle is
//! write-once; the busy flag is advisory and only reported, never used for
//! admission. Admission control is opt-in through a semaphore bound.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::adapter::InferenceAdapter;
use crate::error::{BridgeError, LoadError};
use crate::handle::ModelHandle;
use crate::image_input::decode_image_payload;
use crate::types::{InferenceResult, Tier};

pub struct AppContext {
    tier: Tier,
    model_label: String,
    handle: OnceLock<ModelHandle>,
    busy: AtomicBool,
    admission: Option<Semaphore>,
    adapter: InferenceAdapter,
}

impl AppContext {
    pub fn new(tier: Tier, model_label: impl Into<String>, adapter: InferenceAdapter) -> Self {
        Self {
            tier,
            model_label: model_label.into(),
            handle: OnceLock::new(),
            busy: AtomicBool::new(false),
            admission: None,
            adapter,
        }
    }

    /// Bound the number of inferences running at once.
    pub fn with_max_concurrent(mut self, permits: usize) -> Self {
        self.admission = Some(Semaphore::new(permits));
        self
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn model_label(&self) -> &str {
        &self.model_label
    }

    pub fn is_ready(&self) -> bool {
        self.handle.get().is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Install the loaded backend. Fails if the handle does not fit the tier or
    /// a handle is already installed.
    pub fn install(&self, handle: ModelHandle) -> Result<(), LoadError> {
        handle.check_tier(self.tier)?;
        self.handle.set(handle).map_err(|_| LoadError::AlreadyLoaded)?;
        info!(tier = %self.tier, model = %self.model_label, "Model handle installed");
        Ok(())
    }

    /// Full request lifecycle: busy flag, readiness, decode, inference.
    pub async fn process(&self, image_base64: &str) -> Result<InferenceResult, BridgeError> {
        let _permit = match &self.admission {
            Some(semaphore) => Some(
                semaphore
                    .acquire()
                    .await
                    .map_err(|_| BridgeError::Inference("admission semaphore closed".into()))?,
            ),
            None => None,
        };
        let _busy = BusyGuard::engage(&self.busy);

        let handle = self
            .handle
            .get()
            .ok_or_else(|| BridgeError::NotReady(self.tier.not_ready_message().to_string()))?;

        info!(payload_bytes = image_base64.len(), "Received OCR request");

        let payload = image_base64.to_owned();
        let image = tokio::task::spawn_blocking(move || decode_image_payload(&payload))
            .await
            .map_err(BridgeError::inference)?
            .map_err(|e| {
                warn!(error = %e, "Rejected image payload");
                e
            })?;
        info!(width = image.width(), height = image.height(), "Image decoded");

        let text = self.adapter.infer(handle, image).await?;
        Ok(InferenceResult {
            text,
            tier: self.tier,
        })
    }
}

/// Holds the busy flag up for its lifetime.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn engage(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self { flag }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
        debug!("Busy flag cleared");
    }
}
