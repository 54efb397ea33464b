use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::proxy::HttpError;

/// Global in-flight request cap
///
/// Rejection is immediate: a request arriving while all permits are
/// taken gets 503 rather than queueing.
#[derive(Clone)]
pub struct ConcurrencyLimit {
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyLimit {
    pub fn new(max_in_flight: usize) -> Self {
        Self { semaphore: Arc::new(Semaphore::new(max_in_flight)) }
    }

    pub fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore).try_acquire_owned().ok()
    }
}

/// Buffer the request body, enforcing the configured cap
///
/// Oversized bodies fail with 413 regardless of which route the request
/// would have taken.
pub async fn read_body_capped(body: Incoming, limit: u64) -> Result<Bytes, HttpError> {
    let limited = Limited::new(body, limit as usize);
    match limited.collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(HttpError::BodyTooLarge),
        Err(e) => Err(HttpError::BodyRead(e.to_string())),
    }
}
