use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use http::Uri;

use crate::config::Service;
use crate::error::{GatewayError, Result};

/// Runtime wrapper over a configured service
///
/// The alive flag starts true and is owned by the probe loop; request
/// failures never touch it.
pub struct Backend {
    name: String,
    url: String,
    authority: String,
    /// Path component of the base URL, "" when the URL has no path
    base_path: String,
    health_path: Option<String>,
    alive: AtomicBool,
}

impl Backend {
    fn from_service(svc: &Service) -> Result<Self> {
        let uri: Uri = svc.url.parse()?;
        let authority = uri
            .authority()
            .ok_or_else(|| GatewayError::Config(format!("Service {} url has no host", svc.name)))?
            .to_string();
        let base_path = match uri.path() {
            "/" | "" => String::new(),
            p => p.trim_end_matches('/').to_string(),
        };
        Ok(Self {
            name: svc.name.clone(),
            url: svc.url.clone(),
            authority,
            base_path,
            health_path: svc.health.clone(),
            alive: AtomicBool::new(true),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn health_path(&self) -> Option<&str> {
        self.health_path.as_deref()
    }

    /// Full probe URI, None when the service has no health path
    pub fn health_uri(&self) -> Option<Uri> {
        let health = self.health_path.as_deref()?;
        format!("http://{}{}{}", self.authority, self.base_path, health)
            .parse()
            .ok()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Relaxed);
    }
}

/// A tenant's ordered backends plus the round-robin cursor
///
/// The cursor mutex is held only across one O(n) pick.
pub struct BackendPool {
    backends: Vec<Arc<Backend>>,
    cursor: Mutex<usize>,
}

impl BackendPool {
    pub fn new(services: &[Service]) -> Result<Self> {
        let backends = services
            .iter()
            .map(|svc| Backend::from_service(svc).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        if backends.is_empty() {
            return Err(GatewayError::Config("Backend pool needs at least one service".to_string()));
        }
        // Start one before the first backend so the first pick is index 0.
        let cursor = Mutex::new(backends.len() - 1);
        Ok(Self { backends, cursor })
    }

    /// Next live backend by round-robin, starting one past the previous
    /// pick. Returns None only when every backend is marked dead.
    pub fn next(&self) -> Option<Arc<Backend>> {
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let n = self.backends.len();
        for step in 1..=n {
            let idx = (*cursor + step) % n;
            if self.backends[idx].is_alive() {
                *cursor = idx;
                return Some(Arc::clone(&self.backends[idx]));
            }
        }
        None
    }

    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn alive_count(&self) -> usize {
        self.backends.iter().filter(|b| b.is_alive()).count()
    }
}
