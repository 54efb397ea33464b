use std::sync::Arc;
use std::time::Duration;

use http::Request;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::balancer::Backend;
use crate::proxy::{empty_request_body, SharedClient};
use crate::tenant::TenantRuntime;

/// Per-probe request deadline
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Owns the background probe tasks for every tenant's services
///
/// One task per service with a health path; intervals drift
/// independently. `stop` cancels them all and waits.
pub struct ProbeRunner {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ProbeRunner {
    pub fn start(tenants: &[Arc<TenantRuntime>], client: SharedClient) -> Self {
        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        for tenant in tenants {
            for backend in tenant.pool.backends() {
                if backend.health_path().is_none() {
                    continue;
                }
                let task = tokio::spawn(probe_loop(
                    Arc::clone(backend),
                    tenant.name.clone(),
                    tenant.health_interval,
                    client.clone(),
                    cancel.child_token(),
                ));
                tasks.push(task);
            }
        }

        info!(probes = tasks.len(), "health probes started");
        Self { cancel, tasks }
    }

    pub async fn stop(self) {
        self.cancel.cancel();
        for task in self.tasks {
            let _ = task.await;
        }
        info!("health probes stopped");
    }
}

async fn probe_loop(
    backend: Arc<Backend>,
    tenant: String,
    period: Duration,
    client: SharedClient,
    cancel: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let alive = probe_once(&backend, &client).await;
        if alive != backend.is_alive() {
            if alive {
                info!(%tenant, backend = backend.name(), "backend recovered");
            } else {
                warn!(%tenant, backend = backend.name(), "backend marked dead");
            }
        }
        backend.set_alive(alive);
    }
}

/// One probe round-trip; alive iff a 2xx arrives before the deadline
async fn probe_once(backend: &Backend, client: &SharedClient) -> bool {
    let Some(uri) = backend.health_uri() else {
        return true;
    };

    let req = match Request::get(uri).body(empty_request_body()) {
        Ok(req) => req,
        Err(e) => {
            debug!(backend = backend.name(), error = %e, "failed to build probe request");
            return false;
        }
    };

    match timeout(PROBE_TIMEOUT, client.request(req)).await {
        Ok(Ok(resp)) => resp.status().is_success(),
        Ok(Err(e)) => {
            debug!(backend = backend.name(), error = %e, "probe failed");
            false
        }
        Err(_) => {
            debug!(backend = backend.name(), "probe timed out");
            false
        }
    }
}
