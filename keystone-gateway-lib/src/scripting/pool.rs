use std::sync::{Arc, Mutex, PoisonError};

use mlua::Lua;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::scripting::new_interpreter;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("interpreter pool is closed")]
    Closed,

    #[error("failed to create interpreter: {0}")]
    Create(String),
}

struct PoolState {
    idle: Vec<Lua>,
    created: usize,
    closed: bool,
}

/// Fixed-capacity pool of isolated Lua interpreters
///
/// Instances are created lazily up to the capacity; when all are
/// checked out, `acquire` waits for a release. Interpreters are scratch
/// memory for one dispatch at a time, never shared concurrently.
pub struct LuaPool {
    state: Mutex<PoolState>,
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl LuaPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(PoolState { idle: Vec::new(), created: 0, closed: false }),
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Check out an interpreter together with its capacity permit
    ///
    /// The permit must flow back through `release`, `discard`, or
    /// `forget`; dropping it frees the slot either way.
    pub async fn acquire(&self) -> Result<(Lua, OwnedSemaphorePermit), PoolError> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        let reused = {
            let mut state = self.lock_state();
            if state.closed {
                return Err(PoolError::Closed);
            }
            match state.idle.pop() {
                Some(lua) => Some(lua),
                None => {
                    state.created += 1;
                    None
                }
            }
        };

        match reused {
            Some(lua) => Ok((lua, permit)),
            None => match new_interpreter() {
                Ok(lua) => Ok((lua, permit)),
                Err(e) => {
                    self.lock_state().created -= 1;
                    Err(PoolError::Create(e.to_string()))
                }
            },
        }
    }

    /// Return a healthy interpreter to the idle set
    pub fn release(&self, lua: Lua, permit: OwnedSemaphorePermit) {
        let mut state = self.lock_state();
        if state.closed {
            state.created -= 1;
            drop(lua);
        } else {
            state.idle.push(lua);
        }
        drop(permit);
    }

    /// Destroy an interpreter that must not be reused
    pub fn discard(&self, lua: Lua, permit: OwnedSemaphorePermit) {
        self.lock_state().created -= 1;
        drop(lua);
        drop(permit);
    }

    /// Free the slot of an interpreter whose ownership was lost
    /// (it will be dropped wherever it ended up)
    pub fn forget(&self, permit: OwnedSemaphorePermit) {
        self.lock_state().created -= 1;
        drop(permit);
    }

    /// Close the pool: destroy idle instances now, in-flight ones on
    /// their next release; pending acquires fail
    pub fn close(&self) {
        let mut state = self.lock_state();
        state.closed = true;
        let drained = std::mem::take(&mut state.idle);
        state.created -= drained.len();
        drop(state);
        drop(drained);
        self.slots.close();
    }

    /// Interpreters currently in existence (idle plus checked out)
    pub fn created(&self) -> usize {
        self.lock_state().created
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
