//! # Command Pool Manager
//!
//! Transfer commands have to be recorded into a command-recording resource, and a single
//! resource must never be recorded into from two threads at once. Creating and destroying
//! these resources per upload is expensive, so a fixed set of `K` is created up front and
//! handed out one per concurrent uploader.
//!
//! ## Acquisition
//!
//! [`CommandPoolManager::acquire`] never blocks: it scans the slots with `try_lock` and
//! returns the first free one. When every slot is busy it returns `None` and the caller is
//! expected to try again later (the terrain simply retries on the next frame). Blocking
//! here would serialize uploaders behind whichever thread holds a slot the longest.
//!
//! The returned guard releases its slot when dropped, which covers every exit path of an
//! upload, including early returns on error.

use std::{
    sync::{Mutex, MutexGuard, TryLockError},
    thread,
    time::Duration,
};

use super::GraphicsBackend;
use crate::engine_state::error::TerrainResult;

/// Exclusive access to one command pool slot. Dropping it frees the slot.
pub type CommandPoolGuard<'a, P> = MutexGuard<'a, P>;

/// A fixed-size set of command-recording resources, each behind its own lock.
#[derive(Debug)]
pub struct CommandPoolManager<P> {
    slots: Vec<Mutex<P>>,
}

impl<P: Send> CommandPoolManager<P> {
    /// Creates `count` command pools on `backend`.
    ///
    /// If any creation fails, the pools created so far are destroyed before the error is
    /// returned.
    pub fn new<B>(backend: &B, count: usize) -> TerrainResult<Self>
    where
        B: GraphicsBackend<CommandPool = P>,
    {
        let mut pools = Vec::with_capacity(count);
        for i in 0..count {
            match backend.create_command_pool(&format!("Transfer Command Pool {i}")) {
                Ok(pool) => pools.push(pool),
                Err(err) => {
                    for pool in pools {
                        backend.destroy_command_pool(pool);
                    }
                    return Err(err);
                }
            }
        }

        log::info!("Created {count} transfer command pools");

        Ok(Self::from_pools(pools))
    }

    /// Wraps already-created pools.
    pub fn from_pools(pools: Vec<P>) -> Self {
        Self {
            slots: pools.into_iter().map(Mutex::new).collect(),
        }
    }

    /// Returns the first slot that can be locked without blocking, or `None` if all are busy.
    pub fn acquire(&self) -> Option<CommandPoolGuard<'_, P>> {
        for slot in &self.slots {
            match slot.try_lock() {
                Ok(guard) => return Some(guard),
                // A panicking uploader cannot leave a pool half-recorded: every copy is
                // submitted and waited on before the guard is released.
                Err(TryLockError::Poisoned(poisoned)) => return Some(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => continue,
            }
        }
        None
    }

    /// Retries [`acquire`](Self::acquire) up to `attempts` times, sleeping a jittered,
    /// linearly growing delay between scans.
    pub fn acquire_with_backoff(
        &self,
        attempts: u32,
        base_delay: Duration,
    ) -> Option<CommandPoolGuard<'_, P>> {
        for attempt in 0..attempts {
            if let Some(guard) = self.acquire() {
                return Some(guard);
            }
            if attempt + 1 < attempts {
                let jitter = base_delay.mul_f64(fastrand::f64());
                thread::sleep(base_delay * (attempt + 1) + jitter);
            }
        }
        None
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the manager has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Hands every pool back to the backend.
    pub fn destroy<B>(self, backend: &B)
    where
        B: GraphicsBackend<CommandPool = P>,
    {
        let count = self.slots.len();
        for slot in self.slots {
            let pool = slot
                .into_inner()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            backend.destroy_command_pool(pool);
        }
        log::info!("Destroyed {count} transfer command pools");
    }
}
