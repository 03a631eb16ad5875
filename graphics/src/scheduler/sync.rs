//! GPU synchronization primitives.
//!
//! [`Semaphore`]s order batches on the GPU timeline. [`Fence`]s let the CPU
//! wait for a batch: the renderer keeps one per image slot and waits on it
//! before writing that slot's per-image copies again.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// GPU-GPU ordering between two submitted batches.
///
/// Cannot be waited on from the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Semaphore {
    id: u64,
}

impl Semaphore {
    /// Create a semaphore with the given id.
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    /// Unique id within a frame schedule.
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Status of a fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    /// The GPU work has not completed.
    Unsignaled,
    /// The GPU work has completed.
    Signaled,
}

#[derive(Debug, Default)]
struct FenceState {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

/// CPU-GPU synchronization primitive.
///
/// Clones share state: the backend keeps one clone and signals it when the
/// batch retires, the renderer keeps another and waits on it.
///
/// # Example
///
/// ```ignore
/// let fence = submitter.submit(&batch);
/// if !fence.wait_timeout(Duration::from_millis(100)) {
///     log::warn!("GPU is falling behind");
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Fence {
    state: Arc<FenceState>,
}

impl Fence {
    /// Create a fence in the unsignaled state.
    pub fn new_unsignaled() -> Self {
        Self::default()
    }

    /// Create a fence in the signaled state.
    pub fn new_signaled() -> Self {
        let fence = Self::default();
        fence.signal();
        fence
    }

    /// Current status.
    pub fn status(&self) -> FenceStatus {
        if *self.state.signaled.lock() {
            FenceStatus::Signaled
        } else {
            FenceStatus::Unsignaled
        }
    }

    /// Returns true if the fence is signaled (non-blocking).
    pub fn is_signaled(&self) -> bool {
        self.status() == FenceStatus::Signaled
    }

    /// Block until the fence is signaled.
    pub fn wait(&self) {
        let mut signaled = self.state.signaled.lock();
        while !*signaled {
            self.state.condvar.wait(&mut signaled);
        }
    }

    /// Block until the fence is signaled or `timeout` elapses.
    ///
    /// Returns `true` if the fence was signaled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut signaled = self.state.signaled.lock();
        if *signaled {
            return true;
        }
        let _ = self
            .state
            .condvar
            .wait_while_for(&mut signaled, |signaled| !*signaled, timeout);
        *signaled
    }

    /// Reset to unsignaled. Only valid when no GPU work is pending on it.
    pub fn reset(&self) {
        *self.state.signaled.lock() = false;
    }

    /// Mark the GPU work as complete and wake every waiter.
    ///
    /// Called by queue submitters when the batch retires.
    pub fn signal(&self) {
        *self.state.signaled.lock() = true;
        self.state.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semaphore_id() {
        assert_eq!(Semaphore::new(42).id(), 42);
    }

    #[test]
    fn test_fence_initial_states() {
        assert_eq!(Fence::new_unsignaled().status(), FenceStatus::Unsignaled);
        assert!(Fence::new_signaled().is_signaled());
    }

    #[test]
    fn test_fence_signal_from_other_thread() {
        let fence = Fence::new_unsignaled();
        let gpu = fence.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            gpu.signal();
        });

        fence.wait();
        assert!(fence.is_signaled());
        handle.join().unwrap();
    }

    #[test]
    fn test_fence_wait_timeout() {
        let fence = Fence::new_unsignaled();
        assert!(!fence.wait_timeout(Duration::from_millis(10)));
        fence.signal();
        assert!(fence.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_fence_reset() {
        let fence = Fence::new_signaled();
        fence.reset();
        assert!(!fence.is_signaled());
    }

    #[test]
    fn test_fence_clone_shares_state() {
        let a = Fence::new_unsignaled();
        let b = a.clone();
        a.signal();
        assert!(b.is_signaled());
    }
}
