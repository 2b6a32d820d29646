//! Process-wide map from rendering worker to its [`RenderInstance`].
//!
//! Worker management binds an instance to each worker thread before it
//! evaluates anything; evaluation code looks the instance up for the thread
//! it runs on. A lookup on an unbound thread returns `None`.

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, ThreadId};

use dashmap::DashMap;

use crate::instance::RenderInstance;

/// An instance as held by the registry. Only the owning worker ever locks it.
pub type SharedInstance = Arc<Mutex<RenderInstance>>;

/// Identity of a rendering worker: the thread it runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(ThreadId);

impl WorkerId {
    pub fn current() -> Self {
        WorkerId(thread::current().id())
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

static REGISTRY: OnceLock<DashMap<WorkerId, SharedInstance>> = OnceLock::new();

fn registry() -> &'static DashMap<WorkerId, SharedInstance> {
    REGISTRY.get_or_init(DashMap::new)
}

/// The instance bound to the calling worker, if any.
pub fn current_instance() -> Option<SharedInstance> {
    registry()
        .get(&WorkerId::current())
        .map(|entry| Arc::clone(entry.value()))
}

/// Bind `instance` to the calling worker, returning the one it replaces.
pub fn bind_current(instance: SharedInstance) -> Option<SharedInstance> {
    let worker = WorkerId::current();
    tracing::debug!(%worker, "binding render instance");
    registry().insert(worker, instance)
}

/// Remove the calling worker's binding.
pub fn unbind_current() -> Option<SharedInstance> {
    let worker = WorkerId::current();
    tracing::debug!(%worker, "unbinding render instance");
    registry().remove(&worker).map(|(_, instance)| instance)
}

/// Keeps an instance bound to the current worker for the guard's lifetime.
///
/// On drop the binding is removed, unless something else has been bound to
/// the worker in the meantime.
pub struct WorkerBinding {
    worker: WorkerId,
    instance: SharedInstance,
    // Thread-bound: dropping on another worker would unbind the wrong entry.
    _not_send: PhantomData<*const ()>,
}

impl WorkerBinding {
    pub fn new(instance: SharedInstance) -> Self {
        bind_current(Arc::clone(&instance));
        Self {
            worker: WorkerId::current(),
            instance,
            _not_send: PhantomData,
        }
    }

    pub fn instance(&self) -> &SharedInstance {
        &self.instance
    }

    pub fn worker(&self) -> WorkerId {
        self.worker
    }
}

impl Drop for WorkerBinding {
    fn drop(&mut self) {
        let removed = registry()
            .remove_if(&self.worker, |_, bound| Arc::ptr_eq(bound, &self.instance))
            .is_some();
        if removed {
            tracing::debug!(worker = %self.worker, "render instance binding dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{RenderInstance, RenderParams};

    fn shared() -> SharedInstance {
        Arc::new(Mutex::new(RenderInstance::software(RenderParams::new(2, 2))))
    }

    // Each test runs on its own thread, so bindings never collide.

    #[test]
    fn test_unbound_worker_has_no_instance() {
        assert!(current_instance().is_none());
    }

    #[test]
    fn test_bind_and_unbind() {
        let instance = shared();
        assert!(bind_current(Arc::clone(&instance)).is_none());
        let found = current_instance().unwrap();
        assert!(Arc::ptr_eq(&found, &instance));
        assert!(unbind_current().is_some());
        assert!(current_instance().is_none());
    }

    #[test]
    fn test_binding_is_per_worker() {
        let _binding = WorkerBinding::new(shared());
        assert!(current_instance().is_some());
        let other = thread::spawn(|| current_instance().is_none()).join().unwrap();
        assert!(other);
    }

    #[test]
    fn test_binding_guard_unbinds_on_drop() {
        {
            let binding = WorkerBinding::new(shared());
            assert_eq!(binding.worker(), WorkerId::current());
            assert!(current_instance().is_some());
        }
        assert!(current_instance().is_none());
    }

    #[test]
    fn test_guard_keeps_replacement_binding() {
        let binding = WorkerBinding::new(shared());
        let replacement = shared();
        bind_current(Arc::clone(&replacement));
        drop(binding);
        let found = current_instance().unwrap();
        assert!(Arc::ptr_eq(&found, &replacement));
        unbind_current();
    }
}
