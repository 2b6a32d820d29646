use std::sync::PoisonError;

use tessera_render::{registry, RenderInstance};

/// What a node needs from its caller to evaluate: the worker's render
/// instance, or nothing at all.
///
/// A detached context is valid; nodes that need the GPU return `None` under
/// it without touching any state.
pub struct EvalContext<'a> {
    instance: Option<&'a mut RenderInstance>,
}

impl<'a> EvalContext<'a> {
    pub fn new(instance: &'a mut RenderInstance) -> Self {
        Self {
            instance: Some(instance),
        }
    }

    pub fn detached() -> Self {
        Self { instance: None }
    }

    pub fn has_instance(&self) -> bool {
        self.instance.is_some()
    }

    pub fn instance(&mut self) -> Option<&mut RenderInstance> {
        self.instance.as_deref_mut()
    }
}

/// Run `f` with a context built from the calling worker's registered
/// instance, or a detached context when the worker has none.
pub fn with_current_instance<R>(f: impl FnOnce(&mut EvalContext<'_>) -> R) -> R {
    match registry::current_instance() {
        Some(shared) => {
            let mut instance = shared.lock().unwrap_or_else(|poisoned| {
                tracing::warn!("render instance lock poisoned, continuing");
                PoisonError::into_inner(poisoned)
            });
            let mut cx = EvalContext::new(&mut instance);
            f(&mut cx)
        }
        None => f(&mut EvalContext::detached()),
    }
}
