use std::fmt;
use std::sync::Arc;

use crate::context::Context;

/// A subscriber callback
///
/// Cloning keeps identity: register clones of the same `Handler` for
/// several events and it still runs only once per exit.
#[derive(Clone)]
pub struct Handler(Arc<dyn Fn(&Context) + Send + Sync>);

impl Handler {
    pub fn new<F>(func: F) -> Handler
        where F: Fn(&Context) + Send + Sync + 'static
    {
        Handler(Arc::new(func))
    }

    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn call(&self, ctx: &Context) {
        (self.0)(ctx)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Handler({:#x})", self.id())
    }
}

/// Handlers of one event kind, in registration order, without duplicates
#[derive(Debug, Clone, Default)]
pub(crate) struct HandlerSet {
    handlers: Vec<Handler>,
}

impl HandlerSet {
    pub fn insert(&mut self, handler: Handler) -> bool {
        if self.handlers.iter().any(|h| h.id() == handler.id()) {
            return false;
        }
        self.handlers.push(handler);
        true
    }

    pub fn snapshot(&self) -> Vec<Handler> {
        self.handlers.clone()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }
}
