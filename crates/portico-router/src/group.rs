//! Middleware scopes shared by a router and its groups.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::Middleware;

/// One level of the group tree. Routes keep a reference to the group they
/// were registered on, so middleware added to a group later still applies
/// to its earlier routes.
#[derive(Default)]
pub(crate) struct Group {
    parent: Option<Arc<Group>>,
    middleware: RwLock<Vec<Arc<dyn Middleware>>>,
}

impl Group {
    pub(crate) fn root() -> Self {
        Self::default()
    }

    pub(crate) fn child(parent: &Arc<Self>) -> Self {
        Self {
            parent: Some(Arc::clone(parent)),
            middleware: RwLock::default(),
        }
    }

    pub(crate) fn push(&self, middleware: Arc<dyn Middleware>) {
        self.middleware.write().push(middleware);
    }

    /// Appends this group's chain, ancestors first.
    pub(crate) fn collect_middleware(&self, out: &mut Vec<Arc<dyn Middleware>>) {
        if let Some(parent) = &self.parent {
            parent.collect_middleware(out);
        }
        out.extend(self.middleware.read().iter().cloned());
    }
}
