use std::sync::Arc;

use axum::Router;

/// A long-lived service object exposed at the request-dispatch boundary.
pub trait Resource: Send + Sync + 'static {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Routes served by this resource, relative to the mount point.
    fn routes(self: Arc<Self>) -> Router;
}

/// A cross-cutting component (serialization, filters) attached to the
/// dispatch router rather than serving routes of its own.
pub trait Provider: Send + Sync + 'static {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn attach(self: Arc<Self>, router: Router) -> Router;
}
