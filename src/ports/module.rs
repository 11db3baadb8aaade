use eyre::Result;

use crate::core::registry::Binder;

/// A unit of dependency wiring contributed by an application.
///
/// Modules only declare bindings; construction happens later, eagerly, when
/// the injector is built.
pub trait Module: Send + Sync {
    /// Name used in diagnostics (duplicate bindings, failed configuration).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn configure(&self, binder: &mut Binder) -> Result<()>;
}
