pub mod application;
pub mod assembler;
pub mod registry;

pub use application::{Application, Singleton, SingletonSet};
pub use assembler::{Assembly, AssemblyError, BootstrapModule, ServiceAssembler};
pub use registry::{Binder, InjectionError, Injector, Key, Resolver};
