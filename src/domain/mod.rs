// Domain layer: the persisted record, the provenance-carrying callable and the ports.

pub mod model;
pub mod ports;

pub use model::{PortableCallable, SerializedCallable};
pub use ports::{ImportHook, LoaderImports, ModuleLoader, NoImports};
