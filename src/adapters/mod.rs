// Adapters layer: concrete module loaders and the native modules they ship with.

pub mod registry;
pub mod stdlib;

pub use registry::ModuleRegistry;
