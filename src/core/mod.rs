pub mod classifier;
pub mod codec;
pub mod namespace;
pub mod serializable;
pub mod validator;

pub use classifier::{classify, dedent_by_first_line, extract_source, Classification};
pub use codec::{deserialize_in_namespace, CallableCodec, CodecSettings};
pub use namespace::{namespace_for_module, namespace_for_modules, resolve, Namespace};
pub use serializable::SerializableCallable;
pub use validator::{SandboxImports, SandboxValidator, ValidationReport};
