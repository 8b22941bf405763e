//! Pattern definitions: the built-in library and the registry that layers
//! built-in, file-based and inline definitions.

pub mod builtin;
pub mod registry;

pub use builtin::BUILTIN_PATTERNS;
pub use registry::{PatternRegistry, PatternSource, DEFAULT_PATTERNS_GLOB};
