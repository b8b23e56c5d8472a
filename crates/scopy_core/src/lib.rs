//! scopy_core: Core utilities shared by the scope runtime and the analyzer.
//!
//! Provides string interning for routine and type names, source spans for
//! call-site locations, and Fx-hashed collections.

pub mod collections;
pub mod intern;
pub mod text;

// Re-export commonly used types
pub use intern::{InternedString, StringInterner};
pub use text::TextSpan;
