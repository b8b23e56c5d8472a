//! Source spans for call-site locations.
//!
//! The host compiler hands the analyzer byte spans for every invocation it
//! reports. Diagnostics point back at those spans.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte offset into a source file.
pub type TextPos = u32;

/// `start` plus `length`, in bytes. A document may omit `length`.
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: TextPos,
    #[serde(default)]
    pub length: TextPos,
}

impl TextSpan {
    #[inline]
    pub fn new(start: TextPos, length: TextPos) -> Self {
        Self { start, length }
    }

    /// Exclusive end offset.
    #[inline]
    pub fn end(&self) -> TextPos {
        self.start.saturating_add(self.length)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl fmt::Debug for TextSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextSpan({}+{})", self.start, self.length)
    }
}

impl fmt::Display for TextSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end())
    }
}
