//! The runtime instance.

use crate::context::ScopeContext;
use crate::frame::{FrameHandle, ScopeFrame, DEFAULT_SCOPE_LABEL};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Owns the process root frame that fresh contexts start from.
///
/// Create one at startup and hand out contexts from it. The root frame is
/// created the first time a context is requested; there is no teardown.
pub struct ScopeRuntime {
    root_label: String,
    root: OnceLock<Arc<ScopeFrame>>,
}

impl ScopeRuntime {
    pub fn new() -> Self {
        Self::with_root_label(DEFAULT_SCOPE_LABEL)
    }

    pub fn with_root_label(label: impl Into<String>) -> Self {
        Self {
            root_label: label.into(),
            root: OnceLock::new(),
        }
    }

    fn root_frame(&self) -> &Arc<ScopeFrame> {
        self.root.get_or_init(|| {
            debug!(label = %self.root_label, "root scope created");
            ScopeFrame::root(&self.root_label)
        })
    }

    /// A new context whose current frame is the process root.
    pub fn context(&self) -> ScopeContext {
        ScopeContext::at(Arc::clone(self.root_frame()))
    }

    pub fn root(&self) -> FrameHandle {
        FrameHandle::new(Arc::clone(self.root_frame()))
    }

    /// Whether the root frame exists yet.
    pub fn is_initialized(&self) -> bool {
        self.root.get().is_some()
    }
}

impl Default for ScopeRuntime {
    fn default() -> Self {
        Self::new()
    }
}
