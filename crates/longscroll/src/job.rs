#![forbid(unsafe_code)]

//! Scheduled units of pipeline work.
//!
//! Every suspension point in the pipeline is a [`Job`] queued on the
//! [`Scheduler`](crate::scheduler::Scheduler); the coordinator's drain loop
//! dispatches each popped job against current state. A job naming a
//! [`BlockId`] that no longer resolves was owned by a freed block and
//! resolves to cancellation.

use crate::block::{BlockId, RowSizeChange};

/// One schedulable step of pipeline work.
#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    /// Recompute the viewport from container geometry. Read phase.
    UpdateViewport,
    /// Run the cover pass for the current target. Write phase.
    EnsureCovers,
    /// Give the block set one preparation opportunity. Idle-write phase.
    DoWork,
    /// Append a freshly created block host to the pane. Write phase.
    AttachHost(BlockId),
    /// Swap a block's children for its placeholder or real fragment.
    /// Idle-write phase.
    Mount {
        block: BlockId,
        /// Captured when the render was requested; `prepared` may have
        /// flipped since.
        placeholder_render: bool,
    },
    /// Measure a block's freshly mounted elements. Read phase.
    Measure { block: BlockId, real_render: bool },
    /// Apply one measured height to a placeholder element. Write phase.
    ResizePlaceholder { block: BlockId, row: usize, px: f64 },
    /// Commit measured row heights to the height index. Write phase.
    CommitRowSizes(Vec<RowSizeChange>),
    /// Programmatic scroll of the container. Write phase.
    SetScrollTop(f64),
}

impl Job {
    /// Human-readable name for logging.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpdateViewport => "update_viewport",
            Self::EnsureCovers => "ensure_covers",
            Self::DoWork => "do_work",
            Self::AttachHost(_) => "attach_host",
            Self::Mount { .. } => "mount",
            Self::Measure { .. } => "measure",
            Self::ResizePlaceholder { .. } => "resize_placeholder",
            Self::CommitRowSizes(_) => "commit_row_sizes",
            Self::SetScrollTop(_) => "set_scroll_top",
        }
    }
}
