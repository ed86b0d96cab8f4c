#![forbid(unsafe_code)]

//! Virtualized long-list render pipeline.
//!
//! # Role in longscroll
//! `longscroll` keeps a list of up to hundreds of thousands of
//! variable-height rows scrolling smoothly by materializing only the rows
//! near the visible area, while keeping scrollbar geometry correct and
//! avoiding blank regions under fast scrolling.
//!
//! # Primary responsibilities
//! - **Scheduler**: read / write / idle-write task phases per frame, with
//!   cancel-by-owner and a load factor consumers use to back off.
//! - **Block / BlockSet**: contiguous row runs rendered placeholder-first,
//!   upgraded outward from the focal row, sized adaptively from measured
//!   prepare cost.
//! - **LongScroll**: the coordinator wiring scroll events, the viewport,
//!   the velocity-shaped look-ahead buffer, and height feedback together.
//!
//! # How it fits in the system
//! The host implements [`Surface`] + [`FrameSource`] over its real
//! rendering tree and [`RowSource`] over its data, then forwards scroll
//! events and animation frames. Everything else (what to build, when to
//! measure, what to throw away) is decided here. [`headless`] provides a
//! deterministic in-memory host for tests.
//!
//! # Minimal example
//!
//! ```
//! use longscroll::headless::headless;
//! use longscroll::LongScroll;
//! use web_time::{Duration, Instant};
//!
//! // 10k rows that will all measure at 40 px (the pipeline assumes 30 px
//! // until it has seen them).
//! let (surface, rows) = headless(vec![40.0; 10_000]);
//! let mut scroll = LongScroll::new(rows);
//! scroll.attach(surface);
//!
//! // Drive a few frames the way a host's animation-frame loop would.
//! let mut now = Instant::now();
//! for _ in 0..5 {
//!     scroll.on_frame(now);
//!     now += Duration::from_millis(16);
//! }
//!
//! let stats = scroll.stats();
//! assert!(stats.live_blocks > 0);
//! ```

pub mod block;
pub mod block_set;
pub mod coordinator;
pub mod error;
pub mod frame;
pub mod headless;
pub mod job;
pub mod scheduler;
pub mod source;
pub mod surface;

pub use block::{Block, BlockId, RowSizeChange};
pub use block_set::{BlockSet, BlockSetConfig};
pub use coordinator::{BufferConfig, LongScroll, LongScrollConfig, PipelineStats};
pub use error::Error;
pub use frame::{FrameRequest, FrameSample, FrameSource, FrameTimer};
pub use job::Job;
pub use scheduler::{LoadFactorConfig, Scheduler, SchedulerEvent, TaskOwner, TaskPhase};
pub use source::RowSource;
pub use surface::Surface;

// The geometry kernel is part of the public API.
pub use longscroll_core::{
    HeightError, PxSpan, RowHeightIndex, RowSpan, Span, SpanError, VelocityConfig,
    VelocityTracker,
};
