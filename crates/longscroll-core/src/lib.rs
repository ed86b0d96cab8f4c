#![forbid(unsafe_code)]

//! Geometry and measurement kernel for the longscroll virtualizer.
//!
//! # Role in longscroll
//! `longscroll-core` holds the pure model types the render pipeline is built
//! on: the half-open [`Span`] shared by row and pixel space, the
//! Fenwick-backed [`RowHeightIndex`] that translates between the two, and
//! the [`VelocityTracker`] that smooths raw scroll samples.
//!
//! # How it fits in the system
//! The `longscroll` engine crate owns the scheduler, blocks, and
//! coordinator; everything here is host-agnostic and deterministic, which is
//! what makes the engine testable without a real rendering surface.

pub mod height_index;
pub mod span;
pub mod velocity;

pub use height_index::{HeightError, RowHeightIndex};
pub use span::{PxSpan, RowSpan, Span, SpanError, SpanScalar};
pub use velocity::{VelocityConfig, VelocityTracker};
