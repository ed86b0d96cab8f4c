#![forbid(unsafe_code)]

//! Row-data source contract.

/// Provider of real and placeholder row elements.
///
/// The element type is shared with the [`Surface`](crate::surface::Surface)
/// the rows will be attached to. Real rows may be expensive to build (that
/// cost is what drives adaptive block sizing); placeholders must be cheap,
/// since they are created for every row of every live block.
///
/// # Styling contract
///
/// Real row elements must use border-box sizing and render as block-level
/// elements whose height is stable absent content changes; otherwise the
/// measured heights the pipeline feeds back will disagree with laid-out
/// heights.
pub trait RowSource {
    /// Host element handle type.
    type Element;

    /// Number of rows. Constant between reinits.
    fn len(&self) -> usize;

    /// Whether the source has no rows.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build the real element for `row`. May be slow.
    fn make_row(&mut self, row: usize) -> Self::Element;

    /// Build a cheap placeholder for `row`. Its height is controlled by the
    /// pipeline, not by content.
    fn make_placeholder(&mut self, row: usize) -> Self::Element;

    /// Take back a real element. The source may pool it.
    fn free_row(&mut self, row: usize, element: Self::Element);

    /// Take back a placeholder element.
    fn free_placeholder(&mut self, row: usize, element: Self::Element);
}
