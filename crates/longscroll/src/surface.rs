#![forbid(unsafe_code)]

//! Host rendering surface contract.

/// The scrollable pane the pipeline renders into.
///
/// The engine is the sole writer of the subtree under the pane, and it
/// splits its access by frame phase: [`Surface::scroll_top`],
/// [`Surface::viewport_height`], and [`Surface::measure_height`] are
/// layout-sensitive reads invoked only from read-phase tasks; every other
/// method mutates and is invoked only from write or idle-write tasks. A
/// host binding does not need to enforce this (the scheduler does), but it
/// may assume it.
pub trait Surface {
    /// Host element handle type. Handles are cheap to clone (a real host
    /// binding typically wraps a reference-counted node).
    type Element: Clone;

    /// Declare the pane's total scrollable height.
    fn set_pane_height(&mut self, px: f64);

    /// Currently declared pane height.
    fn pane_height(&self) -> f64;

    /// Scroll offset of the container. Layout read.
    fn scroll_top(&self) -> f64;

    /// Programmatically scroll the container.
    fn set_scroll_top(&mut self, px: f64);

    /// Visible height of the container. Layout read.
    fn viewport_height(&self) -> f64;

    /// Create a detached block host element (absolutely positioned,
    /// translated on the Y axis).
    fn create_host(&mut self) -> Self::Element;

    /// Append a block host to the pane.
    fn attach_host(&mut self, host: &Self::Element);

    /// Remove a block host (and its children) from the pane.
    fn remove_host(&mut self, host: &Self::Element);

    /// Set a block host's Y translation.
    fn set_translate_y(&mut self, host: &Self::Element, px: f64);

    /// Replace the host's children with `children`, as one fragment swap.
    fn replace_children(&mut self, host: &Self::Element, children: &[Self::Element]);

    /// Force an element's CSS height. Used to size placeholders.
    fn set_element_height(&mut self, element: &Self::Element, px: f64);

    /// Measure an element's laid-out height. Layout read.
    fn measure_height(&self, element: &Self::Element) -> f64;
}
