#![forbid(unsafe_code)]

//! Deterministic in-memory host for tests and examples.
//!
//! [`HeadlessSurface`] and [`HeadlessRows`] share one [`SimDom`] element
//! arena, the way a real surface and data source share one document. Tests
//! script scroll positions and row heights, drive frames by hand, and
//! inspect the resulting element tree and free/attach balance.

use crate::frame::{FrameRequest, FrameSource};
use crate::source::RowSource;
use crate::surface::Surface;
use std::cell::{Ref, RefCell};
use std::rc::Rc;

/// One simulated element.
#[derive(Debug, Clone, Default)]
pub struct SimElement {
    /// Laid-out height reported by `measure_height`.
    pub height: f64,
    /// Last applied Y translation.
    pub translate_y: f64,
    /// Current children (element ids).
    pub children: Vec<usize>,
    /// Whether the element is currently attached to the pane.
    pub in_pane: bool,
    /// Whether `remove_host` ran on it.
    pub removed: bool,
}

/// Shared element arena plus pane geometry.
#[derive(Debug, Default)]
pub struct SimDom {
    elements: Vec<SimElement>,
    pane_children: Vec<usize>,
    pane_height: f64,
    scroll_top: f64,
    viewport_height: f64,
    next_frame: u64,
    pending_frames: Vec<FrameRequest>,
    frames_requested: u64,
    frames_cancelled: u64,
}

impl SimDom {
    fn create(&mut self, height: f64) -> usize {
        self.elements.push(SimElement {
            height,
            ..SimElement::default()
        });
        self.elements.len() - 1
    }

    /// Element by id.
    #[must_use]
    pub fn element(&self, id: usize) -> &SimElement {
        &self.elements[id]
    }

    /// Total elements ever created.
    #[must_use]
    pub fn elements_created(&self) -> usize {
        self.elements.len()
    }

    /// Ids of the block hosts currently attached to the pane.
    #[must_use]
    pub fn pane_children(&self) -> &[usize] {
        &self.pane_children
    }

    /// Declared pane height.
    #[must_use]
    pub fn pane_height(&self) -> f64 {
        self.pane_height
    }

    /// Animation-frame requests not yet delivered or cancelled.
    #[must_use]
    pub fn pending_frames(&self) -> &[FrameRequest] {
        &self.pending_frames
    }

    /// Frames requested over the dom's lifetime.
    #[must_use]
    pub fn frames_requested(&self) -> u64 {
        self.frames_requested
    }

    /// Frames cancelled over the dom's lifetime.
    #[must_use]
    pub fn frames_cancelled(&self) -> u64 {
        self.frames_cancelled
    }
}

/// Simulated rendering surface over a shared [`SimDom`].
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    dom: Rc<RefCell<SimDom>>,
}

impl HeadlessSurface {
    /// Borrow the dom for inspection.
    #[must_use]
    pub fn dom(&self) -> Ref<'_, SimDom> {
        self.dom.borrow()
    }

    /// Script the container scroll position, as if the user scrolled.
    pub fn simulate_scroll(&mut self, px: f64) {
        self.dom.borrow_mut().scroll_top = px;
    }

    /// Script the container's visible height.
    pub fn set_viewport_height(&mut self, px: f64) {
        self.dom.borrow_mut().viewport_height = px;
    }

    /// Script a new laid-out height for an element, as if its content
    /// reflowed.
    pub fn set_measured_height(&mut self, element: usize, px: f64) {
        self.dom.borrow_mut().elements[element].height = px;
    }
}

impl Surface for HeadlessSurface {
    type Element = usize;

    fn set_pane_height(&mut self, px: f64) {
        self.dom.borrow_mut().pane_height = px;
    }

    fn pane_height(&self) -> f64 {
        self.dom.borrow().pane_height
    }

    fn scroll_top(&self) -> f64 {
        self.dom.borrow().scroll_top
    }

    fn set_scroll_top(&mut self, px: f64) {
        self.dom.borrow_mut().scroll_top = px;
    }

    fn viewport_height(&self) -> f64 {
        self.dom.borrow().viewport_height
    }

    fn create_host(&mut self) -> usize {
        self.dom.borrow_mut().create(0.0)
    }

    fn attach_host(&mut self, host: &usize) {
        let mut dom = self.dom.borrow_mut();
        dom.pane_children.push(*host);
        dom.elements[*host].in_pane = true;
    }

    fn remove_host(&mut self, host: &usize) {
        let mut dom = self.dom.borrow_mut();
        dom.pane_children.retain(|id| id != host);
        dom.elements[*host].in_pane = false;
        dom.elements[*host].removed = true;
    }

    fn set_translate_y(&mut self, host: &usize, px: f64) {
        self.dom.borrow_mut().elements[*host].translate_y = px;
    }

    fn replace_children(&mut self, host: &usize, children: &[usize]) {
        self.dom.borrow_mut().elements[*host].children = children.to_vec();
    }

    fn set_element_height(&mut self, element: &usize, px: f64) {
        self.dom.borrow_mut().elements[*element].height = px;
    }

    fn measure_height(&self, element: &usize) -> f64 {
        self.dom.borrow().elements[*element].height
    }
}

impl FrameSource for HeadlessSurface {
    fn request_frame(&mut self) -> FrameRequest {
        let mut dom = self.dom.borrow_mut();
        let request = FrameRequest(dom.next_frame);
        dom.next_frame += 1;
        dom.pending_frames.push(request);
        dom.frames_requested += 1;
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        let mut dom = self.dom.borrow_mut();
        dom.pending_frames.retain(|pending| *pending != request);
        dom.frames_cancelled += 1;
    }
}

/// Simulated row source with scripted per-row laid-out heights.
#[derive(Debug)]
pub struct HeadlessRows {
    dom: Rc<RefCell<SimDom>>,
    row_heights: Vec<f64>,
    /// Real elements built over the source's lifetime.
    pub rows_built: u64,
    /// Placeholders built over the source's lifetime.
    pub placeholders_built: u64,
    /// Real elements surrendered back.
    pub rows_freed: u64,
    /// Placeholders surrendered back.
    pub placeholders_freed: u64,
}

impl RowSource for HeadlessRows {
    type Element = usize;

    fn len(&self) -> usize {
        self.row_heights.len()
    }

    fn make_row(&mut self, row: usize) -> usize {
        self.rows_built += 1;
        let height = self.row_heights[row];
        self.dom.borrow_mut().create(height)
    }

    fn make_placeholder(&mut self, _row: usize) -> usize {
        self.placeholders_built += 1;
        self.dom.borrow_mut().create(0.0)
    }

    fn free_row(&mut self, _row: usize, _element: usize) {
        self.rows_freed += 1;
    }

    fn free_placeholder(&mut self, _row: usize, _element: usize) {
        self.placeholders_freed += 1;
    }
}

/// A surface and a row source sharing one freshly created [`SimDom`].
///
/// `row_heights[i]` is the height row `i`'s real element will measure at.
#[must_use]
pub fn headless(row_heights: Vec<f64>) -> (HeadlessSurface, HeadlessRows) {
    let dom = Rc::new(RefCell::new(SimDom {
        viewport_height: 600.0,
        ..SimDom::default()
    }));
    let surface = HeadlessSurface { dom: Rc::clone(&dom) };
    let rows = HeadlessRows {
        dom,
        row_heights,
        rows_built: 0,
        placeholders_built: 0,
        rows_freed: 0,
        placeholders_freed: 0,
    };
    (surface, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_and_rows_share_one_arena() {
        let (mut surface, mut rows) = headless(vec![42.0, 17.0]);
        let host = surface.create_host();
        let row = rows.make_row(0);
        assert_ne!(host, row);
        assert_eq!(surface.measure_height(&row), 42.0);
        assert_eq!(surface.dom().elements_created(), 2);
    }

    #[test]
    fn attach_and_remove_track_pane_membership() {
        let (mut surface, _rows) = headless(vec![30.0; 4]);
        let host = surface.create_host();
        surface.attach_host(&host);
        assert_eq!(surface.dom().pane_children(), &[host]);
        surface.remove_host(&host);
        assert!(surface.dom().pane_children().is_empty());
        assert!(surface.dom().element(host).removed);
    }

    #[test]
    fn frame_requests_are_tracked() {
        let (mut surface, _rows) = headless(vec![]);
        let first = surface.request_frame();
        let second = surface.request_frame();
        assert_ne!(first, second);
        surface.cancel_frame(first);
        assert_eq!(surface.dom().pending_frames(), &[second]);
        assert_eq!(surface.dom().frames_requested(), 2);
        assert_eq!(surface.dom().frames_cancelled(), 1);
    }
}
