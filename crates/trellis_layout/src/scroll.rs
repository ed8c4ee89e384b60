//! Scrollable containers
//!
//! A `LayoutStyle::Scroll` container arranges its children against their
//! unbounded preferred size, so content may be larger than the viewport.
//! Children are shifted by the negated scroll offset. Scrolling only moves
//! the already-arranged children; it never re-measures.

use crate::control::{HorizontalAlignment, VerticalAlignment};
use crate::engine::{align_horizontal, align_vertical};
use crate::error::Result;
use crate::tree::{ControlId, ControlTree};
use trellis_core::{Point, Rect, Size};

/// Scroll geometry of one container
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrollInfo {
    /// Current offset, within `0..=range` on each axis
    pub offset: Point,
    /// Largest offset on each axis
    pub range: Size,
    /// Visible client area
    pub viewport: Size,
    /// Content size, padding included
    pub extent: Size,
    /// Content is wider than the viewport
    pub horizontal: bool,
    /// Content is taller than the viewport
    pub vertical: bool,
}

impl ScrollInfo {
    /// Bring `offset` into range; a disabled axis always scrolls to 0
    pub fn clamp(&self, offset: Point) -> Point {
        let axis = |value: f32, range: f32, enabled: bool| {
            if !enabled || value.is_nan() {
                0.0
            } else {
                value.clamp(0.0, range.max(0.0))
            }
        };
        Point::new(
            axis(offset.x, self.range.width, self.horizontal),
            axis(offset.y, self.range.height, self.vertical),
        )
    }
}

#[derive(Debug, Default)]
pub(crate) struct ScrollState {
    pub(crate) info: ScrollInfo,
    /// Children's bounds before the offset is applied
    pub(crate) arranged: Vec<(ControlId, Rect)>,
}

impl ControlTree {
    pub(crate) fn layout_scroll(&mut self, id: ControlId, viewport: Rect, children: &[ControlId]) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let padding = node.padding;
        let previous = node.scroll.info;

        let content = self.max_preferred(children, Size::INFINITE);
        let horizontal = content.width > viewport.width();
        let vertical = content.height > viewport.height();
        let extent = content.inflate(padding);
        let view = viewport.size.inflate(padding);
        let range = Size::new(extent.width - view.width, extent.height - view.height).sanitized();

        let mut info = ScrollInfo {
            offset: Point::ZERO,
            range,
            viewport: viewport.size,
            extent,
            horizontal,
            vertical,
        };
        info.offset = info.clamp(previous.offset);

        let mut arranged = Vec::with_capacity(children.len());
        for child in children {
            let Some(node) = self.nodes.get(*child) else {
                continue;
            };
            let margin = node.margin;
            let suggested = node.suggested_size;
            // An overflowing axis pins the child to the start edge
            let halign = if horizontal {
                HorizontalAlignment::Left
            } else {
                node.horizontal_alignment
            };
            let valign = if vertical {
                VerticalAlignment::Top
            } else {
                node.vertical_alignment
            };

            let pref = self.measure(*child, Size::INFINITE);
            let (x, width) = if horizontal {
                (viewport.x() + margin.left, pref.width)
            } else {
                align_horizontal(viewport, margin, pref.width, halign, suggested.width.is_some())
            };
            let (y, height) = if vertical {
                (viewport.y() + margin.top, pref.height)
            } else {
                align_vertical(viewport, margin, pref.height, valign, suggested.height.is_some())
            };
            arranged.push((*child, Rect::new(x, y, width, height)));
        }

        if let Some(node) = self.nodes.get_mut(id) {
            node.scroll.arranged = arranged;
            node.scroll.info = info;
        }
        self.apply_scrolled(id);
        if info != previous {
            if let Some(node) = self.nodes.get_mut(id) {
                node.events.scroll_changed.emit(&info);
            }
        }
    }

    /// Move the content of a scroll container so `offset` is at the
    /// viewport's top-left corner.
    ///
    /// The offset is clamped to the scroll range. Returns whether it changed.
    pub fn scroll_to(&mut self, id: ControlId, offset: Point) -> Result<bool> {
        let node = self.node_mut(id)?;
        let offset = node.scroll.info.clamp(offset);
        if offset == node.scroll.info.offset {
            return Ok(false);
        }
        node.scroll.info.offset = offset;
        let info = node.scroll.info;

        self.apply_scrolled(id);
        self.node_mut(id)?.events.scroll_changed.emit(&info);
        tracing::trace!(?id, x = offset.x, y = offset.y, "scrolled");
        Ok(true)
    }

    /// Scroll relative to the current offset
    pub fn scroll_by(&mut self, id: ControlId, dx: f32, dy: f32) -> Result<bool> {
        let current = self.node(id)?.scroll.info.offset;
        self.scroll_to(id, current.offset(dx, dy))
    }

    pub fn scroll_info(&self, id: ControlId) -> Result<ScrollInfo> {
        Ok(self.node(id)?.scroll.info)
    }

    /// Re-apply the cached child rects shifted by the current offset
    fn apply_scrolled(&mut self, id: ControlId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let offset = node.scroll.info.offset;
        let arranged = node.scroll.arranged.clone();
        for (child, rect) in arranged {
            self.apply_bounds(child, rect.offset(-offset.x, -offset.y));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{LayoutStyle, SuggestedSize};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;
    use trellis_platform::{ControlKind, HeadlessBackend, NativeEvent};

    fn scroller(content: SuggestedSize) -> (ControlTree, ControlId, ControlId, HeadlessBackend) {
        let backend = HeadlessBackend::new();
        let mut tree = ControlTree::new(Arc::new(backend.clone()));
        let viewer = tree.create_control(ControlKind::ScrollViewer);
        tree.set_layout(viewer, LayoutStyle::Scroll).unwrap();
        tree.set_bounds(viewer, Rect::new(0.0, 0.0, 50.0, 100.0)).unwrap();
        let child = tree.create_control(ControlKind::Panel);
        tree.set_suggested_size(child, content).unwrap();
        tree.add_child(viewer, child).unwrap();
        tree.run_layout_pass();
        (tree, viewer, child, backend)
    }

    #[test]
    fn test_scroll_range_from_content() {
        let (tree, viewer, child, _) = scroller(SuggestedSize::new(50.0, 300.0));
        let info = tree.scroll_info(viewer).unwrap();

        assert_eq!(info.range, Size::new(0.0, 200.0));
        assert_eq!(info.extent, Size::new(50.0, 300.0));
        assert!(info.vertical);
        assert!(!info.horizontal);
        assert_eq!(tree.bounds(child).unwrap(), Rect::new(0.0, 0.0, 50.0, 300.0));
    }

    #[test]
    fn test_scrolling_moves_children_without_measuring() {
        let (mut tree, viewer, child, backend) = scroller(SuggestedSize::new(50.0, 300.0));
        let measured = tree.stats().measure_calls;

        assert!(tree.scroll_to(viewer, Point::new(0.0, 50.0)).unwrap());
        assert_eq!(tree.bounds(child).unwrap(), Rect::new(0.0, -50.0, 50.0, 300.0));
        assert_eq!(tree.stats().measure_calls, measured);
        let peer = backend.last_peer(&ControlKind::Panel).unwrap();
        assert_eq!(peer.bounds().y(), -50.0);

        assert!(!tree.scroll_to(viewer, Point::new(0.0, 50.0)).unwrap());
    }

    #[test]
    fn test_offset_is_clamped() {
        let (mut tree, viewer, _, _) = scroller(SuggestedSize::new(50.0, 300.0));
        tree.scroll_to(viewer, Point::new(30.0, 999.0)).unwrap();
        assert_eq!(tree.scroll_info(viewer).unwrap().offset, Point::new(0.0, 200.0));

        tree.scroll_by(viewer, 0.0, -500.0).unwrap();
        assert_eq!(tree.scroll_info(viewer).unwrap().offset, Point::ZERO);

        tree.scroll_to(viewer, Point::new(0.0, f32::NAN)).unwrap();
        assert_eq!(tree.scroll_info(viewer).unwrap().offset, Point::ZERO);
    }

    #[test]
    fn test_offset_survives_relayout_and_shrinks_with_content() {
        let (mut tree, viewer, child, _) = scroller(SuggestedSize::new(50.0, 300.0));
        tree.scroll_to(viewer, Point::new(0.0, 150.0)).unwrap();

        tree.set_suggested_size(child, SuggestedSize::new(50.0, 200.0)).unwrap();
        tree.run_layout_pass();
        let info = tree.scroll_info(viewer).unwrap();
        assert_eq!(info.range.height, 100.0);
        assert_eq!(info.offset.y, 100.0);

        tree.set_suggested_size(child, SuggestedSize::new(50.0, 80.0)).unwrap();
        tree.run_layout_pass();
        let info = tree.scroll_info(viewer).unwrap();
        assert!(!info.vertical);
        assert_eq!(info.offset, Point::ZERO);
    }

    #[test]
    fn test_native_scroll_event_scrolls() {
        let (mut tree, viewer, child, backend) = scroller(SuggestedSize::new(50.0, 300.0));
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        tree.events(viewer)
            .unwrap()
            .scroll_changed
            .subscribe(move |info| sink.borrow_mut().push(info.offset));

        let peer = backend.last_peer(&ControlKind::ScrollViewer).unwrap();
        assert!(peer.emit(NativeEvent::Scrolled { x: 0.0, y: 20.0 }));
        tree.process_native_messages();

        assert_eq!(*changes.borrow(), vec![Point::new(0.0, 20.0)]);
        assert_eq!(tree.bounds(child).unwrap().y(), -20.0);
    }

    #[test]
    fn test_native_scroll_event_past_range_is_clamped() {
        let (mut tree, viewer, child, backend) = scroller(SuggestedSize::new(50.0, 300.0));
        let peer = backend.last_peer(&ControlKind::ScrollViewer).unwrap();
        assert!(peer.emit(NativeEvent::Scrolled { x: -5.0, y: 1000.0 }));
        assert_eq!(tree.process_native_messages(), 1);

        assert_eq!(tree.scroll_info(viewer).unwrap().offset, Point::new(0.0, 200.0));
        assert_eq!(tree.bounds(child).unwrap().y(), -200.0);
    }
}
