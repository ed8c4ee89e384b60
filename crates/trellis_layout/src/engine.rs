//! Measure and arrange
//!
//! Measurement (`measure`) answers "how big would this control like to be
//! given this much space" and never changes the tree. Arrangement
//! (`arrange_subtree`) resolves child bounds top-down and pushes them to the
//! native peers.
//!
//! Every container docks first: children with a [`Dock`] other than `None`
//! take strips off the edges in insertion order (earlier children nearer the
//! edge) and `Dock::Fill` children get what is left. The remaining children
//! are then placed in the remaining space by the container's [`LayoutStyle`].
//!
//! Sizes are sanitized on the way in; layout never fails.

use crate::control::{ControlNode, Dock, HorizontalAlignment, LayoutStyle, VerticalAlignment};
use crate::tree::{ControlId, ControlTree};
use smallvec::SmallVec;
use trellis_core::{Rect, Size, Thickness};

pub(crate) type ChildList = SmallVec<[ControlId; 8]>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Axis {
    Horizontal,
    Vertical,
}

impl ControlTree {
    // ========================================================================
    // Measure
    // ========================================================================

    /// Preferred size of `id` within `available`, limited by its suggested,
    /// minimum and maximum sizes
    pub(crate) fn measure(&self, id: ControlId, available: Size) -> Size {
        self.measure_calls.set(self.measure_calls.get() + 1);
        let Some(node) = self.nodes.get(id) else {
            return Size::ZERO;
        };
        let available = available.sanitized();

        let measured = if node.suggested_size.is_complete() {
            Size::ZERO
        } else {
            self.content_preferred(node, available)
        };
        node.suggested_size
            .apply(measured)
            .clamp_between(node.minimum_size, node.maximum_size)
    }

    fn content_preferred(&self, node: &ControlNode, available: Size) -> Size {
        let children = self.layout_children_of(node);
        if children.is_empty() {
            return self.native_preferred(node, available);
        }
        if node.layout.is_stack() && available.any_empty() {
            return Size::ZERO;
        }

        let inner = available
            .clamp_between(None, node.maximum_size)
            .deflate(node.padding);
        let (docked, rest): (ChildList, ChildList) = children
            .iter()
            .copied()
            .partition(|child| self.dock_of(*child) != Dock::None);

        let mut core = match node.layout {
            LayoutStyle::Vertical => self.stack_preferred(&rest, inner, Axis::Vertical),
            LayoutStyle::Horizontal => self.stack_preferred(&rest, inner, Axis::Horizontal),
            _ => self.max_preferred(&rest, inner),
        };

        // Fill-docked children share the center with the undocked ones
        for child in docked.iter().filter(|c| self.dock_of(**c) == Dock::Fill) {
            core = core.max(self.measure_with_margin(*child, inner));
        }
        // Wrap edge strips around the center, innermost first
        for child in docked.iter().rev() {
            let pref = self.measure_with_margin(*child, inner);
            match self.dock_of(*child) {
                Dock::Left | Dock::Right => {
                    core = Size::new(core.width + pref.width, core.height.max(pref.height));
                }
                Dock::Top | Dock::Bottom => {
                    core = Size::new(core.width.max(pref.width), core.height + pref.height);
                }
                Dock::Fill | Dock::None => {}
            }
        }

        core.inflate(node.padding)
    }

    /// Leaf measurement: the peer's own size plus padding
    fn native_preferred(&self, node: &ControlNode, available: Size) -> Size {
        let inner = available.deflate(node.padding);
        node.handler
            .handler
            .as_ref()
            .and_then(|handler| handler.preferred_size(inner).ok())
            .unwrap_or(Size::ZERO)
            .inflate(node.padding)
    }

    fn stack_preferred(&self, children: &[ControlId], available: Size, axis: Axis) -> Size {
        let mut result = Size::ZERO;
        for child in children {
            match axis {
                Axis::Vertical => {
                    let remaining = Size::new(available.width, available.height - result.height);
                    let pref = self.measure_with_margin(*child, remaining.sanitized());
                    result.width = result.width.max(pref.width);
                    result.height += pref.height;
                }
                Axis::Horizontal => {
                    let remaining = Size::new(available.width - result.width, available.height);
                    let pref = self.measure_with_margin(*child, remaining.sanitized());
                    result.width += pref.width;
                    result.height = result.height.max(pref.height);
                }
            }
        }
        result
    }

    /// Largest child preference, margins included
    pub(crate) fn max_preferred(&self, children: &[ControlId], available: Size) -> Size {
        children.iter().fold(Size::ZERO, |acc, child| {
            acc.max(self.measure_with_margin(*child, available))
        })
    }

    fn measure_with_margin(&self, id: ControlId, available: Size) -> Size {
        let margin = self.margin_of(id);
        self.measure(id, available.deflate(margin)).inflate(margin)
    }

    // ========================================================================
    // Arrange
    // ========================================================================

    /// Create handlers for `id` and its visible descendants, parents first,
    /// so leaf native sizes are known before anything below `id` is measured
    pub(crate) fn attach_visible(&mut self, id: ControlId) {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            pending.extend(node.children.iter().rev().copied());
            if let Err(err) = self.ensure_handler(current) {
                tracing::warn!(id = ?current, error = %err, "native peer unavailable, laying out without it");
            }
        }
    }

    /// Lay out the children and recurse, raising `layout_updated` on the way
    /// back up. Handlers must already exist, see [`Self::attach_visible`].
    pub(crate) fn arrange_subtree(&mut self, id: ControlId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if !node.visible {
            return;
        }
        let suspended = node.layout_suspend > 0;
        let children = node.children.clone();
        if !suspended {
            self.layout_children(id);
        }
        for child in children {
            self.arrange_subtree(child);
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.events.layout_updated.emit(&id);
        }
    }

    fn layout_children(&mut self, id: ControlId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if node.layout == LayoutStyle::None {
            return;
        }
        let space = node.children_layout_bounds();
        let style = node.layout;
        let children = self.layout_children_of(node);

        if space.size.any_empty() {
            for child in children {
                self.apply_bounds(child, Rect::from_origin_size(space.origin, Size::ZERO));
            }
            return;
        }

        let (docked, rest): (ChildList, ChildList) = children
            .iter()
            .copied()
            .partition(|child| self.dock_of(*child) != Dock::None);
        let remaining = self.layout_docked(space, &docked);

        match style {
            LayoutStyle::Vertical => self.layout_vertical(remaining, &rest),
            LayoutStyle::Horizontal => self.layout_horizontal(remaining, &rest),
            LayoutStyle::Scroll => self.layout_scroll(id, remaining, &rest),
            LayoutStyle::Basic | LayoutStyle::Dock => self.layout_basic(remaining, &rest),
            LayoutStyle::None => {}
        }
    }

    /// Dock edge strips in insertion order; returns the space left for
    /// undocked children
    fn layout_docked(&mut self, space: Rect, docked: &[ControlId]) -> Rect {
        let mut space = space;
        let mut fills: ChildList = SmallVec::new();

        for child in docked {
            let dock = self.dock_of(*child);
            let margin = self.margin_of(*child);
            if dock == Dock::Fill {
                fills.push(*child);
                continue;
            }

            let pref = self.measure_with_margin(*child, space.size);
            let strip = match dock {
                Dock::Left => {
                    let width = pref.width.min(space.width());
                    let strip = Rect::new(space.x(), space.y(), width, space.height());
                    space.origin.x += width;
                    space.size.width -= width;
                    strip
                }
                Dock::Right => {
                    let width = pref.width.min(space.width());
                    space.size.width -= width;
                    Rect::new(space.right(), space.y(), width, space.height())
                }
                Dock::Top => {
                    let height = pref.height.min(space.height());
                    let strip = Rect::new(space.x(), space.y(), space.width(), height);
                    space.origin.y += height;
                    space.size.height -= height;
                    strip
                }
                Dock::Bottom => {
                    let height = pref.height.min(space.height());
                    space.size.height -= height;
                    Rect::new(space.x(), space.bottom(), space.width(), height)
                }
                Dock::Fill | Dock::None => continue,
            };
            self.apply_bounds(*child, strip.deflate(margin));
        }

        for child in fills {
            let margin = self.margin_of(child);
            self.apply_bounds(child, space.deflate(margin));
        }
        space
    }

    /// Each child aligned on its own within `space`
    fn layout_basic(&mut self, space: Rect, children: &[ControlId]) {
        for child in children {
            let Some(node) = self.nodes.get(*child) else {
                continue;
            };
            let margin = node.margin;
            let (halign, valign) = (node.horizontal_alignment, node.vertical_alignment);
            let suggested = node.suggested_size;

            let pref = self.measure(*child, space.size.deflate(margin));
            let (x, width) = align_horizontal(space, margin, pref.width, halign, suggested.width.is_some());
            let (y, height) = align_vertical(space, margin, pref.height, valign, suggested.height.is_some());
            self.apply_bounds(*child, Rect::new(x, y, width, height));
        }
    }

    /// Top-to-bottom stack. `Bottom` children pack upward from the bottom
    /// edge (last child lowest); `Fill` children share the leftover height.
    fn layout_vertical(&mut self, space: Rect, children: &[ControlId]) {
        let mut consumed = 0.0;
        let mut fill_count = 0usize;
        for child in children {
            if self.valign_of(*child) == VerticalAlignment::Fill {
                fill_count += 1;
                continue;
            }
            let remaining = Size::new(space.width(), space.height() - consumed).sanitized();
            consumed += self.measure_with_margin(*child, remaining).height;
        }
        let leftover = (space.height() - consumed).max(0.0);
        let fill_share = if fill_count > 0 {
            leftover / fill_count as f32
        } else {
            0.0
        };

        let (bottom, top): (ChildList, ChildList) = children
            .iter()
            .copied()
            .partition(|child| self.valign_of(*child) == VerticalAlignment::Bottom);
        let order = top.iter().chain(bottom.iter().rev());

        let mut top_used = 0.0;
        let mut bottom_used = 0.0;
        for child in order {
            let Some(node) = self.nodes.get(*child) else {
                continue;
            };
            let margin = node.margin;
            let (halign, valign) = (node.horizontal_alignment, node.vertical_alignment);
            let explicit_width = node.suggested_size.width.is_some();

            let free = Size::new(
                space.width() - margin.horizontal(),
                space.height() - top_used - bottom_used - margin.vertical(),
            )
            .sanitized();
            let pref = self.measure(*child, free);
            let height = match valign {
                VerticalAlignment::Fill => (fill_share - margin.vertical()).max(0.0).min(free.height),
                _ => pref.height.min(free.height),
            };
            let (x, width) = align_horizontal(space, margin, pref.width, halign, explicit_width);

            let y = if valign == VerticalAlignment::Bottom {
                let y = space.bottom() - bottom_used - margin.bottom - height;
                bottom_used += height + margin.vertical();
                y
            } else {
                let y = space.y() + top_used + margin.top;
                top_used += height + margin.vertical();
                y
            };
            self.apply_bounds(*child, Rect::new(x, y, width, height));
        }
    }

    /// Left-to-right stack. `Right` children pack leftward from the right
    /// edge (last child rightmost); `Fill` children share the leftover width;
    /// `Center` children are centred together as one group.
    fn layout_horizontal(&mut self, space: Rect, children: &[ControlId]) {
        let mut left_used = 0.0;
        let mut right_used = 0.0;
        let mut centered: SmallVec<[(ControlId, f32, f32, f32); 4]> = SmallVec::new();

        let (fills, others): (ChildList, ChildList) = children
            .iter()
            .copied()
            .partition(|child| self.halign_of(*child) == HorizontalAlignment::Fill);
        let (rights, lefts): (ChildList, ChildList) = others
            .iter()
            .copied()
            .partition(|child| self.halign_of(*child) == HorizontalAlignment::Right);

        for child in lefts.iter().chain(rights.iter().rev()) {
            let Some(node) = self.nodes.get(*child) else {
                continue;
            };
            let margin = node.margin;
            let (halign, valign) = (node.horizontal_alignment, node.vertical_alignment);
            let explicit_height = node.suggested_size.height.is_some();

            let free = Size::new(
                space.width() - left_used - right_used - margin.horizontal(),
                space.height() - margin.vertical(),
            )
            .sanitized();
            let pref = self.measure(*child, free);
            let width = pref.width.min(free.width);
            let (y, height) = align_vertical(space, margin, pref.height, valign, explicit_height);

            match halign {
                HorizontalAlignment::Center => centered.push((*child, y, width, height)),
                HorizontalAlignment::Right => {
                    let x = space.right() - right_used - margin.right - width;
                    right_used += width + margin.horizontal();
                    self.apply_bounds(*child, Rect::new(x, y, width, height));
                }
                _ => {
                    let x = space.x() + left_used + margin.left;
                    left_used += width + margin.horizontal();
                    self.apply_bounds(*child, Rect::new(x, y, width, height));
                }
            }
        }

        if !fills.is_empty() {
            let leftover = (space.width() - left_used - right_used).max(0.0);
            let share = leftover / fills.len() as f32;
            for child in fills {
                let Some(node) = self.nodes.get(child) else {
                    continue;
                };
                let margin = node.margin;
                let valign = node.vertical_alignment;
                let explicit_height = node.suggested_size.height.is_some();

                let width = (share - margin.horizontal()).max(0.0);
                let pref = self.measure(child, Size::new(width, space.height() - margin.vertical()).sanitized());
                let (y, height) = align_vertical(space, margin, pref.height, valign, explicit_height);
                let x = space.x() + left_used + margin.left;
                left_used += share;
                self.apply_bounds(child, Rect::new(x, y, width, height));
            }
        }

        if !centered.is_empty() {
            let total: f32 = centered
                .iter()
                .map(|(child, _, width, _)| width + self.margin_of(*child).horizontal())
                .sum();
            let mut offset = ((space.width() - total) / 2.0).max(0.0);
            for (child, y, width, height) in centered {
                let margin = self.margin_of(child);
                let x = space.x() + offset + margin.left;
                offset += width + margin.horizontal();
                self.apply_bounds(child, Rect::new(x, y, width, height));
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Children that take part in layout, in z-order
    pub(crate) fn layout_children_of(&self, node: &ControlNode) -> ChildList {
        node.children
            .iter()
            .copied()
            .filter(|child| self.nodes.get(*child).is_some_and(|n| n.in_layout()))
            .collect()
    }

    pub(crate) fn margin_of(&self, id: ControlId) -> Thickness {
        self.nodes.get(id).map(|n| n.margin).unwrap_or_default()
    }

    fn dock_of(&self, id: ControlId) -> Dock {
        self.nodes.get(id).map(|n| n.dock).unwrap_or_default()
    }

    fn halign_of(&self, id: ControlId) -> HorizontalAlignment {
        self.nodes
            .get(id)
            .map(|n| n.horizontal_alignment)
            .unwrap_or_default()
    }

    fn valign_of(&self, id: ControlId) -> VerticalAlignment {
        self.nodes
            .get(id)
            .map(|n| n.vertical_alignment)
            .unwrap_or_default()
    }
}

/// Resolve `(x, width)` for a child of preferred `width` inside `space`.
///
/// The result stays within `space` minus the margin. A stretched child with
/// an explicit width keeps it and is centred.
pub(crate) fn align_horizontal(
    space: Rect,
    margin: Thickness,
    width: f32,
    alignment: HorizontalAlignment,
    explicit: bool,
) -> (f32, f32) {
    let avail = (space.width() - margin.horizontal()).max(0.0);
    let width = width.min(avail);
    let left = space.x() + margin.left;
    match alignment {
        HorizontalAlignment::Left => (left, width),
        HorizontalAlignment::Right => (space.right() - margin.right - width, width),
        HorizontalAlignment::Center => (left + (avail - width) / 2.0, width),
        HorizontalAlignment::Stretch | HorizontalAlignment::Fill if explicit => {
            (left + (avail - width) / 2.0, width)
        }
        HorizontalAlignment::Stretch | HorizontalAlignment::Fill => (left, avail),
    }
}

/// Vertical counterpart of [`align_horizontal`]
pub(crate) fn align_vertical(
    space: Rect,
    margin: Thickness,
    height: f32,
    alignment: VerticalAlignment,
    explicit: bool,
) -> (f32, f32) {
    let avail = (space.height() - margin.vertical()).max(0.0);
    let height = height.min(avail);
    let top = space.y() + margin.top;
    match alignment {
        VerticalAlignment::Top => (top, height),
        VerticalAlignment::Bottom => (space.bottom() - margin.bottom - height, height),
        VerticalAlignment::Center => (top + (avail - height) / 2.0, height),
        VerticalAlignment::Stretch | VerticalAlignment::Fill if explicit => {
            (top + (avail - height) / 2.0, height)
        }
        VerticalAlignment::Stretch | VerticalAlignment::Fill => (top, avail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::SuggestedSize;
    use std::sync::Arc;
    use trellis_platform::{ControlKind, HeadlessBackend};

    fn tree() -> ControlTree {
        ControlTree::new(Arc::new(HeadlessBackend::new()))
    }

    fn container(tree: &mut ControlTree, layout: LayoutStyle, size: Size) -> ControlId {
        let id = tree.create_control(ControlKind::Container);
        tree.set_layout(id, layout).unwrap();
        tree.set_bounds(id, size.to_rect()).unwrap();
        id
    }

    fn child(tree: &mut ControlTree, parent: ControlId, suggested: SuggestedSize) -> ControlId {
        let id = tree.create_control(ControlKind::Panel);
        tree.set_suggested_size(id, suggested).unwrap();
        tree.add_child(parent, id).unwrap();
        id
    }

    #[test]
    fn test_dock_allocation_order() {
        let mut tree = tree();
        let root = container(&mut tree, LayoutStyle::Dock, Size::new(100.0, 50.0));
        let first = child(&mut tree, root, SuggestedSize::width(20.0));
        let second = child(&mut tree, root, SuggestedSize::width(20.0));
        let fill = child(&mut tree, root, SuggestedSize::NONE);
        tree.set_dock(first, Dock::Left).unwrap();
        tree.set_dock(second, Dock::Left).unwrap();
        tree.set_dock(fill, Dock::Fill).unwrap();

        tree.run_layout_pass();

        assert_eq!(tree.bounds(first).unwrap(), Rect::new(0.0, 0.0, 20.0, 50.0));
        assert_eq!(tree.bounds(second).unwrap(), Rect::new(20.0, 0.0, 20.0, 50.0));
        assert_eq!(tree.bounds(fill).unwrap(), Rect::new(40.0, 0.0, 60.0, 50.0));
    }

    #[test]
    fn test_dock_all_edges() {
        let mut tree = tree();
        let root = container(&mut tree, LayoutStyle::Basic, Size::new(100.0, 100.0));
        let top = child(&mut tree, root, SuggestedSize::height(10.0));
        let bottom = child(&mut tree, root, SuggestedSize::height(15.0));
        let right = child(&mut tree, root, SuggestedSize::width(30.0));
        let rest = child(&mut tree, root, SuggestedSize::new(5.0, 5.0));
        tree.set_dock(top, Dock::Top).unwrap();
        tree.set_dock(bottom, Dock::Bottom).unwrap();
        tree.set_dock(right, Dock::Right).unwrap();
        tree.set_horizontal_alignment(rest, HorizontalAlignment::Left).unwrap();
        tree.set_vertical_alignment(rest, VerticalAlignment::Top).unwrap();

        tree.run_layout_pass();

        assert_eq!(tree.bounds(top).unwrap(), Rect::new(0.0, 0.0, 100.0, 10.0));
        assert_eq!(tree.bounds(bottom).unwrap(), Rect::new(0.0, 85.0, 100.0, 15.0));
        assert_eq!(tree.bounds(right).unwrap(), Rect::new(70.0, 10.0, 30.0, 75.0));
        // Undocked child lands in the remaining space
        assert_eq!(tree.bounds(rest).unwrap(), Rect::new(0.0, 10.0, 5.0, 5.0));
    }

    #[test]
    fn test_vertical_stack_preferred_height() {
        let mut tree = tree();
        let stack = container(&mut tree, LayoutStyle::Vertical, Size::ZERO);
        child(&mut tree, stack, SuggestedSize::height(10.0));
        child(&mut tree, stack, SuggestedSize::height(15.0));

        for available in [
            Size::new(100.0, 100.0),
            Size::new(40.0, 1000.0),
            Size::new(100.0, 12.0),
            Size::INFINITE,
        ] {
            assert_eq!(tree.preferred_size(stack, available).unwrap().height, 25.0);
        }
    }

    #[test]
    fn test_vertical_stack_arrange() {
        let mut tree = tree();
        let stack = container(&mut tree, LayoutStyle::Vertical, Size::new(80.0, 100.0));
        let a = child(&mut tree, stack, SuggestedSize::height(10.0));
        let b = child(&mut tree, stack, SuggestedSize::height(15.0));
        let filler = child(&mut tree, stack, SuggestedSize::NONE);
        let footer = child(&mut tree, stack, SuggestedSize::height(20.0));
        tree.set_vertical_alignment(filler, VerticalAlignment::Fill).unwrap();
        tree.set_vertical_alignment(footer, VerticalAlignment::Bottom).unwrap();
        tree.set_margin(b, Thickness::new(5.0, 2.0, 5.0, 3.0)).unwrap();

        tree.run_layout_pass();

        assert_eq!(tree.bounds(a).unwrap(), Rect::new(0.0, 0.0, 80.0, 10.0));
        assert_eq!(tree.bounds(b).unwrap(), Rect::new(5.0, 12.0, 70.0, 15.0));
        assert_eq!(tree.bounds(footer).unwrap(), Rect::new(0.0, 80.0, 80.0, 20.0));
        // 100 - (10 + 20 + 20) left for the fill child
        assert_eq!(tree.bounds(filler).unwrap(), Rect::new(0.0, 30.0, 80.0, 50.0));
    }

    #[test]
    fn test_horizontal_stack_right_fill_and_center() {
        let mut tree = tree();
        let stack = container(&mut tree, LayoutStyle::Horizontal, Size::new(100.0, 20.0));
        let left = child(&mut tree, stack, SuggestedSize::width(10.0));
        let right_a = child(&mut tree, stack, SuggestedSize::width(10.0));
        let right_b = child(&mut tree, stack, SuggestedSize::width(15.0));
        let fill = child(&mut tree, stack, SuggestedSize::NONE);
        tree.set_horizontal_alignment(right_a, HorizontalAlignment::Right).unwrap();
        tree.set_horizontal_alignment(right_b, HorizontalAlignment::Right).unwrap();
        tree.set_horizontal_alignment(fill, HorizontalAlignment::Fill).unwrap();

        tree.run_layout_pass();

        assert_eq!(tree.bounds(left).unwrap(), Rect::new(0.0, 0.0, 10.0, 20.0));
        assert_eq!(tree.bounds(right_b).unwrap(), Rect::new(85.0, 0.0, 15.0, 20.0));
        assert_eq!(tree.bounds(right_a).unwrap(), Rect::new(75.0, 0.0, 10.0, 20.0));
        assert_eq!(tree.bounds(fill).unwrap(), Rect::new(10.0, 0.0, 65.0, 20.0));

        let centered_stack = container(&mut tree, LayoutStyle::Horizontal, Size::new(100.0, 20.0));
        let c1 = child(&mut tree, centered_stack, SuggestedSize::width(20.0));
        let c2 = child(&mut tree, centered_stack, SuggestedSize::width(30.0));
        tree.set_horizontal_alignment(c1, HorizontalAlignment::Center).unwrap();
        tree.set_horizontal_alignment(c2, HorizontalAlignment::Center).unwrap();
        tree.run_layout_pass();

        assert_eq!(tree.bounds(c1).unwrap().x(), 25.0);
        assert_eq!(tree.bounds(c2).unwrap().x(), 45.0);
    }

    #[test]
    fn test_basic_alignment_and_limits() {
        let mut tree = tree();
        let root = container(&mut tree, LayoutStyle::Basic, Size::new(100.0, 100.0));
        let centered = child(&mut tree, root, SuggestedSize::new(20.0, 10.0));
        tree.set_horizontal_alignment(centered, HorizontalAlignment::Center).unwrap();
        tree.set_vertical_alignment(centered, VerticalAlignment::Bottom).unwrap();
        let stretched = child(&mut tree, root, SuggestedSize::NONE);
        tree.set_maximum_size(stretched, Some(Size::new(1000.0, 1000.0))).unwrap();
        let limited = child(&mut tree, root, SuggestedSize::new(500.0, 2.0));
        tree.set_maximum_size(limited, Some(Size::new(40.0, 40.0))).unwrap();
        tree.set_minimum_size(limited, Some(Size::new(0.0, 8.0))).unwrap();
        tree.set_horizontal_alignment(limited, HorizontalAlignment::Left).unwrap();
        tree.set_vertical_alignment(limited, VerticalAlignment::Top).unwrap();

        tree.run_layout_pass();

        assert_eq!(tree.bounds(centered).unwrap(), Rect::new(40.0, 90.0, 20.0, 10.0));
        assert_eq!(tree.bounds(stretched).unwrap(), Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(tree.bounds(limited).unwrap(), Rect::new(0.0, 0.0, 40.0, 8.0));
    }

    #[test]
    fn test_zero_space_gives_zero_size_children() {
        let mut tree = tree();
        let root = container(&mut tree, LayoutStyle::Vertical, Size::new(10.0, 10.0));
        tree.set_padding(root, Thickness::uniform(6.0)).unwrap();
        let a = child(&mut tree, root, SuggestedSize::new(5.0, 5.0));

        tree.run_layout_pass();
        assert_eq!(tree.bounds(a).unwrap().size, Size::ZERO);
        assert_eq!(tree.preferred_size(root, Size::ZERO).unwrap(), Size::ZERO);
    }

    #[test]
    fn test_nan_and_negative_sizes_are_clamped() {
        let mut tree = tree();
        let root = container(&mut tree, LayoutStyle::Basic, Size::new(50.0, 50.0));
        let a = child(&mut tree, root, SuggestedSize::new(f32::NAN, -3.0));
        tree.set_horizontal_alignment(a, HorizontalAlignment::Left).unwrap();
        tree.set_vertical_alignment(a, VerticalAlignment::Top).unwrap();

        tree.run_layout_pass();
        assert_eq!(tree.bounds(a).unwrap(), Rect::ZERO);
        assert_eq!(tree.preferred_size(a, Size::new(f32::NAN, -1.0)).unwrap(), Size::ZERO);
    }

    #[test]
    fn test_dock_preferred_size_wraps_center() {
        let mut tree = tree();
        let root = container(&mut tree, LayoutStyle::Dock, Size::ZERO);
        tree.set_padding(root, Thickness::uniform(1.0)).unwrap();
        let left = child(&mut tree, root, SuggestedSize::new(10.0, 30.0));
        let top = child(&mut tree, root, SuggestedSize::new(50.0, 5.0));
        let center = child(&mut tree, root, SuggestedSize::new(20.0, 20.0));
        tree.set_dock(left, Dock::Left).unwrap();
        tree.set_dock(top, Dock::Top).unwrap();
        tree.set_dock(center, Dock::Fill).unwrap();

        // center 20x20, top grows it to 50x25, left to 60x30, plus padding
        let pref = tree.preferred_size(root, Size::INFINITE).unwrap();
        assert_eq!(pref, Size::new(62.0, 32.0));
    }

    #[test]
    fn test_invisible_and_ignored_children_are_skipped() {
        let mut tree = tree();
        let stack = container(&mut tree, LayoutStyle::Vertical, Size::new(10.0, 100.0));
        let hidden = child(&mut tree, stack, SuggestedSize::height(10.0));
        let ignored = child(&mut tree, stack, SuggestedSize::height(10.0));
        let shown = child(&mut tree, stack, SuggestedSize::height(10.0));
        tree.hide(hidden).unwrap();
        tree.set_ignore_layout(ignored, true).unwrap();

        tree.run_layout_pass();
        assert_eq!(tree.bounds(shown).unwrap().y(), 0.0);
        assert_eq!(tree.preferred_size(stack, Size::INFINITE).unwrap().height, 10.0);
    }

    #[test]
    fn test_first_pass_uses_native_sizes() {
        let backend =
            HeadlessBackend::new().with_preferred_size(ControlKind::Button, Size::new(80.0, 24.0));
        let mut tree = ControlTree::new(Arc::new(backend));

        let basic = container(&mut tree, LayoutStyle::Basic, Size::new(200.0, 100.0));
        let button = tree.create_control(ControlKind::Button);
        tree.set_horizontal_alignment(button, HorizontalAlignment::Left).unwrap();
        tree.set_vertical_alignment(button, VerticalAlignment::Top).unwrap();
        tree.add_child(basic, button).unwrap();
        let panel = tree.create_control(ControlKind::Panel);
        tree.set_horizontal_alignment(panel, HorizontalAlignment::Right).unwrap();
        tree.set_vertical_alignment(panel, VerticalAlignment::Bottom).unwrap();
        tree.add_child(basic, panel).unwrap();
        let nested = tree.create_control(ControlKind::Button);
        tree.add_child(panel, nested).unwrap();

        let stack = container(&mut tree, LayoutStyle::Vertical, Size::new(200.0, 100.0));
        let first = tree.create_control(ControlKind::Button);
        let second = tree.create_control(ControlKind::Button);
        tree.add_child(stack, first).unwrap();
        tree.add_child(stack, second).unwrap();

        tree.run_layout_pass();

        assert_eq!(tree.bounds(button).unwrap(), Rect::new(0.0, 0.0, 80.0, 24.0));
        assert_eq!(tree.bounds(panel).unwrap(), Rect::new(120.0, 76.0, 80.0, 24.0));
        assert_eq!(tree.bounds(first).unwrap(), Rect::new(0.0, 0.0, 200.0, 24.0));
        assert_eq!(tree.bounds(second).unwrap(), Rect::new(0.0, 24.0, 200.0, 24.0));
        assert!(!tree.needs_layout());
    }

    #[test]
    fn test_hidden_subtree_gets_no_handlers() {
        let mut tree = tree();
        let root = container(&mut tree, LayoutStyle::Basic, Size::new(50.0, 50.0));
        let hidden = tree.create_control(ControlKind::Panel);
        let inner = tree.create_control(ControlKind::Button);
        tree.add_child(root, hidden).unwrap();
        tree.add_child(hidden, inner).unwrap();
        tree.set_visible(hidden, false).unwrap();

        tree.run_layout_pass();

        assert!(tree.has_handler(root).unwrap());
        assert!(!tree.has_handler(hidden).unwrap());
        assert!(!tree.has_handler(inner).unwrap());
    }
}
