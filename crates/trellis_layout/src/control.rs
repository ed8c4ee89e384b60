//! Control properties and per-control state
//!
//! The public half of this module is the vocabulary for describing layout
//! intent (alignment, docking, layout style, suggested size) and the event
//! lists every control carries. The crate-private half is the arena node.

use crate::scroll::{ScrollInfo, ScrollState};
use crate::tree::ControlId;
use std::sync::Arc;
use trellis_core::{EventHandlers, Rect, Size, Thickness};
use trellis_platform::{ControlHandler, ControlKind, HandlerFactory, NativeEvent};

// ============================================================================
// Layout intent
// ============================================================================

/// Horizontal placement of a control within the space its parent offers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HorizontalAlignment {
    Left,
    Center,
    Right,
    /// Take the full width of the offered space
    #[default]
    Stretch,
    /// In a horizontal stack, take whatever width the other children leave;
    /// elsewhere the same as `Stretch`
    Fill,
}

/// Vertical placement of a control within the space its parent offers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VerticalAlignment {
    Top,
    Center,
    Bottom,
    /// Take the full height of the offered space
    #[default]
    Stretch,
    /// In a vertical stack, take whatever height the other children leave;
    /// elsewhere the same as `Stretch`
    Fill,
}

/// Edge a control is docked to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Dock {
    #[default]
    None,
    Left,
    Top,
    Right,
    Bottom,
    /// Whatever remains after every edge strip
    Fill,
}

/// Algorithm a container uses for its non-docked children
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LayoutStyle {
    /// Children are not positioned at all
    None,
    /// Each child aligned independently in the container
    #[default]
    Basic,
    /// Same as `Basic`; for containers whose children are all docked
    Dock,
    /// Children stacked top to bottom
    Vertical,
    /// Children stacked left to right
    Horizontal,
    /// Children placed in a scrollable viewport
    Scroll,
}

impl LayoutStyle {
    pub fn is_stack(&self) -> bool {
        matches!(self, LayoutStyle::Vertical | LayoutStyle::Horizontal)
    }
}

/// Explicit size on either axis; an axis left `None` is measured
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SuggestedSize {
    pub width: Option<f32>,
    pub height: Option<f32>,
}

impl SuggestedSize {
    pub const NONE: SuggestedSize = SuggestedSize {
        width: None,
        height: None,
    };

    pub const fn new(width: f32, height: f32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
        }
    }

    pub const fn width(width: f32) -> Self {
        Self {
            width: Some(width),
            height: None,
        }
    }

    pub const fn height(height: f32) -> Self {
        Self {
            width: None,
            height: Some(height),
        }
    }

    /// Both axes are explicit
    pub fn is_complete(&self) -> bool {
        self.width.is_some() && self.height.is_some()
    }

    /// Override the measured axes of `measured` with the explicit ones
    pub fn apply(&self, measured: Size) -> Size {
        Size::new(
            self.width.unwrap_or(measured.width),
            self.height.unwrap_or(measured.height),
        )
        .sanitized()
    }
}

// ============================================================================
// Events
// ============================================================================

/// Payload of [`ControlEvents::bounds_changed`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundsChanged {
    pub old: Rect,
    pub new: Rect,
}

/// Payload of handler lifecycle events
#[derive(Clone, Debug, PartialEq)]
pub struct HandlerEvent {
    pub control: ControlId,
    /// Attachment cycle the event belongs to
    pub generation: u64,
    pub kind: ControlKind,
}

/// Callbacks raised by one control
#[derive(Default, Debug)]
pub struct ControlEvents {
    pub bounds_changed: EventHandlers<BoundsChanged>,
    /// This control finished arranging its children
    pub layout_updated: EventHandlers<ControlId>,
    pub handler_created: EventHandlers<HandlerEvent>,
    pub handler_destroyed: EventHandlers<HandlerEvent>,
    /// Raised once, just before the control leaves the tree
    pub disposed: EventHandlers<ControlId>,
    /// Native events relayed from the peer
    pub native: EventHandlers<NativeEvent>,
    pub scroll_changed: EventHandlers<ScrollInfo>,
}

// ============================================================================
// Arena node
// ============================================================================

/// Lazily created handler plus the factory that made it
#[derive(Default)]
pub(crate) struct HandlerSlot {
    pub(crate) handler: Option<ControlHandler>,
    pub(crate) factory: Option<Arc<dyn HandlerFactory>>,
    /// Attachment cycles started so far
    pub(crate) generation: u64,
}

pub(crate) struct ControlNode {
    pub(crate) parent: Option<ControlId>,
    pub(crate) children: Vec<ControlId>,
    pub(crate) kind: ControlKind,
    pub(crate) name: Option<String>,

    pub(crate) bounds: Rect,
    pub(crate) margin: Thickness,
    pub(crate) padding: Thickness,
    pub(crate) horizontal_alignment: HorizontalAlignment,
    pub(crate) vertical_alignment: VerticalAlignment,
    pub(crate) dock: Dock,
    pub(crate) visible: bool,
    pub(crate) enabled: bool,

    pub(crate) layout: LayoutStyle,
    pub(crate) suggested_size: SuggestedSize,
    pub(crate) minimum_size: Option<Size>,
    pub(crate) maximum_size: Option<Size>,
    pub(crate) ignore_layout: bool,
    pub(crate) layout_suspend: u32,

    pub(crate) handler: HandlerSlot,
    pub(crate) factory_override: Option<Arc<dyn HandlerFactory>>,
    pub(crate) scroll: ScrollState,
    pub(crate) events: ControlEvents,
}

impl ControlNode {
    pub(crate) fn new(kind: ControlKind) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            kind,
            name: None,
            bounds: Rect::ZERO,
            margin: Thickness::ZERO,
            padding: Thickness::ZERO,
            horizontal_alignment: HorizontalAlignment::default(),
            vertical_alignment: VerticalAlignment::default(),
            dock: Dock::None,
            visible: true,
            enabled: true,
            layout: LayoutStyle::default(),
            suggested_size: SuggestedSize::NONE,
            minimum_size: None,
            maximum_size: None,
            ignore_layout: false,
            layout_suspend: 0,
            handler: HandlerSlot::default(),
            factory_override: None,
            scroll: ScrollState::default(),
            events: ControlEvents::default(),
        }
    }

    /// Client rect deflated by padding, in this control's own coordinates.
    /// Empty when padding exceeds the client size.
    pub(crate) fn children_layout_bounds(&self) -> Rect {
        let client = self.bounds.size.sanitized().to_rect();
        let size = client.size;
        if size.width - self.padding.horizontal() < 0.0
            || size.height - self.padding.vertical() < 0.0
        {
            return Rect::ZERO;
        }
        client.deflate(self.padding)
    }

    /// Participates in its parent's layout
    pub(crate) fn in_layout(&self) -> bool {
        self.visible && !self.ignore_layout
    }
}
