//! Input payloads carried by native events
//!
//! Positions are in the receiving control's client coordinates.

use trellis_core::Point;

/// Input events raised by a native peer
#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    /// Mouse event
    Mouse(MouseEvent),
    /// Keyboard event
    Keyboard(KeyboardEvent),
    /// Wheel or trackpad scroll
    Wheel {
        /// Horizontal delta
        delta_x: f32,
        /// Vertical delta
        delta_y: f32,
    },
}

// ============================================================================
// Mouse Events
// ============================================================================

/// Mouse events
#[derive(Clone, Debug, PartialEq)]
pub enum MouseEvent {
    /// Pointer moved
    Moved { position: Point },
    /// Button pressed
    ButtonPressed {
        button: MouseButton,
        position: Point,
        modifiers: Modifiers,
    },
    /// Button released
    ButtonReleased {
        button: MouseButton,
        position: Point,
        modifiers: Modifiers,
    },
    /// Double click
    DoubleClick { button: MouseButton, position: Point },
    /// Pointer entered the control
    Entered,
    /// Pointer left the control
    Left,
}

impl MouseEvent {
    /// Pointer position, if the event carries one
    pub fn position(&self) -> Option<Point> {
        match self {
            MouseEvent::Moved { position }
            | MouseEvent::ButtonPressed { position, .. }
            | MouseEvent::ButtonReleased { position, .. }
            | MouseEvent::DoubleClick { position, .. } => Some(*position),
            MouseEvent::Entered | MouseEvent::Left => None,
        }
    }
}

/// Mouse buttons
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u16),
}

// ============================================================================
// Keyboard Events
// ============================================================================

/// Keyboard event
#[derive(Clone, Debug, PartialEq)]
pub struct KeyboardEvent {
    /// The key that was pressed or released
    pub key: Key,
    /// Whether the key was pressed or released
    pub state: KeyState,
    /// Modifier keys held during this event
    pub modifiers: Modifiers,
}

/// Key press/release state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyState {
    Pressed,
    Released,
}

/// Modifier key state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    /// Command on macOS, Windows key on Windows
    pub meta: bool,
}

impl Modifiers {
    /// Check if no modifiers are held
    pub fn is_empty(&self) -> bool {
        !self.shift && !self.ctrl && !self.alt && !self.meta
    }
}

/// Keys a control commonly reacts to; everything else arrives as `Char`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Enter,
    Escape,
    Tab,
    Space,
    Backspace,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Left,
    Right,
    Up,
    Down,
    Char(char),
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mouse_position() {
        let pressed = MouseEvent::ButtonPressed {
            button: MouseButton::Left,
            position: Point::new(3.0, 4.0),
            modifiers: Modifiers::default(),
        };
        assert_eq!(pressed.position(), Some(Point::new(3.0, 4.0)));
        assert_eq!(MouseEvent::Entered.position(), None);
    }
}
