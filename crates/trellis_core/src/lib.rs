//! Trellis Core
//!
//! Foundational primitives shared by every Trellis crate:
//!
//! - **Geometry**: points, sizes, rects and edge insets in parent space
//! - **Events**: ordered single-threaded subscriber lists for control events
//! - **Values**: observable [`ValueSource`] cells and disposal-aware slots
//!
//! # Example
//!
//! ```rust
//! use trellis_core::{Rect, Thickness, ValueSource};
//!
//! let client = Rect::new(0.0, 0.0, 100.0, 50.0);
//! let inner = client.deflate(Thickness::uniform(5.0));
//! assert_eq!(inner, Rect::new(5.0, 5.0, 90.0, 40.0));
//!
//! let width = ValueSource::new(inner.width());
//! assert!(!width.set(90.0));
//! ```

pub mod event;
pub mod geometry;
pub mod value;

pub use event::{EventHandlers, SubscriptionId};
pub use geometry::{Point, Rect, Size, Thickness};
pub use value::{
    Disposable, DisposableSource, DisposeNotifier, ValueSource, WeakValueSource,
};
