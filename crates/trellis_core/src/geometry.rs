//! Geometry primitives shared by the control tree and the layout engine
//!
//! All coordinates are device-independent `f32` units. A control's bounds are
//! always expressed in its parent's coordinate space.
//!
//! Sizes coming out of measurement may be infinite (unbounded queries) but are
//! never allowed to be NaN or negative once they reach layout code; use
//! [`Size::sanitized`] at every boundary where a size is consumed.

/// 2D point
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Offset the point by a delta
    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// 2D size
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const ZERO: Size = Size {
        width: 0.0,
        height: 0.0,
    };

    /// Unbounded size used for "how big would you like to be" queries
    pub const INFINITE: Size = Size {
        width: f32::INFINITY,
        height: f32::INFINITY,
    };

    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Convert to a Rect at the origin (0, 0)
    pub const fn to_rect(self) -> Rect {
        Rect {
            origin: Point::ZERO,
            size: self,
        }
    }

    /// Replace NaN and negative extents with zero.
    ///
    /// Infinity is preserved so unbounded queries survive sanitizing.
    pub fn sanitized(self) -> Self {
        Self::new(clamp_extent(self.width), clamp_extent(self.height))
    }

    /// True if either extent is zero, negative or NaN
    pub fn any_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Component-wise maximum
    pub fn max(self, other: Size) -> Size {
        Size::new(self.width.max(other.width), self.height.max(other.height))
    }

    /// Component-wise minimum
    pub fn min(self, other: Size) -> Size {
        Size::new(self.width.min(other.width), self.height.min(other.height))
    }

    /// Clamp into `[min, max]`, where either bound may be absent
    pub fn clamp_between(self, min: Option<Size>, max: Option<Size>) -> Size {
        let mut result = self;
        if let Some(max) = max {
            result = result.min(max.sanitized());
        }
        if let Some(min) = min {
            result = result.max(min.sanitized());
        }
        result
    }

    /// Grow by the total extent of `thickness`
    pub fn inflate(self, thickness: Thickness) -> Size {
        Size::new(
            self.width + thickness.horizontal(),
            self.height + thickness.vertical(),
        )
    }

    /// Shrink by the total extent of `thickness`, never going below zero
    pub fn deflate(self, thickness: Thickness) -> Size {
        Size::new(
            self.width - thickness.horizontal(),
            self.height - thickness.vertical(),
        )
        .sanitized()
    }
}

impl From<Size> for Rect {
    /// Convert Size to Rect at origin (0, 0)
    fn from(size: Size) -> Self {
        size.to_rect()
    }
}

fn clamp_extent(value: f32) -> f32 {
    if value.is_nan() || value < 0.0 {
        0.0
    } else {
        value
    }
}

/// 2D rectangle
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        origin: Point::ZERO,
        size: Size::ZERO,
    };

    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    pub fn x(&self) -> f32 {
        self.origin.x
    }

    pub fn y(&self) -> f32 {
        self.origin.y
    }

    pub fn width(&self) -> f32 {
        self.size.width
    }

    pub fn height(&self) -> f32 {
        self.size.height
    }

    pub fn right(&self) -> f32 {
        self.origin.x + self.size.width
    }

    pub fn bottom(&self) -> f32 {
        self.origin.y + self.size.height
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.origin.x
            && point.x <= self.right()
            && point.y >= self.origin.y
            && point.y <= self.bottom()
    }

    /// Get the size of this rect
    pub fn size(&self) -> Size {
        self.size
    }

    /// Offset the rect by a delta
    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Rect {
            origin: self.origin.offset(dx, dy),
            size: self.size,
        }
    }

    /// Shrink the rect by `thickness` on each side.
    ///
    /// Returns an empty rect at the same origin when the result would
    /// have a negative extent.
    pub fn deflate(&self, thickness: Thickness) -> Self {
        let width = self.size.width - thickness.horizontal();
        let height = self.size.height - thickness.vertical();
        if width < 0.0 || height < 0.0 || width.is_nan() || height.is_nan() {
            return Rect::from_origin_size(self.origin, Size::ZERO);
        }
        Rect::new(
            self.origin.x + thickness.left,
            self.origin.y + thickness.top,
            width,
            height,
        )
    }

    /// Same rect with NaN/negative extents clamped to zero
    pub fn sanitized(&self) -> Self {
        Rect::from_origin_size(self.origin, self.size.sanitized())
    }
}

/// Edge insets used for margins and padding
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Thickness {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Thickness {
    pub const ZERO: Thickness = Thickness {
        left: 0.0,
        top: 0.0,
        right: 0.0,
        bottom: 0.0,
    };

    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Same inset on every edge
    pub const fn uniform(value: f32) -> Self {
        Self::new(value, value, value, value)
    }

    /// `horizontal` on left/right, `vertical` on top/bottom
    pub const fn symmetric(horizontal: f32, vertical: f32) -> Self {
        Self::new(horizontal, vertical, horizontal, vertical)
    }

    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }

    pub fn size(&self) -> Size {
        Size::new(self.horizontal(), self.vertical())
    }
}
