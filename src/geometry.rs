use std::ops::{Add, Sub};

/// A pair of coordinates.
///
/// Used for positions, scales, pivots, skews and anchors, so the component type varies:
/// scene nodes keep `Point<f32>` positions but `Point<i32>` pivots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point<T = f32> {
    pub x: T,
    pub y: T,
}

impl<T> Point<T> {
    pub const fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl<T: Copy + Default + PartialEq> Point<T> {
    pub fn is_zero(&self) -> bool {
        self.x == T::default() && self.y == T::default()
    }
}

impl<T: Add<Output = T>> Add for Point<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl<T: Sub<Output = T>> Sub for Point<T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Width and height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size<T = f32> {
    pub width: T,
    pub height: T,
}

impl<T> Size<T> {
    pub const fn new(width: T, height: T) -> Self {
        Self { width, height }
    }
}

impl<T: Copy + Default + PartialEq> Size<T> {
    /// Both dimensions are zero.
    pub fn is_zero(&self) -> bool {
        self.width == T::default() && self.height == T::default()
    }

    /// At least one dimension is zero.
    pub fn has_zero_area(&self) -> bool {
        self.width == T::default() || self.height == T::default()
    }
}

/// An axis-aligned rectangle made of an origin and a size.
///
/// Containment is half-open: the left and top edges are inside, the right and bottom edges
/// are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect<T = f32> {
    pub origin: Point<T>,
    pub size: Size<T>,
}

impl<T> Rect<T> {
    pub const fn new(x: T, y: T, width: T, height: T) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub const fn from_origin_size(origin: Point<T>, size: Size<T>) -> Self {
        Self { origin, size }
    }
}

impl<T> Rect<T>
where
    T: Copy + Default + PartialOrd + Add<Output = T>,
{
    pub fn max_x(&self) -> T {
        self.origin.x + self.size.width
    }

    pub fn max_y(&self) -> T {
        self.origin.y + self.size.height
    }

    /// Origin and size are both zero.
    pub fn is_null(&self) -> bool {
        let zero = T::default();
        self.origin.x == zero
            && self.origin.y == zero
            && self.size.width == zero
            && self.size.height == zero
    }

    /// Returns true if `point` lies inside the rectangle. Rectangles without a positive width
    /// and height contain nothing.
    pub fn contains(&self, point: Point<T>) -> bool {
        let zero = T::default();
        if self.size.width <= zero || self.size.height <= zero {
            return false;
        }

        point.x >= self.origin.x
            && point.x < self.max_x()
            && point.y >= self.origin.y
            && point.y < self.max_y()
    }

    /// Returns true if the two rectangles overlap. Touching edges count as overlap.
    pub fn intersects(&self, other: &Rect<T>) -> bool {
        let in_range = |value: T, min: T, max: T| value >= min && value <= max;

        let x_overlap = in_range(self.origin.x, other.origin.x, other.max_x())
            || in_range(other.origin.x, self.origin.x, self.max_x());
        let y_overlap = in_range(self.origin.y, other.origin.y, other.max_y())
            || in_range(other.origin.y, self.origin.y, self.max_y());

        x_overlap && y_overlap
    }
}

impl Rect<i32> {
    /// Smallest integer rectangle covering every point, flooring the minimum and ceiling the
    /// maximum. Returns the null rectangle for an empty iterator.
    pub fn enclosing(points: impl IntoIterator<Item = Point<f32>>) -> Self {
        let mut min = Point::new(f32::INFINITY, f32::INFINITY);
        let mut max = Point::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
        let mut any = false;

        for point in points {
            any = true;
            min.x = min.x.min(point.x);
            min.y = min.y.min(point.y);
            max.x = max.x.max(point.x);
            max.y = max.y.max(point.y);
        }

        if !any {
            return Self::default();
        }

        let x = min.x.floor() as i32;
        let y = min.y.floor() as i32;
        Self::new(x, y, max.x.ceil() as i32 - x, max.y.ceil() as i32 - y)
    }

    /// Union of two integer rectangles.
    pub fn union(&self, other: &Rect<i32>) -> Self {
        let min_x = self.origin.x.min(other.origin.x);
        let min_y = self.origin.y.min(other.origin.y);
        let max_x = self.max_x().max(other.max_x());
        let max_y = self.max_y().max(other.max_y());
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}
