//! Rectangles.

use cgmath::{Point2, Vector2, Zero};

/// A rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Rectangle origin.
    pub origin: Point2<f64>,

    /// Rectangle size.
    pub size: Vector2<f64>,
}

impl Rect {
    /// Returns a zero-sized rectangle at the origin.
    pub fn zero() -> Rect {
        Rect {
            origin: Point2::new(0., 0.),
            size: Vector2::zero(),
        }
    }

    /// Returns a new rectangle with the given size.
    pub fn with_size(&self, size: Vector2<f64>) -> Rect {
        Rect {
            origin: self.origin,
            size,
        }
    }

    /// Returns a new rectangle with only the given dimensions changed.
    pub fn with_dimensions(&self, width: Option<f64>, height: Option<f64>) -> Rect {
        self.with_size(Vector2::new(
            width.unwrap_or(self.size.x),
            height.unwrap_or(self.size.y),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_resize_keeps_other_dimension() {
        let rect = Rect {
            origin: Point2::new(1., 2.),
            size: Vector2::new(10., 20.),
        };
        let resized = rect.with_dimensions(Some(30.), None);
        assert_eq!(resized.origin, rect.origin);
        assert_eq!(resized.size, Vector2::new(30., 20.));
        assert_eq!(Rect::zero().with_dimensions(None, Some(4.)).size, Vector2::new(0., 4.));
    }
}
