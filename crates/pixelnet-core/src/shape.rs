use std::fmt;

// Shape — the four-level extent of a tensor
//
// Every tensor in pixelnet is four-dimensional:
//
//   sample (batch element) → map (feature plane) → line (y) → pixel (x)
//
// Storage is row-major within a map, maps are contiguous within a sample and
// samples are contiguous overall, so the linear offset of an element is
//
//   sample·maps·height·width + map·height·width + y·width + x
//
// Vectors and matrices are expressed by leaving the trailing extents at 1.

/// Extent of a tensor along its four axes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Shape {
    pub samples: usize,
    pub maps: usize,
    pub height: usize,
    pub width: usize,
}

impl Shape {
    /// Create a shape in canonical (samples, maps, height, width) order.
    pub const fn new(samples: usize, maps: usize, height: usize, width: usize) -> Self {
        Shape {
            samples,
            maps,
            height,
            width,
        }
    }

    /// Create a shape from the legacy positional order used by
    /// [`Tensor::new`](crate::Tensor::new) and friends: samples, width,
    /// height, maps.
    pub const fn from_legacy(samples: usize, width: usize, height: usize, maps: usize) -> Self {
        Shape::new(samples, maps, height, width)
    }

    /// Total number of elements.
    pub const fn elements(&self) -> usize {
        self.samples * self.maps * self.height * self.width
    }

    /// Elements in one (sample, map) plane.
    pub const fn plane_size(&self) -> usize {
        self.height * self.width
    }

    /// Elements in one sample.
    pub const fn sample_size(&self) -> usize {
        self.maps * self.height * self.width
    }

    /// Whether the index lies inside the shape on every axis.
    pub const fn contains(&self, x: usize, y: usize, map: usize, sample: usize) -> bool {
        x < self.width && y < self.height && map < self.maps && sample < self.samples
    }

    /// Linear offset of an element, without bounds checks.
    pub const fn offset_unchecked(&self, x: usize, y: usize, map: usize, sample: usize) -> usize {
        sample * self.sample_size() + map * self.plane_size() + y * self.width + x
    }

    /// Number of elements when the product does not overflow `usize`.
    pub fn checked_elements(&self) -> Option<usize> {
        self.samples
            .checked_mul(self.maps)?
            .checked_mul(self.height)?
            .checked_mul(self.width)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(s: {}, m: {}, h: {}, w: {})",
            self.samples, self.maps, self.height, self.width
        )
    }
}

impl From<(usize, usize, usize, usize)> for Shape {
    /// Canonical order: (samples, maps, height, width).
    fn from((samples, maps, height, width): (usize, usize, usize, usize)) -> Self {
        Shape::new(samples, maps, height, width)
    }
}
