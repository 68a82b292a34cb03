//! Detection candidates and overlap-based suppression.

pub mod nms;

/// Axis-aligned box in image pixels with inclusive right/bottom edges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BoundingBox {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Inclusive width; zero for degenerate boxes.
    pub fn width(&self) -> i64 {
        (i64::from(self.right) - i64::from(self.left) + 1).max(0)
    }

    /// Inclusive height; zero for degenerate boxes.
    pub fn height(&self) -> i64 {
        (i64::from(self.bottom) - i64::from(self.top) + 1).max(0)
    }

    /// Inclusive pixel area.
    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }

    /// Pixel area shared with `other`.
    pub fn intersection_area(&self, other: &BoundingBox) -> i64 {
        BoundingBox {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        }
        .area()
    }

    /// Intersection area divided by the smaller of the two areas.
    ///
    /// This is not IoU: a box fully inside another has ratio 1.0 however
    /// small it is. Returns 0.0 if either box is empty.
    pub fn overlap_ratio(&self, other: &BoundingBox) -> f32 {
        let min_area = self.area().min(other.area());
        if min_area == 0 {
            return 0.0;
        }
        (self.intersection_area(other) as f64 / min_area as f64) as f32
    }

    /// Clamps every coordinate to `[0, width - 1] x [0, height - 1]`.
    pub fn clip(&self, width: usize, height: usize) -> BoundingBox {
        let max_x = i32::try_from(width.saturating_sub(1)).unwrap_or(i32::MAX);
        let max_y = i32::try_from(height.saturating_sub(1)).unwrap_or(i32::MAX);
        BoundingBox {
            left: self.left.clamp(0, max_x),
            top: self.top.clamp(0, max_y),
            right: self.right.clamp(0, max_x),
            bottom: self.bottom.clamp(0, max_y),
        }
    }

    /// True if `other` lies entirely inside this box.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.right <= self.right
            && other.bottom <= self.bottom
    }
}

/// One scored root placement before suppression.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub bbox: BoundingBox,
    pub score: f32,
    /// Index of the model component that produced the candidate.
    pub component: usize,
    /// Pyramid level of the root filter.
    pub level: usize,
    /// Part boxes at their optimal displacements, in model part order.
    pub parts: Vec<BoundingBox>,
}

impl Candidate {
    /// Clips the root box and every part box to the image.
    pub fn clip(mut self, width: usize, height: usize) -> Self {
        self.bbox = self.bbox.clip(width, height);
        for part in &mut self.parts {
            *part = part.clip(width, height);
        }
        self
    }
}
