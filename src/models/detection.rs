use serde::{Deserialize, Serialize};

/// A raw detector output in source image pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Left edge.
    pub x1: f32,
    /// Top edge.
    pub y1: f32,
    /// Right edge.
    pub x2: f32,
    /// Bottom edge.
    pub y2: f32,
    /// Confidence of the best class.
    pub score: f32,
    /// Index of the best class.
    pub class_id: usize,
}

impl Detection {
    /// Area in square pixels, zero for inverted boxes.
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Intersection over union with another detection.
    pub fn iou(&self, other: &Detection) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }
}

/// An integer pixel box with `x1 < x2` and `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DetectionBox {
    /// Left edge, inclusive.
    pub x1: i32,
    /// Top edge, inclusive.
    pub y1: i32,
    /// Right edge, inclusive.
    pub x2: i32,
    /// Bottom edge, inclusive.
    pub y2: i32,
}

impl DetectionBox {
    /// Creates a box, returning `None` unless `x1 < x2` and `y1 < y2`.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Option<Self> {
        (x1 < x2 && y1 < y2).then_some(Self { x1, y1, x2, y2 })
    }

    /// Truncates a detection's coordinates toward zero.
    ///
    /// Detections that collapse to an empty box are rejected.
    pub fn from_detection(det: &Detection) -> Option<Self> {
        Self::new(det.x1 as i32, det.y1 as i32, det.x2 as i32, det.y2 as i32)
    }

    /// Whether the point lies inside the box, bounds included.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.x1 <= x && x <= self.x2 && self.y1 <= y && y <= self.y2
    }

    /// `(x2 - x1) * (y2 - y1)`.
    pub fn area(&self) -> i64 {
        (self.x2 as i64 - self.x1 as i64) * (self.y2 as i64 - self.y1 as i64)
    }
}
