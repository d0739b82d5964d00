use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer pixel coordinate. Which space it lives in (UI or model) is
/// decided by whoever holds it; crossing spaces goes through
/// [`CoordinateMapper`](super::CoordinateMapper).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Spatial extent of an image or coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<(u32, u32)> for Extent {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Point label understood by the segmentation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Background = 0,
    Foreground = 1,
}

impl Label {
    pub fn value(self) -> f32 {
        self as i32 as f32
    }
}

/// Axis-aligned box with `xmin <= xmax` and `ymin <= ymax`.
///
/// The ordering is established here from the two corners, never taken from
/// the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoxRegion {
    xmin: u32,
    ymin: u32,
    xmax: u32,
    ymax: u32,
}

impl BoxRegion {
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            xmin: a.x.min(b.x),
            ymin: a.y.min(b.y),
            xmax: a.x.max(b.x),
            ymax: a.y.max(b.y),
        }
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.xmin, self.ymin)
    }

    pub fn bottom_right(&self) -> Point {
        Point::new(self.xmax, self.ymax)
    }

    /// `[xmin, ymin, xmax, ymax]`
    pub fn to_array(&self) -> [u32; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }
}

/// Which prompt fields the segmentation call actually used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromptMode {
    #[serde(rename = "box-only")]
    BoxOnly,
    #[serde(rename = "point-only")]
    PointOnly,
    #[serde(rename = "box+point")]
    BoxAndPoint,
}

impl fmt::Display for PromptMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BoxOnly => "box-only",
            Self::PointOnly => "point-only",
            Self::BoxAndPoint => "box+point",
        };
        f.write_str(s)
    }
}

/// Ordered labelled points plus an optional box, in model space.
///
/// Built by [`PromptBuilder`](super::PromptBuilder), which guarantees the
/// prompt is non-empty and that foreground points precede background points.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub(super) points: Vec<(Point, Label)>,
    pub(super) bbox: Option<BoxRegion>,
}

impl Prompt {
    pub fn points(&self) -> &[(Point, Label)] {
        &self.points
    }

    pub fn bbox(&self) -> Option<BoxRegion> {
        self.bbox
    }

    pub fn mode(&self) -> PromptMode {
        match (self.bbox.is_some(), self.points.is_empty()) {
            (true, true) => PromptMode::BoxOnly,
            (true, false) => PromptMode::BoxAndPoint,
            (false, _) => PromptMode::PointOnly,
        }
    }
}
