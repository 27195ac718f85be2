//! Geometry shared by detection and overlay.
//!
//! Two coordinate spaces meet here:
//!
//! * **raster space**: pixels of a page rendered at `scale` (OCR output,
//!   field-map polygons). `raster = page * scale`.
//! * **page space**: PDF points with a top-left origin, y growing downward.
//!   The pdfium adapter flips to PDF's bottom-left origin at the boundary.

use serde::{Deserialize, Serialize};

/// A point in either raster or page space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle, `(x0, y0)` top-left, `(x1, y1)` bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Divide every coordinate by `factor` (raster → page).
    pub fn descale(&self, factor: f64) -> Rect {
        Rect::new(
            self.x0 / factor,
            self.y0 / factor,
            self.x1 / factor,
            self.y1 / factor,
        )
    }

    /// Express the rectangle as fractions of the page size.
    pub fn normalize(&self, page: PageSize) -> Rect {
        let w = if page.width > 0.0 { page.width } else { 1.0 };
        let h = if page.height > 0.0 { page.height } else { 1.0 };
        Rect::new(self.x0 / w, self.y0 / h, self.x1 / w, self.y1 / h)
    }

    /// Point at fractional offsets `(fx, fy)` of the rectangle.
    pub fn at(&self, fx: f64, fy: f64) -> Point {
        Point::new(self.x0 + self.width() * fx, self.y0 + self.height() * fy)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x0 && p.x <= self.x1 && p.y >= self.y0 && p.y <= self.y1
    }
}

/// Page dimensions in page space (points for PDFs, pixels for images).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

/// A 4-point polygon flattened to `[x1, y1, x2, y2, x3, y3, x4, y4]`.
///
/// Corners run top-left, top-right, bottom-right, bottom-left as the OCR
/// detector emits them. The quadrilateral may be slightly rotated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon(pub [f64; 8]);

impl Polygon {
    /// Build from a slice; `None` unless it holds exactly 8 numbers.
    pub fn from_slice(coords: &[f64]) -> Option<Polygon> {
        let arr: [f64; 8] = coords.try_into().ok()?;
        Some(Polygon(arr))
    }

    /// Axis-aligned polygon covering `rect`.
    pub fn from_rect(rect: Rect) -> Polygon {
        Polygon([
            rect.x0, rect.y0, rect.x1, rect.y0, rect.x1, rect.y1, rect.x0, rect.y1,
        ])
    }

    pub fn coords(&self) -> &[f64; 8] {
        &self.0
    }

    /// y of the first corner; the schema builder's vertical sort key.
    pub fn top(&self) -> f64 {
        self.0[1]
    }

    /// Tight bounding box over all four corners.
    pub fn bounds(&self) -> Rect {
        let xs = [self.0[0], self.0[2], self.0[4], self.0[6]];
        let ys = [self.0[1], self.0[3], self.0[5], self.0[7]];
        Rect::new(
            xs.iter().copied().fold(f64::INFINITY, f64::min),
            ys.iter().copied().fold(f64::INFINITY, f64::min),
            xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            ys.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        )
    }

    /// Page-space rectangle used when writing a value back.
    ///
    /// Each edge reads only the two corners on that side: left edge from
    /// corners 1 and 4, top from 1 and 2, right from 2 and 3, bottom from
    /// 3 and 4.
    pub fn overlay_rect(&self, scale: f64) -> Rect {
        let c = &self.0;
        Rect::new(
            c[0].min(c[6]) / scale,
            c[1].min(c[3]) / scale,
            c[2].max(c[4]) / scale,
            c[5].max(c[7]) / scale,
        )
    }
}
