//! The document seam: everything the pipeline needs from a rendering and
//! mutation library.
//!
//! All coordinates crossing this trait are **page space**: points (pixels
//! for images) with a top-left origin. Pages are 1-indexed.
//!
//! [`crate::pipeline::render::PdfiumDocument`] implements it for PDFs;
//! [`ImageDocument`] wraps a single decoded raster image.

use crate::error::Pdf2FormError;
use crate::geometry::{PageSize, Point, Rect};
use image::DynamicImage;

/// Native widget subtype of an embedded form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    Text,
    PushButton,
    Checkbox,
    RadioButton,
    ComboBox,
    ListBox,
    Signature,
    Unknown,
}

/// An embedded form widget as read from the document.
#[derive(Debug, Clone, PartialEq)]
pub struct FormWidget {
    pub page: usize,
    pub kind: WidgetKind,
    pub name: Option<String>,
    pub value: Option<String>,
    /// Page space.
    pub rect: Rect,
}

/// A document the pipeline can read from and write onto.
pub trait FormDocument {
    fn page_count(&self) -> usize;

    fn page_size(&self, page: usize) -> Result<PageSize, Pdf2FormError>;

    /// Render `page` at `scale` × its page-space size.
    fn rasterize(&self, page: usize, scale: f32) -> Result<DynamicImage, Pdf2FormError>;

    /// Embedded form widgets across all pages.
    ///
    /// `Ok(None)` means the document has no form at all.
    fn form_widgets(&self) -> Result<Option<Vec<FormWidget>>, Pdf2FormError>;

    /// Width of `text` in the overlay font at `size`.
    fn measure_text(&self, text: &str, size: f32) -> Result<f32, Pdf2FormError>;

    /// Draw `text` in black with its baseline starting at `origin`.
    fn insert_text(
        &mut self,
        page: usize,
        origin: Point,
        text: &str,
        size: f32,
    ) -> Result<(), Pdf2FormError>;

    /// Stroke a black open polyline through `points`.
    ///
    /// All or nothing: on error the page is left untouched.
    fn draw_polyline(
        &mut self,
        page: usize,
        points: &[Point],
        width: f32,
    ) -> Result<(), Pdf2FormError>;

    /// Serialise the (possibly modified) document.
    fn save(&self) -> Result<Vec<u8>, Pdf2FormError>;
}

/// A single raster image treated as a one-page, read-only document.
///
/// Page space is the image's pixel grid, so geometry detected on it is
/// already at scale 1.
pub struct ImageDocument {
    image: DynamicImage,
    name: String,
}

impl ImageDocument {
    pub fn new(image: DynamicImage, name: impl Into<String>) -> Self {
        Self {
            image,
            name: name.into(),
        }
    }

    /// Decode image bytes (PNG, JPEG, BMP, TIFF).
    pub fn decode(bytes: &[u8], name: impl Into<String>) -> Result<Self, Pdf2FormError> {
        let name = name.into();
        let image = image::load_from_memory(bytes).map_err(|e| Pdf2FormError::CorruptDocument {
            source_name: name.clone(),
            detail: e.to_string(),
        })?;
        Ok(Self { image, name })
    }

    fn check_page(&self, page: usize) -> Result<(), Pdf2FormError> {
        if page == 1 {
            Ok(())
        } else {
            Err(Pdf2FormError::PageOutOfRange { page, total: 1 })
        }
    }

    fn read_only(&self) -> Pdf2FormError {
        Pdf2FormError::UnsupportedContent {
            source_name: self.name.clone(),
            detected: "raster image (overlay needs a PDF)".into(),
        }
    }
}

impl FormDocument for ImageDocument {
    fn page_count(&self) -> usize {
        1
    }

    fn page_size(&self, page: usize) -> Result<PageSize, Pdf2FormError> {
        self.check_page(page)?;
        Ok(PageSize {
            width: self.image.width() as f64,
            height: self.image.height() as f64,
        })
    }

    fn rasterize(&self, page: usize, scale: f32) -> Result<DynamicImage, Pdf2FormError> {
        self.check_page(page)?;
        if (scale - 1.0).abs() < f32::EPSILON {
            return Ok(self.image.clone());
        }
        let w = ((self.image.width() as f32) * scale).round().max(1.0) as u32;
        let h = ((self.image.height() as f32) * scale).round().max(1.0) as u32;
        Ok(self
            .image
            .resize_exact(w, h, image::imageops::FilterType::Triangle))
    }

    fn form_widgets(&self) -> Result<Option<Vec<FormWidget>>, Pdf2FormError> {
        Ok(None)
    }

    fn measure_text(&self, _text: &str, _size: f32) -> Result<f32, Pdf2FormError> {
        Err(self.read_only())
    }

    fn insert_text(
        &mut self,
        _page: usize,
        _origin: Point,
        _text: &str,
        _size: f32,
    ) -> Result<(), Pdf2FormError> {
        Err(self.read_only())
    }

    fn draw_polyline(
        &mut self,
        _page: usize,
        _points: &[Point],
        _width: f32,
    ) -> Result<(), Pdf2FormError> {
        Err(self.read_only())
    }

    fn save(&self) -> Result<Vec<u8>, Pdf2FormError> {
        Err(self.read_only())
    }
}
