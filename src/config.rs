//! Configuration for detection and overlay.
//!
//! Detection is controlled by [`DetectionConfig`], overlay by
//! [`OverlayConfig`]; both are built through a builder that validates on
//! `build()`. The defaults reproduce the geometry contract between the two
//! halves: pages are rasterised at 2× for OCR, so field-map polygons are in
//! 2× raster units and overlay divides by 2 to get back to page points.

use crate::error::Pdf2FormError;
use crate::pipeline::ocr::SharedRecognizer;
use crate::pipeline::schema::DEFAULT_SECTION_GAP;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::path::PathBuf;

/// Magnification used when rasterising PDF pages for OCR.
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;

/// Configuration for field detection (`detect`, `detect_flat`, `detect_hybrid`).
///
/// # Example
/// ```rust
/// use edgequake_pdf2form::{DetectionConfig, PageSelection};
///
/// let config = DetectionConfig::builder()
///     .pages(PageSelection::Range(1, 3))
///     .section_gap(80.0)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct DetectionConfig {
    /// Raster magnification for PDF pages. Range 0.5–4.0. Default: 2.0.
    ///
    /// Field-map coordinates are expressed at this scale; overlay must use
    /// the same value as its `coordinate_scale`.
    pub render_scale: f32,

    /// Vertical distance (raster units) that starts a new schema section.
    /// Default: 100.
    pub section_gap: f64,

    /// Pages to run OCR on. Default: all pages.
    pub pages: PageSelection,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// OCR engine. Required unless every document has embedded form fields
    /// and only hybrid detection is used.
    pub recognizer: Option<SharedRecognizer>,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,

    /// Explicit pdfium library (file or directory). Default: `./`, then system.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Caller-supplied id echoed in hybrid responses. Default: random UUID.
    pub document_id: Option<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            render_scale: DEFAULT_RENDER_SCALE,
            section_gap: DEFAULT_SECTION_GAP,
            pages: PageSelection::default(),
            password: None,
            download_timeout_secs: 120,
            recognizer: None,
            progress_callback: None,
            pdfium_lib_path: None,
            document_id: None,
        }
    }
}

impl fmt::Debug for DetectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectionConfig")
            .field("render_scale", &self.render_scale)
            .field("section_gap", &self.section_gap)
            .field("pages", &self.pages)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("recognizer", &self.recognizer.as_ref().map(|r| r.name().to_string()))
            .field("progress_callback", &self.progress_callback.is_some())
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("document_id", &self.document_id)
            .finish()
    }
}

impl DetectionConfig {
    /// Create a new builder for `DetectionConfig`.
    pub fn builder() -> DetectionConfigBuilder {
        DetectionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`DetectionConfig`].
#[derive(Debug)]
pub struct DetectionConfigBuilder {
    config: DetectionConfig,
}

impl DetectionConfigBuilder {
    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale;
        self
    }

    pub fn section_gap(mut self, gap: f64) -> Self {
        self.config.section_gap = gap;
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn recognizer(mut self, recognizer: SharedRecognizer) -> Self {
        self.config.recognizer = Some(recognizer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn document_id(mut self, id: impl Into<String>) -> Self {
        self.config.document_id = Some(id.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DetectionConfig, Pdf2FormError> {
        let c = &self.config;
        if !(0.5..=4.0).contains(&c.render_scale) {
            return Err(Pdf2FormError::InvalidConfig(format!(
                "render scale must be 0.5–4.0, got {}",
                c.render_scale
            )));
        }
        if !(c.section_gap > 0.0) {
            return Err(Pdf2FormError::InvalidConfig(format!(
                "section gap must be > 0, got {}",
                c.section_gap
            )));
        }
        Ok(self.config)
    }
}

/// Configuration for writing values back onto a PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Factor between field-map coordinates and page points. Default: 2.0.
    pub coordinate_scale: f64,
    /// Initial font size for text values. Default: 10.
    pub font_size: f32,
    /// Smallest font size the fit loop will shrink to. Default: 6.
    pub min_font_size: f32,
    /// Shrink step. Default: 0.5.
    pub font_size_step: f32,
    /// Fraction of the box width text may occupy. Default: 0.95.
    pub fit_ratio: f32,
    /// Left inset of text inside its box, in points. Default: 2.
    pub text_inset: f64,
    /// Checkmark stroke width, in points. Default: 1.5.
    pub checkmark_width: f32,
    /// PDF user password for encrypted documents.
    #[serde(skip)]
    pub password: Option<String>,
    /// Explicit pdfium library (file or directory).
    pub pdfium_lib_path: Option<PathBuf>,
    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            coordinate_scale: DEFAULT_RENDER_SCALE as f64,
            font_size: 10.0,
            min_font_size: 6.0,
            font_size_step: 0.5,
            fit_ratio: 0.95,
            text_inset: 2.0,
            checkmark_width: 1.5,
            password: None,
            pdfium_lib_path: None,
            download_timeout_secs: 120,
        }
    }
}

impl OverlayConfig {
    /// Create a new builder for `OverlayConfig`.
    pub fn builder() -> OverlayConfigBuilder {
        OverlayConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`OverlayConfig`].
#[derive(Debug)]
pub struct OverlayConfigBuilder {
    config: OverlayConfig,
}

impl OverlayConfigBuilder {
    pub fn coordinate_scale(mut self, scale: f64) -> Self {
        self.config.coordinate_scale = scale;
        self
    }

    pub fn font_size(mut self, size: f32) -> Self {
        self.config.font_size = size;
        self
    }

    pub fn min_font_size(mut self, size: f32) -> Self {
        self.config.min_font_size = size;
        self
    }

    pub fn font_size_step(mut self, step: f32) -> Self {
        self.config.font_size_step = step;
        self
    }

    pub fn fit_ratio(mut self, ratio: f32) -> Self {
        self.config.fit_ratio = ratio;
        self
    }

    pub fn text_inset(mut self, inset: f64) -> Self {
        self.config.text_inset = inset;
        self
    }

    pub fn checkmark_width(mut self, width: f32) -> Self {
        self.config.checkmark_width = width;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<OverlayConfig, Pdf2FormError> {
        let c = &self.config;
        if !(c.coordinate_scale > 0.0) {
            return Err(Pdf2FormError::InvalidConfig(format!(
                "coordinate scale must be > 0, got {}",
                c.coordinate_scale
            )));
        }
        if !(c.min_font_size > 0.0) || c.min_font_size > c.font_size {
            return Err(Pdf2FormError::InvalidConfig(format!(
                "font sizes must satisfy 0 < min ({}) ≤ start ({})",
                c.min_font_size, c.font_size
            )));
        }
        if !(c.font_size_step > 0.0) {
            return Err(Pdf2FormError::InvalidConfig(
                "font size step must be > 0".into(),
            ));
        }
        if !(c.fit_ratio > 0.0 && c.fit_ratio <= 1.0) {
            return Err(Pdf2FormError::InvalidConfig(format!(
                "fit ratio must be in (0, 1], got {}",
                c.fit_ratio
            )));
        }
        Ok(self.config)
    }
}

/// Which pages of the document to run OCR on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Every page (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into sorted, deduplicated 1-indexed page numbers
    /// that exist in a document of `total_pages`.
    pub fn to_pages(&self, total_pages: usize) -> Vec<usize> {
        let mut pages: Vec<usize> = match self {
            PageSelection::All => (1..=total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![*p]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => ((*start).max(1)..=(*end).min(total_pages)).collect(),
            PageSelection::Set(pages) => pages
                .iter()
                .copied()
                .filter(|&p| p >= 1 && p <= total_pages)
                .collect(),
        };
        pages.sort_unstable();
        pages.dedup();
        pages
    }
}

/// Parses `all`, `5`, `3-15` or `1,3,5`. Pages are 1-indexed.
impl FromStr for PageSelection {
    type Err = Pdf2FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn page(token: &str) -> Result<usize, Pdf2FormError> {
            match token.trim().parse::<usize>() {
                Ok(0) => Err(Pdf2FormError::InvalidConfig(
                    "pages are 1-indexed; 0 is not a page".into(),
                )),
                Ok(p) => Ok(p),
                Err(_) => Err(Pdf2FormError::InvalidConfig(format!(
                    "'{}' is not a page number",
                    token.trim()
                ))),
            }
        }

        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(PageSelection::All);
        }
        if let Some((start, end)) = s.split_once('-') {
            let (start, end) = (page(start)?, page(end)?);
            if start > end {
                return Err(Pdf2FormError::InvalidConfig(format!(
                    "page range {start}-{end} runs backwards"
                )));
            }
            return Ok(PageSelection::Range(start, end));
        }
        if s.contains(',') {
            return s
                .split(',')
                .map(page)
                .collect::<Result<Vec<_>, _>>()
                .map(PageSelection::Set);
        }
        page(s).map(PageSelection::Single)
    }
}
