//! Text recognition seam.
//!
//! OCR engines are expensive to initialise (model load) and cheap to reuse,
//! so the crate never constructs one per request. Build one at process start
//! and inject it as a [`SharedRecognizer`] through
//! [`crate::config::DetectionConfigBuilder::recognizer`].
//!
//! Engines that cannot be called concurrently implement [`OcrBackend`]
//! (which takes `&mut self`) and are wrapped in a [`LockedRecognizer`], which
//! serialises calls behind a mutex.

use crate::error::Pdf2FormError;
use crate::geometry::Polygon;
use image::DynamicImage;
use std::sync::{Arc, Mutex};

/// One recognised line: raster-space polygon, text, confidence in `0..=1`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedLine {
    pub polygon: Polygon,
    pub text: String,
    pub confidence: f32,
}

/// A reentrant OCR engine.
pub trait TextRecognizer: Send + Sync {
    /// Short engine name, recorded as the source of each text block.
    fn name(&self) -> &str;

    /// Recognise every text line in `image`, in the engine's output order.
    ///
    /// The error string is wrapped into [`Pdf2FormError::OcrFailed`] by the
    /// caller together with the page number.
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<RecognizedLine>, String>;
}

/// Process-wide recognizer handle.
pub type SharedRecognizer = Arc<dyn TextRecognizer>;

/// A non-reentrant OCR engine.
pub trait OcrBackend: Send {
    fn name(&self) -> &str;
    fn recognize(&mut self, image: &DynamicImage) -> Result<Vec<RecognizedLine>, String>;
}

/// Makes any [`OcrBackend`] shareable by serialising calls.
pub struct LockedRecognizer<B: OcrBackend> {
    name: String,
    backend: Mutex<B>,
}

impl<B: OcrBackend> LockedRecognizer<B> {
    pub fn new(backend: B) -> Self {
        Self {
            name: backend.name().to_string(),
            backend: Mutex::new(backend),
        }
    }

    pub fn shared(backend: B) -> SharedRecognizer
    where
        B: 'static,
    {
        Arc::new(Self::new(backend))
    }
}

impl<B: OcrBackend> TextRecognizer for LockedRecognizer<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn recognize(&self, image: &DynamicImage) -> Result<Vec<RecognizedLine>, String> {
        let mut backend = self
            .backend
            .lock()
            .map_err(|_| format!("{} engine lock poisoned by an earlier panic", self.name))?;
        backend.recognize(image)
    }
}

/// Wrap a recognizer failure with page context.
pub(crate) fn ocr_error(recognizer: &dyn TextRecognizer, page: usize, detail: String) -> Pdf2FormError {
    Pdf2FormError::OcrFailed {
        page,
        engine: recognizer.name().to_string(),
        detail,
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxBackend;

#[cfg(feature = "onnx")]
mod onnx {
    //! `pure-onnx-ocr` backend: detection + recognition ONNX models loaded
    //! from a directory containing `det.onnx`, `latin_rec.onnx` and
    //! `latin_dict.txt`.

    use super::{LockedRecognizer, OcrBackend, RecognizedLine, SharedRecognizer};
    use crate::error::Pdf2FormError;
    use crate::geometry::Polygon;
    use image::DynamicImage;
    use std::path::Path;
    use tracing::{debug, info};

    pub struct OnnxBackend {
        engine: pure_onnx_ocr::engine::OcrEngine,
    }

    impl OnnxBackend {
        pub fn from_dir(model_dir: &Path) -> Result<Self, Pdf2FormError> {
            let det_path = model_dir.join("det.onnx");
            let rec_path = model_dir.join("latin_rec.onnx");
            let dict_path = model_dir.join("latin_dict.txt");

            for path in [&det_path, &rec_path, &dict_path] {
                if !path.exists() {
                    return Err(Pdf2FormError::FileNotFound { path: path.clone() });
                }
            }

            let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
                .det_model_path(&det_path)
                .rec_model_path(&rec_path)
                .dictionary_path(&dict_path)
                .build()
                .map_err(|e| Pdf2FormError::InvalidConfig(format!("pure-onnx-ocr: {}", e)))?;

            info!("Loaded pure-onnx-ocr engine from {}", model_dir.display());
            Ok(Self { engine })
        }

        /// Load the models and wrap them as a process-wide handle.
        pub fn shared_from_dir(model_dir: &Path) -> Result<SharedRecognizer, Pdf2FormError> {
            Ok(LockedRecognizer::shared(Self::from_dir(model_dir)?))
        }
    }

    fn to_polygon(polygon: &pure_onnx_ocr::Polygon<f64>) -> Polygon {
        let mut coords = [0.0f64; 8];
        for (i, coord) in polygon.exterior().coords().take(4).enumerate() {
            coords[i * 2] = coord.x;
            coords[i * 2 + 1] = coord.y;
        }
        Polygon(coords)
    }

    impl OcrBackend for OnnxBackend {
        fn name(&self) -> &str {
            "pure-onnx-ocr"
        }

        fn recognize(&mut self, image: &DynamicImage) -> Result<Vec<RecognizedLine>, String> {
            let results = self
                .engine
                .run_from_image(image)
                .map_err(|e| e.to_string())?;
            debug!("pure-onnx-ocr returned {} text regions", results.len());

            Ok(results
                .iter()
                .map(|r| RecognizedLine {
                    polygon: to_polygon(&r.bounding_box),
                    text: r.text.replace("[UNK]", " ").trim().to_string(),
                    confidence: r.confidence,
                })
                .filter(|line| !line.text.is_empty())
                .collect())
        }
    }
}
