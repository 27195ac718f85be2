//! pdfium-backed [`FormDocument`].
//!
//! pdfium keeps thread-local state and is not safe to drive from async
//! contexts, so every function here is blocking; callers in
//! [`crate::convert`] run them inside `tokio::task::spawn_blocking`.
//!
//! PDF page space has a bottom-left origin. This adapter is the only place
//! that knows: rectangles and points are flipped (`y' = height - y`) on the
//! way in and out so the rest of the crate works top-left.

use crate::document::{FormDocument, FormWidget, WidgetKind};
use crate::error::Pdf2FormError;
use crate::geometry::{PageSize, Point, Rect};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Bind to pdfium: an explicit library path when given, else a copy next
/// to the working directory, else the system library.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, Pdf2FormError> {
    let bindings = match lib_path {
        Some(path) if path.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
        }
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| Pdf2FormError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

/// Load PDF bytes, mapping pdfium's load errors onto the crate taxonomy.
pub fn open_pdf<'a>(
    pdfium: &'a Pdfium,
    bytes: Vec<u8>,
    password: Option<&str>,
    name: &str,
) -> Result<PdfiumDocument<'a>, Pdf2FormError> {
    let document = pdfium.load_pdf_from_byte_vec(bytes, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                Pdf2FormError::WrongPassword {
                    source_name: name.to_string(),
                }
            } else {
                Pdf2FormError::PasswordRequired {
                    source_name: name.to_string(),
                }
            }
        } else {
            Pdf2FormError::CorruptDocument {
                source_name: name.to_string(),
                detail: err_str,
            }
        }
    })?;

    info!("PDF loaded: {} pages", document.pages().len());
    Ok(PdfiumDocument::new(document))
}

/// A loaded PDF plus the font used for overlay text.
pub struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
    font: PdfFontToken,
}

impl<'a> PdfiumDocument<'a> {
    pub fn new(mut document: PdfDocument<'a>) -> Self {
        let font = document.fonts_mut().helvetica();
        Self { document, font }
    }

    fn page(&self, page: usize) -> Result<PdfPage<'_>, Pdf2FormError> {
        let index = page_index(page, self.page_count())?;
        self.document
            .pages()
            .get(index)
            .map_err(|e| Pdf2FormError::Internal(format!("page {}: {:?}", page, e)))
    }
}

/// 1-indexed page number → pdfium's `u16` page index.
fn page_index(page: usize, total: usize) -> Result<u16, Pdf2FormError> {
    if page == 0 || page > total {
        return Err(Pdf2FormError::PageOutOfRange { page, total });
    }
    u16::try_from(page - 1).map_err(|_| Pdf2FormError::PageOutOfRange { page, total })
}

fn widget_kind(field_type: PdfFormFieldType) -> WidgetKind {
    match field_type {
        PdfFormFieldType::Text => WidgetKind::Text,
        PdfFormFieldType::PushButton => WidgetKind::PushButton,
        PdfFormFieldType::Checkbox => WidgetKind::Checkbox,
        PdfFormFieldType::RadioButton => WidgetKind::RadioButton,
        PdfFormFieldType::ComboBox => WidgetKind::ComboBox,
        PdfFormFieldType::ListBox => WidgetKind::ListBox,
        PdfFormFieldType::Signature => WidgetKind::Signature,
        _ => WidgetKind::Unknown,
    }
}

fn widget_value(field: &PdfFormField) -> Option<String> {
    if let Some(text) = field.as_text_field() {
        return text.value();
    }
    if let Some(combo) = field.as_combo_box_field() {
        return combo.value();
    }
    if let Some(checkbox) = field.as_checkbox_field() {
        return checkbox.is_checked().ok().map(|c| c.to_string());
    }
    None
}

fn write_err(e: PdfiumError) -> Pdf2FormError {
    Pdf2FormError::DocumentWrite(format!("{:?}", e))
}

impl FormDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_size(&self, page: usize) -> Result<PageSize, Pdf2FormError> {
        let p = self.page(page)?;
        Ok(PageSize {
            width: p.width().value as f64,
            height: p.height().value as f64,
        })
    }

    fn rasterize(&self, page: usize, scale: f32) -> Result<DynamicImage, Pdf2FormError> {
        let p = self.page(page)?;
        let width = (p.width().value * scale).round() as i32;
        let height = (p.height().value * scale).round() as i32;

        let render_config = PdfRenderConfig::new()
            .set_target_width(width)
            .set_maximum_height(height)
            .render_form_data(true);

        let bitmap = p
            .render_with_config(&render_config)
            .map_err(|e| Pdf2FormError::RasterisationFailed {
                page,
                detail: format!("{:?}", e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            page,
            image.width(),
            image.height()
        );
        Ok(image)
    }

    fn form_widgets(&self) -> Result<Option<Vec<FormWidget>>, Pdf2FormError> {
        if self.document.form().is_none() {
            return Ok(None);
        }

        let mut widgets = Vec::new();
        for (index, page) in self.document.pages().iter().enumerate() {
            let page_height = page.height().value as f64;
            for annotation in page.annotations().iter() {
                let Some(field) = annotation.as_form_field() else {
                    continue;
                };
                let bounds = annotation.bounds().map_err(|e| {
                    Pdf2FormError::Internal(format!("widget bounds on page {}: {:?}", index + 1, e))
                })?;
                widgets.push(FormWidget {
                    page: index + 1,
                    kind: widget_kind(field.field_type()),
                    name: field.name(),
                    value: widget_value(field),
                    rect: Rect::new(
                        bounds.left().value as f64,
                        page_height - bounds.top().value as f64,
                        bounds.right().value as f64,
                        page_height - bounds.bottom().value as f64,
                    ),
                });
            }
        }
        Ok(Some(widgets))
    }

    fn measure_text(&self, text: &str, size: f32) -> Result<f32, Pdf2FormError> {
        let object = PdfPageTextObject::new(&self.document, text, self.font, PdfPoints::new(size))
            .map_err(write_err)?;
        Ok(object.width().map_err(write_err)?.value)
    }

    fn insert_text(
        &mut self,
        page: usize,
        origin: Point,
        text: &str,
        size: f32,
    ) -> Result<(), Pdf2FormError> {
        let font = self.font;
        let mut p = self.page(page)?;
        let height = p.height().value;
        p.objects_mut()
            .create_text_object(
                PdfPoints::new(origin.x as f32),
                PdfPoints::new(height - origin.y as f32),
                text,
                font,
                PdfPoints::new(size),
            )
            .map_err(write_err)?;
        Ok(())
    }

    fn draw_polyline(
        &mut self,
        page: usize,
        points: &[Point],
        width: f32,
    ) -> Result<(), Pdf2FormError> {
        let [first, rest @ ..] = points else {
            return Ok(());
        };
        if rest.is_empty() {
            return Ok(());
        }
        let height = self.page(page)?.height().value;
        let flip = |p: &Point| (PdfPoints::new(p.x as f32), PdfPoints::new(height - p.y as f32));

        // The whole stroke is one path object, built off-page and attached
        // in a single call.
        let (x, y) = flip(first);
        let mut path = PdfPagePathObject::new(
            &self.document,
            x,
            y,
            Some(PdfColor::BLACK),
            Some(PdfPoints::new(width)),
            None,
        )
        .map_err(write_err)?;
        for point in rest {
            let (x, y) = flip(point);
            path.line_to(x, y).map_err(write_err)?;
        }

        let mut p = self.page(page)?;
        p.objects_mut().add_path_object(path).map_err(write_err)?;
        Ok(())
    }

    fn save(&self) -> Result<Vec<u8>, Pdf2FormError> {
        self.document.save_to_bytes().map_err(write_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_index_is_zero_based_and_bounded() {
        assert_eq!(page_index(1, 3).unwrap(), 0);
        assert_eq!(page_index(3, 3).unwrap(), 2);
        assert!(matches!(
            page_index(0, 3),
            Err(Pdf2FormError::PageOutOfRange { page: 0, total: 3 })
        ));
        assert!(matches!(page_index(4, 3), Err(Pdf2FormError::PageOutOfRange { .. })));
    }

    #[test]
    fn page_index_never_truncates() {
        let page = u16::MAX as usize + 2;
        assert!(matches!(
            page_index(page, page),
            Err(Pdf2FormError::PageOutOfRange { page: p, .. }) if p == page
        ));
        assert_eq!(page_index(65_536, 70_000).unwrap(), u16::MAX);
    }
}
