//! Single-image PDF derivatives.
//!
//! The upload fields on the target forms accept PDFs for identity and supporting
//! documents. Each PDF holds exactly one page sized to the image (one pixel per point)
//! with the image embedded as a JPEG XObject.

use crate::constants::JPEG_QUALITY;
use crate::FilesError;
use image::codecs::jpeg::JpegEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::fs;
use std::path::Path;

/// Converts the image at `image_path` into a one-page PDF at `pdf_path`.
///
/// # Errors
///
/// Returns `FilesError` if the image cannot be decoded, re-encoded, or the PDF
/// cannot be written.
pub fn convert_image_to_pdf(image_path: &Path, pdf_path: &Path) -> Result<(), FilesError> {
    let rgb = image::open(image_path)?.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode_image(&rgb)?;

    let bytes = single_image_pdf(&jpeg, width, height)?;
    fs::write(pdf_path, bytes).map_err(|e| {
        FilesError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to write PDF {}: {}", pdf_path.display(), e),
        ))
    })
}

fn single_image_pdf(jpeg: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FilesError> {
    let width = i64::from(width);
    let height = i64::from(height);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8_i64,
            "Filter" => "DCTDecode",
        },
        jpeg.to_vec(),
    ));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(width),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(height),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content
        .encode()
        .map_err(|e| FilesError::Pdf(format!("Failed to encode page content: {e}")))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! { "Im0" => image_id },
    });

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(width),
            Object::Integer(height),
        ],
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1_i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| FilesError::Pdf(format!("Failed to serialise PDF: {e}")))?;
    Ok(bytes)
}
