//! File and folder names used by the organizer.

/// Manifest written into each beneficiary folder after organising.
pub const MANIFEST_FILENAME: &str = "files.json";

/// Collage image written into each beneficiary folder before AI extraction.
pub const COLLAGE_FILENAME: &str = "collage.jpg";

/// Suffix appended to a role key for its PDF companion.
pub const PDF_KEY_SUFFIX: &str = "_pdf";

/// JPEG quality used when embedding document images into PDFs and collages.
pub const JPEG_QUALITY: u8 = 90;
