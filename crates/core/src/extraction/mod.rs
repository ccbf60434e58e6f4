//! AI-based data extraction.
//!
//! Extraction is two calls to a generative model: a vision call that turns the document
//! collage into plain text, and a text call that turns that text into a [`PersonRecord`].
//! The second call's output is untrusted; [`parse_ai_record`] locates the JSON object in
//! it and validates it against the record schema, dropping keys the schema does not know. Afterwards the street part of
//! the address is replaced with the one the postal-code service knows.

mod gemini;
mod postal;

pub use gemini::GeminiClient;
pub use postal::{PostalLookup, ViaCepClient};

use crate::constants::{structured_prompt, VISION_PROMPT};
use crate::record::PersonRecord;
use crate::{CoreError, CoreResult};
use std::path::Path;

/// A generative model able to read images and answer text prompts.
pub trait GenerativeModel {
    /// Sends an image and an instruction, returning the model's text answer.
    fn describe_image(&self, image_path: &Path, prompt: &str) -> CoreResult<String>;

    /// Sends a text-only prompt, returning the model's text answer.
    fn generate(&self, prompt: &str) -> CoreResult<String>;
}

/// Returns the first `{ … }` block of `text` with newlines flattened and backslashes removed.
///
/// Braces inside JSON string literals do not count towards nesting.
pub fn locate_record_block(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let block = &text[start..=start + offset];
                    return Some(block.replace(['\n', '\r'], " ").replace('\\', ""));
                }
            }
            _ => {}
        }
    }

    None
}

/// Parses the structured-parsing answer into a record.
///
/// # Errors
///
/// Returns `CoreError::MalformedAiOutput` when no object is found or a known key does
/// not match the record schema. Unknown keys are dropped with a warning.
pub fn parse_ai_record(answer: &str) -> CoreResult<PersonRecord> {
    let block = locate_record_block(answer)
        .ok_or_else(|| CoreError::MalformedAiOutput("no JSON object in model answer".into()))?;

    let (record, ignored) = PersonRecord::parse_json_ignoring_unknown(&block)
        .map_err(|e| CoreError::MalformedAiOutput(e.to_string()))?;
    if !ignored.is_empty() {
        tracing::warn!("ignored unknown keys in model answer: {}", ignored.join(", "));
    }
    Ok(record)
}

/// Rebuilds an address from the street the postal service returned and the house
/// number the raw address carried after its first comma.
///
/// `enrich_address("Rua ABC, 123", "Rua das Flores")` is `"Rua das Flores, 123"`.
pub fn enrich_address(raw_address: &str, street: &str) -> String {
    let number = raw_address
        .split(',')
        .nth(1)
        .map(str::trim)
        .unwrap_or_default();

    format!("{street}, {number}")
        .trim_matches(|c: char| c == ',' || c == ' ')
        .to_owned()
}

/// Runs the two extraction calls and the postal enrichment.
pub struct StructuredExtractor<'a, M: ?Sized, P: ?Sized> {
    model: &'a M,
    postal: &'a P,
}

impl<'a, M, P> StructuredExtractor<'a, M, P>
where
    M: GenerativeModel + ?Sized,
    P: PostalLookup + ?Sized,
{
    pub fn new(model: &'a M, postal: &'a P) -> Self {
        Self { model, postal }
    }

    /// Vision call over the collage.
    pub fn extract_text(&self, collage_path: &Path) -> CoreResult<String> {
        tracing::info!("extracting text from {}", collage_path.display());
        let text = self.model.describe_image(collage_path, VISION_PROMPT)?;
        tracing::debug!("vision call returned {} characters", text.len());
        Ok(text)
    }

    /// Structured-parsing call, then postal enrichment.
    ///
    /// Malformed or empty model output yields `Ok(None)` with a warning so the operator
    /// can fill the record in by hand. Transport and API errors are returned.
    pub fn extract_record(&self, text: &str) -> CoreResult<Option<PersonRecord>> {
        let answer = match self.model.generate(&structured_prompt(text)) {
            Ok(answer) => answer,
            Err(CoreError::EmptyModelAnswer(reason)) => {
                tracing::warn!("model returned no record ({})", reason);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let mut record = match parse_ai_record(&answer) {
            Ok(record) => record,
            Err(CoreError::MalformedAiOutput(reason)) => {
                tracing::warn!("could not parse record from model answer: {}", reason);
                tracing::debug!("raw model answer: {}", answer);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        self.enrich(&mut record);
        Ok(Some(record))
    }

    fn enrich(&self, record: &mut PersonRecord) {
        let Some(postal_code) = record.postal_code.as_deref() else {
            return;
        };

        if let Some(street) = self.postal.street_for(postal_code) {
            let raw = record.address.as_deref().unwrap_or_default();
            let enriched = enrich_address(raw, &street);
            tracing::info!("address enriched from postal code {}", postal_code);
            record.address = Some(enriched);
        }
    }
}
