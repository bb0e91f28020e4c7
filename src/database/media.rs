use base64::{engine::general_purpose::STANDARD, Engine};

use crate::{constants::IMAGE_TYPES, error::ValidationError};

/// Decoded recipe image as stored alongside the recipe row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl RecipeImage {
    pub fn new(mime: String, bytes: Vec<u8>) -> Self {
        Self { mime, bytes }
    }

    /// Accepts `data:image/<type>;base64,<payload>` or a bare base64 payload.
    pub fn from_payload(payload: &str) -> Result<Self, ValidationError> {
        let payload = payload.trim();
        let (declared, data) = match payload.strip_prefix("data:") {
            Some(rest) => match rest.split_once(";base64,") {
                Some((mime, data)) => (Some(mime), data),
                None => return Err(ValidationError::field("image", "Malformed data URL")),
            },
            None => (None, payload),
        };

        let bytes = STANDARD
            .decode(data)
            .map_err(|_| ValidationError::field("image", "Image is not valid base64"))?;
        let sniffed = sniff_mime(&bytes)
            .ok_or_else(|| ValidationError::field("image", "Unsupported image format"))?;

        if let Some(declared) = declared {
            if declared != sniffed {
                return Err(ValidationError::field(
                    "image",
                    "Image content does not match its declared type",
                ));
            }
        }

        Ok(Self::new(sniffed.to_string(), bytes))
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    IMAGE_TYPES
        .iter()
        .find(|(mime, magic)| match *mime {
            "image/webp" => bytes.starts_with(magic) && bytes.get(8..12) == Some(&b"WEBP"[..]),
            _ => bytes.starts_with(magic),
        })
        .map(|(mime, _)| *mime)
}
