//! Relay-style global identifier codec.
//!
//! The query-graph protocol hands out opaque ids that are base64 encodings of
//! `Type:digits` (optionally prefixed by a version segment, e.g.
//! `01:Organization:7`). Domain logic only ever sees the numeric part.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, PAD, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;

use crate::error::ValidationError;
use crate::id::DomainId;

const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decoded parts of a global id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalId {
    /// Type tag, without any version prefix.
    pub type_name: String,
    pub id: DomainId,
}

/// Decodes a global id into its native numeric id.
///
/// # Errors
///
/// Returns `ValidationError::InvalidGraphId` if the input is not base64, does
/// not decode to UTF-8 `Type:digits`, or the digits are not a positive integer.
/// There is no fallback value.
pub fn decode(raw: &str) -> Result<DomainId, ValidationError> {
    decode_parts(raw).map(|parts| parts.id)
}

/// Decodes a global id and checks its type tag.
///
/// # Errors
///
/// Same as [`decode`], and also when the type tag differs from `expected_type`.
pub fn decode_typed(raw: &str, expected_type: &str) -> Result<DomainId, ValidationError> {
    let parts = decode_parts(raw)?;
    if parts.type_name == expected_type {
        Ok(parts.id)
    } else {
        Err(invalid(raw))
    }
}

/// Decodes a global id into its type tag and numeric id.
///
/// # Errors
///
/// Same as [`decode`].
pub fn decode_parts(raw: &str) -> Result<GlobalId, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid(raw));
    }

    let bytes = STANDARD_LENIENT
        .decode(trimmed)
        .or_else(|_| URL_SAFE_LENIENT.decode(trimmed))
        .map_err(|_| invalid(raw))?;
    let payload = String::from_utf8(bytes).map_err(|_| invalid(raw))?;

    let (type_part, digits) = payload.rsplit_once(':').ok_or_else(|| invalid(raw))?;
    // Versioned ids look like `01:Organization:7`; keep only the type segment.
    let type_name = type_part.rsplit(':').next().unwrap_or(type_part);
    if type_name.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(raw));
    }

    let id = digits
        .parse::<u64>()
        .ok()
        .and_then(DomainId::from_u64)
        .ok_or_else(|| invalid(raw))?;

    Ok(GlobalId {
        type_name: type_name.to_string(),
        id,
    })
}

/// Encodes a type tag and id the way the query-graph protocol does.
#[must_use]
pub fn encode(type_name: &str, id: DomainId) -> String {
    STANDARD.encode(format!("{type_name}:{id}"))
}

fn invalid(raw: &str) -> ValidationError {
    ValidationError::InvalidGraphId {
        raw: raw.to_string(),
    }
}
