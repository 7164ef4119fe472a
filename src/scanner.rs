//! Identity document scanning.
//!
//! The optical decode is a collaborator ([`DocumentScanner`]); this module
//! owns the pure parse of the decoded PDF417 payload of a national identity
//! card into structured fields. Two layouts are in circulation, both
//! `@`-delimited:
//!
//! - current: `tramite@SURNAME@GIVEN@SEX@ID@EXEMPLAR@BIRTH@ISSUED[@...]`
//! - legacy:  `@ID@EXEMPLAR@CODE@SURNAME@GIVEN@NATIONALITY@BIRTH@SEX@...`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::validation::strip_id_formatting;

/// Barcode symbologies a scanner can be asked to accept. Identity
/// documents carry PDF417 only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolFormat {
    Pdf417,
}

/// Produces the raw decoded text of a document barcode.
#[async_trait]
pub trait DocumentScanner: Send + Sync {
    /// Scan a symbol in one of `formats`. `Ok(None)` means the user
    /// cancelled or nothing was decoded.
    async fn scan(&self, formats: &[SymbolFormat]) -> Result<Option<String>, ScanError>;
}

/// Fields extracted from a scanned identity document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedIdentity {
    pub national_id: u64,
    pub given_name: String,
    pub surname: String,
}

const MIN_ID_DIGITS: usize = 7;
const MAX_ID_DIGITS: usize = 8;

/// Parse a raw payload. Never panics; anything that is not a complete
/// identity is a [`ScanError::Parse`].
pub fn parse_payload(raw: &str) -> Result<ScannedIdentity, ScanError> {
    let trimmed = raw.trim_matches(|c: char| c.is_whitespace() || c.is_control());
    if trimmed.is_empty() {
        return Err(parse_error("empty payload"));
    }

    let mut fields: Vec<&str> = trimmed.split('@').map(str::trim).collect();
    while fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }

    let legacy = fields.first().is_some_and(|f| f.is_empty());
    let (id, surname, given) = if legacy {
        let start = fields.iter().position(|f| !f.is_empty()).unwrap_or(fields.len());
        let rest = &fields[start..];
        match (rest.first(), rest.get(3), rest.get(4)) {
            (Some(id), Some(surname), Some(given)) => (*id, *surname, *given),
            _ => return Err(parse_error("legacy layout has too few fields")),
        }
    } else {
        if let Some(sex) = fields.get(3) {
            if !matches!(*sex, "M" | "F" | "X") {
                return Err(parse_error("unexpected value in sex field"));
            }
        }
        match (fields.get(1), fields.get(2), fields.get(4)) {
            (Some(surname), Some(given), Some(id)) => (*id, *surname, *given),
            _ => return Err(parse_error("current layout has too few fields")),
        }
    };

    Ok(ScannedIdentity {
        national_id: parse_document_number(id)?,
        given_name: normalize_name(given).ok_or_else(|| parse_error("invalid given name"))?,
        surname: normalize_name(surname).ok_or_else(|| parse_error("invalid surname"))?,
    })
}

fn parse_error(reason: &str) -> ScanError {
    ScanError::Parse {
        reason: reason.to_string(),
    }
}

fn parse_document_number(field: &str) -> Result<u64, ScanError> {
    let digits = strip_id_formatting(field);
    if !(MIN_ID_DIGITS..=MAX_ID_DIGITS).contains(&digits.len())
        || !digits.chars().all(|c| c.is_ascii_digit())
    {
        return Err(parse_error("document number is not 7 or 8 digits"));
    }
    match digits.parse::<u64>() {
        Ok(0) | Err(_) => Err(parse_error("document number is not a positive integer")),
        Ok(id) => Ok(id),
    }
}

/// Collapse whitespace and title-case an upper-cased document name.
/// Returns `None` when the field holds anything other than a name.
fn normalize_name(field: &str) -> Option<String> {
    let words: Vec<&str> = field.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }
    let valid = words.iter().all(|w| {
        w.chars().any(char::is_alphabetic)
            && w.chars().all(|c| c.is_alphabetic() || c == '\'' || c == '-')
    });
    if !valid {
        return None;
    }

    let mut out = String::with_capacity(field.len());
    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let mut capitalize = true;
        for c in word.chars() {
            if capitalize {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            capitalize = !c.is_alphabetic();
        }
    }
    Some(out)
}
