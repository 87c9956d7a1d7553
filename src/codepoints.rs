//! Codepoint assignment.
//!
//! Every icon is addressed by a codepoint embedded in the svg font. Explicit
//! codepoints always win. The rest are handed out in icon order, starting at
//! the configured start value and skipping any value that was reserved
//! explicitly.
//!
//! An entry counts as assigned by being present in the explicit map. Zero is
//! never a valid codepoint, and neither is anything that is not a Unicode
//! scalar value.

use std::collections::{BTreeMap, HashSet};

use crate::error::ValidationError;

/// Start of the Unicode Private Use Area block used by default.
pub const DEFAULT_START_CODEPOINT: u32 = 0xF101;

/// Whether `value` can address a glyph.
pub fn is_glyph_codepoint(value: u32) -> bool {
    value != 0 && char::from_u32(value).is_some()
}

pub fn assign(
    names: &[String],
    explicit: &BTreeMap<String, u32>,
    start: u32,
) -> Result<BTreeMap<String, u32>, ValidationError> {
    for (name, &value) in explicit {
        if !is_glyph_codepoint(value) {
            return Err(ValidationError::InvalidCodepoint {
                name: name.clone(),
                value,
            });
        }
    }

    let reserved: HashSet<u32> = explicit.values().copied().collect();
    let mut assigned = explicit.clone();
    let mut next = start;

    for name in names {
        if assigned.contains_key(name) {
            continue;
        }

        while reserved.contains(&next) || !is_glyph_codepoint(next) {
            if next >= char::MAX as u32 {
                return Err(ValidationError::InvalidCodepoint {
                    name: name.clone(),
                    value: next,
                });
            }
            next += 1;
        }

        assigned.insert(name.clone(), next);
        next += 1;
    }

    Ok(assigned)
}
