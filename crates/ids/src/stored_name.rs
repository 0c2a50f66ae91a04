//! The `<id>-<name>` filename scheme.

use crate::{FileId, IdError, IdResult};
use std::fmt;

/// Characters replaced with `_` so that stored names are portable filenames.
const RESERVED_CHARS: &[char] = &[':', '*', '?', '"', '<', '>', '|'];

/// Longest filename common filesystems accept, in bytes.
pub const MAX_FILE_NAME_BYTES: usize = 255;

/// Reduces a client-supplied filename to a single safe path component.
///
/// - Anything up to the last `/` or `\` is dropped (browsers on Windows send full paths).
/// - Control characters are removed and reserved characters become `_`.
/// - Leading dots are stripped so the result is never hidden nor a relative component.
///
/// # Errors
///
/// Returns [`IdError::InvalidInput`] if nothing usable remains.
pub fn sanitise_file_name(input: &str) -> IdResult<String> {
    let last_component = input
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = last_component
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if RESERVED_CHARS.contains(&c) { '_' } else { c })
        .collect();

    let cleaned = cleaned.trim().trim_start_matches('.').trim_start();

    if cleaned.is_empty() {
        return Err(IdError::InvalidInput(format!(
            "file name has no usable characters: '{}'",
            input
        )));
    }

    Ok(cleaned.to_owned())
}

/// A stored filename carrying its record identity as a prefix.
///
/// Format: `<id>-<name>`, where `name` is already sanitised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredName {
    id: FileId,
    name: String,
}

impl StoredName {
    /// Builds the stored name for an upload of `original_name` under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] if `original_name` sanitises to nothing.
    ///
    /// A name too long for `<id>-<name>` to fit in [`MAX_FILE_NAME_BYTES`] is shortened, keeping
    /// its extension.
    pub fn new(id: FileId, original_name: &str) -> IdResult<Self> {
        let name = sanitise_file_name(original_name)?;
        let budget = MAX_FILE_NAME_BYTES.saturating_sub(id.to_string().len() + 1);

        Ok(Self {
            id,
            name: fit_to_bytes(name, budget),
        })
    }

    /// Recovers identity and name from a stored filename.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] if there is no `-` separator, the prefix is not a
    /// valid [`FileId`], or the name part is empty.
    pub fn parse(input: &str) -> IdResult<Self> {
        let (prefix, name) = input.split_once('-').ok_or_else(|| {
            IdError::InvalidInput(format!("stored name has no identity prefix: '{}'", input))
        })?;

        let id = FileId::parse(prefix)?;

        if name.is_empty() {
            return Err(IdError::InvalidInput(format!(
                "stored name has no file name after the prefix: '{}'",
                input
            )));
        }

        Ok(Self {
            id,
            name: name.to_owned(),
        })
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Shortens `name` to at most `budget` bytes, cutting the stem and keeping the extension.
fn fit_to_bytes(name: String, budget: usize) -> String {
    if name.len() <= budget {
        return name;
    }

    if let Some(dot) = name.rfind('.').filter(|dot| *dot > 0) {
        let (stem, extension) = name.split_at(dot);
        if extension.len() < budget {
            let stem = truncate_on_char_boundary(stem, budget - extension.len());
            if !stem.is_empty() {
                return format!("{}{}", stem, extension);
            }
        }
    }

    truncate_on_char_boundary(&name, budget).to_owned()
}

fn truncate_on_char_boundary(s: &str, max_bytes: usize) -> &str {
    let mut end = max_bytes.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

impl fmt::Display for StoredName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.id, self.name)
    }
}
