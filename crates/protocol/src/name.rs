use std::path::{Component, Path};

use crate::MAX_NAME_LEN;
use crate::error::WireError;

/// Derives the on-the-wire transfer name from a local path.
///
/// Only the final component is kept so the receiver's destination stays
/// inside its own output directory.
pub fn transfer_name(path: &Path) -> Result<String, WireError> {
    let file_name = path.file_name().ok_or_else(|| {
        WireError::InvalidTransferName(format!("no file name in path: {}", path.display()))
    })?;

    let name = file_name
        .to_str()
        .ok_or_else(|| WireError::InvalidName(file_name.to_string_lossy().into_owned()))?;

    validate_transfer_name(name)?;
    Ok(name.to_string())
}

/// Validates a received transfer name before it is joined onto the
/// output directory.
///
/// Rejects:
/// - Empty names and names longer than [`MAX_NAME_LEN`]
/// - Any path separator (`/` or `\`), so only a single component remains
/// - `.` and `..`
/// - Absolute paths and Windows drive prefixes (`C:`)
/// - NUL bytes
pub fn validate_transfer_name(name: &str) -> Result<(), WireError> {
    if name.is_empty() {
        return Err(WireError::InvalidTransferName("empty name".into()));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(WireError::NameTooLong(name.len()));
    }

    if name.contains('\0') {
        return Err(WireError::InvalidTransferName(format!(
            "NUL byte not allowed: {name:?}"
        )));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(WireError::InvalidTransferName(format!(
            "path separator not allowed: {name}"
        )));
    }

    let bytes = name.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return Err(WireError::InvalidTransferName(format!(
            "drive prefix not allowed: {name}"
        )));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        (Some(Component::ParentDir), _) => Err(WireError::InvalidTransferName(format!(
            "parent directory traversal not allowed: {name}"
        ))),
        _ => Err(WireError::InvalidTransferName(format!(
            "not a plain file name: {name}"
        ))),
    }
}
