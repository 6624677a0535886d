use std::path::{Component, Path};

use crate::TransferError;

/// Checks that an object key resolves to a file strictly inside the
/// storage root. Only plain names and `.` segments are allowed.
pub fn validate_object_key(key: &str) -> Result<(), TransferError> {
    let reject = |reason: &str| -> Result<(), TransferError> {
        Err(TransferError::InvalidKey(format!("{reason}: {key:?}")))
    };

    if key.is_empty() {
        return reject("empty key");
    }
    let path = Path::new(key);
    if path.is_absolute() {
        return reject("absolute key");
    }

    let mut names = 0usize;
    for component in path.components() {
        match component {
            Component::Normal(_) => names += 1,
            Component::CurDir => {}
            Component::ParentDir => return reject("key escapes the storage root"),
            Component::RootDir | Component::Prefix(_) => return reject("absolute key"),
        }
    }
    if names == 0 {
        return reject("key names no object");
    }
    Ok(())
}
