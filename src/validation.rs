use crate::view::TextField;

pub const DEFAULT_MAX_FILE_MB: u64 = 10;

pub const ALLOWED_IMAGE_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// Marks every required field that is blank after trimming. Returns `true`
/// when all of them hold a value.
pub fn validate_required(fields: &mut [&mut TextField]) -> bool {
    let mut valid = true;
    for field in fields.iter_mut().filter(|field| field.required) {
        field.invalid = field.trimmed().is_empty();
        if field.invalid {
            valid = false;
        }
    }
    valid
}

#[must_use]
pub fn validate_file_size(size_bytes: u64, max_size_mb: u64) -> bool {
    size_bytes <= max_size_mb.saturating_mul(1024 * 1024)
}

#[must_use]
pub fn validate_image_type(mime: &str) -> bool {
    ALLOWED_IMAGE_TYPES.contains(&mime)
}
