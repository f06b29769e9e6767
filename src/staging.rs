use crate::api::{ApiError, DoorbellClient};
use crate::notify::{Notifications, Severity};
use crate::pending::take_finished;
use crate::validation::{DEFAULT_MAX_FILE_MB, validate_file_size, validate_image_type, validate_required};
use crate::view::{ButtonView, TextField};
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use url::Url;

pub const UPLOAD_LABEL: &str = "Upload Face";
pub const UPLOAD_BUSY_LABEL: &str = "Uploading...";

/// A local image that passed type and size checks and is ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub mime: &'static str,
    pub size_bytes: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("no file path given")]
    Empty,
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is not a regular file")]
    NotAFile(PathBuf),
    #[error("{0} is not an image")]
    NotAnImage(PathBuf),
    #[error("unsupported image type {0}")]
    UnsupportedType(&'static str),
    #[error("file is {size_bytes} bytes, larger than the {max_mb} MB limit")]
    TooLarge { size_bytes: u64, max_mb: u64 },
}

#[must_use]
pub fn mime_from_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Turns pasted terminal text into a path.
///
/// Handles what terminals and file managers produce on drop: surrounding
/// quotes, `file://` URLs and backslash-escaped spaces.
#[must_use]
pub fn parse_dropped_path(raw: &str) -> Option<PathBuf> {
    let first_line = raw.lines().map(str::trim).find(|line| !line.is_empty())?;

    let unquoted = ['\'', '"']
        .iter()
        .find_map(|quote| {
            first_line
                .strip_prefix(*quote)
                .and_then(|rest| rest.strip_suffix(*quote))
        })
        .unwrap_or(first_line);

    if unquoted.starts_with("file://") {
        return Url::parse(unquoted).ok()?.to_file_path().ok();
    }

    let mut unescaped = String::with_capacity(unquoted.len());
    let mut chars = unquoted.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\'
            && let Some(&next) = chars.peek()
            && matches!(next, ' ' | '(' | ')' | '\'' | '"' | '&' | '\\')
        {
            unescaped.push(next);
            chars.next();
            continue;
        }
        unescaped.push(ch);
    }
    if unescaped.is_empty() {
        None
    } else {
        Some(PathBuf::from(unescaped))
    }
}

/// Resolves a dropped path and runs the image checks on it.
pub fn stage_file(raw: &str, max_mb: u64) -> Result<StagedFile, StageError> {
    let path = parse_dropped_path(raw).ok_or(StageError::Empty)?;
    let metadata = std::fs::metadata(&path).map_err(|source| StageError::Unreadable {
        path: path.clone(),
        source,
    })?;
    if !metadata.is_file() {
        return Err(StageError::NotAFile(path));
    }

    let mime = mime_from_path(&path);
    if !mime.starts_with("image/") {
        return Err(StageError::NotAnImage(path));
    }
    if !validate_image_type(mime) {
        return Err(StageError::UnsupportedType(mime));
    }
    let size_bytes = metadata.len();
    if !validate_file_size(size_bytes, max_mb) {
        return Err(StageError::TooLarge { size_bytes, max_mb });
    }

    let file_name = path
        .file_name()
        .map_or_else(|| "upload".to_owned(), |name| name.to_string_lossy().into_owned());
    tracing::debug!(path = %path.display(), mime, size_bytes, "staged image");
    Ok(StagedFile {
        path,
        file_name,
        mime,
        size_bytes,
    })
}

/// State behind the upload modal.
#[derive(Debug)]
pub struct UploadForm {
    pub person_id: TextField,
    pub staged: Option<StagedFile>,
    pub upload_button: ButtonView,
    pub max_file_mb: u64,
    pending: Option<JoinHandle<Result<(), ApiError>>>,
}

impl Default for UploadForm {
    fn default() -> Self {
        Self {
            person_id: TextField::required(),
            staged: None,
            upload_button: ButtonView::new(UPLOAD_LABEL),
            max_file_mb: DEFAULT_MAX_FILE_MB,
            pending: None,
        }
    }
}

impl UploadForm {
    /// Stages a pasted path. Rejections leave the previous file in place.
    pub fn stage(&mut self, raw: &str, notifications: &mut Notifications) -> bool {
        match stage_file(raw, self.max_file_mb) {
            Ok(file) => {
                notifications.notify(format!("Selected {}", file.file_name), Severity::Info);
                self.staged = Some(file);
                true
            }
            Err(err) => {
                tracing::info!(error = %err, "rejected dropped file");
                notifications.notify(err.to_string(), Severity::Warning);
                false
            }
        }
    }

    #[must_use]
    pub fn is_uploading(&self) -> bool {
        self.pending.is_some()
    }

    /// Validates the form and starts the upload.
    pub fn submit(&mut self, client: &DoorbellClient, notifications: &mut Notifications) -> bool {
        if self.pending.is_some() {
            return false;
        }
        if !validate_required(&mut [&mut self.person_id]) {
            notifications.notify("Please enter a person ID", Severity::Warning);
            return false;
        }
        let Ok(person_id) = self.person_id.trimmed().parse::<i64>() else {
            self.person_id.invalid = true;
            notifications.notify("Person ID must be a number", Severity::Warning);
            return false;
        };
        let Some(file) = self.staged.clone() else {
            notifications.notify("Paste or drop an image file first", Severity::Warning);
            return false;
        };

        tracing::info!(person_id, file = %file.file_name, "uploading face image");
        self.upload_button.set_busy(UPLOAD_BUSY_LABEL);
        let client = client.clone();
        self.pending = Some(tokio::spawn(async move {
            client.upload_face(person_id, &file).await
        }));
        true
    }

    /// Returns `true` when an upload finished successfully.
    pub async fn poll(&mut self, notifications: &mut Notifications) -> bool {
        let Some(joined) = take_finished(&mut self.pending).await else {
            return false;
        };
        self.upload_button.restore();
        match joined.unwrap_or_else(|err| Err(err.into())) {
            Ok(()) => {
                notifications.notify("Face image uploaded successfully!", Severity::Success);
                self.staged = None;
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "face upload failed");
                notifications.notify(
                    err.user_message("Error uploading face: ", "Network error during upload"),
                    Severity::Error,
                );
                false
            }
        }
    }

    pub fn reset(&mut self) {
        if self.pending.is_none() {
            self.person_id = TextField::required();
            self.staged = None;
        }
    }
}
