//! Utility functions for Drive URL parsing and output naming.

use url::Url;

/// Errors that can occur during folder ID extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderIdError {
    /// Input is empty after trimming
    Empty,
    /// URL does not carry an ID in any known position
    IdNotFound,
    /// ID contains characters Drive never issues
    InvalidId,
}

impl std::fmt::Display for FolderIdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FolderIdError::Empty => write!(f, "Folder reference is empty"),
            FolderIdError::IdNotFound => write!(f, "No folder ID found in URL"),
            FolderIdError::InvalidId => write!(f, "Folder ID has invalid format"),
        }
    }
}

impl std::error::Error for FolderIdError {}

/// Result type for folder ID extraction.
pub type FolderIdResult<T> = Result<T, FolderIdError>;

/// Extract a Drive file or folder ID from a URL or a bare ID.
///
/// Supports:
/// - https://drive.google.com/drive/folders/FOLDER_ID
/// - https://drive.google.com/drive/u/0/folders/FOLDER_ID?usp=sharing
/// - https://drive.google.com/open?id=FOLDER_ID
/// - https://drive.google.com/file/d/FILE_ID/view
/// - FOLDER_ID
pub fn extract_folder_id(input: &str) -> FolderIdResult<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(FolderIdError::Empty);
    }

    let Ok(url) = Url::parse(input) else {
        return validate_id(input);
    };

    if let Some(id) = extract_from_path(&url) {
        return validate_id(&id);
    }

    if let Some((_, id)) = url.query_pairs().find(|(key, _)| key == "id") {
        return validate_id(&id);
    }

    Err(FolderIdError::IdNotFound)
}

/// Find the segment following `folders` or `d` in the URL path.
fn extract_from_path(url: &Url) -> Option<String> {
    let segments: Vec<&str> = url.path_segments()?.collect();
    segments
        .windows(2)
        .find(|pair| pair[0] == "folders" || pair[0] == "d")
        .map(|pair| pair[1].to_string())
        .filter(|id| !id.is_empty())
}

fn is_valid_id_chars(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn validate_id(id: &str) -> FolderIdResult<String> {
    if id.is_empty() || !is_valid_id_chars(id) {
        return Err(FolderIdError::InvalidId);
    }
    Ok(id.to_string())
}

/// Replace characters that are awkward in file names with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "video".to_string()
    } else {
        cleaned
    }
}

/// Deterministic output name: `<sanitised stem><suffix>.mp4`.
pub fn output_file_name(video_stem: &str, suffix: &str) -> String {
    format!("{}{}.mp4", sanitize_file_name(video_stem), suffix)
}

/// Name prefix of the temporary converted copies made to read office prompts.
pub const CONVERTED_COPY_PREFIX: &str = "reelstamp-export-";

/// Name of the temporary converted copy of `file_id`.
pub fn converted_copy_name(file_id: &str) -> String {
    format!("{}{}", CONVERTED_COPY_PREFIX, file_id)
}

/// True if `name` is a temporary converted copy left in a folder.
pub fn is_converted_copy_name(name: &str) -> bool {
    name.starts_with(CONVERTED_COPY_PREFIX)
}

/// True if `name` looks like a file produced with `suffix`.
pub fn is_output_name(name: &str, suffix: &str) -> bool {
    let lower = name.to_lowercase();
    let marker = format!("{}.mp4", suffix.to_lowercase());
    !suffix.is_empty() && lower.ends_with(&marker)
}
