use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};

/// Fixed storage budget shown next to usage; not enforced
pub const TOTAL_SPACE_QUOTA: i64 = 2 * 1024 * 1024 * 1024;

/// Default number of records returned by a listing
pub const DEFAULT_FILE_LIMIT: usize = 10;

/// Default sort: most recently updated first
pub const DEFAULT_SORT: &str = "$updatedAt-desc";

/// Semantic file type bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Document,
    Image,
    Video,
    Audio,
    Other,
}

const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "txt", "xls", "xlsx", "csv", "rtf", "ods", "ppt", "odp", "md", "html",
    "htm", "epub", "pages", "fig", "psd", "ai", "indd", "xd", "sketch", "afdesign", "afphoto",
];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "svg", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac"];

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Document => "document",
            FileType::Image => "image",
            FileType::Video => "video",
            FileType::Audio => "audio",
            FileType::Other => "other",
        }
    }

    /// Classify a lower-cased extension
    pub fn from_extension(extension: &str) -> Self {
        if DOCUMENT_EXTENSIONS.contains(&extension) {
            FileType::Document
        } else if IMAGE_EXTENSIONS.contains(&extension) {
            FileType::Image
        } else if VIDEO_EXTENSIONS.contains(&extension) {
            FileType::Video
        } else if AUDIO_EXTENSIONS.contains(&extension) {
            FileType::Audio
        } else {
            FileType::Other
        }
    }

    /// Type set behind a listing route segment such as `images` or `media`
    pub fn for_route(segment: &str) -> Vec<FileType> {
        match segment {
            "documents" => vec![FileType::Document],
            "images" => vec![FileType::Image],
            "media" => vec![FileType::Video, FileType::Audio],
            "others" => vec![FileType::Other],
            _ => vec![FileType::Document],
        }
    }
}

/// Type and lower-cased extension of a file name.
/// A name without a dot has no extension.
pub fn get_file_type(file_name: &str) -> (FileType, String) {
    match file_name.rsplit_once('.') {
        Some((_, ext)) => {
            let extension = ext.to_lowercase();
            (FileType::from_extension(&extension), extension)
        }
        None => (FileType::Other, String::new()),
    }
}

/// Stored name for a rename: `name.extension`, or `name` when the extension is empty
pub fn compose_file_name(name: &str, extension: &str) -> String {
    if extension.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", name, extension)
    }
}

/// File metadata record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    #[serde(rename = "$id")]
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    #[serde(default)]
    pub extension: String,
    pub size: i64,
    #[serde(deserialize_with = "deserialize_reference")]
    pub owner: String,
    pub account_id: String,
    #[serde(default)]
    pub users: Vec<String>,
    pub bucket_file_id: String,
    #[serde(rename = "$createdAt")]
    pub created_at: String,
    #[serde(rename = "$updatedAt")]
    pub updated_at: String,
}

/// A related document arrives either as its id or expanded in full
fn deserialize_reference<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Reference {
        Id(String),
        Expanded {
            #[serde(rename = "$id")]
            id: String,
        },
    }

    Ok(match Reference::deserialize(deserializer)? {
        Reference::Id(id) => id,
        Reference::Expanded { id } => id,
    })
}

/// Attributes written when a record is created
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFileDocument {
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub name: String,
    pub url: String,
    pub extension: String,
    pub size: i64,
    pub owner: String,
    pub account_id: String,
    pub users: Vec<String>,
    pub bucket_file_id: String,
}

/// Listing result
#[derive(Debug, Serialize)]
pub struct FileList {
    pub total: u64,
    pub documents: Vec<FileRecord>,
}

/// Listing parameters
#[derive(Debug, Clone, Default)]
pub struct GetFilesParams {
    pub types: Vec<FileType>,
    pub search_text: String,
    pub sort_text: String,
    pub limit: Option<usize>,
}

/// Usage of one type bucket
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceBucket {
    pub size: i64,
    pub latest_date: Option<String>,
}

impl SpaceBucket {
    fn add(&mut self, size: i64, updated_at: &str) {
        self.size += size;
        let newer = match &self.latest_date {
            Some(latest) => updated_at > latest.as_str(),
            None => true,
        };
        if newer {
            self.latest_date = Some(updated_at.to_string());
        }
    }
}

/// Aggregate storage usage per type bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalSpace {
    pub image: SpaceBucket,
    pub document: SpaceBucket,
    pub video: SpaceBucket,
    pub audio: SpaceBucket,
    pub other: SpaceBucket,
    pub used: i64,
    pub all: i64,
}

impl Default for TotalSpace {
    fn default() -> Self {
        Self {
            image: SpaceBucket::default(),
            document: SpaceBucket::default(),
            video: SpaceBucket::default(),
            audio: SpaceBucket::default(),
            other: SpaceBucket::default(),
            used: 0,
            all: TOTAL_SPACE_QUOTA,
        }
    }
}

impl TotalSpace {
    pub fn bucket_mut(&mut self, file_type: FileType) -> &mut SpaceBucket {
        match file_type {
            FileType::Image => &mut self.image,
            FileType::Document => &mut self.document,
            FileType::Video => &mut self.video,
            FileType::Audio => &mut self.audio,
            FileType::Other => &mut self.other,
        }
    }

    pub fn add(&mut self, file: &FileRecord) {
        self.bucket_mut(file.file_type).add(file.size, &file.updated_at);
        self.used += file.size;
    }
}

/// `GET /files` query string
#[derive(Debug, Deserialize)]
pub struct FileListQuery {
    #[serde(rename = "type")]
    pub file_type: Option<String>,
    pub query: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<usize>,
}

/// Rename file request
#[derive(Debug, Deserialize)]
pub struct RenameFileRequest {
    pub name: String,
    #[serde(default)]
    pub extension: String,
    #[serde(default = "default_path")]
    pub path: String,
}

/// Replace the shared-with list
#[derive(Debug, Deserialize)]
pub struct UpdateFileUsersRequest {
    pub emails: Vec<String>,
    #[serde(default = "default_path")]
    pub path: String,
}

/// `DELETE /files/:id` query string
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileQuery {
    pub bucket_file_id: String,
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_path() -> String {
    "/".to_string()
}

/// Actions offered on a single file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum FileAction {
    Rename {
        name: String,
        #[serde(default)]
        extension: String,
    },
    Share {
        emails: Vec<String>,
    },
    Delete {
        #[serde(rename = "bucketFileId")]
        bucket_file_id: String,
    },
    Details,
    Download,
}

#[derive(Debug, Deserialize)]
pub struct FileActionRequest {
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(flatten)]
    pub action: FileAction,
}

#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum FileActionOutcome {
    Record { file: FileRecord },
    Deleted { id: String },
    Download { url: String },
}

/// A file received for upload. `size` is the full size even when the body
/// was not kept because it exceeded the limit.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub size: u64,
    pub data: Bytes,
}

/// Per-file notice surfaced to the uploader
#[derive(Debug, Clone, Serialize)]
pub struct UploadNotice {
    pub name: String,
    pub message: String,
}

#[derive(Debug, Default, Serialize)]
pub struct UploadBatchResult {
    pub uploaded: Vec<FileRecord>,
    pub rejected: Vec<UploadNotice>,
    pub failed: Vec<UploadNotice>,
}
