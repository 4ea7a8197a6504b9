//! Attachment resolution: embed inline, link, or copy out.
//!
//! Decision policy per attachment:
//! 1. Inline body present: keep it (encoding defaults to BASE64).
//! 2. File path present: resolve against the project root. A missing file
//!    becomes an IDENTITY link carrying the raw path. A file within the embed
//!    threshold is read and BASE64-encoded. A larger file is copied into the
//!    external directory (collision-safe name) when one is configured, and
//!    otherwise referenced by its project-relative path.
//! 3. Neither: an empty IDENTITY attachment.
//!
//! All disk access goes through [`AttachmentFs`], so the rest of the crate
//! stays pure and testable without a disk.

pub mod fs;

use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::model::{Attachment, ContentEncoding, RawAttachment};
use crate::obs;

/// Default embed threshold: 512 KiB.
pub const DEFAULT_MAX_EMBED_BYTES: u64 = 512 * 1024;

/// Fallback media type when nothing better is known.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Narrow filesystem capability used by the resolver.
pub trait AttachmentFs {
    /// Size of the regular file at `path`, or `None` when it does not exist.
    fn file_size(&self, path: &Path) -> io::Result<Option<u64>>;

    /// Read the whole file at `path`.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Write `contents` to `path`, creating parent directories as needed.
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// File names directly inside `dir`; empty when `dir` does not exist.
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<String>>;
}

/// Attachment handling knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentOptions {
    /// Files larger than this are not embedded.
    pub max_embed_bytes: u64,
    /// Where oversized files are copied. Relative paths are resolved against
    /// the project root.
    pub external_dir: Option<PathBuf>,
}

impl Default for AttachmentOptions {
    fn default() -> Self {
        Self {
            max_embed_bytes: DEFAULT_MAX_EMBED_BYTES,
            external_dir: None,
        }
    }
}

impl AttachmentOptions {
    pub fn with_max_embed_bytes(mut self, bytes: u64) -> Self {
        self.max_embed_bytes = bytes;
        self
    }

    pub fn with_external_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.external_dir = Some(dir.into());
        self
    }
}

/// Guess a media type from a file extension.
pub fn guess_media_type(path: &str) -> Option<&'static str> {
    let ext = Path::new(path)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    let media_type = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "webm" => "video/webm",
        "mp4" => "video/mp4",
        _ => return None,
    };
    Some(media_type)
}

/// Pick a name not present in `existing`: `name`, then `name-1`, `name-2`, …
/// The counter goes before the extension (`shot.png` → `shot-1.png`).
pub fn collision_free_name(existing: &[String], file_name: &str) -> String {
    if !existing.iter().any(|n| n == file_name) {
        return file_name.to_string();
    }
    let (stem, ext) = match file_name.rfind('.') {
        Some(dot) if dot > 0 => (&file_name[..dot], &file_name[dot..]),
        _ => (file_name, ""),
    };
    (1..)
        .map(|n| format!("{stem}-{n}{ext}"))
        .find(|candidate| !existing.iter().any(|n| n == candidate))
        .unwrap_or_else(|| file_name.to_string())
}

/// Resolves raw attachments against a project root.
pub struct AttachmentResolver<'a> {
    fs: &'a dyn AttachmentFs,
    project_root: PathBuf,
    options: AttachmentOptions,
}

impl<'a> AttachmentResolver<'a> {
    pub fn new(
        fs: &'a dyn AttachmentFs,
        project_root: impl Into<PathBuf>,
        options: AttachmentOptions,
    ) -> Self {
        Self {
            fs,
            project_root: project_root.into(),
            options,
        }
    }

    /// Resolve one attachment. Never fails: data-quality problems degrade to
    /// an IDENTITY link or an empty body.
    pub fn resolve(&self, raw: &RawAttachment) -> Attachment {
        let name = raw
            .name
            .clone()
            .or_else(|| raw.path.as_deref().and_then(file_name_of))
            .unwrap_or_else(|| "attachment".to_string());
        let media_type = raw
            .media_type
            .clone()
            .or_else(|| {
                raw.path
                    .as_deref()
                    .or(Some(name.as_str()))
                    .and_then(guess_media_type)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| OCTET_STREAM.to_string());

        if let Some(body) = &raw.body {
            return Attachment {
                name,
                media_type,
                body: body.clone(),
                content_encoding: raw.encoding.unwrap_or(ContentEncoding::Base64),
                path: raw.path.clone(),
                byte_length: raw.byte_length,
            };
        }

        let Some(raw_path) = raw.path.as_deref() else {
            return Attachment {
                name,
                media_type,
                body: String::new(),
                content_encoding: ContentEncoding::Identity,
                path: None,
                byte_length: raw.byte_length,
            };
        };

        let resolved = self.resolve_path(raw_path);
        let link = |body: String, byte_length: Option<u64>| {
            identity_link(&name, &media_type, body, byte_length)
        };

        let size = match self.fs.file_size(&resolved) {
            Ok(Some(size)) => size,
            Ok(None) => {
                obs::emit_attachment_resolved(&name, "missing");
                return link(raw_path.to_string(), raw.byte_length);
            }
            Err(e) => {
                tracing::warn!(path = %resolved.display(), error = %e, "cannot stat attachment");
                return link(raw_path.to_string(), raw.byte_length);
            }
        };
        let declared = raw.byte_length.unwrap_or(size);

        if declared <= self.options.max_embed_bytes {
            match self.fs.read(&resolved) {
                Ok(bytes) => {
                    obs::emit_attachment_resolved(&name, "embedded");
                    return Attachment {
                        name: name.clone(),
                        media_type: media_type.clone(),
                        body: STANDARD.encode(&bytes),
                        content_encoding: ContentEncoding::Base64,
                        path: Some(raw_path.to_string()),
                        byte_length: Some(bytes.len() as u64),
                    };
                }
                Err(e) => {
                    tracing::warn!(path = %resolved.display(), error = %e, "cannot read attachment");
                    return link(self.relative_to_root(&resolved), Some(declared));
                }
            }
        }

        if let Some(dir) = &self.options.external_dir {
            match self.copy_external(&resolved, dir) {
                Ok(dest) => {
                    obs::emit_attachment_resolved(&name, "copied");
                    return link(self.relative_to_root(&dest), Some(declared));
                }
                Err(e) => {
                    tracing::warn!(path = %resolved.display(), error = %e, "cannot copy attachment");
                }
            }
        }

        obs::emit_attachment_resolved(&name, "linked");
        link(self.relative_to_root(&resolved), Some(declared))
    }

    fn resolve_path(&self, raw_path: &str) -> PathBuf {
        let path = Path::new(raw_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    fn relative_to_root(&self, path: &Path) -> String {
        path.strip_prefix(&self.project_root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    // Not safe against concurrent writers targeting the same directory:
    // the free name is chosen from a listing taken before the write.
    fn copy_external(&self, source: &Path, dir: &Path) -> io::Result<PathBuf> {
        let dir = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.project_root.join(dir)
        };
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        let existing = self.fs.list_dir(&dir)?;
        let dest = dir.join(collision_free_name(&existing, &file_name));
        let bytes = self.fs.read(source)?;
        self.fs.write(&dest, &bytes)?;
        Ok(dest)
    }
}

fn identity_link(
    name: &str,
    media_type: &str,
    body: String,
    byte_length: Option<u64>,
) -> Attachment {
    Attachment {
        name: name.to_string(),
        media_type: media_type.to_string(),
        path: Some(body.clone()),
        body,
        content_encoding: ContentEncoding::Identity,
        byte_length,
    }
}

fn file_name_of(path: &str) -> Option<String> {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}
