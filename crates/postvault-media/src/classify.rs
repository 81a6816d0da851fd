//! Media kind classification.
//!
//! Precedence: server-declared content type first, URL path extension as
//! fallback. Unrecognized types classify as [`MediaKind::Document`] rather
//! than failing.

/// Broad category of a media asset; determines the cache subdirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
    Document,
}

impl MediaKind {
    /// Singular name stored in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
        }
    }

    /// Cache subdirectory name.
    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Video => "videos",
            MediaKind::Document => "documents",
        }
    }

    pub const ALL: [MediaKind; 3] = [MediaKind::Image, MediaKind::Video, MediaKind::Document];
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn kind_for_mime(mime: &str) -> Option<MediaKind> {
    match mime {
        "image/jpeg" | "image/jpg" | "image/png" | "image/gif" | "image/webp" => {
            Some(MediaKind::Image)
        }
        "video/mp4" | "video/webm" | "video/quicktime" => Some(MediaKind::Video),
        "application/pdf" => Some(MediaKind::Document),
        _ => None,
    }
}

fn kind_for_extension(ext: &str) -> Option<MediaKind> {
    match ext {
        ".jpg" | ".jpeg" | ".png" | ".gif" | ".webp" => Some(MediaKind::Image),
        ".mp4" | ".webm" | ".mov" => Some(MediaKind::Video),
        ".pdf" => Some(MediaKind::Document),
        _ => None,
    }
}

/// Classify a media kind from the server-declared content type and the URL.
///
/// The content type wins when recognized; otherwise the URL path extension
/// decides; anything unrecognized is a generic document.
#[must_use]
pub fn classify_kind(url: &str, content_type: Option<&str>) -> MediaKind {
    if let Some(kind) = content_type.and_then(kind_for_mime) {
        return kind;
    }
    if let Some(kind) = kind_for_extension(extension_from_url(url)) {
        return kind;
    }
    MediaKind::Document
}

/// Extract a file extension (with leading dot) from a URL's path.
///
/// Query string and fragment are ignored. Unknown extensions map to `.bin`
/// so the cache path stays deterministic.
#[must_use]
pub fn extension_from_url(url: &str) -> &'static str {
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .to_ascii_lowercase();

    const KNOWN: [&str; 9] = [
        ".jpeg", ".jpg", ".png", ".gif", ".webp", ".webm", ".mp4", ".mov", ".pdf",
    ];
    let last_segment = path.rsplit('/').next().unwrap_or(&path);
    for ext in KNOWN {
        if last_segment.ends_with(ext) {
            return ext;
        }
    }
    ".bin"
}

/// Best-effort MIME type for a known cache extension. Used when serving an
/// entry from disk, where the original response headers are gone.
#[must_use]
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        ".jpg" | ".jpeg" => Some("image/jpeg"),
        ".png" => Some("image/png"),
        ".gif" => Some("image/gif"),
        ".webp" => Some("image/webp"),
        ".mp4" => Some("video/mp4"),
        ".webm" => Some("video/webm"),
        ".mov" => Some("video/quicktime"),
        ".pdf" => Some("application/pdf"),
        _ => None,
    }
}
