use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Fallback for unknown or missing suffixes
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Content-Type by lowercase file suffix
pub static CONTENT_TYPES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("jpg", "image/jpeg"),
        ("jpeg", "image/jpeg"),
        ("jfif", "image/jpeg"),
        ("jpe", "image/jpeg"),
        ("png", "image/png"),
        ("gif", "image/gif"),
        ("tif", "image/tiff"),
        ("tiff", "image/tiff"),
        ("ico", "image/x-icon"),
        ("wbmp", "image/vnd.wap.wbmp"),
        ("fax", "image/fax"),
        ("net", "image/pnetvue"),
        ("rp", "image/vnd.rn-realpix"),
        ("mp4", "video/mp4"),
    ])
});

/// Content-Type for a bare suffix (`"png"`) or a file name (`"cat.PNG"`)
pub fn content_type_for(name: &str) -> &'static str {
    let name = name.trim();
    if name.is_empty() {
        return DEFAULT_CONTENT_TYPE;
    }
    let suffix = name.rsplit_once('.').map_or(name, |(_, suffix)| suffix);
    CONTENT_TYPES
        .get(suffix.to_ascii_lowercase().as_str())
        .copied()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_suffixes_and_file_names() {
        assert_eq!(content_type_for("jpg"), "image/jpeg");
        assert_eq!(content_type_for("photo.JFIF"), "image/jpeg");
        assert_eq!(content_type_for("a.b.tif"), "image/tiff");
        assert_eq!(content_type_for("clip.mp4"), "video/mp4");
        assert_eq!(content_type_for("favicon.ico"), "image/x-icon");
    }

    #[test]
    fn falls_back_to_octet_stream() {
        assert_eq!(content_type_for(""), DEFAULT_CONTENT_TYPE);
        assert_eq!(content_type_for("   "), DEFAULT_CONTENT_TYPE);
        assert_eq!(content_type_for("archive.zip"), DEFAULT_CONTENT_TYPE);
        assert_eq!(content_type_for("noextension"), DEFAULT_CONTENT_TYPE);
        assert_eq!(content_type_for("trailing."), DEFAULT_CONTENT_TYPE);
    }
}
