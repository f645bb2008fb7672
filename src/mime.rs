//! File-extension based content-type resolution

/// Fallback for unknown or missing extensions
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Types the dashboard pins regardless of the registry's answer
const OVERRIDES: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("log", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("tsv", "text/tab-separated-values"),
    ("js", "application/javascript"),
];

/// Resolve a content type from the lowercased suffix after the last `.`
///
/// Total over all inputs: anything unrecognized maps to [`OCTET_STREAM`].
pub fn resolve(file_name: &str) -> &'static str {
    let Some((_, ext)) = file_name.rsplit_once('.') else {
        return OCTET_STREAM;
    };
    if ext.is_empty() {
        return OCTET_STREAM;
    }
    let ext = ext.to_ascii_lowercase();
    OVERRIDES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
        .or_else(|| mime_guess::from_ext(&ext).first_raw())
        .unwrap_or(OCTET_STREAM)
}

/// Strip parameters (`; charset=...`) and lowercase
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Whether a declared type carries no useful information
pub fn is_generic_binary(content_type: &str) -> bool {
    matches!(
        essence(content_type).as_str(),
        "" | "application/octet-stream" | "binary/octet-stream" | "application/binary"
    )
}

/// `text/*` or JSON
pub fn is_text_like(content_type: &str) -> bool {
    let essence = essence(content_type);
    essence.starts_with("text/") || essence == "application/json" || essence.ends_with("+json")
}

/// Types the preview pane can render inline from a data URL
pub fn is_renderable_media(content_type: &str) -> bool {
    let essence = essence(content_type);
    essence.starts_with("image/")
        || essence.starts_with("audio/")
        || essence.starts_with("video/")
        || essence == "application/pdf"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(resolve("notes.txt"), "text/plain");
        assert_eq!(resolve("PHOTO.JPG"), "image/jpeg");
        assert_eq!(resolve("archive.tar.zip"), "application/zip");
        assert_eq!(resolve("data.csv"), "text/csv");
        assert_eq!(resolve("report.pdf"), "application/pdf");
    }

    #[test]
    fn test_pinned_and_registry_types() {
        assert_eq!(resolve("README.md"), "text/markdown");
        assert_eq!(resolve("app.log"), "text/plain");
        assert_eq!(resolve("table.TSV"), "text/tab-separated-values");
        assert_eq!(resolve("script.js"), "application/javascript");

        assert_eq!(resolve("image.png"), "image/png");
        assert_eq!(resolve("icon.gif"), "image/gif");
        assert_eq!(resolve("page.html"), "text/html");
        assert_eq!(resolve("data.json"), "application/json");
        assert_eq!(
            resolve("sheet.xlsx"),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
        // Only the registry knows this one
        assert_eq!(resolve("model.wasm"), "application/wasm");
    }

    #[test]
    fn test_unknown_or_missing_extension() {
        assert_eq!(resolve("Makefile"), OCTET_STREAM);
        assert_eq!(resolve("file.unknownext"), OCTET_STREAM);
        assert_eq!(resolve("trailing."), OCTET_STREAM);
        assert_eq!(resolve(""), OCTET_STREAM);
        assert_eq!(resolve("."), OCTET_STREAM);
    }

    #[test]
    fn test_classification() {
        assert!(is_generic_binary("application/octet-stream"));
        assert!(is_generic_binary(""));
        assert!(!is_generic_binary("image/png"));

        assert!(is_text_like("text/plain; charset=utf-8"));
        assert!(is_text_like("application/json"));
        assert!(!is_text_like("application/pdf"));

        assert!(is_renderable_media("audio/mpeg"));
        assert!(is_renderable_media("application/pdf"));
        assert!(!is_renderable_media("application/zip"));
    }
}
