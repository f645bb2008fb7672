//! Conversion between stored bytes and the string forms used by the preview pane
//!
//! Text-like content is shown as a UTF-8 string; everything else travels as a
//! base64 `data:` URL so it can be handed to an `<img>`, `<audio>` or PDF
//! viewer and written back byte-for-byte.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use percent_encoding::percent_decode_str;
use tracing::debug;

use crate::{
    error::{HdfsError, Result},
    mime,
};

/// Renders raw bytes as a string a display surface can consume
pub trait BinaryToDisplayString: Send + Sync {
    fn to_display_string(&self, bytes: &[u8], content_type: &str) -> String;
}

/// Recovers raw bytes from a display string
pub trait DisplayStringToBinary: Send + Sync {
    fn to_binary(&self, display: &str) -> Result<Vec<u8>>;
}

/// `data:<type>;base64,<payload>` encoding
#[derive(Debug, Clone, Copy, Default)]
pub struct DataUrlEncoding;

impl BinaryToDisplayString for DataUrlEncoding {
    fn to_display_string(&self, bytes: &[u8], content_type: &str) -> String {
        format!("data:{};base64,{}", mime::essence(content_type), BASE64.encode(bytes))
    }
}

impl DisplayStringToBinary for DataUrlEncoding {
    fn to_binary(&self, display: &str) -> Result<Vec<u8>> {
        // A base64 payload never contains a comma, so the last one ends the
        // header even when a quoted parameter holds commas of its own.
        if let Some((header, payload)) = display.rsplit_once(',') {
            if header.ends_with(";base64") {
                return BASE64
                    .decode(payload.trim())
                    .map_err(|e| HdfsError::MalformedContent {
                        message: format!("invalid base64 payload: {}", e),
                    });
            }
        }

        let (_, payload) = display.split_once(',').ok_or_else(|| {
            HdfsError::MalformedContent {
                message: "data URL has no comma-delimited payload".to_string(),
            }
        })?;
        Ok(percent_decode_str(payload).collect())
    }
}

/// What the preview pane should show for a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    /// Editable UTF-8 text
    Text { value: String, content_type: String },
    /// Base64 `data:` URL tagged with the resolved type
    DataUrl { value: String, content_type: String },
    /// Nothing can be shown (the buffer exceeded the preview limit)
    Unsupported { content_type: String },
}

impl Preview {
    pub fn content_type(&self) -> &str {
        match self {
            Preview::Text { content_type, .. }
            | Preview::DataUrl { content_type, .. }
            | Preview::Unsupported { content_type } => content_type,
        }
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, Preview::Text { .. })
    }

    /// Number of lines, as shown above a text preview
    pub fn line_count(&self) -> Option<usize> {
        match self {
            Preview::Text { value, .. } => Some(value.split('\n').count()),
            _ => None,
        }
    }

    /// Read-only tabular view of CSV/TSV text
    pub fn as_table(&self) -> Option<CsvTable> {
        let Preview::Text {
            value,
            content_type,
        } = self
        else {
            return None;
        };
        match mime::essence(content_type).as_str() {
            "text/csv" => Some(parse_delimited(value, ',')),
            "text/tab-separated-values" => Some(parse_delimited(value, '\t')),
            _ => None,
        }
    }

    /// Replace the text of an editable preview
    pub fn with_text(&self, text: impl Into<String>) -> Result<Preview> {
        match self {
            Preview::Text { content_type, .. } => Ok(Preview::Text {
                value: text.into(),
                content_type: content_type.clone(),
            }),
            other => Err(HdfsError::MalformedContent {
                message: format!("{} preview is not editable as text", other.content_type()),
            }),
        }
    }
}

/// Decodes bytes for preview and encodes edited previews back to bytes
pub struct ContentCodec {
    preview_limit: Option<usize>,
    encoding: DataUrlEncoding,
}

impl ContentCodec {
    pub fn new() -> Self {
        Self {
            preview_limit: None,
            encoding: DataUrlEncoding,
        }
    }

    /// Buffers larger than `limit` bytes decode to [`Preview::Unsupported`]
    pub fn with_preview_limit(limit: usize) -> Self {
        Self {
            preview_limit: Some(limit),
            encoding: DataUrlEncoding,
        }
    }

    /// The type used for interpretation
    ///
    /// Generic binary declarations are re-inferred from the extension since
    /// the metadata node's own detection is unreliable.
    pub fn effective_type(content_type: &str, file_name: &str) -> String {
        if mime::is_generic_binary(content_type) {
            mime::resolve(file_name).to_string()
        } else {
            content_type.to_string()
        }
    }

    pub fn decode_for_preview(&self, bytes: &[u8], content_type: &str, file_name: &str) -> Preview {
        let content_type = Self::effective_type(content_type, file_name);

        if let Some(limit) = self.preview_limit {
            if bytes.len() > limit {
                debug!(file_name, size = bytes.len(), limit, "preview limit exceeded");
                return Preview::Unsupported { content_type };
            }
        }

        if mime::is_text_like(&content_type) {
            match std::str::from_utf8(bytes) {
                Ok(text) => {
                    return Preview::Text {
                        value: text.to_string(),
                        content_type,
                    }
                }
                Err(_) => debug!(file_name, "text-like content is not UTF-8, using data URL"),
            }
        }

        Preview::DataUrl {
            value: self.encoding.to_display_string(bytes, &content_type),
            content_type,
        }
    }

    pub fn encode_for_write(&self, preview: &Preview, content_type: &str) -> Result<Bytes> {
        debug!(content_type, "encoding preview for write");
        match preview {
            Preview::Text { value, .. } => Ok(Bytes::copy_from_slice(value.as_bytes())),
            Preview::DataUrl { value, .. } => Ok(Bytes::from(self.encoding.to_binary(value)?)),
            Preview::Unsupported { content_type } => Err(HdfsError::MalformedContent {
                message: format!("no content to write for unsupported {} preview", content_type),
            }),
        }
    }
}

impl Default for ContentCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode with the default (unlimited) codec
pub fn decode_for_preview(bytes: &[u8], content_type: &str, file_name: &str) -> Preview {
    ContentCodec::new().decode_for_preview(bytes, content_type, file_name)
}

/// Encode with the default codec
pub fn encode_for_write(preview: &Preview, content_type: &str) -> Result<Bytes> {
    ContentCodec::new().encode_for_write(preview, content_type)
}

/// Header row plus data rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Parse delimited text, honoring double-quoted fields with `""` escapes
///
/// A trailing newline does not produce an empty row.
pub fn parse_delimited(text: &str, delimiter: char) -> CsvTable {
    let mut records: Vec<Vec<String>> = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                other => field.push(other),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            c if c == delimiter => record.push(std::mem::take(&mut field)),
            other => field.push(other),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    let mut records = records.into_iter();
    CsvTable {
        headers: records.next().unwrap_or_default(),
        rows: records.collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_round_trip() {
        let bytes = b"hello world!\n";
        let preview = decode_for_preview(bytes, "text/plain", "a.txt");
        assert!(matches!(&preview, Preview::Text { value, .. } if value == "hello world!\n"));
        assert_eq!(encode_for_write(&preview, "text/plain").unwrap(), &bytes[..]);
    }

    #[test]
    fn test_binary_round_trip() {
        let bytes: Vec<u8> = (0u8..=255).collect();
        let preview = decode_for_preview(&bytes, "image/png", "pic.png");
        match &preview {
            Preview::DataUrl { value, content_type } => {
                assert!(value.starts_with("data:image/png;base64,"));
                assert_eq!(content_type, "image/png");
            }
            other => panic!("expected data URL, got {:?}", other),
        }
        assert_eq!(encode_for_write(&preview, "image/png").unwrap(), bytes);
    }

    #[test]
    fn test_binary_round_trip_with_comma_in_parameter() {
        let bytes = [1u8, 2, 3, 250, 251];
        let declared = "application/x-thing; name=\"a,b\"";
        let preview = decode_for_preview(&bytes, declared, "x.bin");
        match &preview {
            Preview::DataUrl { value, .. } => {
                assert!(value.starts_with("data:application/x-thing;base64,"), "{}", value);
            }
            other => panic!("expected data URL, got {:?}", other),
        }
        assert_eq!(encode_for_write(&preview, declared).unwrap(), &bytes[..]);

        // A header written elsewhere may still carry the parameter
        let foreign = format!("data:{};base64,AQID+vs=", declared);
        assert_eq!(DataUrlEncoding.to_binary(&foreign).unwrap(), bytes.to_vec());
    }

    #[test]
    fn test_generic_binary_is_reinferred() {
        let preview = decode_for_preview(b"{\"a\":1}", "application/octet-stream", "x.json");
        assert_eq!(preview.content_type(), "application/json");
        assert!(preview.is_editable());

        let preview = decode_for_preview(b"%PDF-1.4", "application/octet-stream", "doc.pdf");
        assert!(matches!(preview, Preview::DataUrl { .. }));
        assert_eq!(preview.content_type(), "application/pdf");
    }

    #[test]
    fn test_declared_type_wins_when_specific() {
        let preview = decode_for_preview(b"plain", "text/plain", "weird.png");
        assert!(preview.is_editable());
    }

    #[test]
    fn test_invalid_utf8_falls_back_to_data_url() {
        let bytes = [0xff, 0xfe, 0x00, b'a'];
        let preview = decode_for_preview(&bytes, "text/plain", "bad.txt");
        assert!(matches!(preview, Preview::DataUrl { .. }));
        assert_eq!(encode_for_write(&preview, "text/plain").unwrap(), &bytes[..]);
    }

    #[test]
    fn test_data_url_without_comma_is_malformed() {
        let preview = Preview::DataUrl {
            value: "data:image/png;base64".to_string(),
            content_type: "image/png".to_string(),
        };
        assert!(matches!(
            encode_for_write(&preview, "image/png"),
            Err(HdfsError::MalformedContent { .. })
        ));
    }

    #[test]
    fn test_plain_data_url_is_percent_decoded() {
        let bytes = DataUrlEncoding.to_binary("data:text/plain,a%20b").unwrap();
        assert_eq!(bytes, b"a b");
    }

    #[test]
    fn test_preview_limit() {
        let codec = ContentCodec::with_preview_limit(4);
        let preview = codec.decode_for_preview(b"too long", "text/plain", "a.txt");
        assert_eq!(
            preview,
            Preview::Unsupported {
                content_type: "text/plain".to_string()
            }
        );
        assert!(codec.encode_for_write(&preview, "text/plain").is_err());
        assert!(codec.decode_for_preview(b"tiny", "text/plain", "a.txt").is_editable());
    }

    #[test]
    fn test_csv_view() {
        let preview = decode_for_preview(
            b"id,name,value\n1,John,100\n2,\"Doe, Jane\",\"say \"\"hi\"\"\"\n",
            "text/csv",
            "data.csv",
        );
        let table = preview.as_table().unwrap();
        assert_eq!(table.headers, vec!["id", "name", "value"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["2", "Doe, Jane", "say \"hi\""]);

        // The table is a view only; the stored bytes are still the raw text
        assert!(preview.is_editable());
        assert_eq!(preview.line_count(), Some(4));
    }

    #[test]
    fn test_csv_crlf_and_missing_trailing_newline() {
        let table = parse_delimited("a,b\r\n1,2", ',');
        assert_eq!(table.headers, vec!["a", "b"]);
        assert_eq!(table.rows, vec![vec!["1".to_string(), "2".to_string()]]);
        assert_eq!(parse_delimited("", ','), CsvTable::default());
    }

    #[test]
    fn test_with_text() {
        let preview = decode_for_preview(b"old", "text/plain", "a.txt");
        let edited = preview.with_text("new").unwrap();
        assert_eq!(encode_for_write(&edited, "text/plain").unwrap(), &b"new"[..]);

        let image = decode_for_preview(b"\x89PNG", "image/png", "a.png");
        assert!(image.with_text("nope").is_err());
    }
}
