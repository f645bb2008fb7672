use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::error::{HdfsError, Result};

/// Characters left untouched inside one path segment (RFC 3986 unreserved)
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Query values are encoded like `encodeURIComponent`
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// An absolute, slash-normalized remote path
///
/// Always starts with a single `/`, has no empty segments and no trailing
/// slash except for the root itself. `.` segments are dropped and `..`
/// pops the previous segment (never above the root).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct HdfsPath(String);

impl HdfsPath {
    /// Normalize any string into an absolute path
    ///
    /// Relative input is interpreted from the root.
    pub fn new(raw: &str) -> Self {
        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        Self::from_segments(&segments)
    }

    /// Parse a path that must already be absolute
    pub fn absolute(raw: &str) -> Result<Self> {
        if !raw.starts_with('/') {
            return Err(HdfsError::InvalidPath {
                path: raw.to_string(),
                message: "expected an absolute path".to_string(),
            });
        }
        Ok(Self::new(raw))
    }

    pub fn root() -> Self {
        HdfsPath("/".to_string())
    }

    fn from_segments(segments: &[&str]) -> Self {
        HdfsPath(format!("/{}", segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Append a relative segment (which may itself contain slashes)
    pub fn join(&self, relative: &str) -> Self {
        if relative.is_empty() {
            return self.clone();
        }
        Self::new(&format!("{}/{}", self.0, relative))
    }

    /// Parent directory; the root is its own parent
    pub fn parent(&self) -> Self {
        match self.0.rfind('/') {
            Some(0) | None => Self::root(),
            Some(idx) => HdfsPath(self.0[..idx].to_string()),
        }
    }

    /// Last segment, empty for the root
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Percent-encode each segment exactly once, keeping the slashes
    ///
    /// The root encodes to `/`.
    pub fn encoded(&self) -> String {
        let encoded: Vec<String> = self
            .segments()
            .map(|s| utf8_percent_encode(s, SEGMENT).to_string())
            .collect();
        format!("/{}", encoded.join("/"))
    }
}

impl fmt::Display for HdfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HdfsPath {
    fn from(raw: &str) -> Self {
        HdfsPath::new(raw)
    }
}

impl From<String> for HdfsPath {
    fn from(raw: String) -> Self {
        HdfsPath::new(&raw)
    }
}

impl From<HdfsPath> for String {
    fn from(path: HdfsPath) -> Self {
        path.0
    }
}

impl AsRef<str> for HdfsPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Encode a query value the way browsers do with `encodeURIComponent`
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}
