//! `multipart/form-data` parsing for file uploads.
//!
//! The whole body is held in memory, bounded by
//! [`ContextConfig::max_memory`](super::ContextConfig). File contents are
//! zero-copy slices of the request body.

use bytes::Bytes;
use thiserror::Error;

use crate::bind::Values;
use crate::http::Headers;

/// Media type accepted by [`MultipartForm::parse`].
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// Errors produced while reading a multipart form.
#[derive(Debug, Error)]
pub enum MultipartError {
    #[error("request content type is not multipart/form-data")]
    NotMultipart,

    #[error("multipart content type has no boundary parameter")]
    MissingBoundary,

    #[error("multipart body exceeds maximum of {max_bytes} bytes")]
    TooLarge { max_bytes: usize },

    #[error("malformed multipart body: {reason}")]
    Malformed { reason: &'static str },

    #[error("no file uploaded under field `{key}`")]
    MissingFile { key: String },
}

/// An uploaded file from one multipart part.
#[derive(Debug, Clone)]
pub struct FormFile {
    field: String,
    filename: String,
    headers: Headers,
    data: Bytes,
}

impl FormFile {
    /// Form field name the file was sent under.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Client-supplied file name with any directory components removed.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// The part's `Content-Type`, if sent.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }

    /// All headers of the part.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// File contents.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// File size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// A parsed `multipart/form-data` body: text fields plus uploaded files.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    values: Values,
    files: Vec<FormFile>,
}

impl MultipartForm {
    /// Parses `body` according to the boundary in `content_type`.
    ///
    /// Parts without a `name` are skipped. Parts with a non-empty `filename`
    /// become files; all others become text values.
    ///
    /// # Errors
    ///
    /// - [`MultipartError::NotMultipart`] / [`MultipartError::MissingBoundary`]
    ///   for an unusable `content_type`.
    /// - [`MultipartError::TooLarge`] if `body` is longer than `max_memory`.
    /// - [`MultipartError::Malformed`] if the part structure is broken.
    pub fn parse(content_type: &str, body: &Bytes, max_memory: usize) -> Result<Self, MultipartError> {
        let boundary = boundary(content_type)?;
        if body.len() > max_memory {
            return Err(MultipartError::TooLarge { max_bytes: max_memory });
        }

        let delimiter = format!("--{boundary}");
        let next_part = format!("\r\n{delimiter}");
        let mut form = Self::default();

        let mut pos = find(body, delimiter.as_bytes(), 0).ok_or(MultipartError::Malformed {
            reason: "missing opening boundary",
        })?;

        loop {
            pos += delimiter.len();
            if body[pos..].starts_with(b"--") {
                break;
            }

            let line_end = find(body, b"\r\n", pos).ok_or(MultipartError::Malformed {
                reason: "unterminated boundary line",
            })?;
            if body[pos..line_end].iter().any(|b| !matches!(b, b' ' | b'\t')) {
                return Err(MultipartError::Malformed {
                    reason: "unexpected data after boundary",
                });
            }

            let header_start = line_end + 2;
            let (header_end, content_start) = if body[header_start..].starts_with(b"\r\n") {
                (header_start, header_start + 2)
            } else {
                let end = find(body, b"\r\n\r\n", header_start).ok_or(MultipartError::Malformed {
                    reason: "unterminated part headers",
                })?;
                (end, end + 4)
            };
            let headers = part_headers(&body[header_start..header_end])?;

            let content_end = find(body, next_part.as_bytes(), content_start).ok_or(
                MultipartError::Malformed {
                    reason: "missing closing boundary",
                },
            )?;
            form.add_part(headers, body.slice(content_start..content_end))?;

            pos = content_end + 2;
        }

        Ok(form)
    }

    /// Text fields of the form.
    pub fn values(&self) -> &Values {
        &self.values
    }

    /// The first file uploaded under `key`.
    pub fn file(&self, key: &str) -> Option<&FormFile> {
        self.files.iter().find(|file| file.field == key)
    }

    /// Every file uploaded under `key`.
    pub fn files<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a FormFile> + 'a {
        self.files.iter().filter(move |file| file.field == key)
    }

    fn add_part(&mut self, headers: Headers, data: Bytes) -> Result<(), MultipartError> {
        let Some(disposition) = headers.get("content-disposition") else {
            return Ok(());
        };
        let params = disposition_params(disposition);
        let param = |name: &str| {
            params
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.clone())
        };

        let Some(field) = param("name") else {
            return Ok(());
        };

        match param("filename").filter(|name| !name.is_empty()) {
            Some(filename) => {
                let filename = base_name(&filename).to_owned();
                self.files.push(FormFile {
                    field,
                    filename,
                    headers,
                    data,
                });
            }
            None => {
                let value = String::from_utf8(data.to_vec()).map_err(|_| MultipartError::Malformed {
                    reason: "form value is not UTF-8",
                })?;
                self.values.add(field, value);
            }
        }
        Ok(())
    }
}

fn boundary(content_type: &str) -> Result<String, MultipartError> {
    let mut parts = content_type.split(';');
    let essence = parts.next().unwrap_or_default().trim();
    if !essence.eq_ignore_ascii_case(MULTIPART_FORM_DATA) {
        return Err(MultipartError::NotMultipart);
    }

    parts
        .filter_map(|part| part.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_owned())
        .filter(|value| !value.is_empty())
        .ok_or(MultipartError::MissingBoundary)
}

fn part_headers(block: &[u8]) -> Result<Headers, MultipartError> {
    let text = std::str::from_utf8(block).map_err(|_| MultipartError::Malformed {
        reason: "part headers are not UTF-8",
    })?;

    let mut headers = Headers::new();
    for line in text.split("\r\n").filter(|line| !line.is_empty()) {
        let (name, value) = line.split_once(':').ok_or(MultipartError::Malformed {
            reason: "part header without colon",
        })?;
        headers.insert(name.trim(), value.trim());
    }
    Ok(headers)
}

// Parameters of `form-data; name="a"; filename="b;c.txt"`, with quoted
// values unescaped. The leading disposition type is dropped.
fn disposition_params(value: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut chars = value.chars().peekable();

    // Skip the disposition type.
    for c in chars.by_ref() {
        if c == ';' {
            break;
        }
    }

    loop {
        let mut key = String::new();
        let mut has_value = false;
        for c in chars.by_ref() {
            if c == '=' {
                has_value = true;
                break;
            }
            if c == ';' {
                break;
            }
            key.push(c);
        }
        let key = key.trim().to_owned();
        if !has_value {
            if !key.is_empty() {
                params.push((key, String::new()));
            }
            if chars.peek().is_none() {
                break;
            }
            continue;
        }

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        let mut val = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            val.push(escaped);
                        }
                    }
                    '"' => break,
                    _ => val.push(c),
                }
            }
            for c in chars.by_ref() {
                if c == ';' {
                    break;
                }
            }
        } else {
            for c in chars.by_ref() {
                if c == ';' {
                    break;
                }
                val.push(c);
            }
        }

        if !key.is_empty() {
            params.push((key, val.trim().to_owned()));
        }
    }

    params
}

fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| offset + from)
}
