//! Per-request context — helpers over one [`Request`] and its response.
//!
//! [`Context`] bundles the incoming request with a [`ResponseWriter`] and
//! offers shortcuts for the common handler chores:
//!
//! | Reading                                   | Writing                                        |
//! |-------------------------------------------|------------------------------------------------|
//! | [`query`](Context::query), [`form`](Context::form), [`form_value`](Context::form_value) | [`write_header`](Context::write_header), [`write`](Context::write) |
//! | [`read_query`](Context::read_query), [`read_form`](Context::read_form) (struct binding) | [`write_json`](Context::write_json), [`write_xml`](Context::write_xml) |
//! | [`read_json`](Context::read_json), [`read_xml`](Context::read_xml) | [`write_html`](Context::write_html), [`write_text`](Context::write_text) |
//! | [`read_html`](Context::read_html), [`read_text`](Context::read_text) | [`set_header`](Context::set_header), [`del_header`](Context::del_header) |
//! | [`form_file`](Context::form_file), [`upload_file`](Context::upload_file) | [`serve_file`](Context::serve_file), [`not_found`](Context::not_found) |
//!
//! Every fallible helper returns its error to the caller; turning an error
//! into a status code is the handler's job.

use std::io;
use std::path::Path;

use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::bind::{BindError, Bindable, Binder, Values};
use crate::http::{Headers, Method, Request, Response, StatusCode};

pub mod escape;
pub mod multipart;
pub mod writer;

pub use multipart::{FormFile, MultipartError, MultipartForm};
pub use writer::ResponseWriter;

/// Name of the `Content-Type` header.
pub const CONTENT_TYPE: &str = "Content-Type";
/// Content type written by the JSON helpers.
pub const CONTENT_TYPE_JSON: &str = "application/json;charset=utf-8";
/// Content type written by the XML helpers.
pub const CONTENT_TYPE_XML: &str = "text/xml;charset=utf-8";
/// Content type written by [`Context::write_html`].
pub const CONTENT_TYPE_HTML: &str = "text/html;charset=utf-8";
/// Content type written by [`Context::write_text`].
pub const CONTENT_TYPE_TEXT: &str = "text/plain;charset=utf-8";

/// Default upper bound for a buffered multipart body (64 MiB).
pub const DEFAULT_MAX_MEMORY: usize = 0x400_0000;

/// Tunables for a [`Context`].
///
/// Deserializable so it can sit inside an application's own config file;
/// missing keys take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Largest multipart body [`Context::form_file`] will parse, in bytes.
    pub max_memory: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_memory: DEFAULT_MAX_MEMORY,
        }
    }
}

/// Errors returned by [`Context`] helpers.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("request has no body")]
    EmptyBody,

    #[error("could not create upload destination for {filename:?}: {source}")]
    CreateFileFailed {
        filename: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML decode error: {0}")]
    XmlDecode(#[from] quick_xml::DeError),

    #[error("XML encode error: {0}")]
    XmlEncode(#[from] quick_xml::SeError),

    #[error("body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Per-request context — the request plus the response being written.
///
/// # Examples
///
/// ```
/// use httpctx::context::Context;
/// use httpctx::http::{Method, Request, StatusCode};
///
/// let request = Request::new(Method::Get, "/greet?name=Ada");
/// let mut ctx = Context::new(request);
///
/// let name = ctx.query().get("name").unwrap_or("stranger").to_owned();
/// ctx.write_text(&format!("hello, {name}"));
///
/// let response = ctx.into_response();
/// assert_eq!(response.status(), StatusCode::Ok);
/// assert_eq!(response.body_ref(), b"hello, Ada");
/// ```
#[derive(Debug)]
pub struct Context {
    request: Request,
    writer: ResponseWriter,
    config: ContextConfig,
    multipart: Option<MultipartForm>,
}

impl Context {
    /// Creates a context with the default [`ContextConfig`].
    pub fn new(request: Request) -> Self {
        Self::with_config(request, ContextConfig::default())
    }

    /// Creates a context with an explicit configuration.
    pub fn with_config(request: Request, config: ContextConfig) -> Self {
        Self {
            request,
            writer: ResponseWriter::new(),
            config,
            multipart: None,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn writer(&self) -> &ResponseWriter {
        &self.writer
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Finishes the response; `200 OK` if no status was written.
    pub fn into_response(self) -> Response {
        self.writer.finish()
    }

    /// Replies `404 page not found` as plain text.
    pub fn not_found(&mut self) {
        self.plain_error(StatusCode::NotFound, "404 page not found");
    }

    /// Replies with `status` and a `"<code> <reason>"` plain-text body.
    pub fn error(&mut self, status: StatusCode) {
        self.plain_error(status, &status.to_string());
    }

    fn plain_error(&mut self, status: StatusCode, message: &str) {
        let headers = self.writer.headers_mut();
        headers.remove("Content-Length");
        headers.set(CONTENT_TYPE, "text/plain; charset=utf-8");
        headers.set("X-Content-Type-Options", "nosniff");
        self.writer.write_header(status);
        self.writer.write(message.as_bytes());
        self.writer.write(b"\n");
    }

    /// Replies with the contents of the file at `path`.
    ///
    /// The content type is picked from the file extension unless one was
    /// already set. A missing file or a directory yields
    /// [`not_found`](Self::not_found); a permission problem yields `403`, any
    /// other I/O failure `500`. `HEAD` requests get headers only.
    pub async fn serve_file(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();

        let status_for = |err: &io::Error| match err.kind() {
            io::ErrorKind::NotFound => StatusCode::NotFound,
            io::ErrorKind::PermissionDenied => StatusCode::Forbidden,
            _ => StatusCode::InternalServerError,
        };

        let contents = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => Err(StatusCode::NotFound),
            Ok(_) => tokio::fs::read(path).await.map_err(|e| status_for(&e)),
            Err(e) => Err(status_for(&e)),
        };

        match contents {
            Ok(contents) => {
                if !self.writer.headers().contains(CONTENT_TYPE) {
                    self.set_header(CONTENT_TYPE, content_type_for(path));
                }
                self.writer.write_header(StatusCode::Ok);
                if *self.request.method() != Method::Head {
                    self.writer.write(&contents);
                }
            }
            Err(StatusCode::NotFound) => self.not_found(),
            Err(status) => self.error(status),
        }
    }

    /// First value of form field `name`.
    ///
    /// Looks at URL-encoded body and query values first, then at the text
    /// fields of a multipart body. A multipart body that cannot be parsed
    /// counts as having no fields.
    pub fn form_value(&mut self, name: &str) -> Option<String> {
        if let Some(value) = self.request.form().get(name) {
            return Some(value.to_owned());
        }
        self.multipart_form()
            .ok()?
            .values()
            .get(name)
            .map(str::to_owned)
    }

    /// Parsed query string values.
    pub fn query(&self) -> &Values {
        self.request.query()
    }

    /// URL-encoded body values followed by query values.
    pub fn form(&self) -> &Values {
        self.request.form()
    }

    /// URL-encoded body values only.
    pub fn post_form(&self) -> &Values {
        self.request.post_form()
    }

    /// Binds [`form`](Self::form) values into `target` using `form` tags.
    ///
    /// # Errors
    ///
    /// See [`Binder::bind`].
    pub fn read_form<T: Bindable + ?Sized>(&self, target: &mut T) -> Result<(), BindError> {
        Binder::form().bind(target, self.form())
    }

    /// Binds [`query`](Self::query) values into `target` using `url` tags.
    ///
    /// # Errors
    ///
    /// See [`Binder::bind`].
    pub fn read_query<T: Bindable + ?Sized>(&self, target: &mut T) -> Result<(), BindError> {
        Binder::query().bind(target, self.query())
    }

    /// Appends a response header.
    pub fn add_header(&mut self, name: &str, value: &str) {
        self.writer.headers_mut().insert(name, value);
    }

    /// Sets a response header, replacing existing values.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.writer.headers_mut().set(name, value);
    }

    /// Removes a response header.
    pub fn del_header(&mut self, name: &str) {
        self.writer.headers_mut().remove(name);
    }

    /// Writes the status line, first copying `overlay` over the response
    /// headers. Only the first call has any effect.
    pub fn write_header(&mut self, status: StatusCode, overlay: Option<&Headers>) {
        if let Some(overlay) = overlay {
            self.writer.headers_mut().overlay(overlay);
        }
        self.writer.write_header(status);
    }

    /// Writes raw body bytes.
    pub fn write(&mut self, data: &[u8]) -> usize {
        self.writer.write(data)
    }

    /// Writes `text` HTML-escaped.
    pub fn write_string(&mut self, text: &str) {
        self.writer.write(escape::escape_html(text).as_bytes());
    }

    /// Writes already-encoded JSON, escaping characters unsafe inside HTML.
    pub fn write_data_json(&mut self, data: &[u8]) {
        let escaped = escape::escape_json_html(data);
        self.set_header(CONTENT_TYPE, CONTENT_TYPE_JSON);
        self.writer.write(&escaped);
    }

    /// Serializes `value` to JSON and writes it.
    ///
    /// # Errors
    ///
    /// [`ContextError::Json`] if `value` cannot be serialized; nothing is written.
    pub fn write_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ContextError> {
        let data = serde_json::to_vec(value)?;
        self.write_data_json(&data);
        Ok(())
    }

    /// Writes already-encoded XML.
    pub fn write_data_xml(&mut self, data: &[u8]) {
        self.set_header(CONTENT_TYPE, CONTENT_TYPE_XML);
        self.writer.write(data);
    }

    /// Serializes `value` to XML and writes it.
    ///
    /// # Errors
    ///
    /// [`ContextError::XmlEncode`] if `value` cannot be serialized; nothing is written.
    pub fn write_xml<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ContextError> {
        let data = quick_xml::se::to_string(value)?;
        self.write_data_xml(data.as_bytes());
        Ok(())
    }

    /// Writes `html` escaped, as `text/html`.
    pub fn write_html(&mut self, html: &str) {
        self.set_header(CONTENT_TYPE, CONTENT_TYPE_HTML);
        self.write_string(html);
    }

    /// Writes `text` verbatim, as `text/plain`.
    pub fn write_text(&mut self, text: &str) {
        self.set_header(CONTENT_TYPE, CONTENT_TYPE_TEXT);
        self.writer.write(text.as_bytes());
    }

    /// First value of request header `name`.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.request.headers().get(name)
    }

    /// The request body.
    ///
    /// # Errors
    ///
    /// [`ContextError::EmptyBody`] if the request has no body stream.
    pub fn get_body(&self) -> Result<&Bytes, ContextError> {
        self.request.body().ok_or(ContextError::EmptyBody)
    }

    /// Runs `decode` over the body bytes.
    ///
    /// # Errors
    ///
    /// [`ContextError::EmptyBody`], or the decoder's error converted into
    /// [`ContextError`].
    pub fn unmarshal_body<T, E, F>(&self, decode: F) -> Result<T, ContextError>
    where
        F: FnOnce(&[u8]) -> Result<T, E>,
        ContextError: From<E>,
    {
        let body = self.get_body()?;
        Ok(decode(body)?)
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// [`ContextError::EmptyBody`] or [`ContextError::Json`].
    pub fn read_json<T: DeserializeOwned>(&self) -> Result<T, ContextError> {
        self.unmarshal_body(|data| serde_json::from_slice(data))
    }

    /// Decodes the body as XML.
    ///
    /// # Errors
    ///
    /// [`ContextError::EmptyBody`] or [`ContextError::XmlDecode`].
    pub fn read_xml<T: DeserializeOwned>(&self) -> Result<T, ContextError> {
        self.unmarshal_body(|data| quick_xml::de::from_reader(data))
    }

    /// The body as text with HTML character references decoded.
    ///
    /// # Errors
    ///
    /// [`ContextError::EmptyBody`] or [`ContextError::Utf8`].
    pub fn read_html(&self) -> Result<String, ContextError> {
        let text = self.read_text()?;
        Ok(escape::unescape_html(&text))
    }

    /// The body as text.
    ///
    /// # Errors
    ///
    /// [`ContextError::EmptyBody`] or [`ContextError::Utf8`].
    pub fn read_text(&self) -> Result<String, ContextError> {
        let body = self.get_body()?;
        Ok(String::from_utf8(body.to_vec())?)
    }

    /// The parsed multipart body, bounded by [`ContextConfig::max_memory`].
    ///
    /// Parsed on first success and cached afterwards.
    ///
    /// # Errors
    ///
    /// [`ContextError::EmptyBody`] or [`ContextError::Multipart`].
    pub fn multipart_form(&mut self) -> Result<&MultipartForm, ContextError> {
        let form = match self.multipart.take() {
            Some(form) => form,
            None => {
                let content_type = self
                    .request
                    .headers()
                    .get("content-type")
                    .ok_or(MultipartError::NotMultipart)?;
                let body = self.request.body().ok_or(ContextError::EmptyBody)?;
                MultipartForm::parse(content_type, body, self.config.max_memory)?
            }
        };
        Ok(&*self.multipart.insert(form))
    }

    /// The first file uploaded under `key`.
    ///
    /// # Errors
    ///
    /// Those of [`multipart_form`](Self::multipart_form), plus
    /// [`MultipartError::MissingFile`] if no file was sent under `key`.
    pub fn form_file(&mut self, key: &str) -> Result<&FormFile, ContextError> {
        self.multipart_form()?
            .file(key)
            .ok_or_else(|| MultipartError::MissingFile { key: key.to_owned() }.into())
    }

    /// Copies the file uploaded under `key` into a sink opened by `create`.
    ///
    /// `create` receives the uploaded file name. The sink is shut down
    /// whether or not the copy succeeds. Returns the number of bytes copied.
    ///
    /// # Errors
    ///
    /// - Those of [`form_file`](Self::form_file).
    /// - [`ContextError::CreateFileFailed`] if `create` fails.
    /// - [`ContextError::Io`] if copying or shutting down the sink fails.
    pub async fn upload_file<F, W>(&mut self, key: &str, create: F) -> Result<u64, ContextError>
    where
        F: FnOnce(&str) -> io::Result<W>,
        W: AsyncWrite + Unpin,
    {
        let file = self.form_file(key)?.clone();
        let mut sink = create(file.filename()).map_err(|source| ContextError::CreateFileFailed {
            filename: file.filename().to_owned(),
            source,
        })?;

        let mut source = file.data().as_ref();
        let copied = tokio::io::copy(&mut source, &mut sink).await;
        let closed = sink.shutdown().await;
        let copied = copied?;
        closed?;

        debug!(field = key, filename = file.filename(), bytes = copied, "upload stored");
        Ok(copied)
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("xml") => "text/xml; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}
