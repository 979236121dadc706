//! Response writer with a write-once status line.

use bytes::{BufMut, BytesMut};
use tracing::trace;

use crate::http::{Headers, Response, StatusCode};

/// Accumulates a response: headers, a status written once, and the body.
///
/// Headers may be edited until the status is committed by
/// [`write_header`](Self::write_header) or the first [`write`](Self::write).
/// Edits made afterwards do not reach the response.
#[derive(Debug, Default)]
pub struct ResponseWriter {
    headers: Headers,
    committed: Option<(StatusCode, Headers)>,
    body: BytesMut,
}

impl ResponseWriter {
    /// Creates a writer with no headers and nothing committed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Headers that will be sent if the status has not been committed yet.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Mutable access to the pending headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        if self.committed.is_some() {
            trace!("header edited after status was written; edit ignored");
        }
        &mut self.headers
    }

    /// The committed status, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.committed.as_ref().map(|(status, _)| *status)
    }

    /// Commits `status` and a snapshot of the current headers.
    ///
    /// Returns `false` and changes nothing if a status was already written.
    pub fn write_header(&mut self, status: StatusCode) -> bool {
        if let Some((written, _)) = &self.committed {
            trace!(%written, ignored = %status, "superfluous write_header call");
            return false;
        }
        self.committed = Some((status, self.headers.clone()));
        true
    }

    /// Appends `data` to the body, committing `200 OK` first if needed.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if self.committed.is_none() {
            self.write_header(StatusCode::Ok);
        }
        self.body.put_slice(data);
        data.len()
    }

    /// Body written so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Builds the final [`Response`], committing `200 OK` if nothing was written.
    pub fn finish(self) -> Response {
        let (status, headers) = match self.committed {
            Some(committed) => committed,
            None => (StatusCode::Ok, self.headers),
        };

        let mut response = Response::new(status);
        for (name, value) in headers.iter() {
            response.add_header(name, value);
        }
        response.body_bytes(self.body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_written_once() {
        let mut w = ResponseWriter::new();
        assert!(w.write_header(StatusCode::Created));
        assert!(!w.write_header(StatusCode::BadRequest));
        assert_eq!(w.status(), Some(StatusCode::Created));
        assert_eq!(w.finish().status(), StatusCode::Created);
    }

    #[test]
    fn write_commits_ok() {
        let mut w = ResponseWriter::new();
        assert_eq!(w.write(b"hi"), 2);
        assert_eq!(w.status(), Some(StatusCode::Ok));
        assert!(!w.write_header(StatusCode::NotFound));
        assert_eq!(w.body(), b"hi");
    }

    #[test]
    fn headers_after_commit_are_dropped() {
        let mut w = ResponseWriter::new();
        w.headers_mut().set("X-Before", "1");
        w.write_header(StatusCode::Ok);
        w.headers_mut().set("X-After", "2");
        let response = w.finish();
        assert_eq!(response.headers().get("x-before"), Some("1"));
        assert!(!response.headers().contains("x-after"));
    }

    #[test]
    fn finish_without_writes() {
        let mut w = ResponseWriter::new();
        w.headers_mut().insert("X-Pending", "yes");
        let response = w.finish();
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.headers().get("x-pending"), Some("yes"));
        assert!(response.body_ref().is_empty());
    }
}
