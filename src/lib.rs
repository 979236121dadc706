//! # httpctx
//!
//! A request/response convenience context over a minimal HTTP/1.1 model,
//! with tag-driven binding of query strings and form bodies into structs.
//!
//! ## Quick Start
//!
//! ```rust
//! use httpctx::bindable;
//! use httpctx::context::Context;
//! use httpctx::http::{Method, Request, StatusCode};
//!
//! #[derive(Debug, Default)]
//! struct Page {
//!     number: u32,
//!     size: u16,
//! }
//!
//! bindable!(Page {
//!     number [url = "page"],
//!     size [url = "per_page"],
//! });
//!
//! let raw = b"GET /items?page=2&per_page=50 HTTP/1.1\r\nHost: localhost\r\n\r\n";
//! let (request, _) = Request::parse(raw).unwrap();
//! let mut ctx = Context::new(request);
//!
//! let mut page = Page::default();
//! match ctx.read_query(&mut page) {
//!     Ok(()) => ctx.write_json(&[page.number, u32::from(page.size)]).unwrap(),
//!     Err(_) => ctx.error(StatusCode::BadRequest),
//! }
//!
//! let response = ctx.into_response();
//! assert_eq!(response.body_ref(), b"[2,50]");
//! ```

pub mod bind;
pub mod context;
pub mod http;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use bind::{BindError, Bindable, Binder, Values};
pub use context::{Context, ContextConfig, ContextError};
pub use http::{Headers, Method, Request, Response, StatusCode};
