//! # Janus Gateway
//!
//! Serves REST/JSON routes on the HTTP sub-server by calling the matching
//! RPC method and translating the result back.
//!
//! - [`route`]: [`get_query`] / [`post_json`] handler glue
//! - [`codec`]: query and JSON decoding, JSON responses
//! - [`metadata`]: which HTTP headers become call metadata
//! - [`error`]: [`to_http`], the status → HTTP mapping with the
//!   application error override

#![doc(html_root_url = "https://docs.rs/janus-gateway/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod metadata;
pub mod route;

pub use codec::{decode_json, decode_query, json_response};
pub use error::{error_response, http_status_from_code, to_http, HttpError};
pub use metadata::{call_context, forwarded_metadata};
pub use route::{get_query, post_json};
