//! Utility modules for strm-sync
//!
//! Reusable helpers for the provider boundary: URL handling, lenient JSON decoding,
//! feed decompression and XMLTV parsing.

pub mod decompression;
pub mod deserializers;
pub mod text;
pub mod url;
pub mod xmltv_parser;

pub use decompression::{CompressionFormat, DecompressionService};
pub use url::UrlUtils;
