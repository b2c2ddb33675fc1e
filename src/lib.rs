//! Web image gallery with EXIF metadata pages and AI-generated captions.
//!
//! Images are kept in an [`store::ObjectStore`], described by the
//! [`metadata`] extractor and optionally captioned through the
//! [`caption::CaptionPipeline`].

pub mod caption;
pub mod config;
pub mod error;
pub mod metadata;
pub mod server;
pub mod store;

pub use config::Config;
pub use error::{AppError, DecodeError, StoreError};
