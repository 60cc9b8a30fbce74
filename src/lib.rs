//! Cloud Clip - share clipboard contents between machines over HTTP
//!
//! Clients upload arbitrary blobs and get back an opaque id; other clients
//! list, fetch or delete clips by that id.
//!
//! ## Storage Layout
//!
//! ```text
//! clips/
//! ├── .staging/      # uploads in flight, cleared on startup
//! ├── <id>           # blob, 32 lowercase hex chars
//! └── <id>.meta      # {"name": "...", "mime": "..."}
//! ```
//!
//! A clip is visible only while both files exist as regular files.

pub mod config;
pub mod error;
pub mod guard;
pub mod http;
pub mod id;
pub mod response;
pub mod scan;
pub mod sniff;
pub mod store;

// Re-exports
pub use config::{Args, Config};
pub use error::ClipError;
pub use guard::{GuardMode, SerializationGuard};
pub use http::HttpServer;
pub use id::{ClipId, IdGenerator, RandomIds};
pub use scan::{scan_clip_dir, Inventory};
pub use store::{Clip, ClipMeta, ClipStore, ClipSummary};
