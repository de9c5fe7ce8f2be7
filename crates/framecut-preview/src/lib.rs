//! Framecut Preview - Timeline pre-render bookkeeping
//!
//! Partitions the timeline into fixed-size chunks and tracks which of them
//! hold a valid render. Rendering itself happens in an external engine that
//! talks to the [`PreviewManager`] through render requests and completion
//! events.

pub mod chunk;
pub mod config;
pub mod error;
pub mod manager;
pub mod persist;
pub mod render;

pub use chunk::{ChunkGrid, ChunkState};
pub use config::PreviewConfig;
pub use error::{PreviewError, PreviewResult};
pub use manager::{PreviewManager, PreviewTrack};
pub use persist::{CacheDirProbe, ChunkProbe, PreviewProperties};
pub use render::{CancelToken, RenderEvent, RenderRequest, RenderTicket};
