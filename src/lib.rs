//! Core library for the segmented-parallel download coordinator: probes a
//! resource, plans byte-range segments, schedules workers (pooled or fixed),
//! and assembles and verifies the result. The CLI in `src/bin/kdownload/`
//! is one embedder of this library; nothing in here talks to a terminal.

pub mod assembler;
pub mod coordinator;
pub mod error;
pub mod integrity;
pub mod logging;
pub mod model;
pub mod paths;
pub mod planner;
pub mod probe;
pub mod scheduler;
pub mod sequential;
pub mod store;
pub mod worker;

pub use coordinator::run;
pub use error::DownloadError;
pub use model::{DownloadRequest, Mode, ResourceDescriptor, SegmentRecord, SegmentStatus, Sinks};
