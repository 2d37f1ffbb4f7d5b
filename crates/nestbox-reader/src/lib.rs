//! Tag reader drivers.
//!
//! [`TagReader`] is the surface the monitor loop drives: capture one raw
//! frame, or power-cycle the reader. [`SerialFrameReader`] implements it
//! over any [`ByteLink`] with the burst pacing and reset pulse the
//! hardware wants; [`ReplayReader`] plays a recorded script back for
//! development runs and tests.

pub mod capture;
pub mod error;
pub mod link;
pub mod replay;

pub use capture::{SerialFrameReader, TagReader};
pub use error::ReaderError;
pub use link::{ByteLink, LineLevel};
pub use replay::{ReplayEntry, ReplayReader, parse_hex_frame};
