//! nestbox-core: occupancy inference for a single RFID nesting box.
//! Frame decoding, read debouncing, identity lookup, and the occupancy
//! state machine. Pure logic with no I/O and no clock reads; time enters
//! as monotonic millisecond values supplied by the caller.

pub mod decode;
pub mod engine;
pub mod multi;
pub mod types;
pub mod validate;

pub use decode::decode_frame;
pub use engine::{EngineConfig, OccupancyEngine, TickOutput};
pub use multi::{MultiPolicy, MultiWindow};
pub use types::{
    Monotonic, NestEvent, NestboxError, Occupant, OccupancyMode, Roster, TagId, TagReading,
};
pub use validate::{ReadValidator, ValidatorConfig};
