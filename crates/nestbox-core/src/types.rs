use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── Time ─────────────────────────────────────────────────────────

/// An instant on the device's monotonic clock, in milliseconds.
///
/// All inference arithmetic runs on these values. Wall-clock time never
/// enters the engine, so clock adjustments cannot perturb duration math.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Monotonic(u64);

impl Monotonic {
    pub const ZERO: Self = Self(0);

    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }

    pub fn plus_millis(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }

    /// Milliseconds elapsed since `earlier`; zero if `earlier` is later.
    pub fn millis_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Whole seconds elapsed since `earlier`, floor-truncated.
    pub fn secs_since(self, earlier: Self) -> u64 {
        self.millis_since(earlier) / 1000
    }
}

impl fmt::Display for Monotonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

// ─── Tag ──────────────────────────────────────────────────────────

/// Normalized RFID tag identifier: uppercase hex, length 8..=16.
///
/// Construction validates the normalized form; parsing and
/// deserialization funnel through the same checks, so no path mints an
/// unchecked tag. The frame decoder is the only production source of
/// these values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct TagId(String);

impl TagId {
    pub const MIN_LEN: usize = 8;
    pub const MAX_LEN: usize = 16;

    pub fn new(s: impl Into<String>) -> Result<Self, NestboxError> {
        let s = s.into();
        if s.len() < Self::MIN_LEN || s.len() > Self::MAX_LEN {
            return Err(NestboxError::InvalidTag(format!(
                "length {} outside {}..={}",
                s.len(),
                Self::MIN_LEN,
                Self::MAX_LEN
            )));
        }
        if !s.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b)) {
            return Err(NestboxError::InvalidTag(format!(
                "non-hex character in {s:?}"
            )));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TagId {
    type Err = NestboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_ascii_uppercase())
    }
}

impl TryFrom<String> for TagId {
    type Error = NestboxError;

    /// Same normalization as [`FromStr`]; serde deserialization lands
    /// here.
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// An accepted reading: the normalized tag plus the instant it cleared
/// the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagReading {
    pub tag: TagId,
    pub accepted_at: Monotonic,
}

// ─── Roster ───────────────────────────────────────────────────────

/// One known animal wearing an RFID tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    pub tag: TagId,
    pub name: String,
    /// Ordinal within the roster, 1-based.
    pub number: u8,
}

/// Immutable tag-to-occupant lookup table, built once at startup.
///
/// Bounded to [`Roster::CAPACITY`] entries; lookups are linear scans,
/// which is plenty at this size. Deserialization runs the same checks
/// as [`Roster::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RosterEntries")]
pub struct Roster {
    occupants: Vec<Occupant>,
}

/// Unvalidated wire shape of a [`Roster`].
#[derive(Deserialize)]
struct RosterEntries {
    occupants: Vec<Occupant>,
}

impl TryFrom<RosterEntries> for Roster {
    type Error = NestboxError;

    fn try_from(value: RosterEntries) -> Result<Self, Self::Error> {
        Self::new(value.occupants)
    }
}

impl Roster {
    pub const CAPACITY: usize = 15;

    pub fn new(occupants: Vec<Occupant>) -> Result<Self, NestboxError> {
        if occupants.is_empty() {
            return Err(NestboxError::EmptyRoster);
        }
        if occupants.len() > Self::CAPACITY {
            return Err(NestboxError::RosterOverflow(occupants.len()));
        }
        for (i, occ) in occupants.iter().enumerate() {
            if occ.number == 0 || occ.number as usize > Self::CAPACITY {
                return Err(NestboxError::InvalidOrdinal(occ.number));
            }
            for prior in &occupants[..i] {
                if prior.tag == occ.tag {
                    return Err(NestboxError::DuplicateTag(occ.tag.to_string()));
                }
                if prior.number == occ.number {
                    return Err(NestboxError::DuplicateOrdinal(occ.number));
                }
            }
        }
        Ok(Self { occupants })
    }

    pub fn lookup(&self, tag: &TagId) -> Option<&Occupant> {
        self.occupants.iter().find(|o| &o.tag == tag)
    }

    pub fn len(&self) -> usize {
        self.occupants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Occupant> {
        self.occupants.iter()
    }
}

// ─── Occupancy mode ───────────────────────────────────────────────

/// Occupancy classification for the box.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccupancyMode {
    #[default]
    Empty,
    Single,
    Multi,
}

impl OccupancyMode {
    pub const ALL: [Self; 3] = [Self::Empty, Self::Single, Self::Multi];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Single => "single",
            Self::Multi => "multi",
        }
    }
}

impl fmt::Display for OccupancyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Events ───────────────────────────────────────────────────────

/// Event record handed to the external publisher. Delivery, formatting,
/// and transport are the publisher's concern; these are plain data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NestEvent {
    Entered {
        occupant: Occupant,
    },
    VisitCompleted {
        occupant: Occupant,
        duration_secs: u64,
    },
    Changed {
        previous: Occupant,
        new: Occupant,
        previous_duration_secs: u64,
    },
    MultiOccupantDetected {
        occupants: Vec<Occupant>,
    },
    MultiOccupantContinued {
        occupants: Vec<Occupant>,
    },
    ReturnedToSingle {
        occupant: Occupant,
    },
    Emptied,
}

impl NestEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Entered { .. } => "entered",
            Self::VisitCompleted { .. } => "visit_completed",
            Self::Changed { .. } => "changed",
            Self::MultiOccupantDetected { .. } => "multi_occupant_detected",
            Self::MultiOccupantContinued { .. } => "multi_occupant_continued",
            Self::ReturnedToSingle { .. } => "returned_to_single",
            Self::Emptied => "emptied",
        }
    }
}

// ─── Error ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NestboxError {
    InvalidTag(String),
    EmptyRoster,
    RosterOverflow(usize),
    DuplicateTag(String),
    DuplicateOrdinal(u8),
    InvalidOrdinal(u8),
}

impl fmt::Display for NestboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTag(msg) => write!(f, "invalid tag: {msg}"),
            Self::EmptyRoster => write!(f, "roster has no occupants"),
            Self::RosterOverflow(n) => {
                write!(f, "roster has {n} occupants, capacity is {}", Roster::CAPACITY)
            }
            Self::DuplicateTag(tag) => write!(f, "duplicate tag in roster: {tag}"),
            Self::DuplicateOrdinal(n) => write!(f, "duplicate ordinal in roster: {n}"),
            Self::InvalidOrdinal(n) => {
                write!(f, "ordinal {n} outside 1..={}", Roster::CAPACITY)
            }
        }
    }
}

impl std::error::Error for NestboxError {}

// ─── Tests ────────────────────────────────────────────────────────
