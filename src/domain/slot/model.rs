//! Slot domain entity

/// Stable numeric slot identity, assigned when the catalog is seeded.
pub type SlotId = i32;

/// Occupancy of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occupancy {
    Available,
    Occupied,
}

impl Occupancy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Occupied => "Occupied",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Available" => Some(Self::Available),
            "Occupied" => Some(Self::Occupied),
            _ => None,
        }
    }

    pub fn is_available(&self) -> bool {
        *self == Self::Available
    }
}

impl std::fmt::Display for Occupancy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reservable parking slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub id: SlotId,
    /// Unique human-readable name, e.g. `A1`
    pub label: String,
    pub occupancy: Occupancy,
}

impl Slot {
    pub fn new(id: SlotId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            occupancy: Occupancy::Available,
        }
    }

    pub fn with_occupancy(mut self, occupancy: Occupancy) -> Self {
        self.occupancy = occupancy;
        self
    }
}

/// Labels seeded into an empty catalog: `<prefix>1 ..= <prefix><count>`.
pub fn slot_labels(prefix: &str, count: u32) -> Vec<String> {
    (1..=count).map(|i| format!("{}{}", prefix, i)).collect()
}
