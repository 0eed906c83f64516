use crate::slots::SlotKey;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which kind of owner a required slot is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    Faculty,
    Room,
}

/// A required slot nobody has claimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageGap {
    pub slot: SlotKey,
    pub missing: OwnerKind,
}

impl fmt::Display for CoverageGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.missing {
            OwnerKind::Faculty => write!(f, "no faculty assigned to {}", self.slot),
            OwnerKind::Room => write!(f, "no room assigned to {}", self.slot),
        }
    }
}

fn join_gaps(gaps: &[CoverageGap]) -> String {
    gaps.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Whole-configuration check failures, raised before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0}")]
    Structural(String),

    #[error("Incomplete coverage: {}", join_gaps(.0))]
    Coverage(Vec<CoverageGap>),
}

/// An editor command that cannot be applied to the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("No {what} at index {index}")]
    OutOfRange { what: &'static str, index: usize },

    #[error("{0} is already assigned elsewhere")]
    SlotTaken(SlotKey),

    #[error("Section {0} already has a theory room")]
    SectionTaken(String),

    #[error("{faculty} may teach at most {limit} distinct subjects")]
    TooManySubjects { faculty: String, limit: usize },

    #[error("Room {room} can hold at most {limit} {what}")]
    RoomFull {
        room: String,
        what: &'static str,
        limit: usize,
    },

    #[error("Nothing to {0}")]
    EmptyHistory(&'static str),
}

/// Failures talking to the external generation service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("Could not reach the timetable generator: {0}")]
    Transport(String),

    #[error("{0}")]
    Rejected(String),

    #[error("The timetable generator sent an unreadable response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Could not access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Everything a request handler can fail with.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    NotFound(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::Mode;

    #[test]
    fn coverage_message_lists_every_gap() {
        let err = ValidationError::Coverage(vec![
            CoverageGap {
                slot: SlotKey::new("Math", "A", Mode::Theory),
                missing: OwnerKind::Faculty,
            },
            CoverageGap {
                slot: SlotKey::new("Chem", "B", Mode::Lab),
                missing: OwnerKind::Room,
            },
        ]);
        assert_eq!(
            err.to_string(),
            "Incomplete coverage: no faculty assigned to Math theory for section A; \
             no room assigned to Chem lab for section B"
        );
    }
}
