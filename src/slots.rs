//! Slot ownership tracking.
//!
//! Every registry here is rebuilt from the full editor state after each
//! edit and never patched in place.

use crate::data::{FacultyMember, LabRoomAssignment, Subject, TheoryRoomAssignment};
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

/// How a subject is taught in a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Theory,
    Lab,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Theory => f.write_str("theory"),
            Self::Lab => f.write_str("lab"),
        }
    }
}

/// A unit of work: one subject taught to one section in one mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct SlotKey {
    pub subject: String,
    pub section: String,
    pub mode: Mode,
}

impl SlotKey {
    pub fn new(subject: impl Into<String>, section: impl Into<String>, mode: Mode) -> Self {
        Self {
            subject: subject.into(),
            section: section.into(),
            mode,
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} for section {}", self.subject, self.mode, self.section)
    }
}

/// A faculty assignment row: `faculty[faculty].assignments[row]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct OwnerRef {
    pub faculty: usize,
    pub row: usize,
}

/// A lab claim entry: `lab_rooms[room].assignments[claim]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct LabClaimRef {
    pub room: usize,
    pub claim: usize,
}

/// Maps each claimed key to its single owner.
///
/// The first claimant of a key owns it; any later claim by a different
/// owner is kept aside in `conflicts`.
#[derive(Debug, Clone)]
pub struct Registry<K, O> {
    owners: HashMap<K, O>,
    conflicts: Vec<(K, O)>,
}

impl<K, O> Registry<K, O>
where
    K: Eq + Hash + Clone,
    O: Copy + PartialEq,
{
    fn from_claims(claims: impl IntoIterator<Item = (K, O)>) -> Self {
        let mut owners = HashMap::new();
        let mut conflicts = Vec::new();
        for (key, owner) in claims {
            match owners.get(&key) {
                None => {
                    owners.insert(key, owner);
                }
                Some(existing) if *existing == owner => {}
                Some(_) => conflicts.push((key, owner)),
            }
        }
        Self { owners, conflicts }
    }

    pub fn owner(&self, key: &K) -> Option<O> {
        self.owners.get(key).copied()
    }

    /// True iff `key` is claimed by someone other than `exclude`.
    pub fn is_taken_by_other(&self, key: &K, exclude: Option<O>) -> bool {
        match self.owners.get(key) {
            Some(owner) => Some(*owner) != exclude,
            None => false,
        }
    }

    pub fn claimed(&self) -> HashSet<K> {
        self.owners.keys().cloned().collect()
    }

    pub fn conflicts(&self) -> &[(K, O)] {
        &self.conflicts
    }
}

/// Faculty rows owning (subject, section, mode) slots.
pub type AssignmentRegistry = Registry<SlotKey, OwnerRef>;

/// Lab rooms owning lab slots, one per (subject, section).
pub type LabRoomRegistry = Registry<SlotKey, LabClaimRef>;

/// Theory rooms owning whole sections, keyed by section name.
pub type TheoryRoomRegistry = Registry<String, usize>;

impl Registry<SlotKey, OwnerRef> {
    pub fn rebuild(faculty: &[FacultyMember]) -> Self {
        let claims = faculty.iter().enumerate().flat_map(|(f, member)| {
            member
                .assignments
                .iter()
                .enumerate()
                .flat_map(move |(row, assignment)| {
                    assignment
                        .slot_keys()
                        .into_iter()
                        .map(move |key| (key, OwnerRef { faculty: f, row }))
                })
        });
        let registry = Self::from_claims(claims);
        trace!(
            "Rebuilt assignment registry: {} slots owned, {} conflicting claims",
            registry.owners.len(),
            registry.conflicts.len()
        );
        registry
    }
}

impl Registry<SlotKey, LabClaimRef> {
    pub fn rebuild(rooms: &[LabRoomAssignment]) -> Self {
        let claims = rooms.iter().enumerate().flat_map(|(room, assignment)| {
            assignment
                .assignments
                .iter()
                .enumerate()
                .filter(|(_, claim)| !claim.subject_name.trim().is_empty())
                .flat_map(move |(index, claim)| {
                    claim.sections.iter().map(move |section| {
                        (
                            SlotKey::new(claim.subject_name.as_str(), section.as_str(), Mode::Lab),
                            LabClaimRef { room, claim: index },
                        )
                    })
                })
        });
        Self::from_claims(claims)
    }
}

impl Registry<String, usize> {
    pub fn rebuild(rooms: &[TheoryRoomAssignment]) -> Self {
        let claims = rooms.iter().enumerate().flat_map(|(room, assignment)| {
            assignment
                .sections
                .iter()
                .map(move |section| (section.clone(), room))
        });
        Self::from_claims(claims)
    }

    /// Expands section claims into theory slots for every theory subject.
    pub fn theory_slots(&self, subjects: &[Subject]) -> HashSet<SlotKey> {
        self.owners
            .keys()
            .flat_map(|section| {
                subjects
                    .iter()
                    .filter(|s| s.offers(Mode::Theory))
                    .map(move |s| SlotKey::new(s.name.as_str(), section.as_str(), Mode::Theory))
            })
            .collect()
    }
}

/// Every slot that must be owned before the request can be submitted.
pub fn required_slots(subjects: &[Subject], sections: &[String]) -> BTreeSet<SlotKey> {
    let mut required = BTreeSet::new();
    for subject in subjects {
        for mode in [Mode::Theory, Mode::Lab] {
            if !subject.offers(mode) {
                continue;
            }
            for section in sections {
                required.insert(SlotKey::new(subject.name.as_str(), section.as_str(), mode));
            }
        }
    }
    required
}

/// Set containment, so stale claims never mask a gap.
pub fn is_fully_covered(required: &BTreeSet<SlotKey>, claimed: &HashSet<SlotKey>) -> bool {
    required.iter().all(|key| claimed.contains(key))
}

/// Required slots absent from `claimed`, in sorted order.
pub fn missing_slots(required: &BTreeSet<SlotKey>, claimed: &HashSet<SlotKey>) -> Vec<SlotKey> {
    required
        .iter()
        .filter(|key| !claimed.contains(*key))
        .cloned()
        .collect()
}

/// Required slots restricted to one mode.
pub fn required_in_mode(required: &BTreeSet<SlotKey>, mode: Mode) -> BTreeSet<SlotKey> {
    required.iter().filter(|k| k.mode == mode).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FacultyAssignment;

    fn sections(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn required_slots_follow_credit_and_lab() {
        let subjects = vec![
            Subject::new("Math", "MTH", 3, 0),
            Subject::new("Chem", "CHM", 2, 1),
            Subject::new("Workshop", "WRK", 0, 2),
        ];
        let required = required_slots(&subjects, &sections(&["A", "B"]));

        assert_eq!(required.len(), 8);
        assert!(required.contains(&SlotKey::new("Math", "B", Mode::Theory)));
        assert!(!required.contains(&SlotKey::new("Math", "A", Mode::Lab)));
        assert!(required.contains(&SlotKey::new("Workshop", "A", Mode::Lab)));
        assert!(!required.contains(&SlotKey::new("Workshop", "A", Mode::Theory)));
    }

    #[test]
    fn second_claim_on_same_slot_is_a_conflict() {
        let faculty = vec![
            FacultyMember::new("Ada", "AL").with_assignment(FacultyAssignment::new(
                "Math", "A", true, false,
            )),
            FacultyMember::new("Grace", "GH").with_assignment(FacultyAssignment::new(
                "Math", "A", true, false,
            )),
        ];
        let registry = AssignmentRegistry::rebuild(&faculty);
        let key = SlotKey::new("Math", "A", Mode::Theory);
        let first = OwnerRef { faculty: 0, row: 0 };
        let second = OwnerRef { faculty: 1, row: 0 };

        assert_eq!(registry.owner(&key), Some(first));
        assert!(registry.is_taken_by_other(&key, Some(second)));
        assert!(!registry.is_taken_by_other(&key, Some(first)));
        assert_eq!(registry.conflicts(), &[(key, second)]);
    }

    #[test]
    fn unclaimed_slot_is_never_taken() {
        let registry = AssignmentRegistry::rebuild(&[]);
        let key = SlotKey::new("Math", "A", Mode::Lab);
        assert!(!registry.is_taken_by_other(&key, None));
        assert!(registry.claimed().is_empty());
    }

    #[test]
    fn lab_room_registry_keys_by_subject_and_section() {
        let rooms = vec![
            LabRoomAssignment::new("L1").with_claim("Chem", &["A", "B"]),
            LabRoomAssignment::new("L2").with_claim("Chem", &["B"]),
        ];
        let registry = LabRoomRegistry::rebuild(&rooms);
        let key = SlotKey::new("Chem", "B", Mode::Lab);

        assert_eq!(registry.owner(&key), Some(LabClaimRef { room: 0, claim: 0 }));
        assert_eq!(registry.conflicts().len(), 1);
        assert_eq!(registry.claimed().len(), 2);
    }

    #[test]
    fn theory_room_claims_expand_to_theory_subjects() {
        let rooms = vec![TheoryRoomAssignment::new("R1", &["A"])];
        let registry = TheoryRoomRegistry::rebuild(&rooms);
        let subjects = vec![
            Subject::new("Math", "MTH", 3, 0),
            Subject::new("Workshop", "WRK", 0, 2),
        ];

        let slots = registry.theory_slots(&subjects);
        assert_eq!(slots.len(), 1);
        assert!(slots.contains(&SlotKey::new("Math", "A", Mode::Theory)));
    }

    #[test]
    fn coverage_uses_containment_not_cardinality() {
        let subjects = vec![Subject::new("Math", "MTH", 3, 0)];
        let required = required_slots(&subjects, &sections(&["A", "B"]));
        let claimed: HashSet<SlotKey> = [
            SlotKey::new("Math", "A", Mode::Theory),
            SlotKey::new("Stale", "A", Mode::Theory),
        ]
        .into_iter()
        .collect();

        assert_eq!(claimed.len(), required.len());
        assert!(!is_fully_covered(&required, &claimed));
        assert_eq!(
            missing_slots(&required, &claimed),
            vec![SlotKey::new("Math", "B", Mode::Theory)]
        );
    }
}
