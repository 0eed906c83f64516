//! Editing as a reducer over immutable snapshots.
//!
//! `apply` never mutates its input: every command yields a new state or an
//! error, and the ownership registries are rebuilt from that state.

use crate::config::Limits;
use crate::data::{
    EditorState, FacultyAssignment, FacultyMember, LabRoomAssignment, Subject,
    TheoryRoomAssignment,
};
use crate::error::EditError;
use crate::slots::{
    AssignmentRegistry, LabRoomRegistry, Mode, OwnerRef, SlotKey, TheoryRoomRegistry,
    is_fully_covered, required_in_mode, required_slots,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const HISTORY_DEPTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    SetSectionsCount { count: u32 },
    SetPeriodsPerDay { periods: u32 },
    SetBreakPeriod { period: u32 },
    AddSubject { subject: Subject },
    UpdateSubject { index: usize, subject: Subject },
    RemoveSubject { index: usize },
    AddFaculty { name: String, abbr: String },
    RenameFaculty { index: usize, name: String, abbr: String },
    RemoveFaculty { index: usize },
    AddAssignment { faculty: usize, assignment: FacultyAssignment },
    UpdateAssignment { faculty: usize, row: usize, assignment: FacultyAssignment },
    RemoveAssignment { faculty: usize, row: usize },
    AddTheoryRoom { room: TheoryRoomAssignment },
    UpdateTheoryRoom { index: usize, room: TheoryRoomAssignment },
    RemoveTheoryRoom { index: usize },
    AddLabRoom { room: LabRoomAssignment },
    UpdateLabRoom { index: usize, room: LabRoomAssignment },
    RemoveLabRoom { index: usize },
}

fn check_index<T>(items: &[T], index: usize, what: &'static str) -> Result<(), EditError> {
    if index < items.len() {
        Ok(())
    } else {
        Err(EditError::OutOfRange { what, index })
    }
}

/// Applies one command to a snapshot, returning the next snapshot.
pub fn apply(
    state: &EditorState,
    command: Command,
    limits: &Limits,
) -> Result<EditorState, EditError> {
    debug!("Applying editor command: {command:?}");
    let mut next = state.clone();
    match command {
        Command::SetSectionsCount { count } => {
            next.sections_count = count;
            prune_sections(&mut next);
        }
        Command::SetPeriodsPerDay { periods } => next.periods_per_day = periods,
        Command::SetBreakPeriod { period } => next.break_period = period,
        Command::AddSubject { subject } => next.subjects.push(subject),
        Command::UpdateSubject { index, subject } => {
            check_index(&next.subjects, index, "subject")?;
            let previous = std::mem::replace(&mut next.subjects[index], subject);
            if previous.name != next.subjects[index].name {
                let renamed = next.subjects[index].name.clone();
                rename_subject(&mut next, &previous.name, &renamed);
            }
        }
        Command::RemoveSubject { index } => {
            check_index(&next.subjects, index, "subject")?;
            let removed = next.subjects.remove(index);
            forget_subject(&mut next, &removed.name);
        }
        Command::AddFaculty { name, abbr } => next.faculty.push(FacultyMember::new(name, abbr)),
        Command::RenameFaculty { index, name, abbr } => {
            check_index(&next.faculty, index, "faculty member")?;
            next.faculty[index].name = name;
            next.faculty[index].abbr = abbr;
        }
        Command::RemoveFaculty { index } => {
            check_index(&next.faculty, index, "faculty member")?;
            next.faculty.remove(index);
        }
        Command::AddAssignment {
            faculty,
            assignment,
        } => {
            check_index(&next.faculty, faculty, "faculty member")?;
            let row = next.faculty[faculty].assignments.len();
            claim_row(&mut next, OwnerRef { faculty, row }, assignment, limits)?;
        }
        Command::UpdateAssignment {
            faculty,
            row,
            assignment,
        } => {
            check_index(&next.faculty, faculty, "faculty member")?;
            check_index(&next.faculty[faculty].assignments, row, "assignment")?;
            claim_row(&mut next, OwnerRef { faculty, row }, assignment, limits)?;
        }
        Command::RemoveAssignment { faculty, row } => {
            check_index(&next.faculty, faculty, "faculty member")?;
            check_index(&next.faculty[faculty].assignments, row, "assignment")?;
            next.faculty[faculty].assignments.remove(row);
        }
        Command::AddTheoryRoom { room } => {
            let index = next.theory_rooms.len();
            claim_theory_room(&mut next, index, room, limits)?;
        }
        Command::UpdateTheoryRoom { index, room } => {
            check_index(&next.theory_rooms, index, "theory room")?;
            claim_theory_room(&mut next, index, room, limits)?;
        }
        Command::RemoveTheoryRoom { index } => {
            check_index(&next.theory_rooms, index, "theory room")?;
            next.theory_rooms.remove(index);
        }
        Command::AddLabRoom { room } => {
            let index = next.lab_rooms.len();
            claim_lab_room(&mut next, index, room, limits)?;
        }
        Command::UpdateLabRoom { index, room } => {
            check_index(&next.lab_rooms, index, "lab room")?;
            claim_lab_room(&mut next, index, room, limits)?;
        }
        Command::RemoveLabRoom { index } => {
            check_index(&next.lab_rooms, index, "lab room")?;
            next.lab_rooms.remove(index);
        }
    }
    Ok(next)
}

/// Puts `assignment` at `owner`, refusing slots owned by another row.
fn claim_row(
    state: &mut EditorState,
    owner: OwnerRef,
    assignment: FacultyAssignment,
    limits: &Limits,
) -> Result<(), EditError> {
    let registry = AssignmentRegistry::rebuild(&state.faculty);
    if let Some(key) = assignment
        .slot_keys()
        .into_iter()
        .find(|key| registry.is_taken_by_other(key, Some(owner)))
    {
        return Err(EditError::SlotTaken(key));
    }

    let member = &mut state.faculty[owner.faculty];
    if owner.row == member.assignments.len() {
        member.assignments.push(assignment);
    } else {
        member.assignments[owner.row] = assignment;
    }
    if member.distinct_subjects().len() > limits.max_subjects_per_faculty {
        return Err(EditError::TooManySubjects {
            faculty: member.name.clone(),
            limit: limits.max_subjects_per_faculty,
        });
    }
    Ok(())
}

fn claim_theory_room(
    state: &mut EditorState,
    index: usize,
    room: TheoryRoomAssignment,
    limits: &Limits,
) -> Result<(), EditError> {
    if room.sections.len() > limits.max_sections_per_theory_room {
        return Err(EditError::RoomFull {
            room: room.room_name,
            what: "sections",
            limit: limits.max_sections_per_theory_room,
        });
    }
    let registry = TheoryRoomRegistry::rebuild(&state.theory_rooms);
    let mut seen = HashSet::new();
    for section in &room.sections {
        if !seen.insert(section) || registry.is_taken_by_other(section, Some(index)) {
            return Err(EditError::SectionTaken(section.clone()));
        }
    }

    if index == state.theory_rooms.len() {
        state.theory_rooms.push(room);
    } else {
        state.theory_rooms[index] = room;
    }
    Ok(())
}

fn claim_lab_room(
    state: &mut EditorState,
    index: usize,
    room: LabRoomAssignment,
    limits: &Limits,
) -> Result<(), EditError> {
    if room.claim_count() > limits.max_claims_per_lab_room {
        return Err(EditError::RoomFull {
            room: room.room_name,
            what: "lab slots",
            limit: limits.max_claims_per_lab_room,
        });
    }
    let registry = LabRoomRegistry::rebuild(&state.lab_rooms);
    let mut seen = HashSet::new();
    for claim in &room.assignments {
        for section in &claim.sections {
            let key = SlotKey::new(claim.subject_name.as_str(), section.as_str(), Mode::Lab);
            let elsewhere = registry.owner(&key).is_some_and(|owner| owner.room != index);
            if elsewhere || !seen.insert(key.clone()) {
                return Err(EditError::SlotTaken(key));
            }
        }
    }

    if index == state.lab_rooms.len() {
        state.lab_rooms.push(room);
    } else {
        state.lab_rooms[index] = room;
    }
    Ok(())
}

/// Drops every reference to sections beyond the current count.
fn prune_sections(state: &mut EditorState) {
    let sections = state.sections();
    let exists = |name: &str| sections.iter().any(|s| s == name);

    for member in &mut state.faculty {
        member
            .assignments
            .retain(|row| row.section_name().is_none_or(|s| exists(s)));
    }
    for room in &mut state.theory_rooms {
        room.sections.retain(|s| exists(s));
    }
    for room in &mut state.lab_rooms {
        for claim in &mut room.assignments {
            claim.sections.retain(|s| exists(s));
        }
        room.assignments.retain(|claim| !claim.sections.is_empty());
    }
}

fn rename_subject(state: &mut EditorState, from: &str, to: &str) {
    for row in state.faculty.iter_mut().flat_map(|f| f.assignments.iter_mut()) {
        if row.subject.as_deref() == Some(from) {
            row.subject = Some(to.to_string());
        }
    }
    for claim in state.lab_rooms.iter_mut().flat_map(|r| r.assignments.iter_mut()) {
        if claim.subject_name == from {
            claim.subject_name = to.to_string();
        }
    }
}

fn forget_subject(state: &mut EditorState, name: &str) {
    for member in &mut state.faculty {
        member
            .assignments
            .retain(|row| row.subject.as_deref() != Some(name));
    }
    for room in &mut state.lab_rooms {
        room.assignments.retain(|claim| claim.subject_name != name);
    }
}

/// Slots the given row may still pick: required and not owned by another row.
pub fn offerable_slots(state: &EditorState, owner: OwnerRef) -> Vec<SlotKey> {
    let registry = AssignmentRegistry::rebuild(&state.faculty);
    required_slots(&state.subjects, &state.sections())
        .into_iter()
        .filter(|key| !registry.is_taken_by_other(key, Some(owner)))
        .collect()
}

/// Which registries fully cover the required slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageStatus {
    pub required_slots: usize,
    pub faculty_claimed: usize,
    pub faculty_complete: bool,
    pub theory_rooms_complete: bool,
    pub lab_rooms_complete: bool,
    pub conflicts: usize,
}

impl CoverageStatus {
    pub fn of(state: &EditorState) -> Self {
        let required = required_slots(&state.subjects, &state.sections());
        let faculty = AssignmentRegistry::rebuild(&state.faculty);
        let theory_rooms = TheoryRoomRegistry::rebuild(&state.theory_rooms);
        let lab_rooms = LabRoomRegistry::rebuild(&state.lab_rooms);

        Self {
            required_slots: required.len(),
            faculty_claimed: faculty.claimed().len(),
            faculty_complete: is_fully_covered(&required, &faculty.claimed()),
            theory_rooms_complete: is_fully_covered(
                &required_in_mode(&required, Mode::Theory),
                &theory_rooms.theory_slots(&state.subjects),
            ),
            lab_rooms_complete: is_fully_covered(
                &required_in_mode(&required, Mode::Lab),
                &lab_rooms.claimed(),
            ),
            conflicts: faculty.conflicts().len()
                + theory_rooms.conflicts().len()
                + lab_rooms.conflicts().len(),
        }
    }

    /// More faculty rows are only useful while some slot has no faculty owner.
    pub fn can_add_faculty(&self) -> bool {
        !self.faculty_complete
    }

    pub fn can_add_rooms(&self) -> bool {
        !(self.theory_rooms_complete && self.lab_rooms_complete)
    }
}

/// A snapshot plus the affordances derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorView {
    pub state: EditorState,
    pub coverage: CoverageStatus,
    pub can_undo: bool,
    pub can_redo: bool,
}

/// Undo/redo over whole snapshots.
#[derive(Debug, Clone, Default)]
pub struct History {
    past: Vec<EditorState>,
    present: EditorState,
    future: Vec<EditorState>,
}

impl History {
    pub fn new(present: EditorState) -> Self {
        Self {
            past: Vec::new(),
            present,
            future: Vec::new(),
        }
    }

    pub fn present(&self) -> &EditorState {
        &self.present
    }

    /// Applies a command; a rejected command leaves the history untouched.
    pub fn apply(&mut self, command: Command, limits: &Limits) -> Result<&EditorState, EditError> {
        let next = apply(&self.present, command, limits)?;
        self.past.push(std::mem::replace(&mut self.present, next));
        if self.past.len() > HISTORY_DEPTH {
            self.past.remove(0);
        }
        self.future.clear();
        Ok(&self.present)
    }

    /// No edits have been made since the last reset.
    pub fn is_pristine(&self) -> bool {
        self.past.is_empty() && self.future.is_empty()
    }

    /// Replaces the present wholesale, e.g. when a draft is resumed.
    pub fn reset(&mut self, present: EditorState) {
        *self = Self::new(present);
    }

    pub fn undo(&mut self) -> Result<&EditorState, EditError> {
        let previous = self.past.pop().ok_or(EditError::EmptyHistory("undo"))?;
        self.future.push(std::mem::replace(&mut self.present, previous));
        Ok(&self.present)
    }

    pub fn redo(&mut self) -> Result<&EditorState, EditError> {
        let next = self.future.pop().ok_or(EditError::EmptyHistory("redo"))?;
        self.past.push(std::mem::replace(&mut self.present, next));
        Ok(&self.present)
    }

    pub fn view(&self) -> EditorView {
        EditorView {
            state: self.present.clone(),
            coverage: CoverageStatus::of(&self.present),
            can_undo: !self.past.is_empty(),
            can_redo: !self.future.is_empty(),
        }
    }
}
