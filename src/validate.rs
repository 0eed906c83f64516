//! Whole-configuration checks run right before the payload is built.
//!
//! Checks run in a fixed order and stop at the first failure. Coverage
//! checks are the exception: every gap they find is reported at once.

use crate::config::Limits;
use crate::data::EditorState;
use crate::error::{CoverageGap, OwnerKind, ValidationError};
use crate::slots::{
    AssignmentRegistry, LabRoomRegistry, Mode, TheoryRoomRegistry, missing_slots,
    required_in_mode, required_slots,
};
use log::{debug, warn};
use std::collections::HashSet;

type Check = fn(&EditorState, &Limits) -> Result<(), ValidationError>;

const CHECKS: [(&str, Check); 7] = [
    ("cardinalities", check_cardinalities),
    ("room coverage", check_room_coverage),
    ("room names", check_room_names),
    ("subjects", check_subjects),
    ("faculty", check_faculty),
    ("assignment rows", check_assignment_rows),
    ("faculty coverage", check_faculty_coverage),
];

pub fn validate(state: &EditorState, limits: &Limits) -> Result<(), ValidationError> {
    for (name, check) in CHECKS {
        if let Err(err) = check(state, limits) {
            warn!("Validation failed at {name}: {err}");
            return Err(err);
        }
        debug!("Validation check passed: {name}");
    }
    Ok(())
}

fn structural(message: impl Into<String>) -> Result<(), ValidationError> {
    Err(ValidationError::Structural(message.into()))
}

/// First name that repeats, ignoring case and surrounding whitespace.
fn first_duplicate<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .find(|name| !seen.insert(name.trim().to_lowercase()))
}

fn check_cardinalities(state: &EditorState, limits: &Limits) -> Result<(), ValidationError> {
    let sections = state.sections_count;
    if !(limits.min_sections..=limits.max_sections).contains(&sections) {
        return structural(format!(
            "Number of sections must be between {} and {}.",
            limits.min_sections, limits.max_sections
        ));
    }
    let subjects = state.subjects.len();
    if !(limits.min_subjects..=limits.max_subjects).contains(&subjects) {
        return structural(format!(
            "Number of subjects must be between {} and {}.",
            limits.min_subjects, limits.max_subjects
        ));
    }
    let max_periods = limits.max_periods_per_day(sections);
    if !(limits.min_periods_per_day..=max_periods).contains(&state.periods_per_day) {
        return structural(format!(
            "Periods per day must be between {} and {max_periods} for {sections} sections.",
            limits.min_periods_per_day
        ));
    }
    if !(1..=state.periods_per_day).contains(&state.break_period) {
        return structural(format!(
            "Break period must be between 1 and {}.",
            state.periods_per_day
        ));
    }
    Ok(())
}

/// Room claims must name real sections and lab subjects, stay within room
/// capacity and never hand one slot to two rooms.
fn check_room_claims(state: &EditorState, limits: &Limits) -> Result<(), ValidationError> {
    let sections = state.sections();
    let unknown_section = |names: &[String]| names.iter().find(|s| !sections.contains(s)).cloned();

    for room in &state.theory_rooms {
        let name = room.room_name.trim();
        if room.sections.len() > limits.max_sections_per_theory_room {
            return structural(format!(
                "Theory room {name} may hold at most {} sections.",
                limits.max_sections_per_theory_room
            ));
        }
        if let Some(section) = unknown_section(&room.sections) {
            return structural(format!(
                "Theory room {name} is assigned to unknown section {section}."
            ));
        }
        if let Some(section) = first_duplicate(room.sections.iter().map(String::as_str)) {
            return structural(format!(
                "Theory room {name} lists section {section} more than once."
            ));
        }
    }
    let theory = TheoryRoomRegistry::rebuild(&state.theory_rooms);
    if let Some((section, room)) = theory.conflicts().first() {
        return structural(format!(
            "Section {section} is assigned to more than one theory room, including {}.",
            state.theory_rooms[*room].room_name.trim()
        ));
    }

    for room in &state.lab_rooms {
        let name = room.room_name.trim();
        if room.claim_count() > limits.max_claims_per_lab_room {
            return structural(format!(
                "Lab room {name} may hold at most {} subject and section pairs.",
                limits.max_claims_per_lab_room
            ));
        }
        for claim in &room.assignments {
            let subject_name = claim.subject_name.trim();
            let Some(subject) = state.subject(subject_name) else {
                return structural(format!(
                    "Lab room {name} is assigned to unknown subject \"{subject_name}\"."
                ));
            };
            if !subject.offers(Mode::Lab) {
                return structural(format!(
                    "Lab room {name} is assigned {subject_name}, which has no lab."
                ));
            }
            if let Some(section) = unknown_section(&claim.sections) {
                return structural(format!(
                    "Lab room {name} is assigned {subject_name} for unknown section {section}."
                ));
            }
            if let Some(section) = first_duplicate(claim.sections.iter().map(String::as_str)) {
                return structural(format!(
                    "Lab room {name} lists {subject_name} for section {section} more than once."
                ));
            }
        }
    }
    let labs = LabRoomRegistry::rebuild(&state.lab_rooms);
    if let Some((slot, claim)) = labs.conflicts().first() {
        return structural(format!(
            "{slot} is claimed more than once, including by lab room {}.",
            state.lab_rooms[claim.room].room_name.trim()
        ));
    }
    Ok(())
}

fn check_room_coverage(state: &EditorState, limits: &Limits) -> Result<(), ValidationError> {
    check_room_claims(state, limits)?;
    let required = required_slots(&state.subjects, &state.sections());

    let theory_claimed =
        TheoryRoomRegistry::rebuild(&state.theory_rooms).theory_slots(&state.subjects);
    let lab_claimed = LabRoomRegistry::rebuild(&state.lab_rooms).claimed();

    let theory_gaps = missing_slots(&required_in_mode(&required, Mode::Theory), &theory_claimed);
    let lab_gaps = missing_slots(&required_in_mode(&required, Mode::Lab), &lab_claimed);
    let gaps: Vec<CoverageGap> = theory_gaps
        .into_iter()
        .chain(lab_gaps)
        .map(|slot| CoverageGap {
            slot,
            missing: OwnerKind::Room,
        })
        .collect();

    if gaps.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Coverage(gaps))
    }
}

fn check_room_names(state: &EditorState, _: &Limits) -> Result<(), ValidationError> {
    let names: Vec<&str> = state
        .theory_rooms
        .iter()
        .map(|r| r.room_name.as_str())
        .chain(state.lab_rooms.iter().map(|r| r.room_name.as_str()))
        .collect();

    if names.iter().any(|n| n.trim().is_empty()) {
        return structural("Every theory and lab room needs a name.");
    }
    if let Some(name) = first_duplicate(names) {
        return structural(format!(
            "Room name \"{}\" is used more than once across theory and lab rooms.",
            name.trim()
        ));
    }
    Ok(())
}

fn check_subjects(state: &EditorState, limits: &Limits) -> Result<(), ValidationError> {
    if state.subjects.iter().any(|s| s.name.trim().is_empty()) {
        return structural("Every subject needs a name.");
    }
    if let Some(name) = first_duplicate(state.subjects.iter().map(|s| s.name.as_str())) {
        return structural(format!("Subject name \"{}\" is used more than once.", name.trim()));
    }
    if let Some(code) = first_duplicate(state.subjects.iter().map(|s| s.code.as_str())) {
        return structural(format!("Subject code \"{}\" is used more than once.", code.trim()));
    }
    for subject in &state.subjects {
        let code_len = subject.code.trim().chars().count();
        if !(1..=limits.max_code_len).contains(&code_len) {
            return structural(format!(
                "Subject code for {} must be 1 to {} characters.",
                subject.name, limits.max_code_len
            ));
        }
        if subject.credit > limits.max_credit {
            return structural(format!(
                "Credit for {} must be between 0 and {}.",
                subject.name, limits.max_credit
            ));
        }
        if subject.lab > limits.max_lab {
            return structural(format!(
                "Lab count for {} must be between 0 and {}.",
                subject.name, limits.max_lab
            ));
        }
        if subject.credit == 0 && subject.lab == 0 {
            return structural(format!(
                "{} needs at least one theory credit or lab.",
                subject.name
            ));
        }
    }
    Ok(())
}

fn check_faculty(state: &EditorState, limits: &Limits) -> Result<(), ValidationError> {
    for member in &state.faculty {
        if member.name.trim().is_empty() || member.abbr.trim().is_empty() {
            return structural("Every faculty member needs a name and an abbreviation.");
        }
    }
    if let Some(name) = first_duplicate(state.faculty.iter().map(|f| f.name.as_str())) {
        return structural(format!("Faculty name \"{}\" is used more than once.", name.trim()));
    }
    if let Some(abbr) = first_duplicate(state.faculty.iter().map(|f| f.abbr.as_str())) {
        return structural(format!(
            "Faculty abbreviation \"{}\" is used more than once.",
            abbr.trim()
        ));
    }
    for member in &state.faculty {
        if member.distinct_subjects().len() > limits.max_subjects_per_faculty {
            return structural(format!(
                "{} may teach at most {} distinct subjects.",
                member.name, limits.max_subjects_per_faculty
            ));
        }
    }
    Ok(())
}

fn check_assignment_rows(state: &EditorState, _: &Limits) -> Result<(), ValidationError> {
    let sections = state.sections();
    for member in &state.faculty {
        for row in &member.assignments {
            let (Some(subject_name), Some(section)) = (row.subject_name(), row.section_name())
            else {
                return structural(format!(
                    "Every assignment for {} needs a subject and a section.",
                    member.name
                ));
            };
            if !row.teaches_theory && !row.teaches_lab {
                return structural(format!(
                    "{} must teach theory, lab or both for {subject_name} in section {section}.",
                    member.name
                ));
            }
            let Some(subject) = state.subject(subject_name) else {
                return structural(format!(
                    "{} is assigned to unknown subject {subject_name}.",
                    member.name
                ));
            };
            if !sections.iter().any(|s| s == section) {
                return structural(format!(
                    "{} is assigned to unknown section {section}.",
                    member.name
                ));
            }
            if let Some(mode) = row.modes().find(|mode| !subject.offers(*mode)) {
                return structural(format!(
                    "{} is assigned {subject_name} {mode}, which the subject does not offer.",
                    member.name
                ));
            }
        }
    }
    Ok(())
}

fn check_faculty_coverage(state: &EditorState, _: &Limits) -> Result<(), ValidationError> {
    let registry = AssignmentRegistry::rebuild(&state.faculty);
    if let Some((slot, claimant)) = registry.conflicts().first() {
        let holder = registry
            .owner(slot)
            .map_or("another row", |owner| state.faculty[owner.faculty].name.as_str());
        return structural(format!(
            "{slot} is assigned more than once, to {holder} and {}.",
            state.faculty[claimant.faculty].name
        ));
    }

    let required = required_slots(&state.subjects, &state.sections());
    let claimed = registry.claimed();

    let gaps: Vec<CoverageGap> = missing_slots(&required, &claimed)
        .into_iter()
        .map(|slot| CoverageGap {
            slot,
            missing: OwnerKind::Faculty,
        })
        .collect();

    if gaps.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Coverage(gaps))
    }
}
