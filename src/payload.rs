//! Normalizes a validated editor state into the generator's request format.

use crate::data::{
    EditorState, FacultyEntry, FacultyMember, RoomBooking, TeachingGroup, TimetableRequest,
    WORKING_DAYS,
};
use crate::slots::Mode;
use itertools::Itertools;
use log::debug;

/// Builds the request. Assumes `validate` already passed.
pub fn build_request(state: &EditorState) -> TimetableRequest {
    let theory_rooms = distinct_room_names(state.theory_rooms.iter().map(|r| r.room_name.as_str()));
    let lab_rooms = distinct_room_names(state.lab_rooms.iter().map(|r| r.room_name.as_str()));

    let theory_subjects: Vec<&str> = state
        .subjects
        .iter()
        .filter(|s| s.offers(Mode::Theory))
        .map(|s| s.name.as_str())
        .collect();

    let theory_room_assignments: Vec<RoomBooking> = state
        .theory_rooms
        .iter()
        .flat_map(|room| {
            room.sections.iter().cartesian_product(&theory_subjects).map(move |(section, subject)| {
                RoomBooking {
                    subject_name: subject.to_string(),
                    section_name: section.clone(),
                    room_name: room.room_name.trim().to_string(),
                }
            })
        })
        .collect();

    let lab_room_assignments: Vec<RoomBooking> = state
        .lab_rooms
        .iter()
        .flat_map(|room| {
            room.assignments.iter().flat_map(move |claim| {
                claim.sections.iter().map(move |section| RoomBooking {
                    subject_name: claim.subject_name.clone(),
                    section_name: section.clone(),
                    room_name: room.room_name.trim().to_string(),
                })
            })
        })
        .collect();

    let faculty: Vec<FacultyEntry> = state
        .faculty
        .iter()
        .filter_map(|member| {
            let assignments = group_assignments(member);
            (!assignments.is_empty()).then(|| FacultyEntry {
                name: member.name.trim().to_string(),
                abbr: member.abbr.trim().to_string(),
                assignments,
            })
        })
        .collect();

    debug!(
        "Built request: {} theory bookings, {} lab bookings, {} faculty",
        theory_room_assignments.len(),
        lab_room_assignments.len(),
        faculty.len()
    );

    TimetableRequest {
        sections_count: state.sections_count,
        theory_rooms,
        lab_rooms,
        theory_room_assignments,
        lab_room_assignments,
        subjects_per_section: state.subjects.len() as u32,
        subjects: state.subjects.clone(),
        faculty,
        periods_per_day: state.periods_per_day,
        break_period: state.break_period,
        working_days: WORKING_DAYS,
    }
}

fn distinct_room_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    names
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unique()
        .map(String::from)
        .collect()
}

/// Groups rows by (subject, theory, lab), collecting sections in encounter order.
/// Rows that claim nothing are dropped.
fn group_assignments(member: &FacultyMember) -> Vec<TeachingGroup> {
    let mut groups: Vec<TeachingGroup> = Vec::new();
    for row in &member.assignments {
        let (Some(subject), Some(section)) = (row.subject_name(), row.section_name()) else {
            continue;
        };
        if !row.teaches_theory && !row.teaches_lab {
            continue;
        }
        let existing = groups.iter_mut().find(|g| {
            g.subject_name == subject
                && g.teaches_theory == row.teaches_theory
                && g.teaches_lab == row.teaches_lab
        });
        match existing {
            Some(group) => group.sections.push(section.to_string()),
            None => groups.push(TeachingGroup {
                subject_name: subject.to_string(),
                teaches_theory: row.teaches_theory,
                teaches_lab: row.teaches_lab,
                sections: vec![section.to_string()],
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::data::{FacultyAssignment, FacultyMember, Subject, TheoryRoomAssignment};
    use crate::validate::{tests::complete_state, validate};
    use serde_json::json;

    #[test]
    fn single_math_section_yields_one_theory_booking() {
        let state = EditorState {
            sections_count: 1,
            periods_per_day: 6,
            break_period: 4,
            subjects: vec![Subject::new("Math", "MTH", 3, 0)],
            faculty: vec![
                FacultyMember::new("Ada Lovelace", "AL")
                    .with_assignment(FacultyAssignment::new("Math", "A", true, false)),
            ],
            theory_rooms: vec![TheoryRoomAssignment::new("R1", &["A"])],
            lab_rooms: vec![],
        };
        let limits = Limits {
            min_subjects: 1,
            ..Limits::default()
        };
        assert!(validate(&state, &limits).is_ok());

        let request = build_request(&state);
        assert_eq!(
            request.theory_room_assignments,
            vec![RoomBooking {
                subject_name: "Math".into(),
                section_name: "A".into(),
                room_name: "R1".into(),
            }]
        );
        assert!(request.lab_room_assignments.is_empty());
        assert_eq!(request.working_days, 5);
    }

    #[test]
    fn theory_room_claims_expand_per_subject() {
        let request = build_request(&complete_state());
        // 2 sections x 4 theory subjects
        assert_eq!(request.theory_room_assignments.len(), 8);
        // 2 lab subjects x 2 sections
        assert_eq!(request.lab_room_assignments.len(), 4);
        assert_eq!(request.theory_rooms, vec!["R101"]);
        assert_eq!(request.lab_rooms, vec!["LAB1"]);
        assert_eq!(request.subjects_per_section, 4);
    }

    #[test]
    fn rows_with_same_subject_and_modes_collapse() {
        let request = build_request(&complete_state());
        let physics = &request.faculty[1];
        assert_eq!(
            physics.assignments,
            vec![TeachingGroup {
                subject_name: "Physics".into(),
                teaches_theory: true,
                teaches_lab: true,
                sections: vec!["A".into(), "B".into()],
            }]
        );
    }

    #[test]
    fn different_modes_stay_separate_groups() {
        let member = FacultyMember::new("Marie Curie", "MC")
            .with_assignment(FacultyAssignment::new("Chemistry", "A", true, false))
            .with_assignment(FacultyAssignment::new("Chemistry", "B", false, true))
            .with_assignment(FacultyAssignment::new("Chemistry", "C", true, false));
        let groups = group_assignments(&member);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].sections, vec!["A", "C"]);
        assert_eq!(groups[1].sections, vec!["B"]);
    }

    #[test]
    fn empty_rows_and_idle_faculty_are_dropped() {
        let mut state = complete_state();
        state.faculty[0].assignments.push(FacultyAssignment::default());
        state.faculty[0]
            .assignments
            .push(FacultyAssignment::new("Math", "A", false, false));
        state.faculty.push(FacultyMember::new("Idle", "ID"));

        let request = build_request(&state);
        assert_eq!(request.faculty.len(), 4);
        assert_eq!(request.faculty[0].assignments.len(), 1);
    }

    #[test]
    fn room_names_are_trimmed_and_deduplicated() {
        let mut state = complete_state();
        state.theory_rooms = vec![
            TheoryRoomAssignment::new("R1 ", &["A"]),
            TheoryRoomAssignment::new("", &[]),
            TheoryRoomAssignment::new("R1", &["B"]),
        ];
        let request = build_request(&state);
        assert_eq!(request.theory_rooms, vec!["R1"]);
        assert!(request.theory_room_assignments.iter().all(|b| b.room_name == "R1"));
    }

    #[test]
    fn building_twice_is_identical() {
        let state = complete_state();
        assert_eq!(build_request(&state), build_request(&state));
    }

    #[test]
    fn request_serializes_with_camel_case_fields() {
        let request = build_request(&complete_state());
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["sectionsCount"], json!(2));
        assert_eq!(value["workingDays"], json!(5));
        assert_eq!(value["breakPeriod"], json!(4));
        assert_eq!(
            value["faculty"][0]["assignments"][0],
            json!({
                "subjectName": "Math",
                "teachesTheory": true,
                "teachesLab": false,
                "sections": ["A", "B"]
            })
        );
    }
}
