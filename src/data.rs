use crate::slots::{Mode, SlotKey};
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The generator always schedules Monday to Friday.
pub const WORKING_DAYS: u32 = 5;

pub const DEFAULT_PERIODS_PER_DAY: u32 = 8;
pub const DEFAULT_BREAK_PERIOD: u32 = 4;

/// Section letters `A..` for the given section count.
pub fn section_names(count: u32) -> Vec<String> {
    (b'A'..=b'Z')
        .take(count as usize)
        .map(|letter| char::from(letter).to_string())
        .collect()
}

/// Form fields arrive either as JSON numbers or as the text typed into them.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(u64),
    Text(String),
}

fn lenient_number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    use serde::de::Error;

    let raw = match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => n,
        NumberOrText::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                0
            } else {
                trimmed
                    .parse::<u64>()
                    .map_err(|_| D::Error::custom(format!("expected a number, found {text:?}")))?
            }
        }
    };
    T::try_from(raw).map_err(|_| D::Error::custom(format!("{raw} is out of range")))
}

/// A subject taught to every section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Subject {
    pub name: String,
    /// The generator echoes subjects back without their code.
    #[serde(default)]
    pub code: String,
    /// Theory classes per week.
    #[serde(deserialize_with = "lenient_number")]
    pub credit: u8,
    /// Two-period lab blocks per week.
    #[serde(default, deserialize_with = "lenient_number")]
    pub lab: u8,
}

impl Subject {
    pub fn new(name: impl Into<String>, code: impl Into<String>, credit: u8, lab: u8) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            credit,
            lab,
        }
    }

    pub fn offers(&self, mode: Mode) -> bool {
        match mode {
            Mode::Theory => self.credit > 0,
            Mode::Lab => self.lab > 0,
        }
    }
}

/// One editable row of a faculty member's teaching load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FacultyAssignment {
    pub subject: Option<String>,
    pub section: Option<String>,
    pub teaches_theory: bool,
    pub teaches_lab: bool,
}

impl FacultyAssignment {
    pub fn new(subject: &str, section: &str, teaches_theory: bool, teaches_lab: bool) -> Self {
        Self {
            subject: Some(subject.to_string()),
            section: Some(section.to_string()),
            teaches_theory,
            teaches_lab,
        }
    }

    pub fn subject_name(&self) -> Option<&str> {
        self.subject.as_deref().filter(|s| !s.trim().is_empty())
    }

    pub fn section_name(&self) -> Option<&str> {
        self.section.as_deref().filter(|s| !s.trim().is_empty())
    }

    pub fn modes(&self) -> impl Iterator<Item = Mode> {
        [
            (self.teaches_theory, Mode::Theory),
            (self.teaches_lab, Mode::Lab),
        ]
        .into_iter()
        .filter_map(|(flag, mode)| flag.then_some(mode))
    }

    /// Slots this row claims; empty until both subject and section are set.
    pub fn slot_keys(&self) -> Vec<SlotKey> {
        match (self.subject_name(), self.section_name()) {
            (Some(subject), Some(section)) => self
                .modes()
                .map(|mode| SlotKey::new(subject, section, mode))
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacultyMember {
    pub name: String,
    pub abbr: String,
    #[serde(default)]
    pub assignments: Vec<FacultyAssignment>,
}

impl FacultyMember {
    pub fn new(name: impl Into<String>, abbr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            abbr: abbr.into(),
            assignments: Vec::new(),
        }
    }

    pub fn with_assignment(mut self, assignment: FacultyAssignment) -> Self {
        self.assignments.push(assignment);
        self
    }

    /// Distinct subjects referenced by this member's rows, in encounter order.
    pub fn distinct_subjects(&self) -> Vec<&str> {
        use itertools::Itertools;

        self.assignments
            .iter()
            .filter_map(FacultyAssignment::subject_name)
            .unique_by(|name| name.to_lowercase())
            .collect()
    }
}

/// A theory room claims whole sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TheoryRoomAssignment {
    pub room_name: String,
    #[serde(default)]
    pub sections: Vec<String>,
}

impl TheoryRoomAssignment {
    pub fn new(room_name: &str, sections: &[&str]) -> Self {
        Self {
            room_name: room_name.to_string(),
            sections: sections.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A lab room's claim on one subject across some sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabClaim {
    #[serde(default)]
    pub subject_name: String,
    #[serde(default)]
    pub sections: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabRoomAssignment {
    pub room_name: String,
    #[serde(default)]
    pub assignments: Vec<LabClaim>,
}

impl LabRoomAssignment {
    pub fn new(room_name: &str) -> Self {
        Self {
            room_name: room_name.to_string(),
            assignments: Vec::new(),
        }
    }

    pub fn with_claim(mut self, subject_name: &str, sections: &[&str]) -> Self {
        self.assignments.push(LabClaim {
            subject_name: subject_name.to_string(),
            sections: sections.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// Number of (subject, section) pairs hosted by this room.
    pub fn claim_count(&self) -> usize {
        self.assignments.iter().map(|c| c.sections.len()).sum()
    }
}

fn default_sections_count() -> u32 {
    1
}

fn default_periods_per_day() -> u32 {
    DEFAULT_PERIODS_PER_DAY
}

fn default_break_period() -> u32 {
    DEFAULT_BREAK_PERIOD
}

/// Everything the operator has entered so far.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorState {
    #[serde(default = "default_sections_count", deserialize_with = "lenient_number")]
    pub sections_count: u32,
    #[serde(default = "default_periods_per_day", deserialize_with = "lenient_number")]
    pub periods_per_day: u32,
    #[serde(default = "default_break_period", deserialize_with = "lenient_number")]
    pub break_period: u32,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub faculty: Vec<FacultyMember>,
    #[serde(default)]
    pub theory_rooms: Vec<TheoryRoomAssignment>,
    #[serde(default)]
    pub lab_rooms: Vec<LabRoomAssignment>,
}

impl Default for EditorState {
    fn default() -> Self {
        Self {
            sections_count: default_sections_count(),
            periods_per_day: DEFAULT_PERIODS_PER_DAY,
            break_period: DEFAULT_BREAK_PERIOD,
            subjects: Vec::new(),
            faculty: Vec::new(),
            theory_rooms: Vec::new(),
            lab_rooms: Vec::new(),
        }
    }
}

impl EditorState {
    pub fn sections(&self) -> Vec<String> {
        section_names(self.sections_count)
    }

    pub fn subject(&self, name: &str) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.name == name)
    }
}

/// One (subject, section, room) booking as the generator expects it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomBooking {
    pub subject_name: String,
    pub section_name: String,
    pub room_name: String,
}

/// A faculty member's rows grouped by subject and teaching modes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeachingGroup {
    pub subject_name: String,
    pub teaches_theory: bool,
    pub teaches_lab: bool,
    pub sections: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacultyEntry {
    pub name: String,
    pub abbr: String,
    pub assignments: Vec<TeachingGroup>,
}

/// The complete input sent to the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableRequest {
    pub sections_count: u32,
    pub theory_rooms: Vec<String>,
    pub lab_rooms: Vec<String>,
    pub theory_room_assignments: Vec<RoomBooking>,
    pub lab_room_assignments: Vec<RoomBooking>,
    pub subjects_per_section: u32,
    pub subjects: Vec<Subject>,
    pub faculty: Vec<FacultyEntry>,
    pub periods_per_day: u32,
    pub break_period: u32,
    pub working_days: u32,
}

/// Faculty as the generator reports it: a bare name or a name with abbreviation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FacultyRef {
    Named {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        abbr: Option<String>,
    },
    Plain(String),
}

impl FacultyRef {
    pub fn name(&self) -> &str {
        match self {
            Self::Named { name, .. } => name,
            Self::Plain(name) => name,
        }
    }

    /// The abbreviation when one is known, otherwise the full name.
    pub fn label(&self) -> &str {
        match self {
            Self::Named {
                abbr: Some(abbr), ..
            } if !abbr.trim().is_empty() => abbr.as_str(),
            other => other.name(),
        }
    }
}

impl fmt::Display for FacultyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Position of a cell inside a two-period lab block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabNote {
    Start,
    Continuation,
}

impl LabNote {
    /// Accepts `"lab start"` and `"lab cont"`, with or without a trailing dot.
    pub fn parse(note: &str) -> Option<Self> {
        let normalized = note.trim().trim_end_matches('.').to_lowercase();
        match normalized.as_str() {
            "lab start" => Some(Self::Start),
            "lab cont" => Some(Self::Continuation),
            _ => None,
        }
    }
}

/// An occupied period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCell {
    pub subject: String,
    pub room: Option<String>,
    pub faculty: Option<FacultyRef>,
    pub is_lab: bool,
    pub note: Option<String>,
    pub section: Option<String>,
}

impl ClassCell {
    pub fn lab_note(&self) -> Option<LabNote> {
        self.note.as_deref().and_then(LabNote::parse)
    }
}

/// Wire shape of a period cell; `null` becomes `None`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct RawCell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    faculty: Option<FacultyRef>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    is_lab: bool,
    #[serde(default, rename = "break", skip_serializing_if = "std::ops::Not::not")]
    is_break: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

/// One period of one day for one section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "Option<RawCell>", into = "Option<RawCell>")]
pub enum Period {
    Empty,
    Break,
    Class(ClassCell),
}

impl From<Option<RawCell>> for Period {
    fn from(raw: Option<RawCell>) -> Self {
        match raw {
            None => Self::Empty,
            Some(cell) if cell.is_break => Self::Break,
            Some(RawCell {
                subject: Some(subject),
                section,
                room,
                faculty,
                is_lab,
                note,
                ..
            }) => Self::Class(ClassCell {
                subject,
                room,
                faculty,
                is_lab,
                note,
                section,
            }),
            Some(cell) => {
                warn!("Dropping a period cell without a subject: {cell:?}");
                Self::Empty
            }
        }
    }
}

impl From<Period> for Option<RawCell> {
    fn from(period: Period) -> Self {
        match period {
            Period::Empty => None,
            Period::Break => Some(RawCell {
                is_break: true,
                ..RawCell::default()
            }),
            Period::Class(cell) => Some(RawCell {
                section: cell.section,
                subject: Some(cell.subject),
                room: cell.room,
                faculty: cell.faculty,
                is_lab: cell.is_lab,
                is_break: false,
                note: cell.note,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DaySchedule {
    pub day: String,
    pub periods: Vec<Period>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SectionSchedule {
    #[serde(default)]
    pub days: Vec<DaySchedule>,
}

/// The generator's answer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedTimetable {
    #[serde(default)]
    pub sections: Vec<String>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub faculty: Vec<FacultyRef>,
    #[serde(default = "default_break_period")]
    pub break_period: u32,
    #[serde(default = "default_periods_per_day")]
    pub periods_per_day: u32,
    #[serde(default)]
    pub theory_rooms: Vec<String>,
    #[serde(default)]
    pub lab_rooms: Vec<String>,
    pub schedules: BTreeMap<String, SectionSchedule>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn section_names_are_letters() {
        assert_eq!(section_names(3), vec!["A", "B", "C"]);
        assert!(section_names(0).is_empty());
    }

    #[test]
    fn subject_numbers_accept_form_text() {
        let subject: Subject =
            serde_json::from_value(json!({"name": "Math", "code": "MTH", "credit": "3", "lab": ""}))
                .unwrap();
        assert_eq!(subject.credit, 3);
        assert_eq!(subject.lab, 0);

        let bad = serde_json::from_value::<Subject>(
            json!({"name": "Math", "code": "MTH", "credit": "three"}),
        );
        assert!(bad.is_err());
    }

    #[test]
    fn assignment_without_section_claims_nothing() {
        let row = FacultyAssignment {
            subject: Some("Math".into()),
            section: Some("  ".into()),
            teaches_theory: true,
            teaches_lab: false,
        };
        assert!(row.slot_keys().is_empty());

        let row = FacultyAssignment::new("Math", "A", true, true);
        assert_eq!(
            row.slot_keys(),
            vec![
                SlotKey::new("Math", "A", Mode::Theory),
                SlotKey::new("Math", "A", Mode::Lab)
            ]
        );
    }

    #[test]
    fn distinct_subjects_ignore_case() {
        let member = FacultyMember::new("Ada", "AL")
            .with_assignment(FacultyAssignment::new("Math", "A", true, false))
            .with_assignment(FacultyAssignment::new("math", "B", true, false))
            .with_assignment(FacultyAssignment::new("Physics", "A", false, true));
        assert_eq!(member.distinct_subjects(), vec!["Math", "Physics"]);
    }

    #[test]
    fn period_cells_decode_all_shapes() {
        let periods: Vec<Period> = serde_json::from_value(json!([
            null,
            {"break": true},
            {"subject": "Math", "room": "R1", "faculty": "Ada", "isLab": false},
            {"subject": "Chem", "room": "L1", "faculty": {"name": "Curie", "abbr": "MC"},
             "isLab": true, "note": "lab cont."}
        ]))
        .unwrap();

        assert_eq!(periods[0], Period::Empty);
        assert_eq!(periods[1], Period::Break);
        let Period::Class(theory) = &periods[2] else {
            panic!("expected a class cell");
        };
        assert_eq!(theory.faculty.as_ref().map(FacultyRef::label), Some("Ada"));
        let Period::Class(lab) = &periods[3] else {
            panic!("expected a class cell");
        };
        assert_eq!(lab.lab_note(), Some(LabNote::Continuation));
        assert_eq!(lab.faculty.as_ref().map(FacultyRef::label), Some("MC"));
    }

    #[test]
    fn cell_without_subject_is_empty() {
        let period: Period =
            serde_json::from_value(json!({"room": "R1", "isLab": false})).unwrap();
        assert_eq!(period, Period::Empty);
    }

    #[test]
    fn echoed_subjects_need_no_code() {
        let subject: Subject =
            serde_json::from_value(json!({"name": "Math", "credit": 3, "lab": 0})).unwrap();
        assert_eq!(subject, Subject::new("Math", "", 3, 0));
    }

    #[test]
    fn period_cells_serialize_back_to_wire_shape() {
        let value = serde_json::to_value(vec![Period::Empty, Period::Break]).unwrap();
        assert_eq!(value, json!([null, {"break": true}]));
    }

    #[test]
    fn lab_notes_parse_loosely() {
        assert_eq!(LabNote::parse("lab start"), Some(LabNote::Start));
        assert_eq!(LabNote::parse("Lab Cont"), Some(LabNote::Continuation));
        assert_eq!(LabNote::parse("lab cont."), Some(LabNote::Continuation));
        assert_eq!(LabNote::parse("remedial"), None);
    }
}
