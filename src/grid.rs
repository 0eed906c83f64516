//! Interprets the generator's per-section grids for display.
//!
//! A lab block arrives as a `"lab start"` cell immediately followed by a
//! `"lab cont"` cell. The pair renders as one block two periods wide. A
//! half of a pair that has no partner next to it (split by the break or
//! the end of the day) is reported as a defect and rendered on its own.

use crate::data::{ClassCell, GeneratedTimetable, LabNote, Period, SectionSchedule, Subject};
use log::{info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BlockContent {
    Empty,
    Break,
    #[serde(rename_all = "camelCase")]
    Class {
        subject: String,
        room: Option<String>,
        faculty: Option<String>,
        is_lab: bool,
    },
}

impl From<&ClassCell> for BlockContent {
    fn from(cell: &ClassCell) -> Self {
        Self::Class {
            subject: cell.subject.clone(),
            room: cell.room.clone(),
            faculty: cell.faculty.as_ref().map(|f| f.label().to_string()),
            is_lab: cell.is_lab,
        }
    }
}

/// A rendered cell starting at `period` (1-indexed) and covering `span` periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedBlock {
    pub period: usize,
    pub span: usize,
    #[serde(flatten)]
    pub content: BlockContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedDay {
    pub day: String,
    pub blocks: Vec<RenderedBlock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DefectKind {
    /// A continuation with no matching start right before it.
    OrphanContinuation,
    /// A start with no matching continuation right after it.
    UnfinishedLab,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridDefect {
    pub section: String,
    pub day: String,
    pub period: usize,
    pub subject: String,
    pub kind: DefectKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedGrid {
    pub days: Vec<RenderedDay>,
    pub defects: Vec<GridDefect>,
}

fn continues(start: &ClassCell, next: Option<&Period>) -> bool {
    matches!(
        next,
        Some(Period::Class(cell))
            if cell.lab_note() == Some(LabNote::Continuation) && cell.subject == start.subject
    )
}

pub fn render_section(section: &str, schedule: &SectionSchedule) -> RenderedGrid {
    let mut defects = Vec::new();
    let mut days = Vec::with_capacity(schedule.days.len());

    for day in &schedule.days {
        let mut blocks = Vec::with_capacity(day.periods.len());
        let mut index = 0;
        while index < day.periods.len() {
            let period = index + 1;
            let mut span = 1;
            let content = match &day.periods[index] {
                Period::Empty => BlockContent::Empty,
                Period::Break => BlockContent::Break,
                Period::Class(cell) => {
                    let defect = match cell.lab_note() {
                        Some(LabNote::Start) if continues(cell, day.periods.get(index + 1)) => {
                            span = 2;
                            None
                        }
                        Some(LabNote::Start) => Some(DefectKind::UnfinishedLab),
                        Some(LabNote::Continuation) => Some(DefectKind::OrphanContinuation),
                        None => None,
                    };
                    if let Some(kind) = defect {
                        defects.push(GridDefect {
                            section: section.to_string(),
                            day: day.day.clone(),
                            period,
                            subject: cell.subject.clone(),
                            kind,
                        });
                    }
                    BlockContent::from(cell)
                }
            };
            blocks.push(RenderedBlock {
                period,
                span,
                content,
            });
            index += span;
        }
        days.push(RenderedDay {
            day: day.day.clone(),
            blocks,
        });
    }

    RenderedGrid { days, defects }
}

fn class_cells(schedule: &SectionSchedule) -> impl Iterator<Item = &ClassCell> {
    schedule
        .days
        .iter()
        .flat_map(|day| day.periods.iter())
        .filter_map(|period| match period {
            Period::Class(cell) => Some(cell),
            _ => None,
        })
}

fn is_lab_start(cell: &ClassCell) -> bool {
    cell.lab_note() == Some(LabNote::Start)
}

/// Scheduled against requested counts for one subject in one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectCoverage {
    pub subject: String,
    pub code: String,
    pub requested_theory: u8,
    pub scheduled_theory: usize,
    pub requested_lab: u8,
    pub scheduled_lab: usize,
    pub matches: bool,
}

pub fn subject_coverage(subjects: &[Subject], schedule: &SectionSchedule) -> Vec<SubjectCoverage> {
    subjects
        .iter()
        .map(|subject| {
            let (mut theory, mut lab) = (0, 0);
            for cell in class_cells(schedule).filter(|c| c.subject == subject.name) {
                if !cell.is_lab {
                    theory += 1;
                } else if is_lab_start(cell) {
                    lab += 1;
                }
            }
            SubjectCoverage {
                subject: subject.name.clone(),
                code: subject.code.clone(),
                requested_theory: subject.credit,
                scheduled_theory: theory,
                requested_lab: subject.lab,
                scheduled_lab: lab,
                matches: theory == usize::from(subject.credit) && lab == usize::from(subject.lab),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassLoad {
    pub theory_periods: usize,
    pub lab_blocks: usize,
}

/// Summary statistics across every section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub sections: usize,
    pub theory_classes: usize,
    pub lab_blocks: usize,
    pub free_periods: usize,
    pub theory_rooms_used: BTreeSet<String>,
    pub lab_rooms_used: BTreeSet<String>,
    pub faculty: BTreeSet<String>,
    pub room_usage: BTreeMap<String, ClassLoad>,
    pub faculty_load: BTreeMap<String, ClassLoad>,
}

pub fn dashboard(timetable: &GeneratedTimetable) -> Dashboard {
    let mut stats = Dashboard {
        sections: timetable.schedules.len(),
        ..Dashboard::default()
    };

    for schedule in timetable.schedules.values() {
        stats.free_periods += schedule
            .days
            .iter()
            .flat_map(|day| day.periods.iter())
            .filter(|p| matches!(p, Period::Empty))
            .count();

        for cell in class_cells(schedule) {
            let counted_as = if !cell.is_lab {
                stats.theory_classes += 1;
                Some(ClassLoad {
                    theory_periods: 1,
                    lab_blocks: 0,
                })
            } else if is_lab_start(cell) {
                stats.lab_blocks += 1;
                Some(ClassLoad {
                    theory_periods: 0,
                    lab_blocks: 1,
                })
            } else {
                None
            };

            if let Some(room) = cell.room.as_deref().filter(|r| !r.is_empty()) {
                let used = if cell.is_lab {
                    &mut stats.lab_rooms_used
                } else {
                    &mut stats.theory_rooms_used
                };
                used.insert(room.to_string());
                if let Some(load) = counted_as {
                    let usage = stats.room_usage.entry(room.to_string()).or_default();
                    usage.theory_periods += load.theory_periods;
                    usage.lab_blocks += load.lab_blocks;
                }
            }

            if let Some(faculty) = &cell.faculty {
                let label = faculty.label().to_string();
                stats.faculty.insert(label.clone());
                if let Some(load) = counted_as {
                    let entry = stats.faculty_load.entry(label).or_default();
                    entry.theory_periods += load.theory_periods;
                    entry.lab_blocks += load.lab_blocks;
                }
            }
        }
    }

    stats
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionView {
    pub section: String,
    pub grid: RenderedGrid,
    pub coverage: Vec<SubjectCoverage>,
}

/// Everything the display phase shows for one generated timetable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableView {
    pub break_period: u32,
    pub periods_per_day: u32,
    pub sections: Vec<SectionView>,
    pub dashboard: Dashboard,
}

pub fn interpret(timetable: &GeneratedTimetable) -> TimetableView {
    let order: Vec<&String> = if timetable.sections.is_empty() {
        timetable.schedules.keys().collect()
    } else {
        timetable.sections.iter().collect()
    };

    let sections: Vec<SectionView> = order
        .into_iter()
        .filter_map(|name| {
            let schedule = timetable.schedules.get(name)?;
            Some(SectionView {
                section: name.clone(),
                grid: render_section(name, schedule),
                coverage: subject_coverage(&timetable.subjects, schedule),
            })
        })
        .collect();

    for defect in sections.iter().flat_map(|s| &s.grid.defects) {
        warn!(
            "Lab block defect in section {} on {} period {}: {:?} ({})",
            defect.section, defect.day, defect.period, defect.kind, defect.subject
        );
    }

    let dashboard = dashboard(timetable);
    info!(
        "Interpreted timetable: {} sections, {} theory classes, {} lab blocks",
        dashboard.sections, dashboard.theory_classes, dashboard.lab_blocks
    );

    TimetableView {
        break_period: timetable.break_period,
        periods_per_day: timetable.periods_per_day,
        sections,
        dashboard,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn theory(subject: &str, room: &str, faculty: &str) -> Value {
        json!({"subject": subject, "room": room, "faculty": faculty, "isLab": false})
    }

    fn lab(subject: &str, room: &str, faculty: &str, note: &str) -> Value {
        json!({"subject": subject, "room": room, "faculty": {"name": faculty, "abbr": faculty},
               "isLab": true, "note": note})
    }

    /// Two sections, six periods, break at period 4.
    pub(crate) fn sample_timetable() -> GeneratedTimetable {
        serde_json::from_value(json!({
            "sections": ["A", "B"],
            "subjects": [
                {"name": "Math", "code": "MTH", "credit": 2, "lab": 0},
                {"name": "Chem", "code": "CHM", "credit": 1, "lab": 1}
            ],
            "faculty": ["AL", "MC"],
            "breakPeriod": 4,
            "periodsPerDay": 6,
            "schedules": {
                "A": {"days": [
                    {"day": "Monday", "periods": [
                        theory("Math", "R1", "AL"),
                        lab("Chem", "L1", "MC", "lab start"),
                        lab("Chem", "L1", "MC", "lab cont."),
                        {"break": true},
                        theory("Math", "R1", "AL"),
                        theory("Chem", "R1", "MC")
                    ]}
                ]},
                "B": {"days": [
                    {"day": "Monday", "periods": [
                        theory("Math", "R2", "AL"),
                        null,
                        lab("Chem", "L1", "MC", "lab start"),
                        {"break": true},
                        lab("Chem", "L1", "MC", "lab cont"),
                        null
                    ]}
                ]}
            }
        }))
        .unwrap()
    }

    #[test]
    fn lab_pair_renders_as_one_block() {
        let timetable = sample_timetable();
        let grid = render_section("A", &timetable.schedules["A"]);
        let blocks = &grid.days[0].blocks;

        assert_eq!(blocks.len(), 5);
        assert_eq!(blocks[1].period, 2);
        assert_eq!(blocks[1].span, 2);
        assert_eq!(blocks[2].period, 4);
        assert_eq!(blocks[2].content, BlockContent::Break);
        assert!(grid.defects.is_empty());
    }

    #[test]
    fn lab_pair_counts_once_in_coverage() {
        let timetable = sample_timetable();
        let coverage = subject_coverage(&timetable.subjects, &timetable.schedules["A"]);

        let chem = coverage.iter().find(|c| c.subject == "Chem").unwrap();
        assert_eq!(chem.scheduled_lab, 1);
        assert_eq!(chem.scheduled_theory, 1);
        assert!(chem.matches);
        assert!(coverage.iter().all(|c| c.matches));
    }

    #[test]
    fn block_split_by_break_is_a_defect() {
        let timetable = sample_timetable();
        let grid = render_section("B", &timetable.schedules["B"]);

        assert_eq!(grid.days[0].blocks.len(), 6);
        assert!(grid.days[0].blocks.iter().all(|b| b.span == 1));
        let kinds: Vec<DefectKind> = grid.defects.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![DefectKind::UnfinishedLab, DefectKind::OrphanContinuation]
        );
        assert_eq!(grid.defects[1].period, 5);
    }

    #[test]
    fn continuation_of_other_subject_does_not_merge() {
        let schedule: SectionSchedule = serde_json::from_value(json!({"days": [
            {"day": "Monday", "periods": [
                lab("Chem", "L1", "MC", "lab start"),
                lab("Physics", "L1", "RF", "lab cont")
            ]}
        ]}))
        .unwrap();
        let grid = render_section("A", &schedule);
        assert_eq!(grid.days[0].blocks.len(), 2);
        assert_eq!(grid.defects.len(), 2);
    }

    #[test]
    fn mismatch_is_flagged() {
        let timetable = sample_timetable();
        let coverage = subject_coverage(&timetable.subjects, &timetable.schedules["B"]);
        let math = coverage.iter().find(|c| c.subject == "Math").unwrap();
        assert_eq!(math.scheduled_theory, 1);
        assert!(!math.matches);
    }

    #[test]
    fn dashboard_totals_across_sections() {
        let stats = dashboard(&sample_timetable());

        assert_eq!(stats.sections, 2);
        assert_eq!(stats.theory_classes, 4);
        assert_eq!(stats.lab_blocks, 2);
        assert_eq!(stats.free_periods, 2);
        assert_eq!(
            stats.theory_rooms_used.iter().collect::<Vec<_>>(),
            vec!["R1", "R2"]
        );
        assert_eq!(stats.lab_rooms_used.iter().collect::<Vec<_>>(), vec!["L1"]);
        assert_eq!(stats.faculty.len(), 2);
        assert_eq!(
            stats.room_usage["L1"],
            ClassLoad {
                theory_periods: 0,
                lab_blocks: 2
            }
        );
        assert_eq!(
            stats.faculty_load["MC"],
            ClassLoad {
                theory_periods: 1,
                lab_blocks: 2
            }
        );
    }

    #[test]
    fn interpret_follows_listed_section_order() {
        let view = interpret(&sample_timetable());
        let names: Vec<&str> = view.sections.iter().map(|s| s.section.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(view.break_period, 4);
        assert_eq!(view.sections[1].grid.defects.len(), 2);
    }

    #[test]
    fn generator_response_is_interpreted() {
        let response = json!({
            "schedules": {
                "A": {"days": [
                    {"day": "Monday", "periods": [
                        {"section": "A", "subject": "Math", "isLab": false,
                         "room": "R101", "faculty": "Ada Lovelace"},
                        {"section": "A", "subject": "Chemistry", "isLab": true,
                         "room": "LAB1", "faculty": "Marie Curie", "note": "lab start"},
                        {"section": "A", "subject": "Chemistry", "isLab": true,
                         "room": "LAB1", "faculty": "Marie Curie", "note": "lab cont."},
                        {"break": true},
                        {"section": "A", "subject": "Chemistry", "isLab": false,
                         "room": "R101", "faculty": null},
                        null
                    ]}
                ]}
            },
            "periodsPerDay": 6,
            "breakPeriod": 4,
            "theoryRooms": ["R101"],
            "labRooms": ["LAB1"],
            "sections": ["A"],
            "faculty": ["Ada Lovelace", "Marie Curie"],
            "subjects": [
                {"name": "Math", "credit": 1, "lab": 0},
                {"name": "Chemistry", "credit": 1, "lab": 1}
            ]
        });
        let timetable: GeneratedTimetable = serde_json::from_value(response).unwrap();
        let view = interpret(&timetable);

        assert_eq!(view.sections.len(), 1);
        assert!(view.sections[0].grid.defects.is_empty());
        assert!(view.sections[0].coverage.iter().all(|c| c.matches));
        assert_eq!(view.dashboard.lab_blocks, 1);
        assert_eq!(view.dashboard.theory_classes, 2);
        assert_eq!(view.dashboard.free_periods, 1);
        assert_eq!(
            view.dashboard.faculty.iter().collect::<Vec<_>>(),
            vec!["Ada Lovelace", "Marie Curie"]
        );
    }

    #[test]
    fn rendered_blocks_serialize_flat() {
        let block = RenderedBlock {
            period: 2,
            span: 2,
            content: BlockContent::Class {
                subject: "Chem".into(),
                room: Some("L1".into()),
                faculty: Some("MC".into()),
                is_lab: true,
            },
        };
        assert_eq!(
            serde_json::to_value(&block).unwrap(),
            json!({"period": 2, "span": 2, "kind": "class", "subject": "Chem",
                   "room": "L1", "faculty": "MC", "isLab": true})
        );
    }
}
