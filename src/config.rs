use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Timetable desk: validates timetable requests, forwards them to the
/// generator and renders what comes back.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address the HTTP server binds to
    #[arg(long, env = "TIMETABLE_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Endpoint of the external timetable generator
    #[arg(
        long,
        env = "TIMETABLE_GENERATOR_URL",
        default_value = "http://127.0.0.1:8000/schedule"
    )]
    pub generator_url: String,

    /// Seconds to wait for the generator before giving up
    #[arg(long, env = "TIMETABLE_TIMEOUT_SECS", default_value_t = 120)]
    pub timeout_secs: u64,

    /// Directory for the draft and last-result caches. In memory if absent.
    #[arg(long, env = "TIMETABLE_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Seconds a saved draft stays resumable
    #[arg(long, env = "TIMETABLE_DRAFT_TTL_SECS", default_value_t = 600)]
    pub draft_ttl_secs: u64,
}

impl Args {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn draft_ttl(&self) -> Duration {
        Duration::from_secs(self.draft_ttl_secs)
    }
}

/// Numeric bounds enforced on a configuration before submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    pub min_sections: u32,
    pub max_sections: u32,
    pub min_subjects: usize,
    pub max_subjects: usize,
    pub max_credit: u8,
    pub max_lab: u8,
    pub max_code_len: usize,
    pub min_periods_per_day: u32,
    pub max_subjects_per_faculty: usize,
    pub max_sections_per_theory_room: usize,
    pub max_claims_per_lab_room: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            min_sections: 1,
            max_sections: 6,
            min_subjects: 4,
            max_subjects: 6,
            max_credit: 3,
            max_lab: 3,
            max_code_len: 5,
            min_periods_per_day: 6,
            max_subjects_per_faculty: 2,
            max_sections_per_theory_room: 2,
            max_claims_per_lab_room: 6,
        }
    }
}

impl Limits {
    /// The generator allows two periods per section beyond the minimum day.
    pub fn max_periods_per_day(&self, sections_count: u32) -> u32 {
        self.min_periods_per_day.max(sections_count * 2)
    }
}
