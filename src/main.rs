use clap::Parser;
use log::info;
use timetable_desk::client::HttpGenerator;
use timetable_desk::config::{Args, Limits};
use timetable_desk::server::{self, AppState, Session};
use timetable_desk::store::{DraftStore, ResultStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    info!(
        "Forwarding timetable requests to {} (timeout {:?})",
        args.generator_url,
        args.timeout()
    );

    let generator = HttpGenerator::new(args.generator_url.as_str(), args.timeout())?;
    let state_dir = args.state_dir.as_deref();
    let session = Session::new(
        DraftStore::open(state_dir, args.draft_ttl())?,
        ResultStore::open(state_dir)?,
    );

    server::run_server(args.listen, AppState::new(generator, Limits::default(), session)).await?;
    Ok(())
}
