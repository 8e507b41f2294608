// SlateCheck entry point.
//
// Startup sequence:
// 1. Resolve the working home and initialize tracing (log to file)
// 2. Load config
// 3. Open the preference store and restore the last session
// 4. Load the reference pack (explicit or auto-discovered)
// 5. Apply belief and lineup uploads, then contest overrides
// 6. Print the report
// 7. Save preferences

mod render;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use slatecheck_core::config::{self, Config};
use slatecheck_core::contest::{ContestInput, PayoutCurve};
use slatecheck_core::discover::discover_pack;
use slatecheck_core::session::Session;
use slatecheck_core::sidecar::{load_reference_pack, DefaultFetcher, LoadOptions};
use slatecheck_core::store::{PreferenceStore, SqliteStore};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "slatecheck")]
#[command(about = "Reconcile and classify DFS lineups against a reference pack", long_about = None)]
struct Cli {
    /// Reference pack (pipeline JSON) path or URL; auto-discovered when omitted
    #[arg(long)]
    pack: Option<String>,

    /// Projections CSV to use as the belief profile
    #[arg(long)]
    beliefs: Option<PathBuf>,

    /// Forget the saved belief profile
    #[arg(long, conflicts_with = "beliefs")]
    clear_beliefs: bool,

    /// Lineup CSV (optimizer export or hand-built lineups)
    #[arg(long)]
    lineups: Option<PathBuf>,

    /// Only show lineups from this set
    #[arg(long)]
    set: Option<String>,

    #[arg(long)]
    entry_fee: Option<f64>,

    #[arg(long)]
    field_size: Option<u32>,

    #[arg(long)]
    prize_pool: Option<f64>,

    /// Number of entries you are playing
    #[arg(long)]
    entries: Option<u32>,

    /// Percent of the field that cashes, e.g. 22
    #[arg(long)]
    paid_pct: Option<f64>,

    /// Ignore the optimizer sidecar named by the pack
    #[arg(long)]
    no_sidecar: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Directory holding config/, defaults/ and logs/
    #[arg(long)]
    home: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 1. Home directory and tracing
    let home = resolve_home(cli.home.as_deref())?;
    init_tracing(&home)?;
    info!("SlateCheck starting up in {}", home.display());

    // 2. Config
    let seeded = config::ensure_config_file(&home).context("failed to initialize config")?;
    if let Some(path) = seeded {
        info!("Wrote default config to {}", path.display());
    }
    let config = config::load_config_from(&home).context("failed to load configuration")?;

    // 3. Preferences
    let db_path = home.join(&config.db_path);
    let store = SqliteStore::open(&db_path.to_string_lossy())
        .context("failed to open preference store")?;
    let mut session = Session::new(config.contest.clone(), config.thresholds.clone());
    match store.load() {
        Ok(prefs) => session.apply_preferences(prefs),
        Err(e) => warn!("Ignoring unreadable preferences: {:#}", e),
    }

    // 4. Reference pack
    load_reference(&cli, &config, &mut session).await?;

    // 5. Uploads and overrides
    if cli.clear_beliefs {
        session.clear_beliefs();
    }
    if let Some(path) = &cli.beliefs {
        let text = read_upload(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        session
            .upload_beliefs(&text, &name)
            .with_context(|| format!("failed to load beliefs from {}", path.display()))?;
    }
    if let Some(path) = &cli.lineups {
        if !session.has_reference() {
            warn!("No reference pack loaded; only name-based lineups can be mapped");
        }
        let text = read_upload(path)?;
        let format = session
            .upload_lineups(&text)
            .with_context(|| format!("failed to load lineups from {}", path.display()))?;
        info!("Loaded {} as {}", path.display(), format);
    }

    let contest = apply_overrides(session.contest_input().clone(), &cli);
    config::validate_contest(&contest).context("invalid contest override")?;
    session.set_contest(contest);

    // 6. Report
    let view = render::ReportView::build(&mut session, cli.set.as_deref());
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&view.to_json()).context("failed to encode report")?
        );
    } else {
        print!("{}", view.to_text());
    }

    // 7. Save
    store
        .save(&session.preferences())
        .context("failed to save preferences")?;
    info!("SlateCheck finished");
    Ok(())
}

/// Load the pack named on the command line, or auto-discover one. Only an
/// explicitly requested pack is fatal when it fails.
async fn load_reference(cli: &Cli, config: &Config, session: &mut Session) -> anyhow::Result<()> {
    let options = LoadOptions {
        sidecar: config.sidecar.enabled && !cli.no_sidecar,
        ..config.load_options()
    };
    let fetcher = DefaultFetcher::new();
    let ticket = session.begin_load();

    if let Some(location) = &cli.pack {
        let load = load_reference_pack(&fetcher, location, options)
            .await
            .with_context(|| format!("failed to load reference pack {location}"))?;
        session.commit_reference(ticket, load);
        return Ok(());
    }

    let today = chrono::Local::now().date_naive();
    match discover_pack(&config.pack_dir, today) {
        Ok(path) => {
            let location = path.to_string_lossy().into_owned();
            match load_reference_pack(&fetcher, &location, options).await {
                Ok(load) => {
                    session.commit_reference(ticket, load);
                }
                Err(e) => {
                    session.fail_auto_load(ticket, e.to_string());
                }
            }
        }
        Err(reason) => {
            session.fail_auto_load(ticket, reason);
        }
    }
    Ok(())
}

fn apply_overrides(mut contest: ContestInput, cli: &Cli) -> ContestInput {
    if let Some(fee) = cli.entry_fee {
        contest.entry_fee = fee;
    }
    if let Some(field) = cli.field_size {
        contest.field_size = field;
    }
    if let Some(pool) = cli.prize_pool {
        contest.prize_pool = pool;
    }
    if let Some(entries) = cli.entries {
        contest.entries = entries;
    }
    if let Some(pct) = cli.paid_pct {
        contest.payout = PayoutCurve::TopFraction {
            fraction: pct / 100.0,
        };
    }
    contest
}

fn read_upload(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// The explicit `--home`, else the current directory when it holds a
/// config, else the per-user data directory.
fn resolve_home(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    if cwd.join("config").exists() || cwd.join("defaults").exists() {
        return Ok(cwd);
    }

    let dirs = directories::ProjectDirs::from("", "", "slatecheck")
        .context("no home directory available for slatecheck data")?;
    Ok(dirs.data_dir().to_path_buf())
}

/// Initialize tracing to a log file so stdout carries only the report.
fn init_tracing(home: &Path) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = home.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("slatecheck.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("slatecheck=info,slatecheck_core=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
