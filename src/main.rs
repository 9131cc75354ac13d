use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod dashboard;
mod db;
mod error;
mod goals;
mod models;
mod progress;
mod ranking;
mod report;
mod source;

use config::Settings;
use dashboard::OwnerAliases;
use models::{GoalOverrides, PersonRevenueRecord};
use source::{BackendClient, RevenueSource, SnapshotFiles};

#[derive(Parser)]
#[command(name = "ae-revenue-tracker")]
#[command(about = "Live revenue tracker for account executives", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import revenue lines from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Rebuild the revenue snapshot from the database
    Refresh {
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        snapshot: SnapshotArgs,
    },
    /// Show progress against goal for every AE
    Dashboard {
        #[command(flatten)]
        view: ViewArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        view: ViewArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Args)]
struct WindowArgs {
    /// First month of the window (YYYY-MM)
    #[arg(long)]
    from: Option<String>,
    /// Last month of the window (YYYY-MM), usually the current month
    #[arg(long)]
    to: Option<String>,
}

#[derive(Args)]
struct SnapshotArgs {
    /// Revenue snapshot file [env: REVENUE_DATA_PATH]
    #[arg(long)]
    data: Option<PathBuf>,
    /// Last-updated timestamp file [env: LAST_UPDATED_PATH]
    #[arg(long)]
    last_updated_file: Option<PathBuf>,
}

#[derive(Args)]
struct ViewArgs {
    #[command(flatten)]
    snapshot: SnapshotArgs,
    /// Read from the dashboard backend instead of the snapshot [env: BACKEND_URL]
    #[arg(long)]
    url: Option<String>,
    /// Refresh the data before rendering
    #[arg(long)]
    trigger_update: bool,
    #[command(flatten)]
    window: WindowArgs,
    /// Manual goal for this run, e.g. aj@sfdata.com=15000
    #[arg(long = "goal", value_name = "OWNER=AMOUNT")]
    goals: Vec<String>,
    /// Display name for an owner, e.g. aj@sfdata.com=AJ
    #[arg(long = "alias", value_name = "OWNER=NAME")]
    aliases: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&settings).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&settings).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect(&settings).await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} revenue lines from {}.", csv.display());
        }
        Commands::Refresh { window, snapshot } => {
            let snapshot = snapshot_files(&settings, &snapshot);
            let count = refresh_snapshot(&settings, &snapshot, &window).await?;
            println!(
                "Saved revenue data for {count} owners to {}.",
                snapshot.data_path.display()
            );
        }
        Commands::Dashboard { view, format } => {
            let dashboard = load_dashboard(&settings, &view).await?;
            match format {
                OutputFormat::Text => print!("{}", dashboard::render_text(&dashboard)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&dashboard)?),
            }
        }
        Commands::Report { view, out } => {
            let dashboard = load_dashboard(&settings, &view).await?;
            let report = report::build_report(&dashboard);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn connect(settings: &Settings) -> anyhow::Result<PgPool> {
    let database_url = settings.require_database_url()?;
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

fn snapshot_files(settings: &Settings, args: &SnapshotArgs) -> SnapshotFiles {
    SnapshotFiles::new(
        args.data
            .clone()
            .unwrap_or_else(|| settings.revenue_data_path.clone()),
        args.last_updated_file
            .clone()
            .unwrap_or_else(|| settings.last_updated_path.clone()),
    )
}

fn resolve_window(window: &WindowArgs, today: NaiveDate) -> anyhow::Result<(NaiveDate, NaiveDate)> {
    let (default_from, default_to) = db::default_window(today);
    let to = match &window.to {
        Some(value) => db::parse_month(value)?,
        None => default_to,
    };
    let from = match &window.from {
        Some(value) => db::parse_month(value)?,
        None if window.to.is_some() => db::default_window(to).0,
        None => default_from,
    };
    anyhow::ensure!(from <= to, "--from must not be after --to");
    Ok((from, to))
}

async fn refresh_snapshot(
    settings: &Settings,
    snapshot: &SnapshotFiles,
    window: &WindowArgs,
) -> anyhow::Result<usize> {
    let (from, to) = resolve_window(window, Local::now().date_naive())?;
    let pool = connect(settings).await?;
    let totals = db::fetch_monthly_totals(&pool, from, to).await?;
    let records = db::pivot_monthly_totals(&totals, &db::months_between(from, to));
    let timestamp = Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string();
    snapshot.write(&records, &timestamp).await?;
    info!(%from, %to, owners = records.len(), "snapshot refreshed");
    Ok(records.len())
}

/// `--url` wins over `BACKEND_URL`; with neither the local snapshot is used.
fn backend_url<'a>(settings: &'a Settings, args: &'a ViewArgs) -> Option<&'a str> {
    args.url.as_deref().or(settings.backend_url.as_deref())
}

async fn load_dashboard(
    settings: &Settings,
    args: &ViewArgs,
) -> anyhow::Result<dashboard::DashboardView> {
    let overrides = GoalOverrides::from_entries(&args.goals)?;
    let mut aliases = OwnerAliases::new();
    for entry in &args.aliases {
        let (owner, name) = models::split_owner_entry(entry)?;
        aliases.insert(owner, name);
    }

    let (records, last_updated) = match backend_url(settings, args) {
        Some(url) => {
            let client = BackendClient::new(url);
            if args.trigger_update {
                let records = client.trigger_update().await?;
                (records, client.fetch_last_updated().await?)
            } else {
                fetch_from(&client).await?
            }
        }
        None => {
            let snapshot = snapshot_files(settings, &args.snapshot);
            if args.trigger_update {
                refresh_snapshot(settings, &snapshot, &args.window).await?;
            }
            fetch_from(&snapshot).await?
        }
    };

    Ok(dashboard::build_dashboard(
        &records,
        &overrides,
        &aliases,
        last_updated.as_deref(),
    ))
}

async fn fetch_from(
    source: &dyn RevenueSource,
) -> anyhow::Result<(Vec<PersonRevenueRecord>, Option<String>)> {
    let records = source.fetch_records().await?;
    let last_updated = source.fetch_last_updated().await?;
    Ok((records, last_updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::stub;

    const REVENUE: &str =
        r#"{"data": [{"owner_email": "aj@sfdata.com", "apr_2025": 100, "may_2025": 150}]}"#;
    const NO_TIMESTAMP: &str =
        r#"{"error": "[Errno 2] No such file or directory: 'last_updated.txt'"}"#;
    const UNREACHABLE: &str = "http://127.0.0.1:1";

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn window(from: Option<&str>, to: Option<&str>) -> WindowArgs {
        WindowArgs {
            from: from.map(str::to_string),
            to: to.map(str::to_string),
        }
    }

    fn view_args(url: Option<String>, data: Option<PathBuf>) -> ViewArgs {
        ViewArgs {
            snapshot: SnapshotArgs {
                data,
                last_updated_file: None,
            },
            url,
            trigger_update: false,
            window: window(None, None),
            goals: Vec::new(),
            aliases: Vec::new(),
        }
    }

    fn settings_with_backend(url: Option<&str>) -> Settings {
        Settings {
            backend_url: url.map(str::to_string),
            ..Settings::from_lookup(|_| None)
        }
    }

    #[test]
    fn window_defaults_to_months_ending_today() {
        let (from, to) = resolve_window(&window(None, None), date(2025, 5, 20)).unwrap();
        assert_eq!((from, to), (date(2025, 1, 1), date(2025, 5, 1)));
    }

    #[test]
    fn window_with_only_to_ends_there() {
        let (from, to) = resolve_window(&window(None, Some("2024-12")), date(2025, 5, 20)).unwrap();
        assert_eq!((from, to), (date(2024, 8, 1), date(2024, 12, 1)));
    }

    #[test]
    fn window_rejects_from_after_to() {
        let err = resolve_window(&window(Some("2025-06"), Some("2025-03")), date(2025, 5, 20))
            .unwrap_err();
        assert!(err.to_string().contains("--from must not be after --to"));
        assert!(resolve_window(&window(Some("June"), None), date(2025, 5, 20)).is_err());
    }

    #[test]
    fn url_flag_beats_environment() {
        let settings = settings_with_backend(Some("http://env.example"));
        let args = view_args(Some("http://flag.example".to_string()), None);
        assert_eq!(backend_url(&settings, &args), Some("http://flag.example"));

        let args = view_args(None, None);
        assert_eq!(backend_url(&settings, &args), Some("http://env.example"));
        assert_eq!(backend_url(&settings_with_backend(None), &args), None);
    }

    #[tokio::test]
    async fn backend_dashboard_renders_without_timestamp() {
        let (url, log) = stub::serve(vec![
            ("GET /revenue", REVENUE),
            ("GET /last_updated", NO_TIMESTAMP),
        ])
        .await;
        let settings = settings_with_backend(Some(UNREACHABLE));

        let view = load_dashboard(&settings, &view_args(Some(url), None))
            .await
            .unwrap();
        assert!(view.last_updated.is_none());
        assert_eq!(view.people.len(), 1);
        assert_eq!(view.people[0].progress, 120);
        assert!(dashboard::render_text(&view).contains("Last updated: unknown"));
        assert_eq!(stub::requests(&log), vec!["GET /revenue", "GET /last_updated"]);
    }

    #[tokio::test]
    async fn backend_from_environment_is_used_over_snapshot() {
        let (url, _log) = stub::serve(vec![
            ("GET /revenue", REVENUE),
            ("GET /last_updated", r#"{"last_updated": "2025-05-20T10:11:12.5"}"#),
        ])
        .await;
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_with_backend(Some(&url));

        let view = load_dashboard(
            &settings,
            &view_args(None, Some(dir.path().join("missing.json"))),
        )
        .await
        .unwrap();
        assert_eq!(view.last_updated.as_deref(), Some("2025-05-20 10:11:12"));
        assert_eq!(view.people[0].owner_email, "aj@sfdata.com");
    }

    #[tokio::test]
    async fn trigger_update_posts_before_reading() {
        let (url, log) = stub::serve(vec![
            ("POST /trigger-update", r#"{"status": "success", "message": "ok"}"#),
            ("GET /revenue", REVENUE),
            ("GET /last_updated", NO_TIMESTAMP),
        ])
        .await;
        let mut args = view_args(Some(url), None);
        args.trigger_update = true;

        load_dashboard(&settings_with_backend(None), &args)
            .await
            .unwrap();
        assert_eq!(
            stub::requests(&log),
            vec!["POST /trigger-update", "GET /revenue", "GET /last_updated"]
        );
    }

    #[tokio::test]
    async fn snapshot_is_used_without_backend() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("revenue_data.json");
        let snapshot = SnapshotFiles::new(&data, dir.path().join("last_updated.txt"));
        let records = vec![PersonRevenueRecord::new("kiriti@sfdata.com")
            .with_month("apr_2025", 40.0)
            .with_month("may_2025", 50.0)];
        snapshot.write(&records, "2025-05-20T10:11:12.250").await.unwrap();

        let mut args = view_args(None, Some(data));
        args.snapshot.last_updated_file = Some(dir.path().join("last_updated.txt"));
        args.goals = vec!["kiriti@sfdata.com=100".to_string()];

        let view = load_dashboard(&settings_with_backend(None), &args)
            .await
            .unwrap();
        assert_eq!(view.people[0].progress, 50);
        assert!(view.people[0].goal_overridden);
        assert_eq!(view.last_updated.as_deref(), Some("2025-05-20 10:11:12"));
    }
}
