use axum_prometheus::PrometheusMetricLayer;
use clap::{Args, Parser, Subcommand};
use mccd::certificate::{CertificateEngine, RuleSet, Sex};
use mccd::config::AppConfig;
use mccd::error::AppError;
use mccd::mortality::{
    EventCsvImporter, MortalityDashboard, MortalityQuery, MortalityRecord, RecordFilter,
    TopCausesReport,
};
use mccd::remote::{
    fetch_or_init, load_option_sets, EventApi, InMemoryAnalytics, InMemoryDataStore,
    InMemoryEventApi, ServiceToken, TOKEN_KEY, TOKEN_NAMESPACE,
};
use mccd::routes::{router, AppState};
use mccd::telemetry::{self, LogSink};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "mccd",
    about = "Certificate of cause of death rules and mortality reports",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print the standard certificate rule catalog
    Rules,
    /// Summarise the top causes of death from an analytics CSV export
    Report(ReportArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
    /// Analytics CSV export served by the mortality endpoint
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// Events of the period being reported
    #[arg(long)]
    events: PathBuf,
    /// Events of the comparison period
    #[arg(long)]
    previous: Option<PathBuf>,
    /// Number of causes to keep (defaults to APP_TOP_CAUSES_LIMIT)
    #[arg(long)]
    limit: Option<usize>,
    /// Break one cause down by organisation unit
    #[arg(long)]
    category: Option<String>,
    /// Only count deaths of this sex
    #[arg(long, value_parser = parse_sex)]
    sex: Option<Sex>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Rules => run_rules(),
        Command::Report(args) => run_report(args),
    }
}

fn parse_sex(raw: &str) -> Result<Sex, String> {
    Sex::parse(raw).ok_or_else(|| format!("unknown sex '{raw}' (expected Male, Female or Unknown)"))
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, LogSink::Stdout)?;

    let policy = config.retry.policy();
    let engine = Arc::new(CertificateEngine::standard(&config.rules)?);

    let api = InMemoryEventApi::seeded();
    let catalog = load_option_sets(&api, &policy).await?;
    let org_units = policy
        .run("fetch organisation units", || api.organisation_units())
        .await?;
    let store = InMemoryDataStore::default();
    let token: ServiceToken = fetch_or_init(
        &store,
        TOKEN_NAMESPACE,
        TOKEN_KEY,
        ServiceToken::default(),
        &policy,
    )
    .await?;
    info!(
        option_sets = catalog.len(),
        org_units = org_units.len(),
        token_configured = !token.token.is_empty(),
        "remote collaborators initialised"
    );

    let records = match args.events.take() {
        Some(path) => EventCsvImporter::from_path(path)?,
        None => Vec::new(),
    };
    let dashboard = MortalityDashboard::new(Arc::new(InMemoryAnalytics::new(records)), policy);

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
        engine,
        dashboard,
        top_causes_limit: config.reporting.top_causes_limit,
    };

    let app = router(state).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "certificate rules service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_rules() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry, LogSink::Stderr)?;

    let engine = CertificateEngine::standard(&config.rules)?;
    render_rules(engine.evaluator().rules());
    Ok(())
}

fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry, LogSink::Stderr)?;

    let current = EventCsvImporter::from_path(&args.events)?;
    let previous = match &args.previous {
        Some(path) => EventCsvImporter::from_path(path)?,
        None => Vec::new(),
    };

    let query = MortalityQuery {
        filters: args.sex.map(RecordFilter::Sex).into_iter().collect(),
        category: args.category,
        limit: args.limit.unwrap_or(config.reporting.top_causes_limit),
        organisation_unit_name: None,
    };

    let report = TopCausesReport::build(&current, &previous, &query);
    render_report(&report, &current, args.previous.is_some());
    Ok(())
}

fn render_rules(rules: &RuleSet) {
    println!("Standard certificate rules ({})", rules.len());
    for rule in rules.iter() {
        let targets: Vec<&str> = rule
            .effects
            .iter()
            .map(|effect| effect.target.as_str())
            .collect();
        println!(
            "- {} [on {}] -> {}",
            rule.name,
            rule.trigger.field,
            targets.join(", ")
        );
    }
}

fn render_report(report: &TopCausesReport, current: &[MortalityRecord], compared: bool) {
    println!("{}", report.title);
    println!(
        "Deaths counted: {} of {} imported events",
        report.total,
        current.len()
    );
    if !compared {
        println!("No comparison period provided; trends are against zero");
    }

    if report.buckets.is_empty() {
        println!("\nNo deaths matched the selection");
        return;
    }

    println!();
    for bucket in report.buckets.iter().rev() {
        let previous = bucket
            .previous_count
            .map(|count| count.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "- {}: {} ({:.2}%), previous {}, trend {}",
            bucket.name, bucket.count, bucket.percentage, previous, bucket.trend_label
        );
    }
}
