//! Command-line interface for the fleet gap monitor.

#![allow(missing_docs)]

pub mod fixture;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use crate::alerts::lifecycle::AlertLifecycle;
use crate::alerts::model::{AlertStatus, GapAlert, Severity};
use crate::alerts::repo::{AlertFilter, AlertRepository};
use crate::alerts::store::SqliteAlertStore;
use crate::core::config::Config;
use crate::core::errors::{FgmError, Result};
use crate::core::time::format_rfc3339;
use crate::daemon::loop_main::{DaemonDeps, MonitoringDaemon};
use crate::daemon::signals::SignalHandler;
use crate::engine::analyzer::{AnalyzerSources, GapAnalyzer, VehicleAnalysis};
use crate::engine::detector::AnalysisWindow;
use crate::logger::events::ActivityEvent;
use crate::logger::events::spawn_logger;
use crate::logger::jsonl::JsonlConfig;
use crate::sources::memory::MemoryFleet;
use crate::sources::VehicleRegistry;

/// Fleet gap monitor: telemetry gap detection, confidence certification,
/// and alert lifecycle management.
#[derive(Debug, Parser)]
#[command(
    name = "fgm",
    version,
    about = "Fleet Gap Monitor - telemetry gap certification",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Analyze gaps for one vehicle or the whole fleet snapshot.
    Analyze(AnalyzeArgs),
    /// Analyze the vehicle and period a report identifier covers.
    Report(ReportArgs),
    /// Run one fleet sweep, persisting alerts.
    Sweep(SweepArgs),
    /// Run the periodic monitoring daemon.
    Daemon(DaemonArgs),
    /// List persisted alerts.
    Alerts(AlertsArgs),
    /// Show one alert with its audit trail.
    Show(ShowArgs),
    /// Certify an alert as verified-benign and close it.
    Certify(CertifyArgs),
    /// Escalate an alert for human review.
    Escalate(VerbArgs),
    /// Close an alert as a confirmed contract breach.
    Breach(VerbArgs),
    /// Print the effective configuration as TOML.
    Config,
}

#[derive(Debug, Clone, Args)]
struct AnalyzeArgs {
    /// Fleet snapshot JSON file.
    #[arg(long, value_name = "PATH")]
    fleet: PathBuf,
    /// Restrict to one vehicle.
    #[arg(long)]
    vehicle: Option<String>,
    /// Window start (RFC 3339); defaults to 7 days before the last record.
    #[arg(long, requires = "to")]
    from: Option<DateTime<Utc>>,
    /// Window end (RFC 3339).
    #[arg(long, requires = "from")]
    to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Args)]
struct ReportArgs {
    #[arg(long, value_name = "PATH")]
    fleet: PathBuf,
    /// Report identifier to correlate.
    report_id: String,
}

#[derive(Debug, Clone, Args)]
struct SweepArgs {
    #[arg(long, value_name = "PATH")]
    fleet: PathBuf,
}

#[derive(Debug, Clone, Args)]
struct DaemonArgs {
    #[arg(long, value_name = "PATH")]
    fleet: PathBuf,
    /// Override the configured startup delay (seconds).
    #[arg(long = "startup-delay", value_name = "SECS")]
    startup_delay: Option<u64>,
    /// Override the configured sweep interval (seconds).
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,
}

#[derive(Debug, Clone, Args)]
struct AlertsArgs {
    #[arg(long)]
    vehicle: Option<String>,
    /// Filter by status (open, escalated, completed, contract_breach).
    #[arg(long)]
    status: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct ShowArgs {
    alert_id: i64,
}

#[derive(Debug, Clone, Args)]
struct CertifyArgs {
    alert_id: i64,
    /// Fleet snapshot used to rebuild the certification evidence.
    #[arg(long, value_name = "PATH")]
    fleet: PathBuf,
    #[arg(long, default_value = "operator")]
    actor: String,
}

#[derive(Debug, Clone, Args)]
struct VerbArgs {
    alert_id: i64,
    #[arg(long, default_value = "operator")]
    actor: String,
    #[arg(long)]
    note: Option<String>,
}

/// Parse arguments, dispatch, and map errors to an exit code.
#[must_use]
pub fn run() -> i32 {
    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }
    match dispatch(&cli) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            1
        }
    }
}

fn dispatch(cli: &Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    match &cli.command {
        Command::Analyze(args) => cmd_analyze(cli, &config, args),
        Command::Report(args) => cmd_report(cli, &config, args),
        Command::Sweep(args) => cmd_sweep(&config, args),
        Command::Daemon(args) => cmd_daemon(&config, args),
        Command::Alerts(args) => cmd_alerts(cli, &config, args),
        Command::Show(args) => cmd_show(cli, &config, args),
        Command::Certify(args) => cmd_certify(&config, args),
        Command::Escalate(args) => cmd_escalate(&config, args),
        Command::Breach(args) => cmd_breach(&config, args),
        Command::Config => cmd_config(&config),
    }
}

// ──────────────────── commands ────────────────────

fn cmd_analyze(cli: &Cli, config: &Config, args: &AnalyzeArgs) -> Result<()> {
    let fleet = fixture::load_fleet(&args.fleet)?;
    let analyzer = GapAnalyzer::from_config(config);
    let sources = memory_sources(&fleet);
    let now = Utc::now();

    let vehicles = match &args.vehicle {
        Some(id) => vec![id.clone()],
        None => fleet.list_active_vehicles()?,
    };
    let window = match (args.from, args.to) {
        (Some(from), Some(to)) => Some(AnalysisWindow::new(from, to)),
        _ => None,
    };
    for vehicle_id in vehicles {
        let analysis = match window {
            Some(window) => analyzer.analyze_window(&sources, &vehicle_id, window, now)?,
            None => analyzer.analyze_vehicle(&sources, &vehicle_id, now)?,
        };
        match analysis {
            Some(analysis) => print_analysis(cli, &analysis)?,
            None => println!("{vehicle_id}: no telemetry to analyze"),
        }
    }
    Ok(())
}

fn cmd_report(cli: &Cli, config: &Config, args: &ReportArgs) -> Result<()> {
    let fleet = fixture::load_fleet(&args.fleet)?;
    let analyzer = GapAnalyzer::from_config(config);
    let sources = memory_sources(&fleet);
    match analyzer.analyze_report(&sources, &fleet, &args.report_id, Utc::now())? {
        Some(analysis) => print_analysis(cli, &analysis),
        None => {
            println!("report {}: no telemetry to analyze", args.report_id);
            Ok(())
        }
    }
}

fn cmd_sweep(config: &Config, args: &SweepArgs) -> Result<()> {
    let fleet = fixture::load_fleet(&args.fleet)?;
    let store = SqliteAlertStore::open(&config.paths.sqlite_db)?;
    let (logger, join) = spawn_logger(jsonl_config(config));
    let daemon = MonitoringDaemon::new(
        config.clone(),
        SignalHandler::unregistered(),
        logger.clone(),
    )?;
    let stats = daemon.run_sweep(&DaemonDeps {
        sources: memory_sources(&fleet),
        registry: &fleet,
        repo: &store,
    });
    logger.shutdown();
    let _ = join.join();
    println!(
        "swept {} vehicle(s), skipped {}, raised {} alert(s)",
        stats.vehicles_swept, stats.vehicles_skipped, stats.alerts_raised
    );
    Ok(())
}

fn cmd_daemon(config: &Config, args: &DaemonArgs) -> Result<()> {
    let fleet = fixture::load_fleet(&args.fleet)?;
    let store = SqliteAlertStore::open(&config.paths.sqlite_db)?;
    let mut config = config.clone();
    if let Some(delay) = args.startup_delay {
        config.scheduler.startup_delay_secs = delay;
    }
    if let Some(interval) = args.interval {
        config.scheduler.sweep_interval_secs = interval;
    }
    config.validate()?;
    let (logger, join) = spawn_logger(jsonl_config(&config));
    let mut daemon = MonitoringDaemon::new(config, SignalHandler::new(), logger.clone())?;
    daemon.run(&DaemonDeps {
        sources: memory_sources(&fleet),
        registry: &fleet,
        repo: &store,
    })?;
    let _ = join.join();
    Ok(())
}

fn cmd_alerts(cli: &Cli, config: &Config, args: &AlertsArgs) -> Result<()> {
    let store = SqliteAlertStore::open(&config.paths.sqlite_db)?;
    let filter = AlertFilter {
        vehicle_id: args.vehicle.clone(),
        status: args.status.as_deref().map(AlertStatus::from_str).transpose()?,
    };
    let alerts = store.list(&filter)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&alerts)?);
        return Ok(());
    }
    if alerts.is_empty() {
        println!("no alerts");
        return Ok(());
    }
    for alert in &alerts {
        print_alert_line(alert);
    }
    Ok(())
}

fn cmd_show(cli: &Cli, config: &Config, args: &ShowArgs) -> Result<()> {
    let store = SqliteAlertStore::open(&config.paths.sqlite_db)?;
    let alert = store.get(args.alert_id)?;
    let trail = store.audit_trail(args.alert_id)?;
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "alert": alert,
                "audit": trail,
            }))?
        );
        return Ok(());
    }
    print_alert_line(&alert);
    println!("  {}", alert.description);
    for entry in &trail {
        let mut line = format!(
            "  {} {} by {}",
            format_rfc3339(entry.recorded_at),
            entry.action.as_str(),
            entry.actor
        );
        if let Some(decision) = entry.decision {
            line.push_str(&format!(" [{}]", decision.as_str()));
        }
        println!("{line}");
    }
    Ok(())
}

fn cmd_certify(config: &Config, args: &CertifyArgs) -> Result<()> {
    let fleet = fixture::load_fleet(&args.fleet)?;
    let store = SqliteAlertStore::open(&config.paths.sqlite_db)?;
    let lifecycle = AlertLifecycle::new(&store);

    let alert = store.get(args.alert_id)?;
    let analyzer = GapAnalyzer::from_config(config);
    let sources = memory_sources(&fleet);
    let analysis = analyzer
        .analyze_vehicle(&sources, &alert.vehicle_id, Utc::now())?
        .ok_or_else(|| FgmError::source_failure(
            alert.vehicle_id.clone(),
            "certify",
            "no telemetry available to rebuild certification evidence",
        ))?;

    let (updated, cert) =
        lifecycle.certify(args.alert_id, &analysis, &fleet, &args.actor, Utc::now())?;
    let (logger, join) = spawn_logger(jsonl_config(config));
    logger.send(ActivityEvent::GapCertified {
        alert_id: updated.id,
        vehicle_id: updated.vehicle_id.clone(),
        content_hash: cert.content_hash.clone(),
    });
    logger.shutdown();
    let _ = join.join();
    println!(
        "alert {} {} (hash {})",
        updated.id,
        "certified".green().bold(),
        cert.content_hash
    );
    Ok(())
}

fn cmd_escalate(config: &Config, args: &VerbArgs) -> Result<()> {
    let store = SqliteAlertStore::open(&config.paths.sqlite_db)?;
    let alert = AlertLifecycle::new(&store).escalate(
        args.alert_id,
        &args.actor,
        args.note.clone(),
        Utc::now(),
    )?;
    println!("alert {} {}", alert.id, "escalated".yellow().bold());
    Ok(())
}

fn cmd_breach(config: &Config, args: &VerbArgs) -> Result<()> {
    let store = SqliteAlertStore::open(&config.paths.sqlite_db)?;
    let alert = AlertLifecycle::new(&store).mark_breach(
        args.alert_id,
        &args.actor,
        args.note.clone(),
        Utc::now(),
    )?;
    println!("alert {} marked {}", alert.id, "contract breach".red().bold());
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    let raw = toml::to_string_pretty(config).map_err(|e| FgmError::Serialization {
        context: "toml",
        details: e.to_string(),
    })?;
    print!("{raw}");
    Ok(())
}

// ──────────────────── helpers ────────────────────

fn memory_sources(fleet: &MemoryFleet) -> AnalyzerSources<'_> {
    AnalyzerSources {
        telemetry: fleet,
        failures: fleet,
        sessions: fleet,
    }
}

fn jsonl_config(config: &Config) -> JsonlConfig {
    JsonlConfig {
        path: config.paths.jsonl_log.clone(),
        ..JsonlConfig::default()
    }
}

fn print_analysis(cli: &Cli, analysis: &VehicleAnalysis) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(analysis)?);
        return Ok(());
    }
    println!(
        "{}: {} gap(s) over {}h, avg confidence {:.1}, longest run {}h",
        analysis.vehicle_id.bold(),
        analysis.metrics.gap_hours,
        analysis.metrics.window_hours,
        analysis.metrics.avg_confidence,
        analysis.metrics.max_consecutive_gaps,
    );
    for gap in &analysis.gaps {
        let confidence = format!("{:5.1}", gap.confidence);
        let confidence = if gap.was_profiled_during_gap {
            confidence.red()
        } else if gap.confidence >= 70.0 {
            confidence.green()
        } else {
            confidence.yellow()
        };
        println!(
            "  {} {} {}",
            format_rfc3339(gap.timestamp),
            confidence,
            gap.justification
        );
    }
    for draft in &analysis.drafts {
        let severity = colorize_severity(draft.severity);
        println!("  {severity} {}", draft.description);
    }
    Ok(())
}

fn print_alert_line(alert: &GapAlert) {
    println!(
        "#{} {} {} {} {} ({})",
        alert.id,
        colorize_severity(alert.severity),
        alert.vehicle_id,
        alert.alert_type.as_str(),
        alert.status.as_str().bold(),
        format_rfc3339(alert.created_at),
    );
}

fn colorize_severity(severity: Severity) -> colored::ColoredString {
    match severity {
        Severity::Info => severity.as_str().normal(),
        Severity::Warning => severity.as_str().yellow(),
        Severity::Critical => severity.as_str().red().bold(),
    }
}
