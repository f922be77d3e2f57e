//! Campaign runner executable
//!
//! Runs a single campaign for one market region, or watches the triggers
//! directory and starts or stops runs as trigger files appear.

mod progress_log;
mod triggers;

use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use outreach_core::{paths, CampaignRunner, OutreachConfig};
use outreach_types::CampaignTrigger;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// How long a Ctrl-C waits for in-flight leads to reach a terminal status
const SHUTDOWN_GRACE: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with INFO as default if RUST_LOG not set
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    let matches = cli().get_matches();

    let data_dir = string_arg(&matches, "data-dir")?;
    if let Err(e) = paths::init_data_root(data_dir.clone()) {
        log::warn!("Data root initialization warning: {}", e);
    }
    log::info!("Using data directory: {}", data_dir);

    let logs_dir = string_arg(&matches, "logs-dir")?;
    if let Err(e) = paths::init_logs_root(logs_dir.clone()) {
        log::warn!("Logs root initialization warning: {}", e);
    }
    log::info!("Using logs directory: {}", logs_dir);

    let templates_dir = string_arg(&matches, "templates-dir")?;
    if let Err(e) = paths::init_templates_root(templates_dir.clone()) {
        log::warn!("Templates root initialization warning: {}", e);
    }
    log::info!("Using templates directory: {}", templates_dir);

    let config_path = config_path(&matches);
    let config = OutreachConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;
    log::info!("Loaded configuration from {}", config_path);

    if config.safety.redirect_to.is_some() {
        log::warn!("Safety redirect is active; no email will reach a real lead");
    }

    let runner = Arc::new(CampaignRunner::from_config(&config)?);
    let progress_handle = progress_log::spawn(runner.subscribe(), paths::progress_log_path());

    if matches.get_flag("list-regions") {
        for region in runner.market_regions().await? {
            println!("{}", region);
        }
    } else if let Some(recipient) = matches.get_one::<String>("test-email") {
        let receipt = runner.send_test_email(recipient).await?;
        log::info!(
            "Test email sent to {} ({})",
            recipient,
            receipt.message_id.as_deref().unwrap_or("no receipt")
        );
    } else if let Some(region) = matches.get_one::<String>("region") {
        let trigger = build_trigger(&matches, region)?;
        spawn_ctrl_c_handler(Arc::downgrade(&runner));

        let summary = runner.run(trigger).await?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if matches.get_flag("monitor-triggers") {
        log::info!("Starting trigger monitor mode");
        tokio::select! {
            result = triggers::monitor(runner.clone()) => result?,
            _ = tokio::signal::ctrl_c() => {
                log::info!("Received Ctrl-C, stopping active runs");
                runner.stop_all();
                wait_for_runs(&runner).await;
            }
        }
    } else {
        log::error!("No action specified. Use --help for options.");
        std::process::exit(1);
    }

    // Flush whatever the progress writer still has queued
    drop(runner);
    let _ = tokio::time::timeout(Duration::from_secs(5), progress_handle).await;

    Ok(())
}

fn cli() -> Command {
    Command::new("outreach-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Cold-outreach email campaign runner")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .help("Configuration file path [default: /app/config/outreach.json]")
        )
        .arg(
            Arg::new("region")
                .long("region")
                .value_name("REGION")
                .help("Run one campaign for this market region")
        )
        .arg(
            Arg::new("limit")
                .long("limit")
                .value_name("N")
                .value_parser(clap::value_parser!(u32))
                .help("Maximum number of leads to fetch for the run")
        )
        .arg(
            Arg::new("sender")
                .long("sender")
                .value_name("EMAIL")
                .help("Send every email as this configured sender")
        )
        .arg(
            Arg::new("campaign-id")
                .long("campaign-id")
                .value_name("ID")
                .help("Campaign id recorded in the send log")
        )
        .arg(
            Arg::new("run-id")
                .long("run-id")
                .value_name("ID")
                .help("Explicit campaign run id (defaults to a new UUID)")
        )
        .arg(
            Arg::new("monitor-triggers")
                .long("monitor-triggers")
                .help("Watch the triggers directory for campaign and stop requests")
                .action(ArgAction::SetTrue)
        )
        .arg(
            Arg::new("list-regions")
                .long("list-regions")
                .help("Print the market regions present in the lead store")
                .action(ArgAction::SetTrue)
        )
        .arg(
            Arg::new("test-email")
                .long("test-email")
                .value_name("ADDRESS")
                .help("Send one rendered sample email to this address")
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Data directory for triggers and staged letters")
                .default_value("/data/outreach")
        )
        .arg(
            Arg::new("logs-dir")
                .long("logs-dir")
                .value_name("DIR")
                .help("Logs directory for the progress feed")
                .default_value("/logs")
        )
        .arg(
            Arg::new("templates-dir")
                .long("templates-dir")
                .value_name("DIR")
                .help("Templates directory for email, letter and branding files")
                .default_value("/app/templates")
        )
}

fn string_arg(matches: &clap::ArgMatches, name: &str) -> anyhow::Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .with_context(|| format!("--{} is required", name))
}

fn config_path(matches: &clap::ArgMatches) -> String {
    matches
        .get_one::<String>("config")
        .cloned()
        .unwrap_or_else(|| paths::default_config_path().display().to_string())
}

fn build_trigger(matches: &clap::ArgMatches, region: &str) -> anyhow::Result<CampaignTrigger> {
    if region.trim().is_empty() {
        anyhow::bail!("--region must not be empty");
    }

    let mut trigger = CampaignTrigger::new(region.trim(), matches.get_one::<u32>("limit").copied());
    if let Some(sender) = matches.get_one::<String>("sender") {
        trigger = trigger.with_sender(sender);
    }
    if let Some(campaign_id) = matches.get_one::<String>("campaign-id") {
        trigger = trigger.with_campaign(campaign_id);
    }
    if let Some(run_id) = matches.get_one::<String>("run-id") {
        trigger = trigger.with_run_id(run_id);
    }
    Ok(trigger)
}

fn spawn_ctrl_c_handler(runner: Weak<CampaignRunner>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            if let Some(runner) = runner.upgrade() {
                log::info!("Received Ctrl-C, stopping after the current lead");
                runner.stop_all();
            }
        }
    });
}

async fn wait_for_runs(runner: &CampaignRunner) {
    let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
    while !runner.active_runs().is_empty() {
        if tokio::time::Instant::now() >= deadline {
            log::warn!("Runs still active after {:?}: {:?}", SHUTDOWN_GRACE, runner.active_runs());
            break;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_single_run_flags() {
        let matches = cli().get_matches_from([
            "outreach-server",
            "--region", "Austin",
            "--limit", "5",
            "--sender", "jane@company.com",
            "--campaign-id", "spring",
            "--run-id", "run-1",
        ]);

        let trigger = build_trigger(&matches, "Austin").unwrap();
        assert_eq!(trigger.market_region, "Austin");
        assert_eq!(trigger.limit, Some(5));
        assert_eq!(trigger.sender_email.as_deref(), Some("jane@company.com"));
        assert_eq!(trigger.campaign_id.as_deref(), Some("spring"));
        assert_eq!(trigger.campaign_run_id.as_deref(), Some("run-1"));
        assert_eq!(config_path(&matches), "/app/config/outreach.json");
        assert_eq!(string_arg(&matches, "data-dir").unwrap(), "/data/outreach");
    }

    #[test]
    fn test_blank_region_is_rejected() {
        let matches = cli().get_matches_from(["outreach-server", "--region", " "]);
        assert!(build_trigger(&matches, " ").is_err());
    }
}
