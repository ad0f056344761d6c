use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use dialoguer::{theme::ColorfulTheme, Confirm};
use friendscan_client::{HttpTransport, QrLogin, ResponseDump, Transport, WebApi};
use friendscan_core::{ConfigManager, FindingSet, FriendscanConfig};
use friendscan_probe::report::{confirmation_prompt, render_findings, DECLINED, NOTHING_FOUND};
use friendscan_probe::{ProbeEngine, ProbeSettings, ProgressSink, ProgressUpdate, TokioSleeper};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, reload, Registry};

const QR_IMAGE: &str = "qrcode.jpg";

#[derive(Parser, Debug)]
#[command(
    name = "friendscan",
    version,
    about = "Find contacts who removed you, without messaging anyone",
    long_about = "friendscan logs in to the web client, adds your contacts batch by batch to a \
                  private group chat and reads back which of them no longer have you as a friend. \
                  The group is emptied after every batch."
)]
struct Cli {
    #[arg(short = 'n', long = "num", help = "Contacts probed per batch")]
    num: Option<usize>,

    #[arg(short, long, help = "Seconds to wait between batches")]
    delay: Option<u64>,

    #[arg(short, long, help = "Width of the progress bar")]
    progress: Option<usize>,

    #[arg(short, long, help = "Retries after a failed group-chat call")]
    retry: Option<u32>,

    #[arg(long, help = "Dump raw responses and log at debug level")]
    debug: bool,

    #[arg(long = "did", help = "Device id sent with every request")]
    device_id: Option<String>,

    #[arg(long, env = "FRIENDSCAN_CONFIG", help = "Configuration file path")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Print findings without asking")]
    yes: bool,

    #[arg(long, help = "Give up on login after this many status polls")]
    max_polls: Option<u32>,

    #[arg(long, help = "Stay alive after the run until interrupted")]
    wait_for_exit: bool,
}

/// Flags win over file and environment settings.
fn apply_cli(config: &mut FriendscanConfig, cli: &Cli) {
    if let Some(num) = cli.num {
        config.probe.batch_size = num;
    }
    if let Some(delay) = cli.delay {
        config.probe.inter_batch_delay_secs = delay;
    }
    if let Some(width) = cli.progress {
        config.probe.progress_width = width;
    }
    if let Some(retry) = cli.retry {
        config.probe.max_attempts = retry.saturating_add(1);
    }
    if let Some(device_id) = &cli.device_id {
        config.session.device_id = device_id.clone();
    }
    if let Some(max_polls) = cli.max_polls {
        config.session.max_login_polls = max_polls;
    }
    if cli.debug {
        config.debug.dump_responses = true;
        config.logging.level = "debug".to_string();
    }
}

fn load_config(cli: &Cli) -> Result<FriendscanConfig> {
    let manager =
        ConfigManager::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let mut config = manager.into_config();
    apply_cli(&mut config, cli);
    ConfigManager::validate_config(&config).context("Invalid command line settings")?;
    Ok(config)
}

type LogHandle = reload::Handle<EnvFilter, Registry>;

/// `RUST_LOG` wins over the configured level.
fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// The filter sits behind a reload handle so the level from the config
/// file can replace the startup level once configuration is loaded.
fn build_subscriber(
    filter: EnvFilter,
) -> (impl tracing::Subscriber + Send + Sync + 'static, LogHandle) {
    let (filter, handle) = reload::Layer::new(filter);
    let subscriber = Registry::default()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false));
    (subscriber, handle)
}

/// Batch progress drawn as `[####------] 34/70 1 found`.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new(width: usize) -> Self {
        Self::with_draw_target(width, ProgressDrawTarget::stderr())
    }

    fn with_draw_target(width: usize, target: ProgressDrawTarget) -> Self {
        let template = format!("[{{bar:{}}}] {{pos}}/{{len}} {{msg}}", width);
        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#-");

        let bar = ProgressBar::with_draw_target(None, target);
        bar.set_style(style);
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish();
    }
}

impl ProgressSink for BarProgress {
    fn report(&self, update: &ProgressUpdate) {
        self.bar.set_length(update.total as u64);
        self.bar.set_position(update.processed as u64);
        self.bar.set_message(format!("{} found", update.findings));
    }
}

fn dump_for(config: &FriendscanConfig) -> Option<ResponseDump> {
    if !config.debug.dump_responses {
        return None;
    }
    let dir = config
        .debug
        .dump_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    Some(ResponseDump::new(dir))
}

async fn run(config: &FriendscanConfig, assume_yes: bool) -> Result<()> {
    let transport: Arc<dyn Transport> = Arc::new(
        HttpTransport::new(&config.transport).context("Failed to build HTTP client")?,
    );

    let dump = dump_for(config);
    if let Some(dump) = &dump {
        info!("Dumping raw responses to {}", dump.dir().display());
    }

    let mut login = QrLogin::new(transport.clone(), QR_IMAGE)
        .with_max_polls(config.session.max_login_polls);
    if let Some(dump) = &dump {
        login = login.with_dump(dump.clone());
    }
    let session = login
        .login(&config.session.device_id)
        .await
        .context("Login failed")?;
    info!("Logged in");

    let mut api =
        WebApi::new(transport, session).with_status_codes(config.probe.status_codes());
    if let Some(dump) = dump {
        api = api.with_dump(dump);
    }

    let self_id = api.init().await.context("Session initialisation failed")?;
    let contacts = api
        .list_contacts()
        .await
        .context("Fetching the contact list failed")?;
    info!("Fetched {} contacts", contacts.contacts.len());

    let progress = Arc::new(BarProgress::new(config.probe.progress_width));
    let engine = ProbeEngine::new(
        Arc::new(api),
        Arc::new(TokioSleeper),
        ProbeSettings::from_config(&config.probe),
    )
    .with_progress(progress.clone());

    let report = engine
        .run(&self_id, &contacts.contacts)
        .await
        .context("Probe aborted")?;
    progress.finish();
    if let Some(group_id) = &report.group_id {
        info!(
            "Probe group {} is left empty in your chat list; delete it whenever you like",
            group_id
        );
    }

    present(&report.findings, assume_yes)
}

fn present(findings: &FindingSet, assume_yes: bool) -> Result<()> {
    if findings.is_empty() {
        println!("{}", NOTHING_FOUND.green().bold());
        return Ok(());
    }

    let show = assume_yes
        || Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(confirmation_prompt(findings))
            .default(true)
            .interact()?;
    if !show {
        println!("{}", DECLINED.yellow());
        return Ok(());
    }

    let lines = render_findings(findings);
    if let Some((header, rest)) = lines.split_first() {
        println!("{}", header.red().bold());
        for line in rest {
            println!("{}", line);
        }
    }
    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(_) => {
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let startup_level = if cli.debug { "debug" } else { "info" };
    let (subscriber, log_handle) = build_subscriber(log_filter(startup_level));
    tracing::subscriber::set_global_default(subscriber).ok();

    let config = load_config(&cli)?;
    if let Err(e) = log_handle.reload(log_filter(&config.logging.level)) {
        warn!("Could not apply log level {}: {}", config.logging.level, e);
    }

    if let Err(e) = run(&config, cli.yes).await {
        error!("{:#}", e);
        eprintln!("{} {:#}", "✗".red(), e);
    }

    if cli.wait_for_exit {
        println!("{}", "Press Ctrl+C to exit".dimmed());
        wait_for_shutdown().await;
    }

    Ok(())
}
