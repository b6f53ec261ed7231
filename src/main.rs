use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use clap::Parser;
use log::{error, info};

use smartir_listener::checkpoint::CheckpointStore;
use smartir_listener::device::{create_device, CodeCapture, DeviceType};
use smartir_listener::profile::SmartIrDoc;
use smartir_listener::session::{Console, Session, SessionError};
use smartir_listener::skip::SkipPolicy;

/// Learn a climate device's full IR command matrix into a SmartIR json file.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// SmartIR json template describing the combinations to learn
    json_file: PathBuf,

    /// Transceiver to learn from, e.g. broadlink:192.168.1.10 or lines:base64
    #[arg(short, long)]
    device: DeviceType,

    /// Operating mode whose IR code does not change with temperature (repeatable)
    #[arg(long = "no-temp-on-mode", value_name = "MODE")]
    no_temp_on_mode: Vec<String>,

    /// Operating mode whose IR code does not change with swing position (repeatable)
    #[arg(long = "no-swing-on-mode", value_name = "MODE")]
    no_swing_on_mode: Vec<String>,

    /// Seconds to wait for each IR code
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

fn run(cli: Cli, cancel: Arc<AtomicBool>) -> anyhow::Result<PathBuf> {
    let doc = SmartIrDoc::load(&cli.json_file)?;
    let policy = SkipPolicy::new(&doc.profile, cli.no_temp_on_mode, cli.no_swing_on_mode)?;

    let mut capture = CodeCapture::new(create_device(cli.device), Duration::from_secs(cli.timeout));
    if !capture.authenticate()? {
        bail!("transceiver authentication failed");
    }

    let store = CheckpointStore::new(&cli.json_file);
    let mut session = Session::new(doc, policy, capture, store, Console::stdio(), cancel)?;
    Ok(session.run()?)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        error!("failed to install the signal handler: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli, cancel) {
        Ok(path) => {
            info!("SmartIR file complete: {}", path.display());
            ExitCode::SUCCESS
        }
        // interruption gets its own exit status so wrappers can tell a
        // resumable abort from a hard failure
        Err(err) if is_cancelled(&err) => {
            error!("{err}");
            ExitCode::from(2)
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn is_cancelled(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref(), Some(SessionError::Cancelled))
}
