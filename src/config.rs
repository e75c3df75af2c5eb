use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_COMMAND: &str = "rivalcfg";
const DEFAULT_ARGS: &[&str] = &["--battery-level"];
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const ASSET_DIR_NAME: &str = "batticons";

/// Runtime settings. There is no config file; everything here is a
/// compile-time default apart from the asset directory, which is located
/// relative to the install.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub command: String,
    pub args: Vec<String>,
    pub poll_interval: Duration,
    /// `None` when no asset directory was found; icons are then generated.
    pub asset_dir: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.into(),
            args: DEFAULT_ARGS.iter().map(|a| a.to_string()).collect(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            asset_dir: None,
        }
    }
}

/// Candidate asset directories, most specific first:
///   1. `batticons/` next to the executable
///   2. `<data_dir>/rivalcfg-tray/batticons`
///   3. `../share/rivalcfg-tray/batticons` relative to the executable
fn asset_candidates(exe_dir: Option<&Path>, data_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = exe_dir {
        candidates.push(dir.join(ASSET_DIR_NAME));
    }
    if let Some(dir) = data_dir {
        candidates.push(dir.join("rivalcfg-tray").join(ASSET_DIR_NAME));
    }
    if let Some(dir) = exe_dir {
        candidates.push(
            dir.join("..")
                .join("share")
                .join("rivalcfg-tray")
                .join(ASSET_DIR_NAME),
        );
    }
    candidates
}

fn find_asset_dir(candidates: Vec<PathBuf>) -> Option<PathBuf> {
    candidates.into_iter().find(|c| c.is_dir())
}

/// Build the monitor config and locate the icon assets.
pub fn load() -> MonitorConfig {
    let exe_dir = match std::env::current_exe() {
        Ok(exe) => exe.parent().map(Path::to_path_buf),
        Err(e) => {
            warn!(error = %e, "could not resolve executable path");
            None
        }
    };
    let data_dir = dirs::data_dir();

    let asset_dir = find_asset_dir(asset_candidates(exe_dir.as_deref(), data_dir.as_deref()));
    match &asset_dir {
        Some(dir) => info!(path = %dir.display(), "found icon assets"),
        None => info!("no icon asset directory found, using generated icons"),
    }

    MonitorConfig {
        asset_dir,
        ..MonitorConfig::default()
    }
}
