use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use mandeltile_core::ViewState;

/// Settings read from `mandeltile.json`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_rows")]
    pub rows: u32,
    #[serde(default = "default_cols")]
    pub cols: u32,
    /// Compute units in the pool. `None` or `0` means one per CPU.
    #[serde(default)]
    pub workers: Option<usize>,
    /// Starting view. When absent, the initial view for the canvas height.
    #[serde(default)]
    pub initial_view: Option<ViewState>,
}

fn default_width() -> u32 {
    800
}
fn default_height() -> u32 {
    600
}
fn default_rows() -> u32 {
    3
}
fn default_cols() -> u32 {
    4
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            rows: default_rows(),
            cols: default_cols(),
            workers: None,
            initial_view: None,
        }
    }
}

impl RenderConfig {
    /// Load settings from `path`, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!("No config file at {}", path.display());
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str::<RenderConfig>(&json) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    error!("Failed to parse config {}: {e}", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                error!("Failed to read config {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Number of compute units to start.
    pub fn worker_count(&self) -> usize {
        match self.workers {
            Some(n) if n > 0 => n,
            _ => match num_cpus::get() {
                0 => 2,
                n => n,
            },
        }
    }

    /// The view to start from on this canvas.
    pub fn start_view(&self) -> ViewState {
        self.initial_view
            .unwrap_or_else(|| ViewState::initial(self.height))
    }
}

/// `mandeltile.json` next to the executable, or in the working directory if
/// the executable's location is unknown.
pub fn default_config_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
        .join("mandeltile.json")
}
