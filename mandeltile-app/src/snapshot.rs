//! The rendered view, saved as JSON so a later run can pick up from it.

use std::fs;
use std::path::Path;

use tracing::debug;

use mandeltile_core::ViewState;

use crate::AppError;

pub fn save(path: &Path, view: &ViewState) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(view)?)?;
    debug!("Saved view snapshot to {}", path.display());
    Ok(())
}

pub fn load(path: &Path) -> Result<ViewState, AppError> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}
