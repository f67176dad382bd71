use crate::error::{AppError, AppResult};
use crate::storage::ReminderData;
use std::fs;
use std::path::Path;

/// Load the reminder document from the local JSON file
pub fn load_local(app_data_path: &Path) -> AppResult<ReminderData> {
    let path = app_data_path.join(crate::config::DATA_FILE_NAME);

    if !path.exists() {
        return Ok(ReminderData::default());
    }

    let content = fs::read_to_string(&path).map_err(|e| AppError::storage(e.to_string()))?;

    match serde_json::from_str::<ReminderData>(&content) {
        Ok(data) => Ok(data),
        Err(e) => {
            // A corrupt document is unrecoverable; start fresh rather than
            // refusing to boot the engine.
            log::warn!("reminder document unreadable ({}), starting empty", e);
            Ok(ReminderData::default())
        }
    }
}

/// Save the reminder document to the local JSON file
pub fn save_local(app_data_path: &Path, data: &ReminderData) -> AppResult<()> {
    let path = app_data_path.join(crate::config::DATA_FILE_NAME);
    let content =
        serde_json::to_string_pretty(data).map_err(|e| AppError::storage(e.to_string()))?;
    fs::write(&path, content).map_err(|e| AppError::storage(e.to_string()))?;
    Ok(())
}
