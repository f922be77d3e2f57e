/// Path constants and utilities for the outreach engine
use std::path::PathBuf;
use once_cell::sync::OnceCell;

// Static storage for configurable data root
static DATA_ROOT: OnceCell<String> = OnceCell::new();

// Static storage for configurable logs root
static LOGS_ROOT: OnceCell<String> = OnceCell::new();

// Static storage for configurable templates root
static TEMPLATES_ROOT: OnceCell<String> = OnceCell::new();

// Default root constants
const DEFAULT_DATA_ROOT: &str = "/data/outreach";
const DEFAULT_LOGS_ROOT: &str = "/logs";
const DEFAULT_TEMPLATES_ROOT: &str = "/app/templates";
pub const APP_ROOT: &str = "/app";

/// Initialize the data root directory. Can only be called once.
/// If not called, the default `/data/outreach` will be used.
pub fn init_data_root(path: String) -> Result<(), String> {
    DATA_ROOT.set(path).map_err(|_| "Data root already initialized".to_string())
}

/// Initialize the logs root directory. Can only be called once.
pub fn init_logs_root(path: String) -> Result<(), String> {
    LOGS_ROOT.set(path).map_err(|_| "Logs root already initialized".to_string())
}

/// Initialize the templates root directory. Can only be called once.
pub fn init_templates_root(path: String) -> Result<(), String> {
    TEMPLATES_ROOT.set(path).map_err(|_| "Templates root already initialized".to_string())
}

fn get_data_root() -> &'static str {
    DATA_ROOT.get().map(|s| s.as_str()).unwrap_or(DEFAULT_DATA_ROOT)
}

fn get_logs_root() -> &'static str {
    LOGS_ROOT.get().map(|s| s.as_str()).unwrap_or(DEFAULT_LOGS_ROOT)
}

fn get_templates_root() -> &'static str {
    TEMPLATES_ROOT.get().map(|s| s.as_str()).unwrap_or(DEFAULT_TEMPLATES_ROOT)
}

// Directory names (relative to roots)
pub const TRIGGERS_DIR_NAME: &str = "triggers";
pub const PROCESSED_DIR_NAME: &str = "processed";
pub const FAILED_DIR_NAME: &str = "failed";
pub const TEMP_DOCUMENTS_DIR_NAME: &str = "temp_pdfs";
pub const CONFIG_DIR_NAME: &str = "config";

pub const PROGRESS_LOG_FILE_NAME: &str = "progress.jsonl";

// Path builder functions
pub fn data_root() -> PathBuf {
    PathBuf::from(get_data_root())
}

pub fn triggers_dir() -> PathBuf {
    data_root().join(TRIGGERS_DIR_NAME)
}

pub fn triggers_processed_dir() -> PathBuf {
    triggers_dir().join(PROCESSED_DIR_NAME)
}

pub fn triggers_failed_dir() -> PathBuf {
    triggers_dir().join(FAILED_DIR_NAME)
}

/// Letters are staged here between generation and send
pub fn temp_documents_dir() -> PathBuf {
    data_root().join(TEMP_DOCUMENTS_DIR_NAME)
}

pub fn app_root() -> PathBuf {
    PathBuf::from(APP_ROOT)
}

pub fn config_dir() -> PathBuf {
    app_root().join(CONFIG_DIR_NAME)
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("outreach.json")
}

pub fn templates_dir() -> PathBuf {
    PathBuf::from(get_templates_root())
}

pub fn logs_root() -> PathBuf {
    PathBuf::from(get_logs_root())
}

pub fn progress_log_path() -> PathBuf {
    logs_root().join(PROGRESS_LOG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_dirs_nest_under_data_root() {
        assert!(triggers_dir().starts_with(data_root()));
        assert!(triggers_processed_dir().ends_with("triggers/processed"));
        assert!(triggers_failed_dir().ends_with("triggers/failed"));
    }

    #[test]
    fn test_temp_documents_under_data_root() {
        assert_eq!(temp_documents_dir(), data_root().join("temp_pdfs"));
    }
}
