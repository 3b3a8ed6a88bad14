// Configuration: the application credentials file, the per-run settings
// and loading of the phone number list.

use crate::error::AppError;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "config.txt";
pub const DEFAULT_INPUT_FILE: &str = "numbers.txt";
pub const DEFAULT_EXISTING_FILE: &str = "existing_results.csv";
pub const DEFAULT_NON_EXISTING_FILE: &str = "non_existing_results.csv";
pub const DEFAULT_DELAY_SECS: u64 = 7;
const SESSION_FILE_NAME: &str = ".phonecheck_session";

/// Application id and secret issued by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_id: i32,
    pub api_hash: String,
}

impl Credentials {
    /// Parse either `API_ID=`/`API_HASH=` pairs or two bare lines
    /// (id first). Returns `None` when the text holds no usable pair.
    pub fn parse(text: &str) -> Option<Self> {
        let lines: Vec<&str> = text
            .lines()
            .map(|l| l.trim().trim_start_matches('\u{feff}'))
            .filter(|l| !l.is_empty())
            .collect();

        let mut api_id = None;
        let mut api_hash = None;
        for line in &lines {
            if let Some((key, value)) = line.split_once('=') {
                match key.trim() {
                    "API_ID" => api_id = value.trim().parse().ok(),
                    "API_HASH" => api_hash = Some(value.trim().to_string()),
                    _ => {}
                }
            }
        }
        if let (Some(api_id), Some(api_hash)) = (api_id, api_hash.filter(|h| !h.is_empty())) {
            return Some(Credentials { api_id, api_hash });
        }

        match lines.as_slice() {
            [id, hash, ..] if !hash.contains('=') => Some(Credentials {
                api_id: id.parse().ok()?,
                api_hash: hash.to_string(),
            }),
            _ => None,
        }
    }

    /// Read credentials from `path`; `Ok(None)` if the file is absent or
    /// does not contain a valid pair.
    pub fn load(path: &Path) -> Result<Option<Self>, AppError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::io(path, e)),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        let text = format!("API_ID={}\nAPI_HASH={}\n", self.api_id, self.api_hash);
        fs::write(path, text).map_err(|e| AppError::io(path, e))
    }
}

/// Settings for one run, passed to the driver at construction.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub existing_output: PathBuf,
    pub non_existing_output: PathBuf,
    pub session_path: PathBuf,
    pub delay: Duration,
    pub invite_target: Option<String>,
    /// Start both result files afresh instead of appending.
    pub fresh_outputs: bool,
}

/// Session token store in the user's home directory.
pub fn default_session_path() -> PathBuf {
    let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.join(SESSION_FILE_NAME)
}

/// A phone number and its 1-based position in the input list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneRecord {
    pub phone: String,
    pub position: usize,
}

/// Split input text into records: lines trimmed, blanks skipped.
pub fn parse_records(text: &str) -> Vec<PhoneRecord> {
    text.lines()
        .map(|l| l.trim().trim_start_matches('\u{feff}'))
        .filter(|l| !l.is_empty())
        .enumerate()
        .map(|(i, phone)| PhoneRecord {
            phone: phone.to_string(),
            position: i + 1,
        })
        .collect()
}

/// Load the input list. A missing file is created empty so the operator
/// has somewhere to put numbers; both that and an empty list end the run.
pub fn load_records(path: &Path) -> Result<Vec<PhoneRecord>, AppError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            fs::write(path, "").map_err(|e| AppError::io(path, e))?;
            return Err(AppError::InputMissing(path.to_path_buf()));
        }
        Err(e) => return Err(AppError::io(path, e)),
    };
    let records = parse_records(&text);
    if records.is_empty() {
        return Err(AppError::EmptyInput(path.to_path_buf()));
    }
    Ok(records)
}

/// Session token persistence, reused across runs.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TokenStore { path: path.into() }
    }

    pub fn load(&self) -> Option<String> {
        fs::read_to_string(&self.path)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    pub fn save(&self, token: &str) -> Result<(), AppError> {
        fs::write(&self.path, token).map_err(|e| AppError::io(&self.path, e))
    }
}
