//! Per-item append-only price change logs

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::info;

use crate::shared::errors::ChangeLogError;
use crate::shared::types::{Eur, Quote};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Bytes read per step when scanning a log backwards
const TAIL_CHUNK: u64 = 4096;

/// Writes one text file per item under `log_dir`.
#[derive(Debug, Clone)]
pub struct ChangeLog {
    log_dir: PathBuf,
}

impl ChangeLog {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self { log_dir: log_dir.into() }
    }

    pub fn path_for(&self, item_name: &str) -> PathBuf {
        self.log_dir.join(log_file_name(item_name))
    }

    /// Last non-empty line of the item's log, if the log exists.
    pub fn last_entry(&self, item_name: &str) -> Result<Option<String>, ChangeLogError> {
        let path = self.path_for(item_name);
        match read_last_line(&path) {
            Ok(line) => Ok(line),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ChangeLogError::Io { path, source }),
        }
    }

    /// Append `old -> new` to the item's log unless its last entry already
    /// ends at `new`. Returns whether a line was written.
    pub fn record(&self, item_name: &str, old: &Quote, new: &Quote) -> Result<bool, ChangeLogError> {
        self.ensure_dir()?;

        if let Some(last) = self.last_entry(item_name)? {
            if entry_ends_at(&last, new.price) {
                info!("ℹ️ No change to log for {}", item_name);
                return Ok(false);
            }
        }

        let entry = format_entry(old, new);
        let path = self.path_for(item_name);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| writeln!(file, "{}", entry))
            .map_err(|source| ChangeLogError::Io { path, source })?;

        info!("📝 Logged change for {}: {}", item_name, entry);
        Ok(true)
    }

    fn ensure_dir(&self) -> Result<(), ChangeLogError> {
        if self.log_dir.exists() && !self.log_dir.is_dir() {
            return Err(ChangeLogError::NotADirectory(self.log_dir.clone()));
        }
        fs::create_dir_all(&self.log_dir).map_err(|source| ChangeLogError::Io {
            path: self.log_dir.clone(),
            source,
        })
    }
}

/// Read backwards from the end of the file until the last non-empty line
/// is complete, so the cost does not grow with the log.
fn read_last_line(path: &Path) -> io::Result<Option<String>> {
    let mut file = File::open(path)?;
    let mut pos = file.metadata()?.len();
    let mut tail: Vec<u8> = Vec::new();

    loop {
        if let Some(end) = tail.iter().rposition(|b| !b.is_ascii_whitespace()) {
            let end = end + 1;
            match tail[..end].iter().rposition(|&b| b == b'\n') {
                Some(start) => return Ok(Some(trimmed_line(&tail[start + 1..end]))),
                None if pos == 0 => return Ok(Some(trimmed_line(&tail[..end]))),
                None => {}
            }
        } else if pos == 0 {
            return Ok(None);
        }

        let step = TAIL_CHUNK.min(pos);
        pos -= step;
        file.seek(SeekFrom::Start(pos))?;
        let mut chunk = vec![0u8; step as usize];
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&tail);
        tail = chunk;
    }
}

fn trimmed_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// Item name with `|` removed and spaces (and path separators) turned into `_`.
pub fn log_file_name(item_name: &str) -> String {
    let key: String = item_name
        .chars()
        .filter(|&c| c != '|')
        .map(|c| if matches!(c, ' ' | '/' | '\\') { '_' } else { c })
        .collect();
    format!("{}.txt", key)
}

/// `"100.00 € (2026-10-19 12:00:00) -> 112.00 € (2026-10-19 12:05:00)"`
pub fn format_entry(old: &Quote, new: &Quote) -> String {
    format!(
        "{} ({}) -> {} ({})",
        Eur(old.price),
        old.observed_at.format(TIMESTAMP_FORMAT),
        Eur(new.price),
        new.observed_at.format(TIMESTAMP_FORMAT)
    )
}

/// New price of a log line written by [`format_entry`].
pub fn entry_new_price(line: &str) -> Option<Decimal> {
    let (_, new_part) = line.rsplit_once("->")?;
    let (amount, _) = new_part.split_once('€')?;
    Decimal::from_str(amount.trim()).ok()
}

fn entry_ends_at(line: &str, price: Decimal) -> bool {
    match entry_new_price(line) {
        Some(last) => last == price,
        None => line.contains(&Eur(price).to_string()),
    }
}
