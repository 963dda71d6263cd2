//! Agent audit log.
//!
//! Every agent run appends the actions it took to
//! `<root>/logs/agent-log.csv`: six columns, ISO-8601 UTC timestamps with a
//! `Z` suffix. The file and its header are created on first append.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

/// Relative path of the audit log inside a repository.
pub const LOG_PATH: &str = "logs/agent-log.csv";

const NUM_FIELDS: usize = 6;

const HEADER: [&str; NUM_FIELDS] = [
    "timestamp",
    "agent",
    "action",
    "details",
    "entry_id",
    "commit_hash",
];

/// One audited action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// When the action happened.
    pub timestamp: DateTime<Utc>,
    /// Name of the agent that acted.
    pub agent: String,
    /// Short action verb (`log`, `import`, `commit`, ...).
    pub action: String,
    /// Free-form detail.
    pub details: String,
    /// Related journal entry id, if any.
    pub entry_id: String,
    /// Related versioned-store commit hash, if any.
    pub commit_hash: String,
}

/// Error raised by audit-log operations.
#[derive(Debug, thiserror::Error)]
pub enum AgentLogError {
    /// A filesystem operation failed.
    #[error("{action} {path}: {source}")]
    Io {
        /// What was being attempted.
        action: &'static str,
        /// The path involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The underlying CSV reader or writer failed.
    #[error("reading agent log rows: {0}")]
    Csv(#[from] csv::Error),

    /// A row did not have exactly six fields.
    #[error("row {row}: expected {NUM_FIELDS} fields, got {found}")]
    RowShape {
        /// 1-based row number, header included.
        row: usize,
        /// Field count actually present.
        found: usize,
    },

    /// A timestamp cell did not parse as RFC 3339.
    #[error("row {row}: parsing timestamp {text:?}: {source}")]
    Timestamp {
        /// 1-based row number.
        row: usize,
        /// The offending cell.
        text: String,
        /// The underlying parse error.
        source: chrono::ParseError,
    },
}

/// Append entries to `<root>/logs/agent-log.csv`, creating the directory,
/// file, and header as needed.
///
/// # Errors
///
/// Returns an error if the log cannot be opened or written.
pub fn append(root: impl AsRef<Path>, entries: &[Entry]) -> Result<(), AgentLogError> {
    let path = root.as_ref().join(LOG_PATH);
    let dir = path.parent().expect("log path has a parent");
    fs::create_dir_all(dir).map_err(|source| AgentLogError::Io {
        action: "creating logs dir",
        path: dir.to_path_buf(),
        source,
    })?;

    let needs_header = !path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| AgentLogError::Io {
            action: "opening agent log",
            path: path.clone(),
            source,
        })?;

    let mut csv_writer = csv::Writer::from_writer(file);
    if needs_header {
        csv_writer.write_record(HEADER)?;
    }
    for entry in entries {
        csv_writer.write_record(&encode_entry(entry))?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Read all entries from `<root>/logs/agent-log.csv`. A missing log yields
/// an empty list.
///
/// # Errors
///
/// Returns an error if the log exists but cannot be read or decoded.
pub fn read(root: impl AsRef<Path>) -> Result<Vec<Entry>, AgentLogError> {
    let path = root.as_ref().join(LOG_PATH);
    let file = match fs::File::open(&path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(AgentLogError::Io {
                action: "opening agent log",
                path,
                source,
            });
        }
    };
    read_entries(file)
}

fn read_entries<R: io::Read>(reader: R) -> Result<Vec<Entry>, AgentLogError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut entries = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let row = index + 1;
        let record = record?;
        if record.len() != NUM_FIELDS {
            return Err(AgentLogError::RowShape {
                row,
                found: record.len(),
            });
        }
        if row == 1 {
            continue; // header
        }
        entries.push(decode_entry(&record, row)?);
    }
    Ok(entries)
}

fn encode_entry(entry: &Entry) -> [String; NUM_FIELDS] {
    [
        entry
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        entry.agent.clone(),
        entry.action.clone(),
        entry.details.clone(),
        entry.entry_id.clone(),
        entry.commit_hash.clone(),
    ]
}

fn decode_entry(record: &csv::StringRecord, row: usize) -> Result<Entry, AgentLogError> {
    let timestamp_text = &record[0];
    let timestamp = DateTime::parse_from_rfc3339(timestamp_text)
        .map_err(|source| AgentLogError::Timestamp {
            row,
            text: timestamp_text.to_string(),
            source,
        })?
        .with_timezone(&Utc);

    Ok(Entry {
        timestamp,
        agent: record[1].to_string(),
        action: record[2].to_string(),
        details: record[3].to_string(),
        entry_id: record[4].to_string(),
        commit_hash: record[5].to_string(),
    })
}
