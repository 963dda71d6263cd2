//! Bank-file import: parser registry, staging-directory scan, and the
//! processed-file move.
//!
//! Inbound bank exports land under `<root>/import/`. After an agent has
//! posted their transactions, the file is moved to `import/processed/` by
//! atomic rename so a crashed run never half-consumes a file.

mod chase;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub use chase::ChaseParser;

use crate::model::BankTransaction;

const IMPORT_DIR: &str = "import";
const PROCESSED_DIR: &str = "import/processed";

/// Error raised by import operations.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
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

    /// The underlying CSV reader failed.
    #[error("reading bank rows: {0}")]
    Csv(#[from] csv::Error),

    /// A row did not have the format's expected field count.
    #[error("row {row}: expected {expected} fields, got {found}")]
    RowShape {
        /// 1-based row number, header included.
        row: usize,
        /// Field count the format requires.
        expected: usize,
        /// Field count actually present.
        found: usize,
    },

    /// A date cell did not parse in the format's date layout.
    #[error("row {row}: parsing date {text:?}: {source}")]
    Date {
        /// 1-based row number.
        row: usize,
        /// The offending cell.
        text: String,
        /// The underlying parse error.
        source: chrono::ParseError,
    },

    /// An amount cell did not parse as a decimal.
    #[error("row {row}: parsing amount {text:?}: {source}")]
    Amount {
        /// 1-based row number.
        row: usize,
        /// The offending cell.
        text: String,
        /// The underlying parse error.
        source: rust_decimal::Error,
    },
}

/// A bank-export parser for one institution's format.
pub trait BankParser: Send + Sync {
    /// The registry key, e.g. `"chase"`.
    fn format(&self) -> &'static str;

    /// Parse a full export stream into transactions.
    ///
    /// # Errors
    ///
    /// Returns an [`ImportError`] identifying the first malformed row.
    fn parse(&self, reader: &mut dyn io::Read) -> Result<Vec<BankTransaction>, ImportError>;
}

/// Named parser registry, immutable after startup.
#[derive(Default)]
pub struct ParserRegistry {
    parsers: std::collections::HashMap<String, Box<dyn BankParser>>,
}

impl ParserRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in parser.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ChaseParser));
        registry
    }

    /// Add a parser under its format name (case-insensitive).
    ///
    /// # Panics
    ///
    /// Panics if a parser is already registered for the format; registration
    /// happens once at startup, so a duplicate is a wiring bug.
    pub fn register(&mut self, parser: Box<dyn BankParser>) {
        let key = parser.format().to_lowercase();
        assert!(
            self.parsers.insert(key.clone(), parser).is_none(),
            "duplicate parser format: {key}"
        );
    }

    /// Look up a parser by format name (case-insensitive).
    #[must_use]
    pub fn get(&self, format: &str) -> Option<&dyn BankParser> {
        self.parsers
            .get(&format.to_lowercase())
            .map(|parser| &**parser)
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("formats", &self.parsers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A bank file waiting in the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// File name without directory.
    pub name: String,
    /// Full path.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
}

/// List the `.csv` files in `<root>/import/`. A missing staging directory
/// yields an empty list.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be read.
pub fn scan(root: impl AsRef<Path>) -> Result<Vec<StagedFile>, ImportError> {
    let dir = root.as_ref().join(IMPORT_DIR);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(ImportError::Io {
                action: "reading import dir",
                path: dir,
                source,
            });
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ImportError::Io {
            action: "reading import dir",
            path: dir.clone(),
            source,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.to_lowercase().ends_with(".csv") {
            continue;
        }
        let metadata = entry.metadata().map_err(|source| ImportError::Io {
            action: "reading metadata for",
            path: entry.path(),
            source,
        })?;
        if metadata.is_dir() {
            continue;
        }
        files.push(StagedFile {
            name,
            path: entry.path(),
            size: metadata.len(),
        });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Move a staged file into `import/processed/` by atomic rename.
///
/// # Errors
///
/// Returns an error if the processed directory cannot be created or the
/// rename fails (including when the source file does not exist).
pub fn mark_processed(root: impl AsRef<Path>, file_name: &str) -> Result<(), ImportError> {
    let root = root.as_ref();
    let src = root.join(IMPORT_DIR).join(file_name);
    let dst_dir = root.join(PROCESSED_DIR);

    fs::create_dir_all(&dst_dir).map_err(|source| ImportError::Io {
        action: "creating processed dir",
        path: dst_dir.clone(),
        source,
    })?;

    let dst = dst_dir.join(file_name);
    fs::rename(&src, &dst).map_err(|source| ImportError::Io {
        action: "moving to processed",
        path: src,
        source,
    })
}
