//! The runtime façade: primitive registration and argument coercion.
//!
//! A [`Runtime`] owns the services an agent script may touch - journal,
//! chart, importers, config, versioned store - and registers one handler
//! per primitive on a [`Bridge`]. Coercion from JSON scalars to domain
//! types happens here, at the boundary; a coercion failure fails the
//! single call and surfaces to the script as an interpreter exception.
//!
//! The audit log and review queue are per-run vectors handed back to the
//! driver when the run ends; nothing here keeps per-run state that
//! outlives the run.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};

use tally_core::agentlog;
use tally_core::chart::{ChartError, ChartService};
use tally_core::config::{Config, ConfigError, CONFIG_FILE};
use tally_core::import::{self, ParserRegistry};
use tally_core::journal::JournalService;
use tally_core::model::{Account, BankTransaction, EntryStatus, Leg};
use tally_core::vcs::{GitStore, VersionedStore};
use tally_core::amount;

use crate::bridge::{Bridge, PrimitiveError};

/// Error raised while constructing a runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The repository config failed to load.
    #[error("loading config: {0}")]
    Config(#[from] ConfigError),

    /// The chart of accounts failed to load.
    #[error("loading chart of accounts: {0}")]
    Chart(#[from] ChartError),
}

/// Services and per-run state behind the registered primitives.
pub struct Runtime {
    root: PathBuf,
    config: Config,
    chart: Arc<ChartService>,
    journal: JournalService,
    parsers: ParserRegistry,
    store: Box<dyn VersionedStore + Send + Sync>,
    agent_name: String,
    dry_run: bool,
    log: Mutex<Vec<agentlog::Entry>>,
    review_queue: Mutex<Vec<Map<String, Value>>>,
}

impl Runtime {
    /// Load config and chart from a repository root and wire up the
    /// default services.
    ///
    /// # Errors
    ///
    /// Returns an error if the config or chart cannot be loaded.
    pub fn open(
        root: impl Into<PathBuf>,
        agent_name: impl Into<String>,
        dry_run: bool,
    ) -> Result<Arc<Self>, RuntimeError> {
        Self::open_with_store(root, agent_name, dry_run, Box::new(GitStore))
    }

    /// Like [`Runtime::open`], with a caller-supplied versioned store.
    ///
    /// # Errors
    ///
    /// Returns an error if the config or chart cannot be loaded.
    pub fn open_with_store(
        root: impl Into<PathBuf>,
        agent_name: impl Into<String>,
        dry_run: bool,
        store: Box<dyn VersionedStore + Send + Sync>,
    ) -> Result<Arc<Self>, RuntimeError> {
        let root = root.into();
        let config = Config::load(root.join(CONFIG_FILE))?;
        let chart = Arc::new(ChartService::load(&root)?);
        let journal = JournalService::new(&root, chart.clone());

        Ok(Arc::new(Self {
            root,
            config,
            chart,
            journal,
            parsers: ParserRegistry::with_builtins(),
            store,
            agent_name: agent_name.into(),
            dry_run,
            log: Mutex::new(Vec::new()),
            review_queue: Mutex::new(Vec::new()),
        }))
    }

    /// Register every primitive on the bridge. One explicit list keeps the
    /// whitelist reported to the sandbox deterministic.
    pub fn register_all(runtime: &Arc<Self>, bridge: &Bridge) {
        type Handler = fn(&Runtime, &[Value], &Map<String, Value>) -> Result<Value, PrimitiveError>;
        const PRIMITIVES: &[(&str, Handler)] = &[
            ("import_scan", Runtime::import_scan),
            ("import_parse", Runtime::import_parse),
            ("import_mark_processed", Runtime::import_mark_processed),
            ("import_deduplicate", Runtime::import_deduplicate),
            ("journal_add_double", Runtime::journal_add_double),
            ("journal_query", Runtime::journal_query),
            ("accounts_list", Runtime::accounts_list),
            ("accounts_get", Runtime::accounts_get),
            ("accounts_exists", Runtime::accounts_exists),
            ("accounts_by_type", Runtime::accounts_by_type),
            ("config_get", Runtime::config_get),
            ("vcs_commit", Runtime::vcs_commit),
            ("ctx_log", Runtime::ctx_log),
            ("queue_add_review", Runtime::queue_add_review),
            ("ctx_dry_run", Runtime::ctx_dry_run),
        ];

        for (name, handler) in PRIMITIVES {
            let runtime = Arc::clone(runtime);
            let handler = *handler;
            bridge.register_primitive(
                *name,
                Arc::new(move |args, kwargs| handler(&runtime, args, kwargs)),
            );
        }
    }

    /// The audit entries collected during this run.
    #[must_use]
    pub fn collected_log(&self) -> Vec<agentlog::Entry> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The review-queue items collected during this run.
    #[must_use]
    pub fn collected_review_queue(&self) -> Vec<Map<String, Value>> {
        self.review_queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Repository root this runtime operates on.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    // --- Import primitives ---

    fn import_scan(&self, _args: &[Value], _kwargs: &Map<String, Value>) -> Result<Value, PrimitiveError> {
        let files = import::scan(&self.root).map_err(|e| PrimitiveError::from_error(&e))?;
        let result: Vec<Value> = files
            .iter()
            .map(|file| {
                json!({
                    "name": file.name,
                    "path": format!("import/{}", file.name),
                    "size": file.size,
                })
            })
            .collect();
        Ok(Value::Array(result))
    }

    fn import_parse(&self, args: &[Value], _kwargs: &Map<String, Value>) -> Result<Value, PrimitiveError> {
        let file_name = coerce::arg_string(args, 0, "import_parse requires a filename argument")?;
        let format = match args.get(1) {
            Some(value) => coerce::as_string(value, "format")?,
            None => "chase".to_string(),
        };

        let parser = self
            .parsers
            .get(&format)
            .ok_or_else(|| PrimitiveError::new(format!("no parser for format {format}")))?;

        let path = self.root.join("import").join(&file_name);
        let mut file = std::fs::File::open(&path)
            .map_err(|e| PrimitiveError::new(format!("open {file_name}: {e}")))?;

        let transactions = parser
            .parse(&mut file)
            .map_err(|e| PrimitiveError::new(format!("parsing {file_name}: {e}")))?;

        Ok(Value::Array(
            transactions.iter().map(transaction_to_value).collect(),
        ))
    }

    fn import_mark_processed(&self, args: &[Value], _kwargs: &Map<String, Value>) -> Result<Value, PrimitiveError> {
        let file_name =
            coerce::arg_string(args, 0, "import_mark_processed requires a filename argument")?;
        import::mark_processed(&self.root, &file_name)
            .map_err(|e| PrimitiveError::from_error(&e))?;
        Ok(json!({"success": true}))
    }

    // Identity for now: the already-imported filter is specified by the
    // data model but not implemented, so callers must not rely on it.
    fn import_deduplicate(&self, args: &[Value], _kwargs: &Map<String, Value>) -> Result<Value, PrimitiveError> {
        Ok(args.first().cloned().unwrap_or_else(|| json!([])))
    }

    // --- Journal primitives ---

    fn journal_add_double(&self, _args: &[Value], kwargs: &Map<String, Value>) -> Result<Value, PrimitiveError> {
        let date = coerce::date_field(kwargs, "date")?;
        let amount = coerce::decimal_field(kwargs, "amount")?;
        let confidence = coerce::decimal_field(kwargs, "confidence")?;

        let status_text = coerce::string_field(kwargs, "status")?;
        let status = if status_text.is_empty() {
            EntryStatus::PendingReview
        } else {
            status_text
                .parse()
                .map_err(|e: tally_core::model::UnknownStatus| PrimitiveError::from_error(&e))?
        };

        let entry_id = self
            .journal
            .add_double(tally_core::journal::AddDoubleParams {
                date,
                description: coerce::string_field(kwargs, "description")?,
                debit_account: coerce::int_field(kwargs, "debit_account")?,
                credit_account: coerce::int_field(kwargs, "credit_account")?,
                amount,
                counterparty: coerce::string_field(kwargs, "counterparty")?,
                reference: coerce::string_field(kwargs, "reference")?,
                confidence,
                status,
                evidence: coerce::string_field(kwargs, "evidence")?,
                tags: coerce::string_field(kwargs, "tags")?,
                notes: coerce::string_field(kwargs, "notes")?,
            })
            .map_err(|e| PrimitiveError::from_error(&e))?;

        Ok(json!({"entry_id": entry_id, "success": true}))
    }

    fn journal_query(&self, _args: &[Value], kwargs: &Map<String, Value>) -> Result<Value, PrimitiveError> {
        let today = chrono::Local::now().date_naive();
        let year = coerce::int_field_or(kwargs, "year", i64::from(today.year()))?;
        let month = coerce::int_field_or(kwargs, "month", i64::from(today.month()))?;
        let status_filter = coerce::string_field(kwargs, "status")?;

        let year = i32::try_from(year)
            .map_err(|_| PrimitiveError::new(format!("year {year} out of range")))?;
        let month = u32::try_from(month)
            .map_err(|_| PrimitiveError::new(format!("month {month} out of range")))?;

        let legs = self
            .journal
            .read_month(year, month)
            .map_err(|e| PrimitiveError::from_error(&e))?;

        let result: Vec<Value> = legs
            .iter()
            .filter(|leg| status_filter.is_empty() || leg.status.as_str() == status_filter)
            .map(leg_to_value)
            .collect();
        Ok(Value::Array(result))
    }

    // --- Chart primitives ---

    fn accounts_list(&self, _args: &[Value], _kwargs: &Map<String, Value>) -> Result<Value, PrimitiveError> {
        Ok(Value::Array(
            self.chart.all().iter().map(account_to_value).collect(),
        ))
    }

    fn accounts_get(&self, args: &[Value], _kwargs: &Map<String, Value>) -> Result<Value, PrimitiveError> {
        let id = coerce::arg_int(args, 0, "accounts_get requires an account ID")?;
        Ok(self
            .chart
            .get(id)
            .map_or_else(|| json!({}), account_to_value))
    }

    fn accounts_exists(&self, args: &[Value], _kwargs: &Map<String, Value>) -> Result<Value, PrimitiveError> {
        let Some(value) = args.first() else {
            return Ok(Value::Bool(false));
        };
        let id = coerce::as_int(value, "account ID")?;
        Ok(Value::Bool(self.chart.get(id).is_some()))
    }

    fn accounts_by_type(&self, args: &[Value], _kwargs: &Map<String, Value>) -> Result<Value, PrimitiveError> {
        let type_text = coerce::arg_string(args, 0, "accounts_by_type requires a type argument")?;
        let account_type = type_text
            .parse()
            .map_err(|e: tally_core::model::UnknownAccountType| PrimitiveError::from_error(&e))?;

        Ok(Value::Array(
            self.chart
                .by_type(account_type)
                .into_iter()
                .map(account_to_value)
                .collect(),
        ))
    }

    // --- Config primitive ---

    fn config_get(&self, args: &[Value], _kwargs: &Map<String, Value>) -> Result<Value, PrimitiveError> {
        let key = coerce::arg_string(args, 0, "config_get requires a key argument")?;
        Ok(self.config.lookup(&key).unwrap_or(Value::Null))
    }

    // --- Versioned-store primitive ---

    fn vcs_commit(&self, args: &[Value], _kwargs: &Map<String, Value>) -> Result<Value, PrimitiveError> {
        let message = coerce::arg_string(args, 0, "vcs_commit requires a message argument")?;
        let hash = self
            .store
            .commit_all(
                &self.root,
                &message,
                &self.config.git.author_name,
                &self.config.git.author_email,
            )
            .map_err(|e| PrimitiveError::from_error(&e))?;
        Ok(json!({"commit_hash": hash, "success": true}))
    }

    // --- Context primitives ---

    fn ctx_log(&self, args: &[Value], _kwargs: &Map<String, Value>) -> Result<Value, PrimitiveError> {
        let message = match args.first() {
            Some(value) => coerce::as_string(value, "message")?,
            None => String::new(),
        };

        self.log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(agentlog::Entry {
                timestamp: Utc::now(),
                agent: self.agent_name.clone(),
                action: "log".to_string(),
                details: message.clone(),
                entry_id: String::new(),
                commit_hash: String::new(),
            });

        eprintln!("  [{}] {message}", self.agent_name);
        Ok(Value::Bool(true))
    }

    fn queue_add_review(&self, _args: &[Value], kwargs: &Map<String, Value>) -> Result<Value, PrimitiveError> {
        let mut queue = self.review_queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.push(kwargs.clone());
        Ok(json!({
            "item_id": format!("q{:03}", queue.len()),
            "success": true,
        }))
    }

    fn ctx_dry_run(&self, _args: &[Value], _kwargs: &Map<String, Value>) -> Result<Value, PrimitiveError> {
        Ok(Value::Bool(self.dry_run))
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("root", &self.root)
            .field("agent_name", &self.agent_name)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

// Scripts consume query results as plain numbers; the float conversion
// below is read-path only - the write path never touches floats.

fn account_to_value(account: &Account) -> Value {
    let mut map = Map::new();
    map.insert("id".into(), json!(account.id));
    map.insert("name".into(), json!(account.name));
    map.insert("type".into(), json!(account.account_type.as_str()));
    if let Some(parent) = account.parent_id {
        map.insert("parent_id".into(), json!(parent));
    }
    if !account.tax_line.is_empty() {
        map.insert("tax_line".into(), json!(account.tax_line));
    }
    if !account.description.is_empty() {
        map.insert("description".into(), json!(account.description));
    }
    Value::Object(map)
}

fn transaction_to_value(transaction: &BankTransaction) -> Value {
    json!({
        "date": transaction.date.format("%Y-%m-%d").to_string(),
        "description": transaction.description,
        "amount": transaction.amount.to_f64().unwrap_or(0.0),
        "reference": transaction.reference,
    })
}

fn leg_to_value(leg: &Leg) -> Value {
    json!({
        "entry_id": leg.entry_id,
        "date": leg.date.format("%Y-%m-%d").to_string(),
        "account_id": leg.account_id,
        "description": leg.description,
        "debit": leg.debit.to_f64().unwrap_or(0.0),
        "credit": leg.credit.to_f64().unwrap_or(0.0),
        "counterparty": leg.counterparty,
        "reference": leg.reference,
        "confidence": leg.confidence.to_f64().unwrap_or(0.0),
        "status": leg.status.as_str(),
        "evidence": leg.evidence,
        "tags": leg.tags,
        "notes": leg.notes,
    })
}

/// JSON-to-domain coercion at the primitive boundary.
mod coerce {
    use super::{amount, Decimal, Map, NaiveDate, PrimitiveError, Value};

    /// A required positional string argument.
    pub fn arg_string(args: &[Value], index: usize, missing: &str) -> Result<String, PrimitiveError> {
        let value = args.get(index).ok_or_else(|| PrimitiveError::new(missing))?;
        as_string(value, "argument")
    }

    /// A required positional integer argument.
    pub fn arg_int(args: &[Value], index: usize, missing: &str) -> Result<i64, PrimitiveError> {
        let value = args.get(index).ok_or_else(|| PrimitiveError::new(missing))?;
        as_int(value, "argument")
    }

    /// A string; null reads as empty.
    pub fn as_string(value: &Value, what: &str) -> Result<String, PrimitiveError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Null => Ok(String::new()),
            other => Err(PrimitiveError::new(format!(
                "{what}: expected string, got {}",
                kind(other)
            ))),
        }
    }

    /// An integer; floats with an integral value are accepted because some
    /// transports deliver numeric ids as floats.
    pub fn as_int(value: &Value, what: &str) -> Result<i64, PrimitiveError> {
        let converted = match value {
            Value::Number(n) => n.as_i64().or_else(|| {
                #[allow(clippy::cast_possible_truncation)]
                n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)
            }),
            _ => None,
        };
        converted.ok_or_else(|| {
            PrimitiveError::new(format!("{what}: expected integer, got {}", kind(value)))
        })
    }

    /// A named string field; missing or null reads as empty.
    pub fn string_field(kwargs: &Map<String, Value>, key: &str) -> Result<String, PrimitiveError> {
        match kwargs.get(key) {
            None => Ok(String::new()),
            Some(value) => as_string(value, key),
        }
    }

    /// A named integer field; missing or null reads as zero.
    pub fn int_field(kwargs: &Map<String, Value>, key: &str) -> Result<i64, PrimitiveError> {
        match kwargs.get(key) {
            None | Some(Value::Null) => Ok(0),
            Some(value) => as_int(value, key),
        }
    }

    /// A named integer field with a default for missing, null, or zero.
    pub fn int_field_or(
        kwargs: &Map<String, Value>,
        key: &str,
        default: i64,
    ) -> Result<i64, PrimitiveError> {
        let value = int_field(kwargs, key)?;
        Ok(if value == 0 { default } else { value })
    }

    /// A named `YYYY-MM-DD` date field.
    pub fn date_field(kwargs: &Map<String, Value>, key: &str) -> Result<NaiveDate, PrimitiveError> {
        let text = match kwargs.get(key) {
            Some(Value::String(s)) => s.as_str(),
            Some(other) => {
                return Err(PrimitiveError::new(format!(
                    "{key}: expected date string, got {}",
                    kind(other)
                )));
            }
            None => {
                return Err(PrimitiveError::new(format!("{key}: required")));
            }
        };
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map_err(|e| PrimitiveError::new(format!("invalid {key}: parsing {text:?}: {e}")))
    }

    /// A named decimal field; missing or null reads as zero. Numbers are
    /// normalized through their textual form, never float arithmetic.
    pub fn decimal_field(kwargs: &Map<String, Value>, key: &str) -> Result<Decimal, PrimitiveError> {
        match kwargs.get(key) {
            None => Ok(Decimal::ZERO),
            Some(value) => amount::amount_from_json(value)
                .map_err(|e| PrimitiveError::new(format!("invalid {key}: {e}"))),
        }
    }

    fn kind(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

}
