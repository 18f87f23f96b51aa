//! Structured event capture for market runs.
//!
//! [`TableRecorder`] is a `tracing` subscriber that turns INFO-or-higher events
//! into column tables, one table per event target. Columns appear the first
//! time a field is seen; rows missing a field are padded with a default.
//!
//! ```ignore
//! let recorder = instrument::TableRecorder::new();
//! tracing::subscriber::with_default(recorder.clone(), || {
//!     tracing::info!(target: "clearing", pass = 1u64, price = 10.0);
//! });
//! let clearing = recorder.table("clearing").unwrap();
//! assert_eq!(clearing.f64s("price"), vec![10.0]);
//! ```
//!
//! The recorder is `Clone` and shares its tables, so events emitted on other
//! threads land in the same place as long as those threads run under it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Record};
use tracing::{Event, Id, Metadata, Subscriber};

// === VALUES & COLUMNS ===

/// One recorded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    U64(u64),
    I64(i64),
    F64(f64),
    Bool(bool),
    Str(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::U64(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
        }
    }
}

/// A column of typed values.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedColumn {
    U64(Vec<u64>),
    I64(Vec<i64>),
    F64(Vec<f64>),
    Bool(Vec<bool>),
    Str(Vec<String>),
}

impl TypedColumn {
    /// Empty column of `value`'s type, pre-padded to `rows`.
    fn for_value(value: &Value, rows: usize) -> Self {
        match value {
            Value::U64(_) => TypedColumn::U64(vec![0; rows]),
            Value::I64(_) => TypedColumn::I64(vec![0; rows]),
            Value::F64(_) => TypedColumn::F64(vec![0.0; rows]),
            Value::Bool(_) => TypedColumn::Bool(vec![false; rows]),
            Value::Str(_) => TypedColumn::Str(vec![String::new(); rows]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TypedColumn::U64(v) => v.len(),
            TypedColumn::I64(v) => v.len(),
            TypedColumn::F64(v) => v.len(),
            TypedColumn::Bool(v) => v.len(),
            TypedColumn::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn pad_to(&mut self, rows: usize) {
        let padding = rows.saturating_sub(self.len());
        if padding == 0 {
            return;
        }
        match self {
            TypedColumn::U64(v) => v.extend(std::iter::repeat_n(0, padding)),
            TypedColumn::I64(v) => v.extend(std::iter::repeat_n(0, padding)),
            TypedColumn::F64(v) => v.extend(std::iter::repeat_n(0.0, padding)),
            TypedColumn::Bool(v) => v.extend(std::iter::repeat_n(false, padding)),
            TypedColumn::Str(v) => v.extend(std::iter::repeat_n(String::new(), padding)),
        }
    }

    /// Append a value, widening the column when the types disagree:
    /// integers widen to `I64` or `F64`, anything else falls back to strings.
    fn push(&mut self, value: Value) {
        self.widen_for(&value);
        match (self, value) {
            (TypedColumn::U64(v), Value::U64(x)) => v.push(x),
            (TypedColumn::I64(v), Value::I64(x)) => v.push(x),
            (TypedColumn::I64(v), Value::U64(x)) => v.push(x as i64),
            (TypedColumn::F64(v), Value::F64(x)) => v.push(x),
            (TypedColumn::F64(v), Value::U64(x)) => v.push(x as f64),
            (TypedColumn::F64(v), Value::I64(x)) => v.push(x as f64),
            (TypedColumn::Bool(v), Value::Bool(x)) => v.push(x),
            (TypedColumn::Str(v), x) => v.push(x.to_string()),
            // widen_for leaves only the pairs above
            _ => {}
        }
    }

    fn widen_for(&mut self, value: &Value) {
        let widened = match (&*self, value) {
            (TypedColumn::U64(_), Value::U64(_))
            | (TypedColumn::I64(_), Value::I64(_) | Value::U64(_))
            | (TypedColumn::F64(_), Value::F64(_) | Value::U64(_) | Value::I64(_))
            | (TypedColumn::Bool(_), Value::Bool(_))
            | (TypedColumn::Str(_), _) => return,
            (TypedColumn::U64(v), Value::I64(_)) => {
                TypedColumn::I64(v.iter().map(|&u| u as i64).collect())
            }
            (TypedColumn::U64(_) | TypedColumn::I64(_), Value::F64(_)) => {
                TypedColumn::F64(self.to_f64s())
            }
            _ => TypedColumn::Str(self.to_strings()),
        };
        *self = widened;
    }

    fn to_f64s(&self) -> Vec<f64> {
        match self {
            TypedColumn::U64(v) => v.iter().map(|&x| x as f64).collect(),
            TypedColumn::I64(v) => v.iter().map(|&x| x as f64).collect(),
            TypedColumn::F64(v) => v.clone(),
            TypedColumn::Bool(v) => v.iter().map(|&x| if x { 1.0 } else { 0.0 }).collect(),
            TypedColumn::Str(v) => v.iter().map(|s| s.parse().unwrap_or(0.0)).collect(),
        }
    }

    fn to_strings(&self) -> Vec<String> {
        match self {
            TypedColumn::U64(v) => v.iter().map(u64::to_string).collect(),
            TypedColumn::I64(v) => v.iter().map(i64::to_string).collect(),
            TypedColumn::F64(v) => v.iter().map(f64::to_string).collect(),
            TypedColumn::Bool(v) => v.iter().map(bool::to_string).collect(),
            TypedColumn::Str(v) => v.clone(),
        }
    }
}

// === TABLES ===

/// Rows recorded under one target.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: HashMap<String, TypedColumn>,
    rows: usize,
}

impl Table {
    fn push_row(&mut self, row: Vec<(String, Value)>) {
        for (name, value) in row {
            let rows = self.rows;
            self.columns
                .entry(name)
                .or_insert_with(|| TypedColumn::for_value(&value, rows))
                .push(value);
        }
        self.rows += 1;
        for column in self.columns.values_mut() {
            column.pad_to(self.rows);
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn column(&self, name: &str) -> Option<&TypedColumn> {
        self.columns.get(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Numeric column as floats. Missing columns read as empty.
    pub fn f64s(&self, name: &str) -> Vec<f64> {
        self.columns.get(name).map(TypedColumn::to_f64s).unwrap_or_default()
    }

    /// Unsigned column. Other types read as empty.
    pub fn u64s(&self, name: &str) -> Vec<u64> {
        match self.columns.get(name) {
            Some(TypedColumn::U64(v)) => v.clone(),
            _ => Vec::new(),
        }
    }

    pub fn bools(&self, name: &str) -> Vec<bool> {
        match self.columns.get(name) {
            Some(TypedColumn::Bool(v)) => v.clone(),
            _ => Vec::new(),
        }
    }

    /// Any column rendered as strings.
    pub fn strs(&self, name: &str) -> Vec<String> {
        self.columns.get(name).map(TypedColumn::to_strings).unwrap_or_default()
    }
}

// === SUBSCRIBER ===

/// Shared, cloneable event recorder. See the crate docs.
#[derive(Debug, Clone, Default)]
pub struct TableRecorder {
    tables: Arc<Mutex<HashMap<String, Table>>>,
}

impl TableRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of one target's table.
    pub fn table(&self, target: &str) -> Option<Table> {
        self.tables.lock().get(target).cloned()
    }

    pub fn targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self.tables.lock().keys().cloned().collect();
        targets.sort();
        targets
    }

    pub fn snapshot(&self) -> HashMap<String, Table> {
        self.tables.lock().clone()
    }

    /// Take everything recorded so far, leaving the recorder empty.
    pub fn drain(&self) -> HashMap<String, Table> {
        std::mem::take(&mut *self.tables.lock())
    }

    pub fn clear(&self) {
        self.tables.lock().clear();
    }
}

/// Collects one event's fields in declaration order.
#[derive(Default)]
struct RowVisitor {
    row: Vec<(String, Value)>,
}

impl Visit for RowVisitor {
    fn record_u64(&mut self, field: &Field, value: u64) {
        self.row.push((field.name().to_string(), Value::U64(value)));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.row.push((field.name().to_string(), Value::I64(value)));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.row.push((field.name().to_string(), Value::F64(value)));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.row.push((field.name().to_string(), Value::Bool(value)));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.row.push((field.name().to_string(), Value::Str(value.to_string())));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.row.push((field.name().to_string(), Value::Str(format!("{value:?}"))));
    }
}

impl Subscriber for TableRecorder {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.is_event() && *metadata.level() <= tracing::Level::INFO
    }

    fn new_span(&self, _span: &Attributes<'_>) -> Id {
        // spans are not recorded
        Id::from_u64(1)
    }

    fn record(&self, _span: &Id, _values: &Record<'_>) {}

    fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

    fn event(&self, event: &Event<'_>) {
        let mut visitor = RowVisitor::default();
        event.record(&mut visitor);

        let target = event.metadata().target().to_string();
        self.tables
            .lock()
            .entry(target)
            .or_default()
            .push_row(visitor.row);
    }

    fn enter(&self, _span: &Id) {}

    fn exit(&self, _span: &Id) {}
}
