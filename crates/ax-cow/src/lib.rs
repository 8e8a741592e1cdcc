#![forbid(unsafe_code)]

//! Copy-on-write arbitration for shared column storage.
//!
//! The process-wide mode is resolved once at startup and injected into
//! every store constructor; there is no mutable global. Derived views
//! carry explicit provenance (derivation depth, creation generation, a
//! temporary flag) and the guard inspects that metadata to decide when a
//! write must be copied first or diagnosed as a chained assignment.
//! Diagnostics are recoverable: they land in a [`SignalLedger`] and the
//! mutation itself proceeds according to the active mode.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use ax_index::LabelIndex;
use ax_types::Scalar;

/// Boot-time copy-on-write mode. Fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CowMode {
    /// Views are logically independent; the first write through a view
    /// copies the shared buffer, leaving the parent untouched.
    CopyOnWrite,
    /// Compatibility mode: views write into shared storage; chained
    /// writes are diagnosed instead of prevented.
    Legacy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    ChainedAssignment,
    InplaceOnView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CowSignal {
    pub kind: SignalKind,
    pub column: String,
    /// Identifier of the originating write statement; at most one signal
    /// of a given kind is recorded per statement.
    pub statement: u64,
    pub detail: String,
}

/// Append-only record of mutation diagnostics raised by the guard.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalLedger {
    records: Vec<CowSignal>,
}

impl SignalLedger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Record `signal` unless the same kind was already reported for the
    /// same statement. Returns whether the record was appended.
    pub fn record_once(&mut self, signal: CowSignal) -> bool {
        let duplicate = self
            .records
            .iter()
            .any(|r| r.kind == signal.kind && r.statement == signal.statement);
        if duplicate {
            return false;
        }
        self.records.push(signal);
        true
    }

    #[must_use]
    pub fn records(&self) -> &[CowSignal] {
        &self.records
    }

    #[must_use]
    pub fn count_of(&self, kind: SignalKind) -> usize {
        self.records.iter().filter(|r| r.kind == kind).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CowError {
    #[error("column {name} is not present in the store")]
    UnknownColumn { name: String },
    #[error("index {position} is out of bounds for axis 0 with size {size}")]
    OutOfBounds { position: usize, size: usize },
    #[error("column {name} has {values} values but the store index has {rows} rows")]
    LengthMismatch {
        name: String,
        values: usize,
        rows: usize,
    },
}

type SharedValues = Rc<RefCell<Vec<Scalar>>>;

#[derive(Debug, Clone)]
struct ColumnSlot {
    name: String,
    values: SharedValues,
    generation: Rc<Cell<u64>>,
}

/// Minimal labeled column container hosting the guard: the row store the
/// label index addresses. Columns share storage with the views derived
/// from them.
#[derive(Debug)]
pub struct ColumnStore {
    mode: CowMode,
    row_index: LabelIndex,
    columns: Vec<ColumnSlot>,
    next_statement: Rc<Cell<u64>>,
}

impl ColumnStore {
    pub fn new(
        mode: CowMode,
        row_index: LabelIndex,
        columns: Vec<(&str, Vec<Scalar>)>,
    ) -> Result<Self, CowError> {
        let rows = row_index.len();
        let mut slots = Vec::with_capacity(columns.len());
        for (name, values) in columns {
            if values.len() != rows {
                return Err(CowError::LengthMismatch {
                    name: name.to_owned(),
                    values: values.len(),
                    rows,
                });
            }
            slots.push(ColumnSlot {
                name: name.to_owned(),
                values: Rc::new(RefCell::new(values)),
                generation: Rc::new(Cell::new(0)),
            });
        }
        Ok(Self {
            mode,
            row_index,
            columns: slots,
            next_statement: Rc::new(Cell::new(0)),
        })
    }

    #[must_use]
    pub fn mode(&self) -> CowMode {
        self.mode
    }

    #[must_use]
    pub fn row_index(&self) -> &LabelIndex {
        &self.row_index
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|slot| slot.name.as_str()).collect()
    }

    fn slot(&self, name: &str) -> Result<&ColumnSlot, CowError> {
        self.columns
            .iter()
            .find(|slot| slot.name == name)
            .ok_or_else(|| CowError::UnknownColumn {
                name: name.to_owned(),
            })
    }

    /// Derive a view over a column. The handle starts temporary (an
    /// unpersisted selection) at derivation depth 1.
    pub fn column(&self, name: &str) -> Result<ColumnView, CowError> {
        let slot = self.slot(name)?;
        let len = slot.values.borrow().len();
        Ok(ColumnView {
            column: slot.name.clone(),
            values: Rc::clone(&slot.values),
            generation: Rc::clone(&slot.generation),
            next_statement: Rc::clone(&self.next_statement),
            mode: self.mode,
            offset: 0,
            len,
            depth: 1,
            created_generation: slot.generation.get(),
            is_temporary: true,
        })
    }

    /// Current parent-visible contents of a column.
    pub fn snapshot(&self, name: &str) -> Result<Vec<Scalar>, CowError> {
        Ok(self.slot(name)?.values.borrow().clone())
    }

    /// Parent-visible mutation count of a column.
    pub fn generation(&self, name: &str) -> Result<u64, CowError> {
        Ok(self.slot(name)?.generation.get())
    }
}

/// A derived handle over (possibly shared) column storage, carrying the
/// provenance the guard consults instead of inspecting call stacks.
#[derive(Debug, Clone)]
pub struct ColumnView {
    column: String,
    values: SharedValues,
    generation: Rc<Cell<u64>>,
    next_statement: Rc<Cell<u64>>,
    mode: CowMode,
    offset: usize,
    len: usize,
    depth: u32,
    created_generation: u64,
    is_temporary: bool,
}

impl ColumnView {
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.is_temporary
    }

    #[must_use]
    pub fn created_generation(&self) -> u64 {
        self.created_generation
    }

    /// Materialize the window this view addresses.
    #[must_use]
    pub fn values(&self) -> Vec<Scalar> {
        let storage = self.values.borrow();
        storage[self.offset..self.offset + self.len].to_vec()
    }

    /// Mark the handle as persisted (bound to a caller-owned binding),
    /// which exempts its writes from chained-assignment diagnosis.
    #[must_use]
    pub fn persist(mut self) -> Self {
        self.is_temporary = false;
        self
    }

    /// Derive a narrower view; derivation depth grows by one.
    pub fn slice(&self, start: usize, len: usize) -> Result<Self, CowError> {
        if start > self.len || start + len > self.len {
            return Err(CowError::OutOfBounds {
                position: start + len,
                size: self.len,
            });
        }
        let mut child = self.clone();
        child.offset = self.offset + start;
        child.len = len;
        child.depth = self.depth + 1;
        child.is_temporary = true;
        Ok(child)
    }

    fn next_statement_id(&self) -> u64 {
        let id = self.next_statement.get();
        self.next_statement.set(id + 1);
        id
    }

    /// Detach this view onto a private copy of the shared buffer.
    fn detach(&mut self) {
        let copied = self.values.borrow().clone();
        self.values = Rc::new(RefCell::new(copied));
    }

    fn diagnose_chained(&self, ledger: &mut SignalLedger, statement: u64) {
        if self.mode == CowMode::Legacy && self.is_temporary {
            ledger.record_once(CowSignal {
                kind: SignalKind::ChainedAssignment,
                column: self.column.clone(),
                statement,
                detail: format!(
                    "setitem through a temporary view at derivation depth {}",
                    self.depth
                ),
            });
        }
    }

    fn apply_write<F>(&mut self, write: F)
    where
        F: FnOnce(&mut [Scalar]),
    {
        match self.mode {
            CowMode::CopyOnWrite => {
                if Rc::strong_count(&self.values) > 1 {
                    self.detach();
                }
                let mut storage = self.values.borrow_mut();
                write(&mut storage[self.offset..self.offset + self.len]);
            }
            CowMode::Legacy => {
                {
                    let mut storage = self.values.borrow_mut();
                    write(&mut storage[self.offset..self.offset + self.len]);
                }
                self.generation.set(self.generation.get() + 1);
            }
        }
    }

    /// Assign `value` at the given view-relative positions. One statement:
    /// at most one chained-assignment diagnostic regardless of how many
    /// positions it touches.
    pub fn assign(
        &mut self,
        positions: &[usize],
        value: &Scalar,
        ledger: &mut SignalLedger,
    ) -> Result<(), CowError> {
        for &pos in positions {
            if pos >= self.len {
                return Err(CowError::OutOfBounds {
                    position: pos,
                    size: self.len,
                });
            }
        }

        let statement = self.next_statement_id();
        self.diagnose_chained(ledger, statement);
        self.apply_write(|window| {
            for &pos in positions {
                window[pos] = value.clone();
            }
        });
        Ok(())
    }

    /// Assign `value` across the whole view window.
    pub fn assign_all(&mut self, value: &Scalar, ledger: &mut SignalLedger) -> Result<(), CowError> {
        let positions: Vec<usize> = (0..self.len).collect();
        self.assign(&positions, value, ledger)
    }

    fn diagnose_inplace(&self, ledger: &mut SignalLedger, statement: u64, method: &str) {
        ledger.record_once(CowSignal {
            kind: SignalKind::InplaceOnView,
            column: self.column.clone(),
            statement,
            detail: format!("in-place {method} on a view will behave as a copy in the future"),
        });
    }

    /// In-place fill of missing elements. Raises one forward-compatibility
    /// diagnostic per call, in either mode.
    pub fn fill_na_in_place(&mut self, fill: &Scalar, ledger: &mut SignalLedger) {
        let statement = self.next_statement_id();
        self.diagnose_inplace(ledger, statement, "fillna");
        self.apply_write(|window| {
            for slot in window {
                if slot.is_missing() {
                    *slot = fill.clone();
                }
            }
        });
    }

    /// In-place value replacement. Raises one forward-compatibility
    /// diagnostic per call, in either mode.
    pub fn replace_in_place(&mut self, from: &Scalar, to: &Scalar, ledger: &mut SignalLedger) {
        let statement = self.next_statement_id();
        self.diagnose_inplace(ledger, statement, "replace");
        self.apply_write(|window| {
            for slot in window {
                if slot.semantic_eq(from) {
                    *slot = to.clone();
                }
            }
        });
    }
}
