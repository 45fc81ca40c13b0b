use crate::ast::{DeclId, VarDecl};
use crate::value::Value;
use std::collections::HashMap;
use tracing::trace;

/// Index of a reference cell in the [`DynamicScope`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId(u32);

impl CellId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Default)]
struct Slot {
    value: Value,
    /// Captured by a closure: the cell outlives the activation that created it.
    captured: bool,
}

/// Runtime storage of variables: every declaration maps to a stack of cells,
/// one per live activation.
///
/// Cells of plain locals are recycled when their activation ends. Captured
/// cells are never recycled: a closure may be called at any later point, so
/// the arena grows with every captured activation for as long as the scope
/// lives. Hosts running long sessions that create many closures should start
/// a fresh evaluator from time to time.
#[derive(Debug, Default)]
pub struct DynamicScope {
    cells: Vec<Slot>,
    free: Vec<CellId>,
    vars: HashMap<DeclId, Vec<CellId>>,
}

impl DynamicScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a fresh `undefined` cell for `decl`.
    pub fn register(&mut self, decl: &VarDecl) -> CellId {
        let cell = match self.free.pop() {
            Some(cell) => {
                self.cells[cell.index()] = Slot::default();
                cell
            }
            None => {
                self.cells.push(Slot::default());
                CellId((self.cells.len() - 1) as u32)
            }
        };
        self.push(decl, cell)
    }

    /// Pushes an existing (captured) cell for `decl`.
    pub fn register_cell(&mut self, decl: &VarDecl, cell: CellId) -> CellId {
        self.push(decl, cell)
    }

    fn push(&mut self, decl: &VarDecl, cell: CellId) -> CellId {
        trace!(name = %decl.name, cell = cell.index(), "register");
        self.vars.entry(decl.id).or_default().push(cell);
        cell
    }

    /// Pops the current cell of `decl`.
    pub fn unregister(&mut self, decl: &VarDecl) -> Option<CellId> {
        let stack = self.vars.get_mut(&decl.id)?;
        let cell = stack.pop()?;
        if stack.is_empty() {
            self.vars.remove(&decl.id);
        }
        trace!(name = %decl.name, cell = cell.index(), "unregister");
        if !self.cells[cell.index()].captured {
            self.cells[cell.index()] = Slot::default();
            self.free.push(cell);
        }
        Some(cell)
    }

    /// Current cell of `decl`, if it is registered.
    pub fn find(&self, decl: &VarDecl) -> Option<CellId> {
        self.vars.get(&decl.id).and_then(|stack| stack.last().copied())
    }

    pub fn mark_captured(&mut self, cell: CellId) {
        self.cells[cell.index()].captured = true;
    }

    pub fn get(&self, cell: CellId) -> &Value {
        &self.cells[cell.index()].value
    }

    /// Writes `value` into `cell`. References are stored as the value they point to.
    pub fn set(&mut self, cell: CellId, value: Value) {
        let value = self.deref(&value);
        self.cells[cell.index()].value = value;
    }

    /// Value a reference points to; other values are returned unchanged.
    pub fn deref(&self, value: &Value) -> Value {
        match value {
            Value::Reference(cell) => self.get(*cell).clone(),
            other => other.clone(),
        }
    }
}
