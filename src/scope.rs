use crate::ast::VarDecl;
use crate::error::ScopeError;
use std::collections::HashMap;
use std::rc::Rc;

/// Name resolution policy of a [`StaticScope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeOptions {
    /// A root scope is opened at construction and can never be closed.
    pub global_scope: bool,
    /// An inner declaration may shadow an outer one with the same name.
    pub allow_masking: bool,
    /// A name may be declared twice in the same scope (the second one masks the first).
    pub allow_local_redefinition: bool,
}

impl Default for ScopeOptions {
    fn default() -> Self {
        Self {
            global_scope: false,
            allow_masking: true,
            allow_local_redefinition: false,
        }
    }
}

struct Declared {
    decl: Rc<VarDecl>,
    depth: usize,
}

/// Compile-time scopes: binds names to their declarations while parsing.
///
/// Each name maps to the stack of its visible declarations, most recent last,
/// so closing a scope un-shadows outer declarations without rescanning.
pub struct StaticScope {
    options: ScopeOptions,
    names: HashMap<String, Vec<Declared>>,
    scopes: Vec<Vec<Rc<VarDecl>>>,
}

impl StaticScope {
    pub fn new(options: ScopeOptions) -> Self {
        let scopes = if options.global_scope {
            vec![Vec::new()]
        } else {
            Vec::new()
        };
        Self {
            options,
            names: HashMap::new(),
            scopes,
        }
    }

    pub fn options(&self) -> ScopeOptions {
        self.options
    }

    /// Number of open scopes, the global one included.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn open_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    /// Declares `decl` in the innermost scope. On conflict the error message
    /// is returned and nothing is declared.
    pub fn declare(&mut self, decl: Rc<VarDecl>) -> Result<(), String> {
        let depth = self.scopes.len();
        if depth == 0 {
            return Err("Invalid declaration (a scope must be opened first).".to_string());
        }
        let chain = self.names.entry(decl.name.clone()).or_default();
        if let Some(existing) = chain.last() {
            if !self.options.allow_masking {
                return Err(format!(
                    "Masking is not allowed: declaration conflicts with declaration at {}.",
                    existing.decl.location
                ));
            }
            if existing.depth == depth && !self.options.allow_local_redefinition {
                return Err(format!(
                    "Declaration conflicts with declaration at {}.",
                    existing.decl.location
                ));
            }
        }
        chain.push(Declared {
            decl: Rc::clone(&decl),
            depth,
        });
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(decl);
        }
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&Rc<VarDecl>> {
        self.names
            .get(name)
            .and_then(|chain| chain.last())
            .map(|d| &d.decl)
    }

    /// Closes the innermost scope and returns its declarations in declaration order.
    pub fn close_scope(&mut self) -> Result<Vec<Rc<VarDecl>>, ScopeError> {
        match self.scopes.len() {
            0 => return Err(ScopeError::NoOpenScope),
            1 if self.options.global_scope => return Err(ScopeError::GlobalScope),
            _ => {}
        }
        let declared = self.scopes.pop().unwrap_or_default();
        for decl in declared.iter().rev() {
            if let Some(chain) = self.names.get_mut(&decl.name) {
                chain.pop();
                if chain.is_empty() {
                    self.names.remove(&decl.name);
                }
            }
        }
        Ok(declared)
    }

    /// Declarations of the global scope (empty when there is none).
    pub fn globals(&self) -> &[Rc<VarDecl>] {
        match self.scopes.first() {
            Some(globals) if self.options.global_scope => globals,
            _ => &[],
        }
    }

    /// Closes every scope above `depth`, used to recover after an aborted parse.
    pub fn close_to(&mut self, depth: usize) {
        while self.scopes.len() > depth {
            if self.close_scope().is_err() {
                break;
            }
        }
    }
}

impl Default for StaticScope {
    fn default() -> Self {
        Self::new(ScopeOptions::default())
    }
}
