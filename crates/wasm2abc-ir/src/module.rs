//! Module-level declarations.

use crate::expr::Expr;
use crate::types::{Literal, ValType};

/// Where an imported function or global comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Import {
    pub module: String,
    pub base: String,
}

impl Import {
    pub fn new(module: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            base: base.into(),
        }
    }
}

/// A function, either defined in the module or imported.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<ValType>,
    /// Declared locals after the parameters.
    pub vars: Vec<ValType>,
    /// Result types; more than one is a multi-value function.
    pub results: Vec<ValType>,
    /// Ignored for imports.
    pub body: Expr,
    pub import: Option<Import>,
}

impl Function {
    /// A function defined in the module.
    pub fn new(
        name: impl Into<String>,
        params: Vec<ValType>,
        results: Vec<ValType>,
        body: Expr,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            vars: Vec::new(),
            results,
            body,
            import: None,
        }
    }

    /// An imported function.
    pub fn imported(
        name: impl Into<String>,
        import: Import,
        params: Vec<ValType>,
        results: Vec<ValType>,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            vars: Vec::new(),
            results,
            body: Expr::Nop,
            import: Some(import),
        }
    }

    pub fn with_vars(mut self, vars: Vec<ValType>) -> Self {
        self.vars = vars;
        self
    }

    pub fn is_import(&self) -> bool {
        self.import.is_some()
    }

    /// The single result type, or `None` for a void function.
    pub fn result(&self) -> Option<ValType> {
        self.results.first().copied()
    }

    /// Type of local `index` (parameters first, then vars).
    pub fn local_type(&self, index: u32) -> Option<ValType> {
        let index = index as usize;
        match index.checked_sub(self.params.len()) {
            None => self.params.get(index).copied(),
            Some(var) => self.vars.get(var).copied(),
        }
    }

    /// Total locals, parameters included.
    pub fn local_count(&self) -> usize {
        self.params.len() + self.vars.len()
    }
}

/// How a global gets its initial value.
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalInit {
    Const(Literal),
    Import(Import),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub name: String,
    pub ty: ValType,
    pub mutable: bool,
    pub init: GlobalInit,
}

/// What an export refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportKind {
    Function(String),
    Global(String),
    Memory,
    Table,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub kind: ExportKind,
}

/// An active data segment at a constant offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSegment {
    pub offset: u32,
    pub data: Vec<u8>,
}

/// Linear memory, in 64 KiB pages.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Memory {
    pub initial: u32,
    pub maximum: Option<u32>,
    pub segments: Vec<DataSegment>,
}

/// Function names placed in the call table starting at `offset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSegment {
    pub offset: u32,
    pub functions: Vec<String>,
}

/// A whole module.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub functions: Vec<Function>,
    pub globals: Vec<Global>,
    pub exports: Vec<Export>,
    pub memory: Option<Memory>,
    pub table_segments: Vec<TableSegment>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|g| g.name == name)
    }

    pub fn add_function(&mut self, function: Function) -> &mut Self {
        self.functions.push(function);
        self
    }

    pub fn export_function(
        &mut self,
        name: impl Into<String>,
        function: impl Into<String>,
    ) -> &mut Self {
        self.exports.push(Export {
            name: name.into(),
            kind: ExportKind::Function(function.into()),
        });
        self
    }
}
