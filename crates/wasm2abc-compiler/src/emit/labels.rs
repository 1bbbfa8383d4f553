//! Label and fixup bookkeeping for branch relocation.
//!
//! Labels live in a per-assembler arena. A label is pending until [`resolve`]
//! records its offset; branches emitted before that leave a fixup which is
//! patched when the assembler finishes.
//!
//! [`resolve`]: LabelTable::resolve

use wasm2abc_core::AssembleError;

/// Opaque handle to a branch target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u32);

#[derive(Debug)]
struct LabelInfo {
    name: String,
    offset: Option<usize>,
    used: bool,
}

/// A 3-byte displacement waiting for its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fixup {
    /// Offset of the first displacement byte.
    pub site: usize,
    /// Offset the displacement is relative to.
    pub anchor: usize,
    pub label: Label,
}

/// Arena of labels plus the fixups that reference them.
#[derive(Debug, Default)]
pub struct LabelTable {
    labels: Vec<LabelInfo>,
    fixups: Vec<Fixup>,
    /// Counter for generated names.
    generated: u32,
}

impl LabelTable {
    /// Create an empty label table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a pending label. Unnamed labels get a generated name.
    pub fn create(&mut self, name: Option<&str>) -> Label {
        let name = match name {
            Some(name) => name.to_owned(),
            None => {
                let name = format!("$label${}", self.generated);
                self.generated += 1;
                name
            }
        };
        self.labels.push(LabelInfo {
            name,
            offset: None,
            used: false,
        });
        Label((self.labels.len() - 1) as u32)
    }

    pub fn name(&self, label: Label) -> &str {
        &self.labels[label.0 as usize].name
    }

    /// Resolved offset, if any.
    pub fn offset(&self, label: Label) -> Option<usize> {
        self.labels[label.0 as usize].offset
    }

    /// Whether any branch references the label.
    pub fn is_used(&self, label: Label) -> bool {
        self.labels[label.0 as usize].used
    }

    pub fn mark_used(&mut self, label: Label) {
        self.labels[label.0 as usize].used = true;
    }

    /// Record the label's offset. A label resolves at most once.
    pub fn resolve(&mut self, label: Label, offset: usize) -> Result<(), AssembleError> {
        let info = &mut self.labels[label.0 as usize];
        if info.offset.is_some() {
            return Err(AssembleError::LabelRebound {
                name: info.name.clone(),
            });
        }
        info.offset = Some(offset);
        Ok(())
    }

    pub fn add_fixup(&mut self, site: usize, anchor: usize, label: Label) {
        self.fixups.push(Fixup {
            site,
            anchor,
            label,
        });
    }

    /// Number of fixups not yet patched.
    pub fn pending_fixups(&self) -> usize {
        self.fixups.len()
    }

    /// Remove and return every recorded fixup.
    pub fn take_fixups(&mut self) -> Vec<Fixup> {
        std::mem::take(&mut self.fixups)
    }
}
