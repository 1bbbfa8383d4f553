//! Registry of the emitted class's instance members.
//!
//! Slots and methods share one namespace. Declaring a name again with the same
//! meaning is a no-op; declaring it with a different meaning is an error.

use rustc_hash::FxHashMap;
use wasm2abc_core::{ConstantPool, Trait, TranslateError};
use wasm2abc_ir::Import;

use crate::options::QualifiedName;

/// Name of the linear memory slot.
pub const MEMORY_SLOT: &str = "__wasm2swf_memory";

/// Name of the indirect call table slot.
pub const TABLE_SLOT: &str = "__wasm2swf_table";

/// Name of the exports slot.
pub const EXPORTS_SLOT: &str = "exports";

/// How the instance constructor fills a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotInit {
    /// Freshly allocated linear memory.
    Memory,
    /// The indirect call table.
    Table,
    /// The export object.
    Exports,
    /// A module global.
    Global,
    /// `imports[module][base]`.
    Import(Import),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberKind {
    Slot {
        type_name: Option<QualifiedName>,
        init: SlotInit,
    },
    Method {
        method: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub kind: MemberKind,
}

/// Ordered member table with name lookup.
#[derive(Debug, Clone, Default)]
pub struct ClassMembers {
    members: Vec<Member>,
    index: FxHashMap<String, usize>,
}

impl ClassMembers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the slots every emitted class carries.
    pub fn with_reserved_slots() -> Self {
        let mut members = Self::new();
        let reserved = [
            (MEMORY_SLOT, "flash.utils:ByteArray", SlotInit::Memory),
            (TABLE_SLOT, "Array", SlotInit::Table),
            (EXPORTS_SLOT, "Object", SlotInit::Exports),
        ];
        for (name, ty, init) in reserved {
            members.members.push(Member {
                name: name.to_owned(),
                kind: MemberKind::Slot {
                    type_name: Some(QualifiedName::parse(ty)),
                    init,
                },
            });
            members.index.insert(name.to_owned(), members.members.len() - 1);
        }
        members
    }

    /// Declare a slot. Returns `true` if it was not declared before.
    pub fn declare_slot(
        &mut self,
        name: &str,
        type_name: Option<QualifiedName>,
        init: SlotInit,
    ) -> Result<bool, TranslateError> {
        if let Some(&i) = self.index.get(name) {
            return match &self.members[i].kind {
                MemberKind::Slot { init: existing, .. } if *existing == init => Ok(false),
                _ => Err(TranslateError::DuplicateMember {
                    name: name.to_owned(),
                }),
            };
        }
        tracing::debug!(name, ?init, "declared slot");
        self.push(Member {
            name: name.to_owned(),
            kind: MemberKind::Slot { type_name, init },
        });
        Ok(true)
    }

    /// Declare a method. Every method name is declared exactly once.
    pub fn declare_method(&mut self, name: &str, method: u32) -> Result<(), TranslateError> {
        if self.index.contains_key(name) {
            return Err(TranslateError::DuplicateMember {
                name: name.to_owned(),
            });
        }
        self.push(Member {
            name: name.to_owned(),
            kind: MemberKind::Method { method },
        });
        Ok(())
    }

    fn push(&mut self, member: Member) {
        self.index.insert(member.name.clone(), self.members.len());
        self.members.push(member);
    }

    pub fn get(&self, name: &str) -> Option<&Member> {
        self.index.get(name).map(|&i| &self.members[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.iter()
    }

    /// Slots in declaration order with their initializers.
    pub fn slots(&self) -> impl Iterator<Item = (&str, &SlotInit)> {
        self.members.iter().filter_map(|m| match &m.kind {
            MemberKind::Slot { init, .. } => Some((m.name.as_str(), init)),
            MemberKind::Method { .. } => None,
        })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Instance traits in declaration order.
    ///
    /// Slots are numbered from 1. Method traits use their method index as
    /// dispatch id.
    pub fn to_traits(&self, pool: &mut ConstantPool) -> Vec<Trait> {
        let mut slot_id = 0;
        self.members
            .iter()
            .map(|member| {
                let name = pool.public_qname(&member.name);
                match &member.kind {
                    MemberKind::Slot { type_name, .. } => {
                        slot_id += 1;
                        let ty = type_name.as_ref().map_or(0, |t| t.intern(pool));
                        Trait::slot(name, slot_id, ty)
                    }
                    MemberKind::Method { method } => Trait::method(name, *method, *method),
                }
            })
            .collect()
    }
}
