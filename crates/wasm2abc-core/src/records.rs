//! Structural records of an ABC file.
//!
//! Every record is index-only: names, types and values refer to constant pool
//! entries, methods refer to the method table, and so on. Each record knows how
//! to write itself; [`AbcFile`](crate::AbcFile) drives the order.

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::EncodeError;
use crate::varint::{write_u8, write_u30, write_u30_usize};

// ============================================================================
// Methods
// ============================================================================

bitflags! {
    /// Method info flags byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MethodFlags: u8 {
        const NEED_ARGUMENTS = 0x01;
        const NEED_ACTIVATION = 0x02;
        const NEED_REST = 0x04;
        const HAS_OPTIONAL = 0x08;
        const SET_DXNS = 0x40;
        const HAS_PARAM_NAMES = 0x80;
    }
}

/// Kind byte of an optional-parameter default or a slot initializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ValueKind {
    Undefined = 0x00,
    Utf8 = 0x01,
    Int = 0x03,
    UInt = 0x04,
    Double = 0x06,
    Namespace = 0x08,
    False = 0x0a,
    True = 0x0b,
    Null = 0x0c,
    PackageNamespace = 0x16,
    PackageInternalNs = 0x17,
    ProtectedNamespace = 0x18,
    ExplicitNamespace = 0x19,
    StaticProtectedNs = 0x1a,
    PrivateNs = 0x05,
}

/// A default value for an optional parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionDetail {
    pub value: u32,
    pub kind: ValueKind,
}

/// A method signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodInfo {
    /// Multiname indices of the parameter types (0 = any).
    pub param_types: Vec<u32>,
    /// Multiname index of the return type (0 = any).
    pub return_type: u32,
    /// String index of the method name (0 = anonymous).
    pub name: u32,
    pub flags: MethodFlags,
    pub options: Vec<OptionDetail>,
    /// String indices of parameter names.
    pub param_names: Vec<u32>,
}

impl MethodInfo {
    pub(crate) fn write_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        write_u30_usize(out, self.param_types.len())?;
        write_u30(out, self.return_type)?;
        for &ty in &self.param_types {
            write_u30(out, ty)?;
        }
        write_u30(out, self.name)?;

        let mut flags = self.flags;
        flags.set(MethodFlags::HAS_OPTIONAL, !self.options.is_empty());
        flags.set(MethodFlags::HAS_PARAM_NAMES, !self.param_names.is_empty());
        write_u8(out, flags.bits());

        if flags.contains(MethodFlags::HAS_OPTIONAL) {
            write_u30_usize(out, self.options.len())?;
            for option in &self.options {
                write_u30(out, option.value)?;
                write_u8(out, option.kind.into());
            }
        }
        if flags.contains(MethodFlags::HAS_PARAM_NAMES) {
            for &name in &self.param_names {
                write_u30(out, name)?;
            }
        }
        Ok(())
    }
}

/// An exception handler range inside a method body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExceptionInfo {
    pub from: u32,
    pub to: u32,
    pub target: u32,
    pub exc_type: u32,
    pub var_name: u32,
}

/// Code and frame sizes for one method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodBody {
    pub method: u32,
    pub max_stack: u32,
    pub local_count: u32,
    pub init_scope_depth: u32,
    pub max_scope_depth: u32,
    pub code: Vec<u8>,
    pub exceptions: Vec<ExceptionInfo>,
    pub traits: Vec<Trait>,
}

impl MethodBody {
    pub(crate) fn write_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        write_u30(out, self.method)?;
        write_u30(out, self.max_stack)?;
        write_u30(out, self.local_count)?;
        write_u30(out, self.init_scope_depth)?;
        write_u30(out, self.max_scope_depth)?;
        write_u30_usize(out, self.code.len())?;
        out.extend_from_slice(&self.code);

        write_u30_usize(out, self.exceptions.len())?;
        for exc in &self.exceptions {
            write_u30(out, exc.from)?;
            write_u30(out, exc.to)?;
            write_u30(out, exc.target)?;
            write_u30(out, exc.exc_type)?;
            write_u30(out, exc.var_name)?;
        }
        write_traits(out, &self.traits)
    }
}

// ============================================================================
// Traits
// ============================================================================

bitflags! {
    /// Trait attribute nibble (upper four bits of the kind byte).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TraitAttributes: u8 {
        const FINAL = 0x1;
        const OVERRIDE = 0x2;
        const METADATA = 0x4;
    }
}

/// Kind-specific payload of a trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraitData {
    Slot {
        slot_id: u32,
        type_name: u32,
        value: u32,
        value_kind: ValueKind,
    },
    Const {
        slot_id: u32,
        type_name: u32,
        value: u32,
        value_kind: ValueKind,
    },
    Method { disp_id: u32, method: u32 },
    Getter { disp_id: u32, method: u32 },
    Setter { disp_id: u32, method: u32 },
    Class { slot_id: u32, class: u32 },
    Function { slot_id: u32, function: u32 },
}

impl TraitData {
    /// Low nibble of the kind byte.
    pub fn kind(&self) -> u8 {
        match self {
            TraitData::Slot { .. } => 0,
            TraitData::Method { .. } => 1,
            TraitData::Getter { .. } => 2,
            TraitData::Setter { .. } => 3,
            TraitData::Class { .. } => 4,
            TraitData::Function { .. } => 5,
            TraitData::Const { .. } => 6,
        }
    }
}

/// A named member of a class, instance, script or activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trait {
    /// Multiname index (must be a `QName`).
    pub name: u32,
    pub data: TraitData,
    pub attributes: TraitAttributes,
    pub metadata: Vec<u32>,
}

impl Trait {
    /// A trait with no attributes and no metadata.
    pub fn new(name: u32, data: TraitData) -> Self {
        Self {
            name,
            data,
            attributes: TraitAttributes::empty(),
            metadata: Vec::new(),
        }
    }

    /// An untyped slot with no initial value.
    pub fn slot(name: u32, slot_id: u32, type_name: u32) -> Self {
        Self::new(
            name,
            TraitData::Slot {
                slot_id,
                type_name,
                value: 0,
                value_kind: ValueKind::Undefined,
            },
        )
    }

    /// A method with the given dispatch id.
    pub fn method(name: u32, disp_id: u32, method: u32) -> Self {
        Self::new(name, TraitData::Method { disp_id, method })
    }

    /// A class trait.
    pub fn class(name: u32, slot_id: u32, class: u32) -> Self {
        Self::new(name, TraitData::Class { slot_id, class })
    }

    pub fn with_attributes(mut self, attributes: TraitAttributes) -> Self {
        self.attributes |= attributes;
        self
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        write_u30(out, self.name)?;

        let mut attributes = self.attributes;
        attributes.set(TraitAttributes::METADATA, !self.metadata.is_empty());
        write_u8(out, self.data.kind() | (attributes.bits() << 4));

        match self.data {
            TraitData::Slot {
                slot_id,
                type_name,
                value,
                value_kind,
            }
            | TraitData::Const {
                slot_id,
                type_name,
                value,
                value_kind,
            } => {
                write_u30(out, slot_id)?;
                write_u30(out, type_name)?;
                write_u30(out, value)?;
                if value != 0 {
                    write_u8(out, value_kind.into());
                }
            }
            TraitData::Class { slot_id, class } => {
                write_u30(out, slot_id)?;
                write_u30(out, class)?;
            }
            TraitData::Function { slot_id, function } => {
                write_u30(out, slot_id)?;
                write_u30(out, function)?;
            }
            TraitData::Method { disp_id, method }
            | TraitData::Getter { disp_id, method }
            | TraitData::Setter { disp_id, method } => {
                write_u30(out, disp_id)?;
                write_u30(out, method)?;
            }
        }

        if attributes.contains(TraitAttributes::METADATA) {
            write_u30_usize(out, self.metadata.len())?;
            for &md in &self.metadata {
                write_u30(out, md)?;
            }
        }
        Ok(())
    }
}

pub(crate) fn write_traits(out: &mut Vec<u8>, traits: &[Trait]) -> Result<(), EncodeError> {
    write_u30_usize(out, traits.len())?;
    for t in traits {
        t.write_to(out)?;
    }
    Ok(())
}

// ============================================================================
// Classes and scripts
// ============================================================================

bitflags! {
    /// Instance info flags byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InstanceFlags: u8 {
        const SEALED = 0x01;
        const FINAL = 0x02;
        const INTERFACE = 0x04;
        const PROTECTED_NS = 0x08;
    }
}

/// The instance half of a class definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceInfo {
    pub name: u32,
    pub super_name: u32,
    pub flags: InstanceFlags,
    /// Namespace index, written only when `PROTECTED_NS` is set.
    pub protected_ns: u32,
    pub interfaces: Vec<u32>,
    pub iinit: u32,
    pub traits: Vec<Trait>,
}

impl InstanceInfo {
    pub(crate) fn write_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        write_u30(out, self.name)?;
        write_u30(out, self.super_name)?;
        write_u8(out, self.flags.bits());
        if self.flags.contains(InstanceFlags::PROTECTED_NS) {
            write_u30(out, self.protected_ns)?;
        }
        write_u30_usize(out, self.interfaces.len())?;
        for &iface in &self.interfaces {
            write_u30(out, iface)?;
        }
        write_u30(out, self.iinit)?;
        write_traits(out, &self.traits)
    }
}

/// The static half of a class definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassInfo {
    pub cinit: u32,
    pub traits: Vec<Trait>,
}

impl ClassInfo {
    pub(crate) fn write_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        write_u30(out, self.cinit)?;
        write_traits(out, &self.traits)
    }
}

/// A script: its initializer and global traits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptInfo {
    pub init: u32,
    pub traits: Vec<Trait>,
}

impl ScriptInfo {
    pub(crate) fn write_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        write_u30(out, self.init)?;
        write_traits(out, &self.traits)
    }
}

/// A metadata entry: a name plus key/value string pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub name: u32,
    pub items: Vec<(u32, u32)>,
}

impl Metadata {
    pub(crate) fn write_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        write_u30(out, self.name)?;
        write_u30_usize(out, self.items.len())?;
        for &(key, _) in &self.items {
            write_u30(out, key)?;
        }
        for &(_, value) in &self.items {
            write_u30(out, value)?;
        }
        Ok(())
    }
}
