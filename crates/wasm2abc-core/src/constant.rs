//! Constant pool for ABC files.
//!
//! The pool holds seven independent tables (integers, unsigned integers,
//! doubles, strings, namespaces, namespace sets and multinames). Instructions
//! and structural records reference entries by index. Index 0 of every table is
//! a reserved sentinel that is never written; real entries start at 1.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use rustc_hash::FxHashMap;
use std::hash::Hash;

use crate::error::EncodeError;
use crate::varint::{
    write_d64, write_s32, write_string, write_u8, write_u30, write_u30_usize, write_u32,
};

// ============================================================================
// Pool entry types
// ============================================================================

/// Namespace kind byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum NamespaceKind {
    PrivateNs = 0x05,
    Namespace = 0x08,
    PackageNamespace = 0x16,
    PackageInternalNs = 0x17,
    ProtectedNamespace = 0x18,
    ExplicitNamespace = 0x19,
    StaticProtectedNs = 0x1a,
}

/// A namespace entry: kind plus a string-pool index (0 = any name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub kind: NamespaceKind,
    pub name: u32,
}

/// An ordered list of namespace-pool indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NamespaceSet(pub Vec<u32>);

/// A multiname entry.
///
/// Each variant carries the subset of {namespace, name, namespace set} its
/// layout encodes. `A` variants are the attribute forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Multiname {
    QName { ns: u32, name: u32 },
    QNameA { ns: u32, name: u32 },
    RtqName { name: u32 },
    RtqNameA { name: u32 },
    RtqNameL,
    RtqNameLA,
    Multiname { name: u32, ns_set: u32 },
    MultinameA { name: u32, ns_set: u32 },
    MultinameL { ns_set: u32 },
    MultinameLA { ns_set: u32 },
}

impl Multiname {
    /// The kind byte written before the entry.
    pub fn kind(&self) -> u8 {
        match self {
            Multiname::QName { .. } => 0x07,
            Multiname::QNameA { .. } => 0x0d,
            Multiname::RtqName { .. } => 0x0f,
            Multiname::RtqNameA { .. } => 0x10,
            Multiname::RtqNameL => 0x11,
            Multiname::RtqNameLA => 0x12,
            Multiname::Multiname { .. } => 0x09,
            Multiname::MultinameA { .. } => 0x0e,
            Multiname::MultinameL { .. } => 0x1b,
            Multiname::MultinameLA { .. } => 0x1c,
        }
    }

    /// Operands an instruction must pop to resolve this name at runtime.
    ///
    /// Runtime-qualified forms take a namespace, late-bound forms take a name.
    pub fn runtime_operands(&self) -> u32 {
        match self {
            Multiname::RtqName { .. } | Multiname::RtqNameA { .. } => 1,
            Multiname::RtqNameL | Multiname::RtqNameLA => 2,
            Multiname::MultinameL { .. } | Multiname::MultinameLA { .. } => 1,
            _ => 0,
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        write_u8(out, self.kind());
        match *self {
            Multiname::QName { ns, name } | Multiname::QNameA { ns, name } => {
                write_u30(out, ns)?;
                write_u30(out, name)
            }
            Multiname::RtqName { name } | Multiname::RtqNameA { name } => write_u30(out, name),
            Multiname::RtqNameL | Multiname::RtqNameLA => Ok(()),
            Multiname::Multiname { name, ns_set } | Multiname::MultinameA { name, ns_set } => {
                write_u30(out, name)?;
                write_u30(out, ns_set)
            }
            Multiname::MultinameL { ns_set } | Multiname::MultinameLA { ns_set } => {
                write_u30(out, ns_set)
            }
        }
    }
}

// ============================================================================
// Interning table
// ============================================================================

/// One pool table: entries in insertion order plus a dedup index.
#[derive(Debug, Clone)]
struct Table<T, K> {
    entries: Vec<T>,
    index: FxHashMap<K, u32>,
}

impl<T, K> Default for Table<T, K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: FxHashMap::default(),
        }
    }
}

impl<T, K: Eq + Hash> Table<T, K> {
    fn intern(&mut self, key: K, value: T) -> u32 {
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        self.entries.push(value);
        let idx = self.entries.len() as u32;
        self.index.insert(key, idx);
        idx
    }

    fn get(&self, index: u32) -> Option<&T> {
        index
            .checked_sub(1)
            .and_then(|i| self.entries.get(i as usize))
    }

    /// Section count: entries + 1, or 0 when the table is empty.
    fn write_count(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        if self.entries.is_empty() {
            write_u30(out, 0)
        } else {
            write_u30_usize(out, self.entries.len() + 1)
        }
    }
}

// ============================================================================
// ConstantPool
// ============================================================================

/// Interning store for every pooled value of one ABC file.
///
/// Interning returns the existing index for an equal entry, otherwise appends.
/// Doubles compare by bit pattern, so `0.0` and `-0.0` are distinct entries;
/// every NaN maps to the sentinel index 0.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    ints: Table<i32, i32>,
    uints: Table<u32, u32>,
    doubles: Table<f64, u64>,
    strings: Table<String, String>,
    namespaces: Table<Namespace, Namespace>,
    ns_sets: Table<NamespaceSet, NamespaceSet>,
    multinames: Table<Multiname, Multiname>,
}

impl ConstantPool {
    /// Create a new empty constant pool.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern_int(&mut self, value: i32) -> u32 {
        self.ints.intern(value, value)
    }

    pub fn intern_uint(&mut self, value: u32) -> u32 {
        self.uints.intern(value, value)
    }

    /// Intern a double. NaN is never stored and yields index 0.
    pub fn intern_double(&mut self, value: f64) -> u32 {
        if value.is_nan() {
            return 0;
        }
        self.doubles.intern(value.to_bits(), value)
    }

    /// Intern a string. The empty string is a regular entry.
    pub fn intern_string(&mut self, value: &str) -> u32 {
        if let Some(&idx) = self.strings.index.get(value) {
            return idx;
        }
        self.strings.intern(value.to_owned(), value.to_owned())
    }

    pub fn intern_namespace(&mut self, ns: Namespace) -> u32 {
        self.namespaces.intern(ns, ns)
    }

    pub fn intern_ns_set(&mut self, set: NamespaceSet) -> u32 {
        self.ns_sets.intern(set.clone(), set)
    }

    pub fn intern_multiname(&mut self, name: Multiname) -> u32 {
        self.multinames.intern(name, name)
    }

    // ========================================================================
    // Convenience constructors
    // ========================================================================

    /// The package namespace for `package` (`""` is the public namespace).
    pub fn package_namespace(&mut self, package: &str) -> u32 {
        let name = self.intern_string(package);
        self.intern_namespace(Namespace {
            kind: NamespaceKind::PackageNamespace,
            name,
        })
    }

    /// The public namespace: the unnamed package namespace.
    pub fn public_namespace(&mut self) -> u32 {
        self.package_namespace("")
    }

    /// A namespace set holding only the public namespace.
    pub fn public_ns_set(&mut self) -> u32 {
        let ns = self.public_namespace();
        self.intern_ns_set(NamespaceSet(vec![ns]))
    }

    /// A `QName` in namespace `ns`.
    pub fn qname(&mut self, ns: u32, name: &str) -> u32 {
        let name = self.intern_string(name);
        self.intern_multiname(Multiname::QName { ns, name })
    }

    /// A `QName` in the public namespace.
    pub fn public_qname(&mut self, name: &str) -> u32 {
        let ns = self.public_namespace();
        self.qname(ns, name)
    }

    /// A `QName` in the package namespace of `package`.
    pub fn package_qname(&mut self, package: &str, name: &str) -> u32 {
        let ns = self.package_namespace(package);
        self.qname(ns, name)
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn int(&self, index: u32) -> Option<i32> {
        self.ints.get(index).copied()
    }

    pub fn uint(&self, index: u32) -> Option<u32> {
        self.uints.get(index).copied()
    }

    pub fn double(&self, index: u32) -> Option<f64> {
        self.doubles.get(index).copied()
    }

    pub fn string(&self, index: u32) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }

    pub fn namespace(&self, index: u32) -> Option<&Namespace> {
        self.namespaces.get(index)
    }

    pub fn ns_set(&self, index: u32) -> Option<&NamespaceSet> {
        self.ns_sets.get(index)
    }

    pub fn multiname(&self, index: u32) -> Option<&Multiname> {
        self.multinames.get(index)
    }

    /// Printable form of a multiname for traces and disassembly.
    pub fn describe_multiname(&self, index: u32) -> String {
        let name_of = |idx: u32| self.string(idx).unwrap_or("*").to_owned();
        let ns_of = |idx: u32| {
            self.namespace(idx)
                .map(|ns| name_of(ns.name))
                .unwrap_or_else(|| "*".to_owned())
        };
        match self.multiname(index) {
            None => format!("#{index}"),
            Some(Multiname::QName { ns, name }) | Some(Multiname::QNameA { ns, name }) => {
                let ns = ns_of(*ns);
                if ns.is_empty() {
                    name_of(*name)
                } else {
                    format!("{ns}::{}", name_of(*name))
                }
            }
            Some(Multiname::RtqName { name }) | Some(Multiname::RtqNameA { name }) => {
                format!("[rt]::{}", name_of(*name))
            }
            Some(Multiname::RtqNameL) | Some(Multiname::RtqNameLA) => "[rt]::[rt]".to_owned(),
            Some(Multiname::Multiname { name, .. }) | Some(Multiname::MultinameA { name, .. }) => {
                format!("{{set}}::{}", name_of(*name))
            }
            Some(Multiname::MultinameL { .. }) | Some(Multiname::MultinameLA { .. }) => {
                "{set}::[rt]".to_owned()
            }
        }
    }

    /// Entry counts per table, in section order.
    pub fn len(&self) -> [usize; 7] {
        [
            self.ints.entries.len(),
            self.uints.entries.len(),
            self.doubles.entries.len(),
            self.strings.entries.len(),
            self.namespaces.entries.len(),
            self.ns_sets.entries.len(),
            self.multinames.entries.len(),
        ]
    }

    /// Check if every table is empty.
    pub fn is_empty(&self) -> bool {
        self.len().iter().all(|&n| n == 0)
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Write the seven pool sections.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        self.ints.write_count(out)?;
        for &v in &self.ints.entries {
            write_s32(out, v);
        }

        self.uints.write_count(out)?;
        for &v in &self.uints.entries {
            write_u32(out, v);
        }

        self.doubles.write_count(out)?;
        for &v in &self.doubles.entries {
            write_d64(out, v);
        }

        self.strings.write_count(out)?;
        for v in &self.strings.entries {
            write_string(out, v)?;
        }

        self.namespaces.write_count(out)?;
        for ns in &self.namespaces.entries {
            write_u8(out, ns.kind.into());
            write_u30(out, ns.name)?;
        }

        self.ns_sets.write_count(out)?;
        for set in &self.ns_sets.entries {
            write_u30_usize(out, set.0.len())?;
            for &ns in &set.0 {
                write_u30(out, ns)?;
            }
        }

        self.multinames.write_count(out)?;
        for name in &self.multinames.entries {
            name.write_to(out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_pool_is_empty() {
        let pool = ConstantPool::new();
        assert!(pool.is_empty());
        assert_eq!(pool.int(0), None);
    }

    #[test]
    fn indices_start_at_one() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.intern_int(7), 1);
        assert_eq!(pool.intern_uint(7), 1);
        assert_eq!(pool.intern_double(7.0), 1);
        assert_eq!(pool.intern_string("seven"), 1);
        assert_eq!(pool.int(1), Some(7));
    }

    #[test]
    fn interning_is_idempotent() {
        let mut pool = ConstantPool::new();
        let a = pool.intern_int(100);
        let b = pool.intern_int(200);
        let c = pool.intern_int(100);
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(c, a);
        assert_eq!(pool.len()[0], 2);
    }

    #[test]
    fn zero_is_a_real_entry() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.intern_int(0), 1);
        assert_eq!(pool.intern_uint(0), 1);
    }

    #[test]
    fn nan_maps_to_sentinel() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.intern_double(f64::NAN), 0);
        assert_eq!(pool.intern_double(-f64::NAN), 0);
        assert!(pool.is_empty());
    }

    #[test]
    fn signed_zeroes_are_distinct() {
        let mut pool = ConstantPool::new();
        let pos = pool.intern_double(0.0);
        let neg = pool.intern_double(-0.0);
        assert_ne!(pos, neg);
        assert_eq!(pool.intern_double(-0.0), neg);
    }

    #[test]
    fn empty_string_is_not_the_sentinel() {
        let mut pool = ConstantPool::new();
        let idx = pool.intern_string("");
        assert_eq!(idx, 1);
        assert_eq!(pool.string(idx), Some(""));
    }

    #[test]
    fn structural_equality_for_names() {
        let mut pool = ConstantPool::new();
        let a = pool.public_qname("foo");
        let b = pool.public_qname("foo");
        let c = pool.public_qname("bar");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let s1 = pool.public_ns_set();
        let s2 = pool.public_ns_set();
        assert_eq!(s1, s2);
        assert_eq!(pool.len()[4], 1);
    }

    #[test]
    fn tables_have_independent_indices() {
        let mut pool = ConstantPool::new();
        pool.intern_int(1);
        pool.intern_int(2);
        assert_eq!(pool.intern_string("x"), 1);
    }

    #[test]
    fn describe_qualified_names() {
        let mut pool = ConstantPool::new();
        let plain = pool.public_qname("Object");
        let nested = pool.package_qname("flash.utils", "ByteArray");
        let late = pool.public_ns_set();
        let late = pool.intern_multiname(Multiname::MultinameL { ns_set: late });
        assert_eq!(pool.describe_multiname(plain), "Object");
        assert_eq!(pool.describe_multiname(nested), "flash.utils::ByteArray");
        assert_eq!(pool.describe_multiname(late), "{set}::[rt]");
    }

    #[test]
    fn empty_pool_encodes_zero_counts() {
        let pool = ConstantPool::new();
        let mut out = Vec::new();
        pool.write_to(&mut out).unwrap();
        assert_eq!(out, vec![0; 7]);
    }

    #[test]
    fn qname_encodes_namespace_then_name() {
        let mut pool = ConstantPool::new();
        pool.public_qname("f");
        let mut out = Vec::new();
        pool.write_to(&mut out).unwrap();
        assert_eq!(
            out,
            vec![
                0, 0, 0, // ints, uints, doubles
                3, 0, 1, b'f', // strings: "", "f"
                2, 0x16, 1, // namespaces: package ""
                0, // ns sets
                2, 0x07, 1, 2, // multinames: QName(ns 1, name 2)
            ]
        );
    }

    #[test]
    fn runtime_operand_counts() {
        assert_eq!(Multiname::QName { ns: 1, name: 1 }.runtime_operands(), 0);
        assert_eq!(Multiname::RtqName { name: 1 }.runtime_operands(), 1);
        assert_eq!(Multiname::RtqNameL.runtime_operands(), 2);
        assert_eq!(Multiname::MultinameL { ns_set: 1 }.runtime_operands(), 1);
    }
}
