//! Translation options.

use std::fmt;

use wasm2abc_core::{ConstantPool, DEFAULT_MAJOR_VERSION, DEFAULT_MINOR_VERSION};

/// A `package:Name` class or property reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub package: String,
    pub name: String,
}

impl QualifiedName {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }

    /// A name in the unnamed public package.
    pub fn public(name: impl Into<String>) -> Self {
        Self::new("", name)
    }

    /// Parse `package:Name`. A name without a colon is public.
    pub fn parse(text: &str) -> Self {
        match text.rsplit_once(':') {
            Some((package, name)) => Self::new(package, name),
            None => Self::public(text),
        }
    }

    /// Intern as a `QName` in the package namespace.
    pub fn intern(&self, pool: &mut ConstantPool) -> u32 {
        pool.package_qname(&self.package, &self.name)
    }

    /// Dotted form used by container symbol tables.
    pub fn dotted(&self) -> String {
        if self.package.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.package, self.name)
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.package.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}:{}", self.package, self.name)
        }
    }
}

/// Options controlling the emitted class and file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Name of the emitted class.
    pub class_name: String,
    /// Package of the emitted class.
    pub package: String,
    /// Inheritance chain from the root class down to the direct superclass.
    pub base_classes: Vec<QualifiedName>,
    pub minor_version: u16,
    pub major_version: u16,
    /// Import module providing the reinterpret scratch functions.
    pub scratch_module: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            class_name: "Instance".to_owned(),
            package: String::new(),
            base_classes: vec![QualifiedName::public("Object")],
            minor_version: DEFAULT_MINOR_VERSION,
            major_version: DEFAULT_MAJOR_VERSION,
            scratch_module: "env".to_owned(),
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class_name(mut self, name: impl Into<String>) -> Self {
        self.class_name = name.into();
        self
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    /// Replace the inheritance chain. Must start at the root class.
    pub fn with_base_classes(mut self, chain: Vec<QualifiedName>) -> Self {
        self.base_classes = chain;
        self
    }

    /// Extend `flash.display:Sprite`, so the class can be a document class.
    pub fn with_sprite_base(self) -> Self {
        self.with_base_classes(
            [
                "Object",
                "flash.events:EventDispatcher",
                "flash.display:DisplayObject",
                "flash.display:InteractiveObject",
                "flash.display:DisplayObjectContainer",
                "flash.display:Sprite",
            ]
            .into_iter()
            .map(QualifiedName::parse)
            .collect(),
        )
    }

    pub fn with_version(mut self, minor: u16, major: u16) -> Self {
        self.minor_version = minor;
        self.major_version = major;
        self
    }

    pub fn with_scratch_module(mut self, module: impl Into<String>) -> Self {
        self.scratch_module = module.into();
        self
    }

    /// The emitted class as a qualified name.
    pub fn class_qname(&self) -> QualifiedName {
        QualifiedName::new(self.package.clone(), self.class_name.clone())
    }

    /// The direct superclass (`Object` when the chain is empty).
    pub fn super_class(&self) -> QualifiedName {
        self.base_classes
            .last()
            .cloned()
            .unwrap_or_else(|| QualifiedName::public("Object"))
    }
}
