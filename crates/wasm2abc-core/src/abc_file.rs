//! The whole-file record set and its serializer.

use crate::constant::ConstantPool;
use crate::error::EncodeError;
use crate::records::{ClassInfo, InstanceInfo, Metadata, MethodBody, MethodInfo, ScriptInfo};
use crate::varint::{write_u16, write_u30_usize};

/// Default minor version.
pub const DEFAULT_MINOR_VERSION: u16 = 16;

/// Default major version.
pub const DEFAULT_MAJOR_VERSION: u16 = 46;

/// Every record of one ABC file.
///
/// Lives for a whole translation session. Instances and classes are parallel
/// tables and must have the same length when encoded.
#[derive(Debug, Clone)]
pub struct AbcFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub pool: ConstantPool,
    pub methods: Vec<MethodInfo>,
    pub metadata: Vec<Metadata>,
    pub instances: Vec<InstanceInfo>,
    pub classes: Vec<ClassInfo>,
    pub scripts: Vec<ScriptInfo>,
    pub bodies: Vec<MethodBody>,
}

impl Default for AbcFile {
    fn default() -> Self {
        Self::new(DEFAULT_MINOR_VERSION, DEFAULT_MAJOR_VERSION)
    }
}

impl AbcFile {
    /// Create an empty file with the given version.
    pub fn new(minor_version: u16, major_version: u16) -> Self {
        Self {
            minor_version,
            major_version,
            pool: ConstantPool::new(),
            methods: Vec::new(),
            metadata: Vec::new(),
            instances: Vec::new(),
            classes: Vec::new(),
            scripts: Vec::new(),
            bodies: Vec::new(),
        }
    }

    /// Append a method signature and return its index.
    pub fn add_method(&mut self, info: MethodInfo) -> u32 {
        self.methods.push(info);
        (self.methods.len() - 1) as u32
    }

    /// Append a method body.
    pub fn add_body(&mut self, body: MethodBody) {
        self.bodies.push(body);
    }

    /// Append a class (instance and static halves) and return its index.
    pub fn add_class(&mut self, instance: InstanceInfo, class: ClassInfo) -> u32 {
        self.instances.push(instance);
        self.classes.push(class);
        (self.classes.len() - 1) as u32
    }

    /// Append a script and return its index.
    pub fn add_script(&mut self, script: ScriptInfo) -> u32 {
        self.scripts.push(script);
        (self.scripts.len() - 1) as u32
    }

    /// The body for method `method`, if one was added.
    pub fn body_of(&self, method: u32) -> Option<&MethodBody> {
        self.bodies.iter().find(|b| b.method == method)
    }

    /// Serialize the whole file.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        if self.instances.len() != self.classes.len() {
            return Err(EncodeError::ClassCountMismatch {
                instances: self.instances.len(),
                classes: self.classes.len(),
            });
        }

        let mut out = Vec::with_capacity(self.estimated_size());
        write_u16(&mut out, self.minor_version);
        write_u16(&mut out, self.major_version);

        self.pool.write_to(&mut out)?;
        tracing::trace!(bytes = out.len(), "encoded constant pool");

        write_u30_usize(&mut out, self.methods.len())?;
        for method in &self.methods {
            method.write_to(&mut out)?;
        }

        write_u30_usize(&mut out, self.metadata.len())?;
        for md in &self.metadata {
            md.write_to(&mut out)?;
        }

        write_u30_usize(&mut out, self.classes.len())?;
        for instance in &self.instances {
            instance.write_to(&mut out)?;
        }
        for class in &self.classes {
            class.write_to(&mut out)?;
        }

        write_u30_usize(&mut out, self.scripts.len())?;
        for script in &self.scripts {
            script.write_to(&mut out)?;
        }

        write_u30_usize(&mut out, self.bodies.len())?;
        for body in &self.bodies {
            body.write_to(&mut out)?;
        }

        tracing::debug!(
            bytes = out.len(),
            methods = self.methods.len(),
            bodies = self.bodies.len(),
            classes = self.classes.len(),
            "encoded abc file"
        );
        Ok(out)
    }

    fn estimated_size(&self) -> usize {
        64 + self.bodies.iter().map(|b| b.code.len() + 16).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Trait;

    #[test]
    fn empty_file_layout() {
        let bytes = AbcFile::default().encode().unwrap();
        assert_eq!(
            bytes,
            vec![
                16, 0, 46, 0, // minor, major
                0, 0, 0, 0, 0, 0, 0, // pool sections
                0, // methods
                0, // metadata
                0, // classes
                0, // scripts
                0, // bodies
            ]
        );
    }

    #[test]
    fn mismatched_class_tables_fail() {
        let mut abc = AbcFile::default();
        abc.instances.push(InstanceInfo::default());
        assert_eq!(
            abc.encode(),
            Err(EncodeError::ClassCountMismatch {
                instances: 1,
                classes: 0,
            })
        );
    }

    #[test]
    fn table_indices_are_positional() {
        let mut abc = AbcFile::default();
        assert_eq!(abc.add_method(MethodInfo::default()), 0);
        assert_eq!(abc.add_method(MethodInfo::default()), 1);
        assert_eq!(
            abc.add_class(InstanceInfo::default(), ClassInfo::default()),
            0
        );
        assert_eq!(abc.add_script(ScriptInfo::default()), 0);
    }

    #[test]
    fn script_with_one_method() {
        let mut abc = AbcFile::new(16, 46);
        let name = abc.pool.public_qname("main");
        let method = abc.add_method(MethodInfo::default());
        abc.add_script(ScriptInfo {
            init: method,
            traits: vec![Trait::method(name, 1, method)],
        });
        abc.add_body(MethodBody {
            method,
            max_stack: 1,
            local_count: 1,
            init_scope_depth: 0,
            max_scope_depth: 1,
            code: vec![0x47],
            ..Default::default()
        });

        let bytes = abc.encode().unwrap();
        let tail = [
            1, 0, 0, 0, 0, // method: no params, any return, no name, no flags
            0, // metadata
            0, // classes
            1, 0, 1, 1, 0x01, 1, 0, // script: init 0, one method trait
            1, 0, 1, 1, 0, 1, 1, 0x47, 0, 0, // body
        ];
        assert!(bytes.ends_with(&tail));
        assert_eq!(abc.body_of(method).map(|b| b.code.len()), Some(1));
    }
}
