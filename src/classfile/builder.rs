//! Minimal class file assembler
//!
//! Produces structurally valid class files (not verifiable ones) for tests and
//! benchmarks, so fixtures can be described in code instead of checked-in
//! `.class` blobs.

use super::instructions::opcode;
use super::MAGIC;
use std::collections::HashMap;

/// One instruction; class operands use internal names (`a/b/C`, `[La/b/C;`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op<'a> {
    AconstNull,
    Pop,
    Dup,
    Return,
    Areturn,
    Athrow,
    New(&'a str),
    ANewArray(&'a str),
    CheckCast(&'a str),
    InstanceOf(&'a str),
    LdcClass(&'a str),
    GetStatic(&'a str, &'a str, &'a str),
    PutStatic(&'a str, &'a str, &'a str),
    GetField(&'a str, &'a str, &'a str),
    PutField(&'a str, &'a str, &'a str),
    InvokeVirtual(&'a str, &'a str, &'a str),
    InvokeSpecial(&'a str, &'a str, &'a str),
    InvokeStatic(&'a str, &'a str, &'a str),
    InvokeInterface(&'a str, &'a str, &'a str),
}

/// Extra method attributes: declared exceptions and catch handlers
#[derive(Debug, Clone, Default)]
pub struct MethodExtras {
    throws: Vec<String>,
    catches: Vec<String>,
}

impl MethodExtras {
    pub fn throws(mut self, class: &str) -> Self {
        self.throws.push(class.to_string());
        self
    }

    pub fn catches(mut self, class: &str) -> Self {
        self.catches.push(class.to_string());
        self
    }
}

#[derive(Debug, Default)]
struct PoolBuilder {
    entries: Vec<Vec<u8>>,
    index: HashMap<Vec<u8>, u16>,
}

impl PoolBuilder {
    fn intern(&mut self, entry: Vec<u8>) -> u16 {
        if let Some(index) = self.index.get(&entry) {
            return *index;
        }
        let index = (self.entries.len() + 1) as u16;
        self.index.insert(entry.clone(), index);
        self.entries.push(entry);
        index
    }

    fn utf8(&mut self, value: &str) -> u16 {
        let mut entry = vec![1];
        entry.extend_from_slice(&(value.len() as u16).to_be_bytes());
        entry.extend_from_slice(value.as_bytes());
        self.intern(entry)
    }

    fn indexed(&mut self, tag: u8, indices: &[u16]) -> u16 {
        let mut entry = vec![tag];
        for index in indices {
            entry.extend_from_slice(&index.to_be_bytes());
        }
        self.intern(entry)
    }

    fn class(&mut self, name: &str) -> u16 {
        let name = self.utf8(name);
        self.indexed(7, &[name])
    }

    fn member(&mut self, tag: u8, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class(owner);
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        let name_and_type = self.indexed(12, &[name, descriptor]);
        self.indexed(tag, &[class, name_and_type])
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&((self.entries.len() + 1) as u16).to_be_bytes());
        for entry in &self.entries {
            out.extend_from_slice(entry);
        }
    }
}

struct MethodSpec {
    access: u16,
    name: String,
    descriptor: String,
    code: Option<Vec<u8>>,
    extras: MethodExtras,
}

/// Builds a class file in memory
pub struct ClassBuilder {
    pool: PoolBuilder,
    access: u16,
    this_class: String,
    super_class: Option<String>,
    interfaces: Vec<String>,
    fields: Vec<(u16, String, String)>,
    methods: Vec<MethodSpec>,
}

impl ClassBuilder {
    /// A public class extending `java/lang/Object`
    pub fn new(name: &str) -> Self {
        Self {
            pool: PoolBuilder::default(),
            access: 0x0021,
            this_class: name.to_string(),
            super_class: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn access(mut self, flags: u16) -> Self {
        self.access = flags;
        self
    }

    pub fn super_class(mut self, name: &str) -> Self {
        self.super_class = Some(name.to_string());
        self
    }

    /// For `java/lang/Object` itself and module-info
    pub fn no_super_class(mut self) -> Self {
        self.super_class = None;
        self
    }

    pub fn interface(mut self, name: &str) -> Self {
        self.interfaces.push(name.to_string());
        self
    }

    pub fn field(mut self, access: u16, name: &str, descriptor: &str) -> Self {
        self.fields.push((access, name.to_string(), descriptor.to_string()));
        self
    }

    pub fn method(self, access: u16, name: &str, descriptor: &str, ops: Vec<Op<'_>>) -> Self {
        self.method_with(access, name, descriptor, ops, |m| m)
    }

    pub fn method_with(
        mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        ops: Vec<Op<'_>>,
        extras: impl FnOnce(MethodExtras) -> MethodExtras,
    ) -> Self {
        let code = self.assemble(&ops);
        self.methods.push(MethodSpec {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            code: Some(code),
            extras: extras(MethodExtras::default()),
        });
        self
    }

    /// Abstract or native method: no Code attribute
    pub fn bodiless_method(mut self, access: u16, name: &str, descriptor: &str) -> Self {
        self.methods.push(MethodSpec {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            code: None,
            extras: MethodExtras::default(),
        });
        self
    }

    fn assemble(&mut self, ops: &[Op<'_>]) -> Vec<u8> {
        let mut code = Vec::new();
        for op in ops {
            let (opcode, operand) = match *op {
                Op::AconstNull => (0x01, None),
                Op::Pop => (0x57, None),
                Op::Dup => (0x59, None),
                Op::Return => (0xb1, None),
                Op::Areturn => (0xb0, None),
                Op::Athrow => (0xbf, None),
                Op::New(class) => (opcode::NEW, Some(self.pool.class(class))),
                Op::ANewArray(class) => (opcode::ANEWARRAY, Some(self.pool.class(class))),
                Op::CheckCast(class) => (opcode::CHECKCAST, Some(self.pool.class(class))),
                Op::InstanceOf(class) => (opcode::INSTANCEOF, Some(self.pool.class(class))),
                Op::LdcClass(class) => (opcode::LDC_W, Some(self.pool.class(class))),
                Op::GetStatic(o, n, d) => (opcode::GETSTATIC, Some(self.pool.member(9, o, n, d))),
                Op::PutStatic(o, n, d) => (opcode::PUTSTATIC, Some(self.pool.member(9, o, n, d))),
                Op::GetField(o, n, d) => (opcode::GETFIELD, Some(self.pool.member(9, o, n, d))),
                Op::PutField(o, n, d) => (opcode::PUTFIELD, Some(self.pool.member(9, o, n, d))),
                Op::InvokeVirtual(o, n, d) => (opcode::INVOKEVIRTUAL, Some(self.pool.member(10, o, n, d))),
                Op::InvokeSpecial(o, n, d) => (opcode::INVOKESPECIAL, Some(self.pool.member(10, o, n, d))),
                Op::InvokeStatic(o, n, d) => (opcode::INVOKESTATIC, Some(self.pool.member(10, o, n, d))),
                Op::InvokeInterface(o, n, d) => (opcode::INVOKEINTERFACE, Some(self.pool.member(11, o, n, d))),
            };
            code.push(opcode);
            if let Some(index) = operand {
                code.extend_from_slice(&index.to_be_bytes());
                if opcode == opcode::INVOKEINTERFACE {
                    code.extend_from_slice(&[1, 0]);
                }
            }
        }
        code
    }

    pub fn build(mut self) -> Vec<u8> {
        let this_class = self.pool.class(&self.this_class);
        let super_class = match self.super_class.clone() {
            Some(name) => self.pool.class(&name),
            None => 0,
        };
        let interfaces: Vec<u16> = self
            .interfaces
            .clone()
            .iter()
            .map(|i| self.pool.class(i))
            .collect();

        let mut members = Vec::new();
        members.extend_from_slice(&(self.fields.len() as u16).to_be_bytes());
        for (access, name, descriptor) in std::mem::take(&mut self.fields) {
            members.extend_from_slice(&access.to_be_bytes());
            members.extend_from_slice(&self.pool.utf8(&name).to_be_bytes());
            members.extend_from_slice(&self.pool.utf8(&descriptor).to_be_bytes());
            members.extend_from_slice(&0u16.to_be_bytes());
        }

        members.extend_from_slice(&(self.methods.len() as u16).to_be_bytes());
        for method in std::mem::take(&mut self.methods) {
            members.extend_from_slice(&method.access.to_be_bytes());
            members.extend_from_slice(&self.pool.utf8(&method.name).to_be_bytes());
            members.extend_from_slice(&self.pool.utf8(&method.descriptor).to_be_bytes());

            let mut attributes = Vec::new();
            if let Some(code) = &method.code {
                let mut info = Vec::new();
                info.extend_from_slice(&4u16.to_be_bytes());
                info.extend_from_slice(&4u16.to_be_bytes());
                info.extend_from_slice(&(code.len() as u32).to_be_bytes());
                info.extend_from_slice(code);
                info.extend_from_slice(&(method.extras.catches.len() as u16).to_be_bytes());
                for class in &method.extras.catches {
                    info.extend_from_slice(&0u16.to_be_bytes());
                    info.extend_from_slice(&(code.len() as u16).to_be_bytes());
                    info.extend_from_slice(&0u16.to_be_bytes());
                    info.extend_from_slice(&self.pool.class(class).to_be_bytes());
                }
                info.extend_from_slice(&0u16.to_be_bytes());
                attributes.push((self.pool.utf8("Code"), info));
            }
            if !method.extras.throws.is_empty() {
                let mut info = Vec::new();
                info.extend_from_slice(&(method.extras.throws.len() as u16).to_be_bytes());
                for class in &method.extras.throws {
                    info.extend_from_slice(&self.pool.class(class).to_be_bytes());
                }
                attributes.push((self.pool.utf8("Exceptions"), info));
            }

            members.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
            for (name, info) in attributes {
                members.extend_from_slice(&name.to_be_bytes());
                members.extend_from_slice(&(info.len() as u32).to_be_bytes());
                members.extend_from_slice(&info);
            }
        }

        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&52u16.to_be_bytes());
        self.pool.write(&mut out);
        out.extend_from_slice(&self.access.to_be_bytes());
        out.extend_from_slice(&this_class.to_be_bytes());
        out.extend_from_slice(&super_class.to_be_bytes());
        out.extend_from_slice(&(interfaces.len() as u16).to_be_bytes());
        for interface in interfaces {
            out.extend_from_slice(&interface.to_be_bytes());
        }
        out.extend_from_slice(&members);
        out.extend_from_slice(&0u16.to_be_bytes());
        out
    }
}
