//! Class file model
//!
//! A [`ClassFile`] keeps the raw bytes of every field and method alongside the
//! decoded view so a unit can drop members and be written back without
//! re-encoding the rest of the file. [`BinaryUnit`] is the analyzer-facing view
//! built on top of it.

pub mod builder;
mod constant_pool;
pub mod descriptor;
pub mod instructions;
mod reader;
mod unit;

pub use constant_pool::{Constant, ConstantPool, MemberRef};
pub use descriptor::{FieldType, MethodDescriptor};
pub use instructions::{Instruction, Instructions, InvokeKind, MemberHandle, Reference, References, TypeUse};
pub use unit::{Behavior, BinaryUnit, Code, ExceptionHandler, Field};

use reader::ByteReader;
use thiserror::Error;

pub const MAGIC: u32 = 0xCAFE_BABE;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_NATIVE: u16 = 0x0100;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_MODULE: u16 = 0x8000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassFormatError {
    #[error("unexpected end of data at offset {offset}")]
    UnexpectedEof { offset: usize },

    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),

    #[error("unknown constant pool tag {0}")]
    UnknownConstantTag(u8),

    #[error("constant pool count {0} does not match its entries")]
    BadConstantPoolCount(usize),

    #[error("invalid constant pool index {0}")]
    BadConstantIndex(u16),

    #[error("constant #{index} is not a {expected}")]
    UnexpectedConstant { index: u16, expected: &'static str },

    #[error("malformed descriptor {0:?}")]
    BadDescriptor(String),

    #[error("unknown opcode {opcode:#04x} at bytecode offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("truncated instruction at bytecode offset {offset}")]
    TruncatedCode { offset: usize },
}

/// An attribute with its payload left undecoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name: String,
    pub info: Vec<u8>,
}

/// A field_info or method_info structure
#[derive(Debug, Clone)]
pub struct MemberInfo {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub attributes: Vec<AttributeInfo>,
    raw: Vec<u8>,
}

impl MemberInfo {
    fn parse(reader: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<Self, ClassFormatError> {
        let start = reader.position();
        let access_flags = reader.u2()?;
        let name = pool.utf8(reader.u2()?)?.to_string();
        let descriptor = pool.utf8(reader.u2()?)?.to_string();
        let attributes = parse_attributes(reader, pool)?;
        Ok(Self {
            access_flags,
            name,
            descriptor,
            attributes,
            raw: reader.since(start).to_vec(),
        })
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

fn parse_attributes(reader: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<Vec<AttributeInfo>, ClassFormatError> {
    let count = reader.u2()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = pool.utf8(reader.u2()?)?.to_string();
        let len = reader.u4()? as usize;
        attributes.push(AttributeInfo {
            name,
            info: reader.take(len)?.to_vec(),
        });
    }
    Ok(attributes)
}

/// A parsed class file that can be serialised back after dropping members
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<MemberInfo>,
    pub methods: Vec<MemberInfo>,
    pub attributes: Vec<AttributeInfo>,
    /// magic through the interface table
    header: Vec<u8>,
    /// class attribute table
    trailer: Vec<u8>,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self, ClassFormatError> {
        let mut reader = ByteReader::new(bytes);
        let magic = reader.u4()?;
        if magic != MAGIC {
            return Err(ClassFormatError::BadMagic(magic));
        }
        let minor_version = reader.u2()?;
        let major_version = reader.u2()?;
        let constant_pool = ConstantPool::parse(&mut reader)?;
        let access_flags = reader.u2()?;
        let this_class = constant_pool.class_name(reader.u2()?)?.to_string();
        let super_index = reader.u2()?;
        let super_class = if super_index == 0 {
            None
        } else {
            Some(constant_pool.class_name(super_index)?.to_string())
        };
        let interface_count = reader.u2()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(constant_pool.class_name(reader.u2()?)?.to_string());
        }
        let header = reader.since(0).to_vec();

        let field_count = reader.u2()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            fields.push(MemberInfo::parse(&mut reader, &constant_pool)?);
        }
        let method_count = reader.u2()?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            methods.push(MemberInfo::parse(&mut reader, &constant_pool)?);
        }

        let trailer_start = reader.position();
        let attributes = parse_attributes(&mut reader, &constant_pool)?;
        let trailer = reader.since(trailer_start).to_vec();

        Ok(Self {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
            header,
            trailer,
        })
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Keep only the fields and methods for which `keep` returns true
    pub fn retain_fields(&mut self, keep: impl FnMut(&MemberInfo) -> bool) {
        self.fields.retain(keep);
    }

    pub fn retain_methods(&mut self, keep: impl FnMut(&MemberInfo) -> bool) {
        self.methods.retain(keep);
    }

    /// Serialise; the constant pool is written unchanged, so entries only
    /// used by dropped members simply become unreferenced
    pub fn to_bytes(&self) -> Vec<u8> {
        let members: usize = self.fields.iter().chain(&self.methods).map(|m| m.raw.len()).sum();
        let mut out = Vec::with_capacity(self.header.len() + members + self.trailer.len() + 4);
        out.extend_from_slice(&self.header);
        out.extend_from_slice(&(self.fields.len() as u16).to_be_bytes());
        for field in &self.fields {
            out.extend_from_slice(&field.raw);
        }
        out.extend_from_slice(&(self.methods.len() as u16).to_be_bytes());
        for method in &self.methods {
            out.extend_from_slice(&method.raw);
        }
        out.extend_from_slice(&self.trailer);
        out
    }
}
