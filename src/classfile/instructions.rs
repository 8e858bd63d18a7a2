//! Pull-based bytecode decoding
//!
//! [`Instructions`] walks a code array one instruction at a time; [`References`]
//! layers on top of it and yields only the instructions that name another
//! symbol. Both are lazy, finite and cheap to restart (clone or re-create).

use super::constant_pool::{Constant, ConstantPool, MemberRef};
use super::descriptor::referenced_class;
use super::ClassFormatError;

pub mod opcode {
    pub const LDC: u8 = 0x12;
    pub const LDC_W: u8 = 0x13;
    pub const LDC2_W: u8 = 0x14;
    pub const IINC: u8 = 0x84;
    pub const TABLESWITCH: u8 = 0xaa;
    pub const LOOKUPSWITCH: u8 = 0xab;
    pub const GETSTATIC: u8 = 0xb2;
    pub const PUTSTATIC: u8 = 0xb3;
    pub const GETFIELD: u8 = 0xb4;
    pub const PUTFIELD: u8 = 0xb5;
    pub const INVOKEVIRTUAL: u8 = 0xb6;
    pub const INVOKESPECIAL: u8 = 0xb7;
    pub const INVOKESTATIC: u8 = 0xb8;
    pub const INVOKEINTERFACE: u8 = 0xb9;
    pub const INVOKEDYNAMIC: u8 = 0xba;
    pub const NEW: u8 = 0xbb;
    pub const ANEWARRAY: u8 = 0xbd;
    pub const CHECKCAST: u8 = 0xc0;
    pub const INSTANCEOF: u8 = 0xc1;
    pub const WIDE: u8 = 0xc4;
    pub const MULTIANEWARRAY: u8 = 0xc5;
}

/// One decoded instruction; `index` is the constant pool operand where the opcode has one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub offset: usize,
    pub opcode: u8,
    pub index: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct Instructions<'a> {
    code: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> Instructions<'a> {
    pub fn new(code: &'a [u8]) -> Self {
        Self { code, pos: 0, failed: false }
    }

    fn byte(&self, at: usize) -> Result<u8, ClassFormatError> {
        self.code
            .get(at)
            .copied()
            .ok_or(ClassFormatError::TruncatedCode { offset: at })
    }

    fn u2(&self, at: usize) -> Result<u16, ClassFormatError> {
        Ok(u16::from_be_bytes([self.byte(at)?, self.byte(at + 1)?]))
    }

    fn i4(&self, at: usize) -> Result<i32, ClassFormatError> {
        Ok(i32::from_be_bytes([
            self.byte(at)?,
            self.byte(at + 1)?,
            self.byte(at + 2)?,
            self.byte(at + 3)?,
        ]))
    }

    /// Length of the instruction at `offset`, operands included
    fn length(&self, offset: usize, opcode: u8) -> Result<usize, ClassFormatError> {
        let len = match opcode {
            0x00..=0x0f => 1,
            0x10 => 2,
            0x11 => 3,
            opcode::LDC => 2,
            opcode::LDC_W | opcode::LDC2_W => 3,
            0x15..=0x19 => 2,
            0x1a..=0x35 => 1,
            0x36..=0x3a => 2,
            0x3b..=0x83 => 1,
            opcode::IINC => 3,
            0x85..=0x98 => 1,
            0x99..=0xa8 => 3,
            0xa9 => 2,
            opcode::TABLESWITCH => {
                let base = offset + 1 + padding(offset);
                let low = self.i4(base + 4)?;
                let high = self.i4(base + 8)?;
                let count = (high as i64 - low as i64 + 1).max(0) as usize;
                1 + padding(offset) + 12 + count * 4
            }
            opcode::LOOKUPSWITCH => {
                let base = offset + 1 + padding(offset);
                let pairs = self.i4(base + 4)?.max(0) as usize;
                1 + padding(offset) + 8 + pairs * 8
            }
            0xac..=0xb1 => 1,
            opcode::GETSTATIC..=opcode::INVOKESTATIC => 3,
            opcode::INVOKEINTERFACE | opcode::INVOKEDYNAMIC => 5,
            opcode::NEW => 3,
            0xbc => 2,
            opcode::ANEWARRAY => 3,
            0xbe | 0xbf => 1,
            opcode::CHECKCAST | opcode::INSTANCEOF => 3,
            0xc2 | 0xc3 => 1,
            opcode::WIDE => {
                if self.byte(offset + 1)? == opcode::IINC {
                    6
                } else {
                    4
                }
            }
            opcode::MULTIANEWARRAY => 4,
            0xc6 | 0xc7 => 3,
            0xc8 | 0xc9 => 5,
            0xca | 0xfe | 0xff => 1,
            other => return Err(ClassFormatError::UnknownOpcode { opcode: other, offset }),
        };
        Ok(len)
    }

    fn decode(&self, offset: usize) -> Result<(Instruction, usize), ClassFormatError> {
        let opcode = self.byte(offset)?;
        let len = self.length(offset, opcode)?;
        if offset + len > self.code.len() {
            return Err(ClassFormatError::TruncatedCode { offset });
        }
        let index = match opcode {
            opcode::LDC => Some(self.byte(offset + 1)? as u16),
            opcode::LDC_W
            | opcode::LDC2_W
            | opcode::GETSTATIC..=opcode::INVOKEDYNAMIC
            | opcode::NEW
            | opcode::ANEWARRAY
            | opcode::CHECKCAST
            | opcode::INSTANCEOF
            | opcode::MULTIANEWARRAY => Some(self.u2(offset + 1)?),
            _ => None,
        };
        Ok((Instruction { offset, opcode, index }, len))
    }
}

/// Alignment padding after a switch opcode at `offset`
fn padding(offset: usize) -> usize {
    (4 - (offset + 1) % 4) % 4
}

impl Iterator for Instructions<'_> {
    type Item = Result<Instruction, ClassFormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.code.len() {
            return None;
        }
        match self.decode(self.pos) {
            Ok((instruction, len)) => {
                self.pos += len;
                Some(Ok(instruction))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    Virtual,
    Static,
    Special,
    Interface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeUse {
    New,
    NewArray,
    MultiNewArray,
    CheckCast,
    InstanceOf,
    ClassLiteral,
    /// Method call on an array type, e.g. `clone()`
    ArrayReceiver,
}

/// What a method handle points at
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberHandle {
    Field(MemberRef),
    Method(MemberRef),
}

impl MemberHandle {
    /// Resolve a `CONSTANT_MethodHandle` at `index`
    pub fn from_pool(pool: &ConstantPool, index: u16) -> Result<Option<Self>, ClassFormatError> {
        match pool.get(index)? {
            Constant::MethodHandle { reference_kind, reference_index } => {
                let target = pool.member_ref(*reference_index)?;
                if target.owner.starts_with('[') {
                    return Ok(None);
                }
                Ok(Some(if *reference_kind <= 4 {
                    MemberHandle::Field(target)
                } else {
                    MemberHandle::Method(target)
                }))
            }
            _ => Ok(None),
        }
    }
}

/// A symbol reference found in a method body
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    FieldRead(MemberRef),
    FieldWrite(MemberRef),
    Invoke(InvokeKind, MemberRef),
    Type(TypeUse, String),
    Handle(MemberHandle),
    /// `invokedynamic`; index into the unit's bootstrap method table
    Dynamic(u16),
}

#[derive(Debug, Clone)]
pub struct References<'a> {
    instructions: Instructions<'a>,
    pool: &'a ConstantPool,
}

impl<'a> References<'a> {
    pub fn new(code: &'a [u8], pool: &'a ConstantPool) -> Self {
        Self {
            instructions: Instructions::new(code),
            pool,
        }
    }

    fn reference(&self, instruction: Instruction) -> Result<Option<Reference>, ClassFormatError> {
        let Some(index) = instruction.index else {
            return Ok(None);
        };
        let reference = match instruction.opcode {
            opcode::GETSTATIC | opcode::GETFIELD => Reference::FieldRead(self.pool.member_ref(index)?),
            opcode::PUTSTATIC | opcode::PUTFIELD => Reference::FieldWrite(self.pool.member_ref(index)?),
            opcode::INVOKEVIRTUAL
            | opcode::INVOKESPECIAL
            | opcode::INVOKESTATIC
            | opcode::INVOKEINTERFACE => {
                let target = self.pool.member_ref(index)?;
                if target.owner.starts_with('[') {
                    return Ok(referenced_class(&target.owner)?
                        .map(|class| Reference::Type(TypeUse::ArrayReceiver, class)));
                }
                let kind = match instruction.opcode {
                    opcode::INVOKEVIRTUAL => InvokeKind::Virtual,
                    opcode::INVOKESPECIAL => InvokeKind::Special,
                    opcode::INVOKESTATIC => InvokeKind::Static,
                    _ => InvokeKind::Interface,
                };
                Reference::Invoke(kind, target)
            }
            opcode::INVOKEDYNAMIC => match self.pool.get(index)? {
                Constant::InvokeDynamic { bootstrap_method_attr_index, .. } => {
                    Reference::Dynamic(*bootstrap_method_attr_index)
                }
                _ => {
                    return Err(ClassFormatError::UnexpectedConstant { index, expected: "InvokeDynamic" })
                }
            },
            opcode::NEW | opcode::ANEWARRAY | opcode::CHECKCAST | opcode::INSTANCEOF | opcode::MULTIANEWARRAY => {
                let use_ = match instruction.opcode {
                    opcode::NEW => TypeUse::New,
                    opcode::ANEWARRAY => TypeUse::NewArray,
                    opcode::CHECKCAST => TypeUse::CheckCast,
                    opcode::INSTANCEOF => TypeUse::InstanceOf,
                    _ => TypeUse::MultiNewArray,
                };
                match referenced_class(self.pool.class_name(index)?)? {
                    Some(class) => Reference::Type(use_, class),
                    None => return Ok(None),
                }
            }
            opcode::LDC | opcode::LDC_W => match self.pool.get(index)? {
                Constant::Class { .. } => match referenced_class(self.pool.class_name(index)?)? {
                    Some(class) => Reference::Type(TypeUse::ClassLiteral, class),
                    None => return Ok(None),
                },
                Constant::MethodHandle { .. } => match MemberHandle::from_pool(self.pool, index)? {
                    Some(handle) => Reference::Handle(handle),
                    None => return Ok(None),
                },
                _ => return Ok(None),
            },
            _ => return Ok(None),
        };
        Ok(Some(reference))
    }
}

impl Iterator for References<'_> {
    type Item = Result<Reference, ClassFormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let instruction = match self.instructions.next()? {
                Ok(instruction) => instruction,
                Err(e) => return Some(Err(e)),
            };
            match self.reference(instruction) {
                Ok(Some(reference)) => return Some(Ok(reference)),
                Ok(None) => continue,
                Err(e) => {
                    self.instructions.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_instruction_walk() {
        // iconst_0, istore_1, bipush 7, pop, return
        let code = [0x03, 0x3c, 0x10, 0x07, 0x57, 0xb1];
        let offsets: Vec<_> = Instructions::new(&code).map(|i| i.unwrap().offset).collect();
        assert_eq!(offsets, vec![0, 1, 2, 4, 5]);
    }

    #[test]
    fn test_tableswitch_padding() {
        // nop, tableswitch at offset 1 -> 2 pad bytes, default, low=0, high=1, 2 targets, then return
        let mut code = vec![0x00, opcode::TABLESWITCH, 0, 0];
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&1i32.to_be_bytes());
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&0i32.to_be_bytes());
        code.push(0xb1);
        let decoded: Vec<_> = Instructions::new(&code).map(|i| i.unwrap()).collect();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[2].offset, code.len() - 1);
    }

    #[test]
    fn test_lookupswitch_and_wide() {
        // lookupswitch at 0 -> 3 pad bytes, default, npairs=1, one pair; wide iinc; return
        let mut code = vec![opcode::LOOKUPSWITCH, 0, 0, 0];
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&1i32.to_be_bytes());
        code.extend_from_slice(&5i32.to_be_bytes());
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&[opcode::WIDE, opcode::IINC, 0, 1, 0, 1]);
        code.push(0xb1);
        let decoded: Vec<_> = Instructions::new(&code).map(|i| i.unwrap().opcode).collect();
        assert_eq!(decoded, vec![opcode::LOOKUPSWITCH, opcode::WIDE, 0xb1]);
    }

    #[test]
    fn test_unknown_opcode_stops_iteration() {
        let code = [0x00, 0xd0, 0x00];
        let mut iter = Instructions::new(&code);
        assert!(iter.next().unwrap().is_ok());
        assert!(matches!(
            iter.next(),
            Some(Err(ClassFormatError::UnknownOpcode { opcode: 0xd0, offset: 1 }))
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_truncated_operand() {
        let code = [opcode::GETSTATIC, 0x00];
        assert!(matches!(
            Instructions::new(&code).next(),
            Some(Err(ClassFormatError::TruncatedCode { .. }))
        ));
    }
}
