//! Analyzer-facing view of one compiled class

use super::constant_pool::{Constant, ConstantPool};
use super::descriptor::{internal_to_dotted, parameter_signature, referenced_class, FieldType, MethodDescriptor};
use super::instructions::{MemberHandle, Reference, References, TypeUse};
use super::reader::ByteReader;
use super::{ClassFile, ClassFormatError, MemberInfo, ACC_INTERFACE, ACC_MODULE, ACC_NATIVE};

pub const CONSTRUCTOR: &str = "<init>";
pub const STATIC_INITIALIZER: &str = "<clinit>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub descriptor: String,
    pub field_type: FieldType,
    pub access_flags: u16,
}

impl Field {
    /// `a.Used used`
    pub fn long_name(&self) -> String {
        format!("{} {}", self.field_type, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// `None` for `finally` handlers
    pub catch_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub bytecode: Vec<u8>,
    pub exception_table: Vec<ExceptionHandler>,
}

/// A method or constructor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Behavior {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub parameters: Vec<FieldType>,
    pub return_type: Option<FieldType>,
    pub access_flags: u16,
    /// Classes named by the `Exceptions` attribute
    pub exceptions: Vec<String>,
    pub code: Option<Code>,
}

impl Behavior {
    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR
    }

    pub fn is_static_initializer(&self) -> bool {
        self.name == STATIC_INITIALIZER
    }

    pub fn is_method(&self) -> bool {
        !self.name.starts_with('<')
    }

    pub fn is_native(&self) -> bool {
        self.access_flags & ACC_NATIVE != 0
    }

    /// `(I[Ljava/lang/String;)`; the part of the descriptor that identifies an overload
    pub fn parameter_signature(&self) -> &str {
        parameter_signature(&self.descriptor)
    }

    fn parameter_list(&self) -> String {
        self.parameters
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// `a.B.run(int)` for methods, `a.B(int)` for constructors
    pub fn long_name(&self) -> String {
        if self.is_constructor() {
            format!("{}({})", self.owner, self.parameter_list())
        } else {
            format!("{}.{}({})", self.owner, self.name, self.parameter_list())
        }
    }

    /// Strip-log form: methods carry their return type in front
    pub fn display_name(&self) -> String {
        if !self.is_method() {
            return self.long_name();
        }
        let return_type = self
            .return_type
            .as_ref()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "void".to_string());
        format!("{} {}", return_type, self.long_name())
    }
}

/// A class with its members decoded, names in dotted form
#[derive(Debug, Clone)]
pub struct BinaryUnit {
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub access_flags: u16,
    pub fields: Vec<Field>,
    pub behaviors: Vec<Behavior>,
    /// Per bootstrap method: the handle plus every class or handle among its static arguments
    pub bootstrap_methods: Vec<Vec<Reference>>,
    pub class_file: ClassFile,
}

impl BinaryUnit {
    pub fn parse(bytes: &[u8]) -> Result<Self, ClassFormatError> {
        Self::from_class_file(ClassFile::parse(bytes)?)
    }

    pub fn from_class_file(class_file: ClassFile) -> Result<Self, ClassFormatError> {
        let name = internal_to_dotted(&class_file.this_class);
        let pool = &class_file.constant_pool;

        let fields = class_file
            .fields
            .iter()
            .map(|f| {
                Ok(Field {
                    name: f.name.clone(),
                    descriptor: f.descriptor.clone(),
                    field_type: FieldType::parse(&f.descriptor)?,
                    access_flags: f.access_flags,
                })
            })
            .collect::<Result<Vec<_>, ClassFormatError>>()?;

        let behaviors = class_file
            .methods
            .iter()
            .map(|m| parse_behavior(&name, m, pool))
            .collect::<Result<Vec<_>, _>>()?;

        let bootstrap_methods = match class_file.attribute("BootstrapMethods") {
            Some(attribute) => parse_bootstrap_methods(&attribute.info, pool)?,
            None => Vec::new(),
        };

        Ok(Self {
            super_name: class_file.super_class.as_deref().map(internal_to_dotted),
            interfaces: class_file.interfaces.iter().map(|i| internal_to_dotted(i)).collect(),
            access_flags: class_file.access_flags,
            name,
            fields,
            behaviors,
            bootstrap_methods,
            class_file,
        })
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags & ACC_INTERFACE != 0
    }

    pub fn is_module(&self) -> bool {
        self.access_flags & ACC_MODULE != 0
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Declared behavior by name and parameter signature
    pub fn behavior(&self, name: &str, parameters: &str) -> Option<&Behavior> {
        self.behaviors
            .iter()
            .find(|b| b.name == name && b.parameter_signature() == parameters)
    }

    /// Every declared method with this name, all overloads
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Behavior> + 'a {
        self.behaviors.iter().filter(move |b| b.is_method() && b.name == name)
    }

    pub fn static_initializer(&self) -> Option<&Behavior> {
        self.behaviors.iter().find(|b| b.is_static_initializer())
    }

    /// Symbol references made by a behavior body of this unit
    pub fn references<'a>(&'a self, code: &'a Code) -> References<'a> {
        References::new(&code.bytecode, &self.class_file.constant_pool)
    }

    /// Serialised class bytes with only the members accepted by the predicates
    pub fn to_bytes_retaining(
        &self,
        mut keep_field: impl FnMut(&Field) -> bool,
        mut keep_behavior: impl FnMut(&Behavior) -> bool,
    ) -> Vec<u8> {
        let mut class_file = self.class_file.clone();
        let mut fields = self.fields.iter();
        class_file.retain_fields(|_| fields.next().map_or(true, &mut keep_field));
        let mut behaviors = self.behaviors.iter();
        class_file.retain_methods(|_| behaviors.next().map_or(true, &mut keep_behavior));
        class_file.to_bytes()
    }
}

fn parse_behavior(owner: &str, info: &MemberInfo, pool: &ConstantPool) -> Result<Behavior, ClassFormatError> {
    let descriptor = MethodDescriptor::parse(&info.descriptor)?;

    let code = match info.attribute("Code") {
        Some(attribute) => Some(parse_code(&attribute.info, pool)?),
        None => None,
    };

    let mut exceptions = Vec::new();
    if let Some(attribute) = info.attribute("Exceptions") {
        let mut reader = ByteReader::new(&attribute.info);
        let count = reader.u2()?;
        for _ in 0..count {
            if let Some(class) = referenced_class(pool.class_name(reader.u2()?)?)? {
                exceptions.push(class);
            }
        }
    }

    Ok(Behavior {
        owner: owner.to_string(),
        name: info.name.clone(),
        descriptor: info.descriptor.clone(),
        parameters: descriptor.parameters,
        return_type: descriptor.return_type,
        access_flags: info.access_flags,
        exceptions,
        code,
    })
}

fn parse_code(info: &[u8], pool: &ConstantPool) -> Result<Code, ClassFormatError> {
    let mut reader = ByteReader::new(info);
    let _max_stack = reader.u2()?;
    let _max_locals = reader.u2()?;
    let code_length = reader.u4()? as usize;
    let bytecode = reader.take(code_length)?.to_vec();

    let handler_count = reader.u2()?;
    let mut exception_table = Vec::with_capacity(handler_count as usize);
    for _ in 0..handler_count {
        let start_pc = reader.u2()?;
        let end_pc = reader.u2()?;
        let handler_pc = reader.u2()?;
        let catch_index = reader.u2()?;
        let catch_type = if catch_index == 0 {
            None
        } else {
            referenced_class(pool.class_name(catch_index)?)?
        };
        exception_table.push(ExceptionHandler {
            start_pc,
            end_pc,
            handler_pc,
            catch_type,
        });
    }

    Ok(Code {
        bytecode,
        exception_table,
    })
}

fn parse_bootstrap_methods(info: &[u8], pool: &ConstantPool) -> Result<Vec<Vec<Reference>>, ClassFormatError> {
    let mut reader = ByteReader::new(info);
    let count = reader.u2()?;
    let mut methods = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mut references = Vec::new();
        let handle_index = reader.u2()?;
        if let Some(handle) = MemberHandle::from_pool(pool, handle_index)? {
            references.push(Reference::Handle(handle));
        }
        let argument_count = reader.u2()?;
        for _ in 0..argument_count {
            let index = reader.u2()?;
            match pool.get(index)? {
                Constant::MethodHandle { .. } => {
                    if let Some(handle) = MemberHandle::from_pool(pool, index)? {
                        references.push(Reference::Handle(handle));
                    }
                }
                Constant::Class { .. } => {
                    if let Some(class) = referenced_class(pool.class_name(index)?)? {
                        references.push(Reference::Type(TypeUse::ClassLiteral, class));
                    }
                }
                _ => {}
            }
        }
        methods.push(references);
    }
    Ok(methods)
}
