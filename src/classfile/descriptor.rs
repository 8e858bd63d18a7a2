//! Field and method descriptors (JVMS 4.3)

use super::ClassFormatError;
use std::fmt;

/// A field type as written in a descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Primitive, by descriptor letter (`I`, `J`, `Z`, ...)
    Base(char),
    /// Class or interface, dotted name
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType {
    pub fn parse(descriptor: &str) -> Result<Self, ClassFormatError> {
        let (field_type, rest) = Self::parse_prefix(descriptor)?;
        if !rest.is_empty() {
            return Err(ClassFormatError::BadDescriptor(descriptor.to_string()));
        }
        Ok(field_type)
    }

    fn parse_prefix(descriptor: &str) -> Result<(Self, &str), ClassFormatError> {
        let bad = || ClassFormatError::BadDescriptor(descriptor.to_string());
        let mut chars = descriptor.chars();
        let first = chars.next().ok_or_else(bad)?;
        match first {
            'B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z' => Ok((FieldType::Base(first), &descriptor[1..])),
            'L' => {
                let end = descriptor.find(';').ok_or_else(bad)?;
                let name = &descriptor[1..end];
                if name.is_empty() {
                    return Err(bad());
                }
                Ok((FieldType::Object(internal_to_dotted(name)), &descriptor[end + 1..]))
            }
            '[' => {
                let (component, rest) = Self::parse_prefix(&descriptor[1..]).map_err(|_| bad())?;
                Ok((FieldType::Array(Box::new(component)), rest))
            }
            _ => Err(bad()),
        }
    }

    /// The class a value of this type needs loaded, if any (element class for arrays)
    pub fn class_name(&self) -> Option<&str> {
        match self {
            FieldType::Base(_) => None,
            FieldType::Object(name) => Some(name),
            FieldType::Array(component) => component.class_name(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Base(c) => {
                let name = match c {
                    'B' => "byte",
                    'C' => "char",
                    'D' => "double",
                    'F' => "float",
                    'I' => "int",
                    'J' => "long",
                    'S' => "short",
                    _ => "boolean",
                };
                write!(f, "{}", name)
            }
            FieldType::Object(name) => write!(f, "{}", name),
            FieldType::Array(component) => write!(f, "{}[]", component),
        }
    }
}

/// A parsed method descriptor; `return_type` is `None` for `V`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,
    pub return_type: Option<FieldType>,
}

impl MethodDescriptor {
    pub fn parse(descriptor: &str) -> Result<Self, ClassFormatError> {
        let bad = || ClassFormatError::BadDescriptor(descriptor.to_string());
        let mut rest = descriptor.strip_prefix('(').ok_or_else(bad)?;
        let mut parameters = Vec::new();
        while !rest.starts_with(')') {
            let (parameter, tail) = FieldType::parse_prefix(rest).map_err(|_| bad())?;
            parameters.push(parameter);
            rest = tail;
        }
        let rest = &rest[1..];
        let return_type = if rest == "V" {
            None
        } else {
            Some(FieldType::parse(rest).map_err(|_| bad())?)
        };
        Ok(Self { parameters, return_type })
    }

    /// Parameters rendered the way javap prints them: `int,java.lang.String[]`
    pub fn parameter_list(&self) -> String {
        self.parameters
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// The parameter part of a method descriptor, `(` through `)`
pub fn parameter_signature(descriptor: &str) -> &str {
    match descriptor.find(')') {
        Some(end) => &descriptor[..=end],
        None => descriptor,
    }
}

pub fn internal_to_dotted(name: &str) -> String {
    name.replace('/', ".")
}

pub fn dotted_to_internal(name: &str) -> String {
    name.replace('.', "/")
}

/// Archive path of a class file
pub fn class_path(class_name: &str) -> String {
    format!("{}.class", dotted_to_internal(class_name))
}

/// The class named by a class constant; arrays yield their element class, primitive arrays nothing
pub fn referenced_class(internal_name: &str) -> Result<Option<String>, ClassFormatError> {
    if internal_name.starts_with('[') {
        Ok(FieldType::parse(internal_name)?.class_name().map(str::to_string))
    } else {
        Ok(Some(internal_to_dotted(internal_name)))
    }
}
