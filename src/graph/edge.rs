// Why one symbol made another reachable

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Declared as a root
    Root,

    /// Owning class of a behavior or field
    Declares,

    SuperClass,
    Interface,

    /// `<clinit>` of a loaded class
    StaticInitializer,

    ParameterType,
    ReturnType,

    /// Catch type in an exception table
    CatchType,

    /// Declared in a throws clause
    Throws,

    /// Overriding method of a reachable one
    Override,

    /// Instance method of a class with an unresolved supertype
    UnresolvedSuper,

    FieldRead,
    FieldWrite,
    Invoke,

    /// new, casts, array allocation, class literals
    TypeUse,

    /// Declared type of a field
    FieldType,

    /// Method handle or bootstrap argument
    Handle,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EdgeKind::Root => "root",
            EdgeKind::Declares => "declaring class",
            EdgeKind::SuperClass => "superclass",
            EdgeKind::Interface => "interface",
            EdgeKind::StaticInitializer => "static initializer",
            EdgeKind::ParameterType => "parameter type",
            EdgeKind::ReturnType => "return type",
            EdgeKind::CatchType => "catch type",
            EdgeKind::Throws => "throws",
            EdgeKind::Override => "overrides",
            EdgeKind::UnresolvedSuper => "may override an unresolved supertype",
            EdgeKind::FieldRead => "reads",
            EdgeKind::FieldWrite => "writes",
            EdgeKind::Invoke => "invokes",
            EdgeKind::TypeUse => "uses type",
            EdgeKind::FieldType => "field type",
            EdgeKind::Handle => "method handle",
        };
        f.write_str(label)
    }
}
