// Symbol identities for the reachability graph

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a method or constructor: owner, name and parameter signature.
///
/// Two behaviors with equal name and parameters in different classes are
/// different symbols; the override relation is an edge between them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BehaviorId {
    pub owner: String,
    pub name: String,
    /// Descriptor parameter part, `(I[Ljava/lang/String;)`
    pub parameters: String,
}

impl BehaviorId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, parameters: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            parameters: parameters.into(),
        }
    }

    /// Same name and parameters, owner ignored
    pub fn same_signature(&self, other: &BehaviorId) -> bool {
        self.name == other.name && self.parameters == other.parameters
    }
}

impl fmt::Display for BehaviorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.parameters)
    }
}

/// Identity of a field: owner and name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberId {
    pub owner: String,
    pub name: String,
}

impl MemberId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.name)
    }
}

/// A node of the reachability graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Symbol {
    Unit { name: String },
    Behavior(BehaviorId),
    Member(MemberId),
}

impl Symbol {
    pub fn unit(name: impl Into<String>) -> Self {
        Symbol::Unit { name: name.into() }
    }

    /// The class this symbol belongs to (itself for units)
    pub fn owner(&self) -> &str {
        match self {
            Symbol::Unit { name } => name,
            Symbol::Behavior(id) => &id.owner,
            Symbol::Member(id) => &id.owner,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Unit { name } => write!(f, "{}", name),
            Symbol::Behavior(id) => write!(f, "{}", id),
            Symbol::Member(id) => write!(f, "{}", id),
        }
    }
}

impl From<BehaviorId> for Symbol {
    fn from(id: BehaviorId) -> Self {
        Symbol::Behavior(id)
    }
}

impl From<MemberId> for Symbol {
    fn from(id: MemberId) -> Self {
        Symbol::Member(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_signature_is_not_same_symbol() {
        let base = BehaviorId::new("a.Base", "foo", "()");
        let derived = BehaviorId::new("a.Derived", "foo", "()");
        assert!(base.same_signature(&derived));
        assert_ne!(base, derived);
    }

    #[test]
    fn test_display() {
        assert_eq!(BehaviorId::new("a.B", "run", "(I)").to_string(), "a.B.run(I)");
        assert_eq!(Symbol::from(MemberId::new("a.B", "x")).to_string(), "a.B.x");
        assert_eq!(Symbol::unit("a.B").owner(), "a.B");
    }
}
