use super::classpath::ClassPool;
use crate::classfile::{BinaryUnit, MemberHandle, MemberRef, Reference, ACC_PRIVATE, ACC_STATIC};
use crate::classfile::descriptor::parameter_signature;
use crate::error::{Error, Result};
use crate::graph::{BehaviorId, EdgeKind, MemberId, Symbol, SymbolGraph};
use petgraph::graph::NodeIndex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::rc::Rc;
use tracing::{debug, warn};

/// JDK bootstrap classes whose native methods are expected
pub const NATIVE_ALLOW_LIST: &[&str] = &[
    "sun.misc.Unsafe",
    "sun.reflect.ConstantPool",
    "sun.misc.VM",
    "java.io.Console",
    "java.io.FileSystem",
    "java.io.ObjectStreamClass",
    "java.lang.Double",
    "java.lang.Object",
    "java.lang.Package",
    "java.lang.System",
    "java.lang.ClassLoader",
    "java.lang.Thread",
    "java.lang.Throwable",
    "java.lang.SecurityManager",
    "java.net.InetAddress",
    "java.net.NetworkingInterface",
    "java.security.AccessController",
    "java.util.TimeZone",
];

/// Method handle classes whose methods match any call descriptor
const SIGNATURE_POLYMORPHIC: &[&str] = &["java.lang.invoke.MethodHandle", "java.lang.invoke.VarHandle"];

#[derive(Debug, Clone, Default)]
pub struct AnalyzerOptions {
    /// Treat references to classes missing from every classpath as errors
    pub strict_unresolved: bool,
}

/// A reference that could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unresolved {
    pub symbol: String,
    pub referrer: String,
}

/// Result of a closure run
#[derive(Debug)]
pub struct Reachability {
    graph: SymbolGraph,
    unresolved: Vec<Unresolved>,
    native_methods: Vec<String>,
}

impl Reachability {
    pub fn graph(&self) -> &SymbolGraph {
        &self.graph
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.graph.contains(symbol)
    }

    pub fn contains_unit(&self, name: &str) -> bool {
        self.graph.contains_unit(name)
    }

    pub fn contains_behavior(&self, owner: &str, name: &str, parameters: &str) -> bool {
        self.graph.contains(&Symbol::Behavior(BehaviorId::new(owner, name, parameters)))
    }

    pub fn contains_member(&self, owner: &str, name: &str) -> bool {
        self.graph.contains(&Symbol::Member(MemberId::new(owner, name)))
    }

    /// Every reachable symbol, ordered
    pub fn symbols(&self) -> std::collections::BTreeSet<Symbol> {
        self.graph.symbols().cloned().collect()
    }

    /// Look up `a.B`, `a.B.field`, `a.B.method` (first overload) or `a.B.method(I)`
    pub fn find(&self, text: &str) -> Option<&Symbol> {
        if let Some(idx) = self.graph.node_index(&Symbol::unit(text)) {
            return self.graph.symbol(idx);
        }
        let (head, parameters) = match text.find('(') {
            Some(i) => (&text[..i], Some(&text[i..])),
            None => (text, None),
        };
        let (owner, name) = head.rsplit_once('.')?;
        self.graph.symbols().find(|s| match s {
            Symbol::Behavior(id) => {
                id.owner == owner && id.name == name && parameters.map_or(true, |p| id.parameters == p)
            }
            Symbol::Member(id) => parameters.is_none() && id.owner == owner && id.name == name,
            Symbol::Unit { .. } => false,
        })
    }

    /// Discovery chain from a root to the symbol named by `text`
    pub fn explain(&self, text: &str) -> Option<Vec<(Option<EdgeKind>, &Symbol)>> {
        self.graph.explain(self.find(text)?)
    }

    pub fn unresolved(&self) -> &[Unresolved] {
        &self.unresolved
    }

    /// Retained native methods outside the allow-list
    pub fn native_methods(&self) -> &[String] {
        &self.native_methods
    }
}

/// Worklist closure over classes, behaviors and fields.
///
/// Every `add_*` is idempotent. A newly added behavior is queued and its code
/// decoded by [`closure`](Self::closure); unit and behavior discovery both
/// re-check overrides, so the result does not depend on arrival order.
pub struct ReachabilityAnalyzer<'a> {
    pool: ClassPool<'a>,
    options: AnalyzerOptions,
    graph: SymbolGraph,
    queue: VecDeque<(NodeIndex, Rc<BinaryUnit>, usize)>,
    /// Resolved, visited units with all their supertypes
    loaded: Vec<(Rc<BinaryUnit>, Rc<HashSet<String>>)>,
    /// Visited methods by (name, parameters), for late-arriving subclasses
    methods_by_signature: HashMap<(String, String), Vec<(NodeIndex, String)>>,
    unresolved: BTreeMap<String, String>,
    native_methods: Vec<String>,
}

impl<'a> ReachabilityAnalyzer<'a> {
    pub fn new(pool: ClassPool<'a>) -> Self {
        Self::with_options(pool, AnalyzerOptions::default())
    }

    pub fn with_options(pool: ClassPool<'a>, options: AnalyzerOptions) -> Self {
        Self {
            pool,
            options,
            graph: SymbolGraph::new(),
            queue: VecDeque::new(),
            loaded: Vec::new(),
            methods_by_signature: HashMap::new(),
            unresolved: BTreeMap::new(),
            native_methods: Vec::new(),
        }
    }

    /// Seed with a class (all declared behaviors) or `Class.method` (all overloads)
    pub fn add_root(&mut self, root: &str) -> Result<()> {
        if let Some(unit) = self.pool.get(root)? {
            debug!("root class {}", root);
            self.add_unit(root, None, EdgeKind::Root)?;
            for index in 0..unit.behaviors.len() {
                self.add_behavior(&unit, index, None, EdgeKind::Root)?;
            }
            return Ok(());
        }

        let not_found = || Error::RootNotFound { root: root.to_string() };
        let (class, method) = root.rsplit_once('.').ok_or_else(not_found)?;
        let unit = self.pool.get(class)?.ok_or_else(not_found)?;
        let matches: Vec<usize> = unit
            .behaviors
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_method() && b.name == method)
            .map(|(i, _)| i)
            .collect();
        if matches.is_empty() {
            return Err(not_found());
        }
        debug!("root {} ({} overloads)", root, matches.len());
        for index in matches {
            self.add_behavior(&unit, index, None, EdgeKind::Root)?;
        }
        Ok(())
    }

    /// Mark a class reachable as if referenced from outside
    pub fn add_class(&mut self, name: &str) -> Result<()> {
        self.add_unit(name, None, EdgeKind::Root).map(|_| ())
    }

    /// Number of symbols reached so far
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.graph.contains(symbol)
    }

    fn add_unit(&mut self, name: &str, from: Option<NodeIndex>, kind: EdgeKind) -> Result<NodeIndex> {
        let (idx, new) = self.graph.insert(Symbol::unit(name), from, kind);
        if !new {
            return Ok(idx);
        }
        let Some(unit) = self.pool.get(name)? else {
            self.record_unresolved(name.to_string(), from);
            return Ok(idx);
        };

        let (supertypes, open) = self.supertypes(&unit)?;
        let supertypes = Rc::new(supertypes);
        self.loaded.push((unit.clone(), supertypes.clone()));

        if let Some(super_name) = &unit.super_name {
            self.add_unit(super_name, Some(idx), EdgeKind::SuperClass)?;
        }
        for interface in &unit.interfaces {
            self.add_unit(interface, Some(idx), EdgeKind::Interface)?;
        }
        if let Some(index) = unit.behaviors.iter().position(|b| b.is_static_initializer()) {
            self.add_behavior(&unit, index, Some(idx), EdgeKind::StaticInitializer)?;
        }

        // calls dispatched through a supertype we cannot see are invisible,
        // so every instance method may be an override
        if open {
            debug!("{} has an unresolved supertype, keeping its instance methods", unit.name);
            for (index, behavior) in unit.behaviors.iter().enumerate() {
                if behavior.is_method() && behavior.access_flags & (ACC_STATIC | ACC_PRIVATE) == 0 {
                    self.add_behavior(&unit, index, Some(idx), EdgeKind::UnresolvedSuper)?;
                }
            }
        }

        // methods of this unit overriding already visited ones
        for (index, behavior) in unit.behaviors.iter().enumerate() {
            if !behavior.is_method() {
                continue;
            }
            let key = (behavior.name.clone(), behavior.parameter_signature().to_string());
            let bases: Vec<NodeIndex> = match self.methods_by_signature.get(&key) {
                Some(bases) => bases
                    .iter()
                    .filter(|(_, owner)| supertypes.contains(owner))
                    .map(|(node, _)| *node)
                    .collect(),
                None => continue,
            };
            if let Some(base) = bases.first() {
                self.add_behavior(&unit, index, Some(*base), EdgeKind::Override)?;
            }
        }
        Ok(idx)
    }

    fn add_behavior(
        &mut self,
        unit: &Rc<BinaryUnit>,
        index: usize,
        from: Option<NodeIndex>,
        kind: EdgeKind,
    ) -> Result<NodeIndex> {
        let behavior = &unit.behaviors[index];
        let id = BehaviorId::new(&unit.name, &behavior.name, behavior.parameter_signature());
        let (idx, new) = self.graph.insert(Symbol::Behavior(id), from, kind);
        if !new {
            return Ok(idx);
        }

        self.add_unit(&unit.name, Some(idx), EdgeKind::Declares)?;
        for parameter in &behavior.parameters {
            if let Some(class) = parameter.class_name() {
                self.add_unit(class, Some(idx), EdgeKind::ParameterType)?;
            }
        }
        if let Some(class) = behavior.return_type.as_ref().and_then(|t| t.class_name()) {
            self.add_unit(class, Some(idx), EdgeKind::ReturnType)?;
        }
        if let Some(code) = &behavior.code {
            for handler in &code.exception_table {
                if let Some(class) = &handler.catch_type {
                    self.add_unit(class, Some(idx), EdgeKind::CatchType)?;
                }
            }
        }
        // the verifier may load declared exceptions even if never thrown
        for class in &behavior.exceptions {
            self.add_unit(class, Some(idx), EdgeKind::Throws)?;
        }

        if behavior.is_native() && !NATIVE_ALLOW_LIST.contains(&unit.name.as_str()) {
            self.native_methods.push(behavior.long_name());
        }
        self.queue.push_back((idx, unit.clone(), index));

        if behavior.is_method() {
            let key = (behavior.name.clone(), behavior.parameter_signature().to_string());
            self.methods_by_signature
                .entry(key)
                .or_default()
                .push((idx, unit.name.clone()));

            // overriding methods in already visited subtypes
            let overriders: Vec<(Rc<BinaryUnit>, usize)> = self
                .loaded
                .iter()
                .filter(|(derived, supertypes)| derived.name != unit.name && supertypes.contains(&unit.name))
                .filter_map(|(derived, _)| {
                    derived
                        .behaviors
                        .iter()
                        .position(|b| {
                            b.is_method()
                                && b.name == behavior.name
                                && b.parameter_signature() == behavior.parameter_signature()
                        })
                        .map(|i| (derived.clone(), i))
                })
                .collect();
            for (derived, derived_index) in overriders {
                self.add_behavior(&derived, derived_index, Some(idx), EdgeKind::Override)?;
            }
        }
        Ok(idx)
    }

    fn add_member(&mut self, owner: &str, name: &str, from: NodeIndex, kind: EdgeKind) -> Result<()> {
        let Some((declaring, complete)) = self.resolve_field(owner, name)? else {
            return Ok(());
        };
        let Some(unit) = declaring else {
            return self.missing_member(format!("{}.{}", owner, name), from, complete);
        };
        let Some(field) = unit.field(name) else {
            return Ok(());
        };
        let (idx, new) = self.graph.insert(Symbol::Member(MemberId::new(&unit.name, name)), Some(from), kind);
        if new {
            self.add_unit(&unit.name, Some(idx), EdgeKind::Declares)?;
            if let Some(class) = field.field_type.class_name() {
                self.add_unit(class, Some(idx), EdgeKind::FieldType)?;
            }
        }
        Ok(())
    }

    /// Field lookup: the class, its superinterfaces, then its superclass.
    /// `None` when `owner` itself is unresolved; otherwise the declaring unit
    /// (if found) and whether every class on the path resolved.
    fn resolve_field(&mut self, owner: &str, name: &str) -> Result<Option<(Option<Rc<BinaryUnit>>, bool)>> {
        if self.pool.get(owner)?.is_none() {
            return Ok(None);
        }
        let mut complete = true;
        let mut pending = vec![owner.to_string()];
        let mut seen = HashSet::new();
        while let Some(class) = pending.pop() {
            if !seen.insert(class.clone()) {
                continue;
            }
            let Some(unit) = self.pool.get(&class)? else {
                complete = false;
                continue;
            };
            if unit.field(name).is_some() {
                return Ok(Some((Some(unit), complete)));
            }
            // pushed in reverse so interfaces are searched before the superclass
            if let Some(super_name) = &unit.super_name {
                pending.push(super_name.clone());
            }
            for interface in unit.interfaces.iter().rev() {
                pending.push(interface.clone());
            }
        }
        Ok(Some((None, complete)))
    }

    fn invoke(&mut self, target: &MemberRef, from: NodeIndex, kind: EdgeKind) -> Result<()> {
        self.add_unit(&target.owner, Some(from), kind)?;
        let parameters = parameter_signature(&target.descriptor);
        let Some((found, complete)) = self.resolve_method(&target.owner, &target.name, parameters)? else {
            return Ok(());
        };
        match found {
            Some((unit, index)) => {
                self.add_behavior(&unit, index, Some(from), kind)?;
                Ok(())
            }
            None => self.missing_member(
                format!("{}.{}{}", target.owner, target.name, target.descriptor),
                from,
                complete,
            ),
        }
    }

    /// Method lookup: constructors on the owner only; methods along the
    /// superclass chain, then through all superinterfaces.
    #[allow(clippy::type_complexity)]
    fn resolve_method(
        &mut self,
        owner: &str,
        name: &str,
        parameters: &str,
    ) -> Result<Option<(Option<(Rc<BinaryUnit>, usize)>, bool)>> {
        let Some(unit) = self.pool.get(owner)? else {
            return Ok(None);
        };
        let position = |unit: &BinaryUnit| {
            unit.behaviors
                .iter()
                .position(|b| b.name == name && b.parameter_signature() == parameters)
                .or_else(|| {
                    if SIGNATURE_POLYMORPHIC.contains(&unit.name.as_str()) {
                        unit.behaviors.iter().position(|b| b.name == name && b.is_native())
                    } else {
                        None
                    }
                })
        };

        if name.starts_with('<') {
            return Ok(Some((position(&*unit).map(|i| (unit.clone(), i)), true)));
        }

        let mut complete = true;
        let mut interfaces = Vec::new();
        let mut current = Some(unit);
        while let Some(class) = current {
            if let Some(index) = position(&*class) {
                return Ok(Some((Some((class, index)), complete)));
            }
            interfaces.extend(class.interfaces.iter().cloned());
            current = match &class.super_name {
                Some(super_name) => {
                    let next = self.pool.get(super_name)?;
                    if next.is_none() {
                        complete = false;
                    }
                    next
                }
                None => None,
            };
        }

        let mut seen = HashSet::new();
        let mut pending: VecDeque<String> = interfaces.into();
        while let Some(interface) = pending.pop_front() {
            if !seen.insert(interface.clone()) {
                continue;
            }
            let Some(unit) = self.pool.get(&interface)? else {
                complete = false;
                continue;
            };
            if let Some(index) = position(&*unit) {
                return Ok(Some((Some((unit, index)), complete)));
            }
            pending.extend(unit.interfaces.iter().cloned());
        }
        Ok(Some((None, complete)))
    }

    fn missing_member(&mut self, symbol: String, from: NodeIndex, complete: bool) -> Result<()> {
        if complete {
            return Err(Error::UnresolvedSymbol {
                symbol,
                referrer: self.describe(Some(from)),
            });
        }
        self.record_unresolved(symbol, Some(from));
        Ok(())
    }

    fn record_unresolved(&mut self, symbol: String, from: Option<NodeIndex>) {
        let referrer = self.describe(from);
        debug!("unresolved {} (from {})", symbol, referrer);
        self.unresolved.entry(symbol).or_insert(referrer);
    }

    fn describe(&self, node: Option<NodeIndex>) -> String {
        node.and_then(|idx| self.graph.symbol(idx))
            .map(|s| s.to_string())
            .unwrap_or_else(|| "<root>".to_string())
    }

    /// All classes and interfaces `unit` extends or implements, transitively,
    /// and whether any of them is missing from the classpath
    fn supertypes(&mut self, unit: &BinaryUnit) -> Result<(HashSet<String>, bool)> {
        let mut result = HashSet::new();
        let mut open = false;
        let mut pending: Vec<String> = unit.super_name.iter().chain(&unit.interfaces).cloned().collect();
        while let Some(name) = pending.pop() {
            if !result.insert(name.clone()) {
                continue;
            }
            match self.pool.get(&name)? {
                Some(parent) => pending.extend(parent.super_name.iter().chain(&parent.interfaces).cloned()),
                None => open = true,
            }
        }
        Ok((result, open))
    }

    fn follow(&mut self, unit: &Rc<BinaryUnit>, reference: Reference, from: NodeIndex) -> Result<()> {
        match reference {
            Reference::FieldRead(target) => {
                self.add_unit(&target.owner, Some(from), EdgeKind::FieldRead)?;
                self.add_member(&target.owner, &target.name, from, EdgeKind::FieldRead)
            }
            Reference::FieldWrite(target) => {
                self.add_unit(&target.owner, Some(from), EdgeKind::FieldWrite)?;
                self.add_member(&target.owner, &target.name, from, EdgeKind::FieldWrite)
            }
            Reference::Invoke(_, target) => self.invoke(&target, from, EdgeKind::Invoke),
            Reference::Type(_, class) => self.add_unit(&class, Some(from), EdgeKind::TypeUse).map(|_| ()),
            Reference::Handle(MemberHandle::Field(target)) => {
                self.add_unit(&target.owner, Some(from), EdgeKind::Handle)?;
                self.add_member(&target.owner, &target.name, from, EdgeKind::Handle)
            }
            Reference::Handle(MemberHandle::Method(target)) => self.invoke(&target, from, EdgeKind::Handle),
            Reference::Dynamic(bootstrap) => {
                let arguments = unit
                    .bootstrap_methods
                    .get(bootstrap as usize)
                    .cloned()
                    .unwrap_or_default();
                for argument in arguments {
                    self.follow(unit, argument, from)?;
                }
                Ok(())
            }
        }
    }

    /// Decode queued behaviors until nothing new is reached
    pub fn closure(&mut self) -> Result<()> {
        while let Some((idx, unit, index)) = self.queue.pop_front() {
            let Some(code) = &unit.behaviors[index].code else {
                continue;
            };
            let references = unit
                .references(code)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| {
                    Error::class_format(
                        format!("{}.{}", unit.name, unit.behaviors[index].name),
                        e,
                    )
                })?;
            for reference in references {
                self.follow(&unit, reference, idx)?;
            }
        }
        Ok(())
    }

    /// Run the closure to its fixed point and hand over the reachable set
    pub fn finish(mut self) -> Result<Reachability> {
        self.closure()?;

        if !self.unresolved.is_empty() {
            warn!(
                "{} unresolved symbols (not found on any classpath)",
                self.unresolved.len()
            );
            if self.options.strict_unresolved {
                let (symbol, referrer) = self
                    .unresolved
                    .iter()
                    .next()
                    .map(|(s, r)| (s.clone(), r.clone()))
                    .unwrap_or_default();
                return Err(Error::UnresolvedSymbol { symbol, referrer });
            }
        }
        for method in &self.native_methods {
            warn!("native method: {}", method);
        }

        Ok(Reachability {
            graph: self.graph,
            unresolved: self
                .unresolved
                .into_iter()
                .map(|(symbol, referrer)| Unresolved { symbol, referrer })
                .collect(),
            native_methods: self.native_methods,
        })
    }
}

/// Does `unit` declare `public static void main(String[])`?
pub fn has_main_method(unit: &BinaryUnit) -> bool {
    unit.behaviors.iter().any(|b| {
        b.name == "main"
            && b.descriptor == "([Ljava/lang/String;)V"
            && b.access_flags & crate::classfile::ACC_STATIC != 0
            && b.access_flags & crate::classfile::ACC_PUBLIC != 0
    })
}
