//! Reachability and sweep integration tests
//!
//! Class files are synthesised with `ClassBuilder`; `java.lang.Object` is put
//! in the archive so every lookup path resolves.

use appjar::analysis::{self, AnalyzerOptions, ClassPool, ReachabilityAnalyzer, StripOptions};
use appjar::archive::{Archive, VirtualArchive};
use appjar::classfile::builder::{ClassBuilder, Op};
use appjar::classfile::descriptor::class_path;
use appjar::classfile::{BinaryUnit, ACC_PUBLIC, ACC_STATIC};
use appjar::graph::{EdgeKind, Symbol};
use appjar::Error;

const MAIN: &str = "([Ljava/lang/String;)V";

fn object() -> Vec<u8> {
    ClassBuilder::new("java/lang/Object")
        .no_super_class()
        .method(ACC_PUBLIC, "<init>", "()V", vec![Op::Return])
        .build()
}

fn archive_of(classes: Vec<Vec<u8>>) -> VirtualArchive {
    let mut archive = VirtualArchive::new();
    archive.write("java/lang/Object.class", object()).unwrap();
    for bytes in classes {
        let unit = BinaryUnit::parse(&bytes).unwrap();
        archive.write(&class_path(&unit.name), bytes).unwrap();
    }
    archive
}

fn holder_archive() -> VirtualArchive {
    archive_of(vec![
        ClassBuilder::new("a/Main")
            .method(
                ACC_PUBLIC | ACC_STATIC,
                "main",
                MAIN,
                vec![Op::GetStatic("a/Holder", "used", "La/Used;"), Op::Pop, Op::Return],
            )
            .build(),
        ClassBuilder::new("a/Holder")
            .field(ACC_PUBLIC | ACC_STATIC, "used", "La/Used;")
            .field(ACC_PUBLIC | ACC_STATIC, "unused", "La/Unused;")
            .build(),
        ClassBuilder::new("a/Used").build(),
        ClassBuilder::new("a/Unused").build(),
    ])
}

// ============================================================================
// Reachable set properties
// ============================================================================

#[test]
fn test_repeated_adds_do_not_grow_the_set() {
    let archive = holder_archive();
    let mut analyzer = ReachabilityAnalyzer::new(ClassPool::new(&archive));
    analyzer.add_root("a.Main.main").unwrap();
    analyzer.closure().unwrap();
    let size = analyzer.len();

    analyzer.add_root("a.Main.main").unwrap();
    analyzer.add_class("a.Holder").unwrap();
    analyzer.add_class("a.Used").unwrap();
    analyzer.closure().unwrap();
    assert_eq!(analyzer.len(), size);
}

#[test]
fn test_closure_only_grows() {
    let archive = holder_archive();
    let mut analyzer = ReachabilityAnalyzer::new(ClassPool::new(&archive));
    analyzer.add_root("a.Main.main").unwrap();
    let seeded = analyzer.len();
    let roots = [Symbol::unit("a.Main")];

    let reachability = analyzer.finish().unwrap();
    assert!(reachability.graph().len() >= seeded);
    assert!(roots.iter().all(|s| reachability.contains(s)));
}

#[test]
fn test_override_propagation_is_order_independent() {
    let archive = archive_of(vec![
        ClassBuilder::new("a/Base")
            .method(ACC_PUBLIC, "foo", "()V", vec![Op::Return])
            .build(),
        ClassBuilder::new("a/Derived")
            .super_class("a/Base")
            .method(ACC_PUBLIC, "foo", "()V", vec![Op::Return])
            .build(),
    ]);

    let mut base_first = ReachabilityAnalyzer::new(ClassPool::new(&archive));
    base_first.add_root("a.Base.foo").unwrap();
    base_first.closure().unwrap();
    base_first.add_class("a.Derived").unwrap();
    let base_first = base_first.finish().unwrap();

    let mut derived_first = ReachabilityAnalyzer::new(ClassPool::new(&archive));
    derived_first.add_class("a.Derived").unwrap();
    derived_first.closure().unwrap();
    derived_first.add_root("a.Base.foo").unwrap();
    let derived_first = derived_first.finish().unwrap();

    assert!(base_first.contains_behavior("a.Derived", "foo", "()"));
    assert_eq!(base_first.symbols(), derived_first.symbols());

    let chain = base_first.explain("a.Derived.foo()").unwrap();
    assert_eq!(chain.last().map(|(kind, _)| *kind), Some(Some(EdgeKind::Override)));
}

#[test]
fn test_unrelated_same_signature_is_not_an_override() {
    let archive = archive_of(vec![
        ClassBuilder::new("a/Base")
            .method(ACC_PUBLIC, "foo", "()V", vec![Op::Return])
            .build(),
        ClassBuilder::new("b/Stranger")
            .method(ACC_PUBLIC, "foo", "()V", vec![Op::Return])
            .build(),
    ]);
    let mut analyzer = ReachabilityAnalyzer::new(ClassPool::new(&archive));
    analyzer.add_root("a.Base.foo").unwrap();
    analyzer.add_class("b.Stranger").unwrap();
    let reachability = analyzer.finish().unwrap();
    assert!(!reachability.contains_behavior("b.Stranger", "foo", "()"));
}

#[test]
fn test_field_read_keeps_declaring_class_and_field_type_only() {
    let archive = holder_archive();
    let mut analyzer = ReachabilityAnalyzer::new(ClassPool::new(&archive));
    analyzer.add_root("a.Main.main").unwrap();
    let reachability = analyzer.finish().unwrap();

    assert!(reachability.contains_unit("a.Holder"));
    assert!(reachability.contains_member("a.Holder", "used"));
    assert!(reachability.contains_unit("a.Used"));
    assert!(!reachability.contains_member("a.Holder", "unused"));
    assert!(!reachability.contains_unit("a.Unused"));
}

#[test]
fn test_declared_exceptions_are_kept() {
    let archive = archive_of(vec![
        ClassBuilder::new("a/Main")
            .method_with(ACC_PUBLIC | ACC_STATIC, "run", "()V", vec![Op::Return], |m| m.throws("a/Ex"))
            .method_with(ACC_PUBLIC | ACC_STATIC, "safe", "()V", vec![Op::Return], |m| {
                m.catches("a/Caught")
            })
            .build(),
        ClassBuilder::new("a/Ex").build(),
        ClassBuilder::new("a/Caught").build(),
    ]);
    let mut analyzer = ReachabilityAnalyzer::new(ClassPool::new(&archive));
    analyzer.add_root("a.Main.run").unwrap();
    analyzer.add_root("a.Main.safe").unwrap();
    let reachability = analyzer.finish().unwrap();

    assert!(reachability.contains_unit("a.Ex"));
    assert!(reachability.contains_unit("a.Caught"));
}

#[test]
fn test_class_root_keeps_every_behavior() {
    let archive = archive_of(vec![ClassBuilder::new("a/Plugin")
        .method(ACC_PUBLIC, "<init>", "()V", vec![Op::Return])
        .method(ACC_PUBLIC, "start", "()V", vec![Op::Return])
        .method(ACC_PUBLIC, "stop", "()V", vec![Op::Return])
        .build()]);
    let mut analyzer = ReachabilityAnalyzer::new(ClassPool::new(&archive));
    analyzer.add_root("a.Plugin").unwrap();
    let reachability = analyzer.finish().unwrap();

    for name in ["<init>", "start", "stop"] {
        assert!(reachability.contains_behavior("a.Plugin", name, "()"), "{name}");
    }
}

#[test]
fn test_unknown_root() {
    let archive = holder_archive();
    let options = StripOptions {
        roots: vec!["a.Missing.main".to_string()],
        ..StripOptions::default()
    };
    let mut data = archive.clone();
    let err = analysis::strip(&mut data, &options).unwrap_err();
    assert!(matches!(err, Error::RootNotFound { ref root } if root == "a.Missing.main"));
    // nothing swept on failure
    assert_eq!(data.len(), archive.len());
}

// ============================================================================
// Sweep
// ============================================================================

#[test]
fn test_sweep_keeps_only_reachable_units() {
    let mut archive = archive_of(vec![
        ClassBuilder::new("a/Main")
            .no_super_class()
            .method(ACC_PUBLIC | ACC_STATIC, "main", MAIN, vec![Op::Return])
            .build(),
        ClassBuilder::new("a/Two").no_super_class().build(),
        ClassBuilder::new("a/Three").no_super_class().build(),
    ]);
    archive.delete("java/lang/Object.class").unwrap();

    let options = StripOptions {
        roots: vec!["a.Main.main".to_string()],
        ..StripOptions::default()
    };
    let (_, log) = analysis::strip(&mut archive, &options).unwrap();

    let paths: Vec<&str> = archive.paths().collect();
    assert_eq!(paths, vec!["a/Main.class"]);
    assert_eq!(log.deleted, vec!["a.Three", "a.Two"]);
}

#[test]
fn test_sweep_strips_unused_field_and_keeps_holder() {
    let mut archive = holder_archive();
    archive.write("META-INF/services/x", "kept").unwrap();
    let log_dir = tempfile::tempdir().unwrap();
    let options = StripOptions {
        roots: vec!["a.Main.main".to_string()],
        log: Some(log_dir.path().join("strip.log")),
        ..StripOptions::default()
    };

    let (_, log) = analysis::strip(&mut archive, &options).unwrap();

    assert!(archive.is_file("META-INF/services/x"));
    assert!(!archive.exists("a/Unused.class"));
    let holder = BinaryUnit::parse(archive.read("a/Holder.class").unwrap()).unwrap();
    let fields: Vec<&str> = holder.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(fields, vec!["used"]);

    let text = std::fs::read_to_string(log_dir.path().join("strip.log")).unwrap();
    assert!(text.contains("- a.Unused\n"));
    assert!(text.contains("* a.Holder\n  - a.Unused unused\n"));
    assert_eq!(log.removed_members(), log.modified.iter().map(|m| m.removed.len()).sum::<usize>());
}

#[test]
fn test_override_of_unresolved_base_survives_sweep() {
    let mut archive = VirtualArchive::new();
    for bytes in [
        ClassBuilder::new("a/Main")
            .method(
                ACC_PUBLIC | ACC_STATIC,
                "main",
                MAIN,
                vec![
                    Op::New("a/Shown"),
                    Op::InvokeVirtual("java/lang/Object", "toString", "()Ljava/lang/String;"),
                    Op::Pop,
                    Op::Return,
                ],
            )
            .build(),
        ClassBuilder::new("a/Shown")
            .method(ACC_PUBLIC, "toString", "()Ljava/lang/String;", vec![Op::AconstNull, Op::Areturn])
            .build(),
    ] {
        let unit = BinaryUnit::parse(&bytes).unwrap();
        archive.write(&class_path(&unit.name), bytes).unwrap();
    }

    let options = StripOptions {
        roots: vec!["a.Main.main".to_string()],
        ..StripOptions::default()
    };
    let (reachability, log) = analysis::strip(&mut archive, &options).unwrap();

    assert!(log.is_empty());
    assert!(reachability.unresolved().iter().any(|u| u.symbol == "java.lang.Object"));
    let shown = BinaryUnit::parse(archive.read("a/Shown.class").unwrap()).unwrap();
    assert!(shown.behaviors.iter().any(|b| b.name == "toString"));
}

#[test]
fn test_runtime_classpath_resolves_but_is_not_swept() {
    let dir = tempfile::tempdir().unwrap();
    let mut runtime = Archive::new();
    runtime.data.write("java/lang/Object.class", object()).unwrap();
    runtime
        .data
        .write("java/util/List.class", ClassBuilder::new("java/util/List").build())
        .unwrap();
    let runtime_path = dir.path().join("rt.jar");
    runtime.save_to(&runtime_path).unwrap();

    let mut archive = VirtualArchive::new();
    archive
        .write(
            "a/Main.class",
            ClassBuilder::new("a/Main")
                .method(
                    ACC_PUBLIC | ACC_STATIC,
                    "main",
                    MAIN,
                    vec![Op::CheckCast("java/util/List"), Op::Return],
                )
                .build(),
        )
        .unwrap();

    let options = StripOptions {
        roots: vec!["a.Main.main".to_string()],
        runtime_classpath: vec![runtime_path],
        analyzer: AnalyzerOptions { strict_unresolved: true },
        log: None,
    };
    let (reachability, log) = analysis::strip(&mut archive, &options).unwrap();

    assert!(reachability.unresolved().is_empty());
    assert!(reachability.contains_unit("java.util.List"));
    assert!(log.is_empty());
    assert!(archive.is_file("a/Main.class"));
}
