//! Merge engine integration tests
//!
//! Sources are built in memory and merged through the public API; the last
//! section round-trips real jar files through `Archive`.

use appjar::archive::{Archive, PatternSet};
use appjar::merge::{MergeEngine, MergeRules, SourceArchive, REGISTRY_PATH};
use appjar::Error;

fn source(label: &str, files: &[(&str, &str)]) -> SourceArchive {
    let mut archive = Archive::new();
    for (path, content) in files {
        archive.data.write(path, content.as_bytes()).unwrap();
    }
    SourceArchive::new(label, archive)
}

fn rules(concat: &[&str], overwrite: &[&str]) -> MergeRules {
    MergeRules {
        concat: PatternSet::new(concat).unwrap(),
        overwrite: PatternSet::new(overwrite).unwrap(),
        ..MergeRules::default()
    }
}

// ============================================================================
// Conflict resolution
// ============================================================================

#[test]
fn test_duplicates_accumulate_across_sources() {
    let engine = MergeEngine::default();
    let mut dest = Archive::new();
    let sources = vec![
        source("A", &[("p/P1", "a1"), ("p/P2", "a2")]),
        source("B", &[("p/P1", "b1")]),
        source("C", &[("p/P2", "c2")]),
    ];

    let err = engine.merge_all(&mut dest, sources).unwrap_err();
    let Error::DuplicateEntries(report) = err else {
        panic!("expected duplicate entries");
    };

    assert_eq!(report.len(), 2);
    assert_eq!(report.origins("p/P1").unwrap(), ["A", "B"]);
    assert_eq!(report.origins("p/P2").unwrap(), ["A", "C"]);
    let text = report.to_string();
    assert!(text.contains("  [A, B]:\n    p/P1\n"));
    assert!(text.contains("  [A, C]:\n    p/P2\n"));
}

#[test]
fn test_overwrite_last_source_wins() {
    let engine = MergeEngine::new(rules(&[], &["config/*.properties"]));
    let mut dest = Archive::new();
    let sources = vec![
        source("S1", &[("config/q.properties", "one")]),
        source("S2", &[("config/q.properties", "two")]),
        source("S3", &[("config/q.properties", "three")]),
    ];

    let summary = engine.merge_all(&mut dest, sources).unwrap();
    assert_eq!(dest.data.read("config/q.properties").unwrap(), b"three");
    assert_eq!(summary.overwritten, 2);
}

#[test]
fn test_concat_inserts_one_separator() {
    let engine = MergeEngine::new(rules(&["META-INF/services/*"], &[]));
    let mut dest = Archive::new();
    let sources = vec![
        source("S1", &[("META-INF/services/R", "a")]),
        source("S2", &[("META-INF/services/R", "b")]),
    ];

    let summary = engine.merge_all(&mut dest, sources).unwrap();
    assert_eq!(dest.data.read("META-INF/services/R").unwrap(), b"a\nb");
    assert_eq!(summary.concatenated, 2);
}

#[test]
fn test_pattern_separator_is_literal() {
    // a single `*` must not cross directories
    let engine = MergeEngine::new(rules(&[], &["conf/*"]));
    let mut dest = Archive::new();
    let err = engine
        .merge_all(
            &mut dest,
            vec![source("a", &[("conf/x/y", "1")]), source("b", &[("conf/x/y", "2")])],
        )
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateEntries(_)));
}

#[test]
fn test_incremental_merge_reports_duplicates_so_far() {
    let engine = MergeEngine::default();
    let mut dest = Archive::new();
    let mut merge = engine.begin(&mut dest);
    merge.add(source("a", &[("x", "1")])).unwrap();
    merge.add(source("b", &[("x", "2")])).unwrap();
    assert!(merge.duplicates().contains("x"));
    assert!(merge.finish().is_err());
}

// ============================================================================
// Jar round trip
// ============================================================================

#[test]
fn test_merge_jars_from_disk() {
    let dir = tempfile::tempdir().unwrap();

    let mut first = Archive::new();
    first.data.write("lib/A.class", "A").unwrap();
    first.manifest.set("Created-By", "first");
    first
        .data
        .write(
            REGISTRY_PATH,
            "<component-set><components><component><role>a</role></component></components></component-set>",
        )
        .unwrap();
    let first_path = dir.path().join("first.jar");
    first.save_to(&first_path).unwrap();

    let mut second = Archive::new();
    second.data.write("lib/B.class", "B").unwrap();
    second.manifest.set("Created-By", "second");
    second
        .data
        .write(
            REGISTRY_PATH,
            "<component-set><components><component><role>b</role></component></components></component-set>",
        )
        .unwrap();
    let second_path = dir.path().join("second.jar");
    second.save_to(&second_path).unwrap();

    let engine = MergeEngine::default();
    let mut dest = Archive::new();
    let sources = vec![
        SourceArchive::load("g:first:1", &first_path).unwrap(),
        SourceArchive::load("g:second:1", &second_path).unwrap(),
    ];
    let summary = engine.merge_all(&mut dest, sources).unwrap();

    assert_eq!(summary.sources, 2);
    assert_eq!(summary.registry_components, 2);
    assert!(dest.data.is_file("lib/A.class"));
    assert!(dest.data.is_file("lib/B.class"));
    assert_eq!(dest.manifest.get("created-by"), Some("second"));

    let out = dir.path().join("merged.jar");
    dest.save_to(&out).unwrap();
    let reloaded = Archive::load(&out).unwrap();
    assert!(reloaded.data.is_file(REGISTRY_PATH));
    assert_eq!(reloaded.manifest.get("Created-By"), Some("second"));
}
