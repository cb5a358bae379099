use indoc::indoc;
use lar_core::{Archive, ArchiveSet, LarError, Packer};
use lar_test_helpers::fixtures::{main_requiring_util, packed, packed_file, script_tree, util_module};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

#[test]
fn test_repeated_reads_touch_container_once() {
    let archive = Archive::from_bytes(
        "mem",
        packed(&[("a.lua", "return 'a'"), ("b.lua", "return 'b'")]),
    )
    .unwrap();

    let first = archive.read("a.lua").unwrap();
    let second = archive.read("a.lua").unwrap();
    let third = archive.read("a.lua").unwrap();

    assert_eq!(first, second);
    assert_eq!(second, third);
    assert!(Arc::ptr_eq(&first, &third));
    assert_eq!(archive.container_reads(), 1);

    archive.read("b.lua").unwrap();
    assert_eq!(archive.container_reads(), 2);
}

#[test]
fn test_packed_tree_has_exact_entries() {
    let tree = script_tree(&[
        ("a/b.lua", "return 'b'"),
        ("a/c.lua", "return 'c'"),
        ("readme.txt", "docs"),
    ]);
    let out = TempDir::new().unwrap();
    let dst = out.path().join("tree.lar");

    let report = Packer::default().pack(&dst, tree.path()).unwrap();
    assert_eq!(report.files, vec!["a/b.lua", "a/c.lua"]);
    assert_eq!(report.directories, 1);

    let archive = Archive::open(&dst).unwrap();
    assert_eq!(archive.entry_names(), vec!["a/b.lua", "a/c.lua"]);
    assert!(matches!(
        archive.read("readme.txt").unwrap_err(),
        LarError::EntryNotFound { .. }
    ));
}

#[test]
fn test_packing_twice_gives_same_paths() {
    let tree = script_tree(&[("x/y.lua", "return 1"), ("z.lua", "return 2")]);
    let out = TempDir::new().unwrap();

    let one = Packer::default()
        .pack(out.path().join("one.lar"), tree.path())
        .unwrap();
    let two = Packer::default()
        .pack(out.path().join("two.lar"), tree.path())
        .unwrap();

    assert_eq!(one, two);
    assert_eq!(
        Archive::open(out.path().join("one.lar")).unwrap().entry_names(),
        Archive::open(out.path().join("two.lar")).unwrap().entry_names()
    );
}

#[test]
fn test_end_to_end_archive_only() {
    let tree = script_tree(&[("main.lua", main_requiring_util()), ("util.lua", util_module())]);
    let out = TempDir::new().unwrap();
    let dst = out.path().join("app.lar");
    Packer::default().pack(&dst, tree.path()).unwrap();
    drop(tree);

    let set = ArchiveSet::new().unwrap();
    set.load_archive(&dst).unwrap();
    assert!(set.search_paths().is_empty());

    set.run_file("main.lua").unwrap();

    let result: i64 = set.engine().lua().globals().get("result").unwrap();
    assert_eq!(result, 42);
}

#[test]
fn test_require_falls_back_to_search_path() {
    let scripts = script_tree(&[("helpers/fmt.lua", "return { tag = 'disk' }")]);
    let out = TempDir::new().unwrap();
    let app = packed_file(
        out.path(),
        "app.lar",
        &[("main.lua", "tag = require('helpers.fmt').tag")],
    );

    let set = ArchiveSet::new().unwrap();
    set.load_archive(&app).unwrap();
    set.add_search_path(scripts.path()).unwrap();
    set.run_file("main.lua").unwrap();

    let tag: String = set.engine().lua().globals().get("tag").unwrap();
    assert_eq!(tag, "disk");
}

#[test]
fn test_missing_require_reports_module_name() {
    let set = ArchiveSet::new().unwrap();
    set.load_archive_from_memory("app", packed(&[("main.lua", "require('ghost')")]))
        .unwrap();

    let err = set.run_file("main.lua").unwrap_err();

    assert!(matches!(err, LarError::Engine(_)));
    let message = err.to_string();
    assert!(message.contains("ghost"), "unexpected message: {}", message);
    assert!(message.contains("no module 'ghost' in loaded archives"));
}

#[test]
fn test_syntax_error_in_module_is_reported() {
    let set = ArchiveSet::new().unwrap();
    set.load_archive_from_memory(
        "app",
        packed(&[
            ("main.lua", "require('broken')"),
            ("broken.lua", "local = 1"),
        ]),
    )
    .unwrap();

    let err = set.run_file("main.lua").unwrap_err();
    assert!(err.to_string().contains("broken"));
}

#[test]
fn test_required_module_is_cached_by_archive() {
    let main = indoc! {r#"
        local a = require("util")
        package.loaded["util"] = nil
        local b = require("util")
        result = a.double(1) + b.double(2)
    "#};

    let set = ArchiveSet::new().unwrap();
    set.load_archive_from_memory(
        "app",
        packed(&[("main.lua", main), ("util.lua", util_module())]),
    )
    .unwrap();

    set.run_file("main.lua").unwrap();

    let result: i64 = set.engine().lua().globals().get("result").unwrap();
    assert_eq!(result, 6);
}

#[test]
fn test_concurrent_loads_and_runs() {
    let set = Arc::new(ArchiveSet::new().unwrap());
    set.load_archive_from_memory(
        "base",
        packed(&[("main.lua", main_requiring_util()), ("util.lua", util_module())]),
    )
    .unwrap();

    let loaders: Vec<_> = (0..4)
        .map(|i| {
            let set = Arc::clone(&set);
            thread::spawn(move || {
                let name = format!("extra-{}", i);
                let data = packed(&[("util.lua", "return { double = function() return 0 end }")]);
                set.load_archive_from_memory(name, data).unwrap();
            })
        })
        .collect();

    let runners: Vec<_> = (0..4)
        .map(|_| {
            let set = Arc::clone(&set);
            thread::spawn(move || {
                for _ in 0..10 {
                    set.run_source("package.loaded['util'] = nil").unwrap();
                    set.run_file("main.lua").unwrap();
                }
            })
        })
        .collect();

    for handle in loaders.into_iter().chain(runners) {
        handle.join().unwrap();
    }

    assert_eq!(set.archive_names().len(), 5);
    let result: i64 = set.engine().lua().globals().get("result").unwrap();
    assert_eq!(result, 42);
}

#[test]
fn test_concurrent_duplicate_loads_admit_one() {
    let set = Arc::new(ArchiveSet::new().unwrap());
    let data = packed(&[("main.lua", "")]);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let set = Arc::clone(&set);
            let data = data.clone();
            thread::spawn(move || set.load_archive_from_memory("same", data).is_ok())
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 1);
    assert_eq!(set.archive_names(), vec!["same".to_string()]);
}
