//! Integration tests for loading definitions from disk and dispatching them

use cogs_host::{
    exec_fn, listener_fn, names, CommandRegistry, EventPayload, EventSource, ListenerRegistry,
    ManifestLoader, ModuleDefinition, Registry, RegistryConfig, RegistryError,
};
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn write_json(dir: &Path, file: &str, value: serde_json::Value) {
    let path = dir.join(file);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create directory");
    }
    fs::write(path, serde_json::to_vec_pretty(&value).unwrap()).expect("Failed to write definition");
}

fn argv(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

#[tokio::test]
async fn test_dispatch_commands_loaded_from_disk() {
    let temp = TempDir::new().unwrap();
    write_json(
        temp.path(),
        "build.json",
        json!({
            "kind": "command",
            "id": "build",
            "aliases": ["build", "b"],
            "args": [{ "name": "target", "required": true }],
            "flags": [{ "name": "release", "type": "boolean", "alias": "r" }]
        }),
    );
    write_json(
        temp.path(),
        "maintenance/clean.json",
        json!({
            "default": {
                "kind": "command",
                "id": "clean",
                "category": "maintenance",
                "aliases": ["clean"]
            }
        }),
    );
    fs::write(temp.path().join("notes.md"), "# not a definition").unwrap();

    let built = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&built);

    let mut registry: CommandRegistry =
        Registry::new(RegistryConfig::for_commands().directory(temp.path()));
    registry.define(
        "build",
        Arc::new(exec_fn(move |data| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push((
                    data.arg("target").cloned(),
                    data.flag("release").cloned(),
                ));
                Ok(())
            }
        })),
    );

    assert_eq!(registry.load_all(None).unwrap(), 2);
    assert_eq!(registry.category("maintenance").unwrap().len(), 1);

    assert!(registry.run(Some(argv(&["b", "web", "-r"]))).await);
    assert_eq!(
        *built.lock().unwrap(),
        vec![(Some(json!("web")), Some(json!(true)))]
    );

    // No exec registered under "clean": dispatch reports the error.
    let errors = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&errors);
    registry.on(
        names::ERROR,
        Arc::new(move |_: &EventPayload| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    assert!(!registry.run(Some(argv(&["clean"]))).await);
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reload_picks_up_new_aliases() {
    let temp = TempDir::new().unwrap();
    let definition = |aliases: Vec<&str>| {
        json!({ "kind": "command", "id": "status", "aliases": aliases })
    };
    write_json(temp.path(), "status.json", definition(vec!["status"]));

    let mut registry: CommandRegistry =
        Registry::new(RegistryConfig::for_commands().directory(temp.path()));
    registry.define("status", Arc::new(exec_fn(|_| async { Ok(()) })));
    registry.load_all(None).unwrap();
    assert!(registry.resolve("st").is_none());

    write_json(temp.path(), "status.json", definition(vec!["status", "st"]));
    registry.reload("status").unwrap();

    assert!(registry.handle(&argv(&["st"])).await);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_msgpack_definitions_are_discovered() {
    let temp = TempDir::new().unwrap();
    let definition = ModuleDefinition::from_value(json!({
        "kind": "command",
        "id": "pack",
        "aliases": ["pack"]
    }))
    .unwrap();
    fs::write(
        temp.path().join("pack.msgpack"),
        definition.to_msgpack().unwrap(),
    )
    .unwrap();

    let mut registry: CommandRegistry =
        Registry::new(RegistryConfig::for_commands().directory(temp.path()));
    assert_eq!(registry.load_all(None).unwrap(), 1);
    assert!(registry.resolve("pack").is_some());
}

#[test]
fn test_alias_conflict_across_files_leaves_registry_consistent() {
    let temp = TempDir::new().unwrap();
    write_json(
        temp.path(),
        "a.json",
        json!({ "kind": "command", "id": "a", "aliases": ["shared"] }),
    );

    let mut registry: CommandRegistry = Registry::new(RegistryConfig::for_commands());
    registry.load(temp.path().join("a.json")).unwrap();

    write_json(
        temp.path(),
        "b.json",
        json!({ "kind": "command", "id": "b", "aliases": ["b", "shared"] }),
    );
    let result = registry.load(temp.path().join("b.json"));

    assert!(matches!(result, Err(RegistryError::AliasConflict { .. })));
    assert_eq!(registry.ids(), vec!["a"]);
    assert!(registry.resolve("b").is_none());
    assert!(!registry.loader().is_cached(&temp.path().join("b.json")));
}

#[test]
fn test_listeners_loaded_from_disk_bind_to_named_emitters() {
    let temp = TempDir::new().unwrap();
    write_json(
        temp.path(),
        "on-load.json",
        json!({
            "kind": "listener",
            "id": "onCommandLoad",
            "handler": "count",
            "emitter": "commands",
            "event": "load"
        }),
    );
    write_json(
        temp.path(),
        "first-load.json",
        json!({
            "kind": "listener",
            "id": "firstLoad",
            "handler": "count",
            "emitter": "commands",
            "event": "load",
            "type": "once"
        }),
    );

    let commands: CommandRegistry = Registry::new(RegistryConfig::for_commands());
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);

    let mut listeners: ListenerRegistry = Registry::with_loader(
        RegistryConfig::for_listeners().directory(temp.path()),
        Arc::new(ManifestLoader::new()),
    );
    listeners.set_emitter("commands", commands.events());
    listeners.define(
        "count",
        Arc::new(listener_fn(move |payload| {
            if let EventPayload::Load { .. } = payload {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        })),
    );
    assert_eq!(listeners.load_all(None).unwrap(), 2);

    let mut commands = commands;
    commands
        .load_instance(cogs_host::Command::new("a", Default::default()))
        .unwrap();
    commands
        .load_instance(cogs_host::Command::new("b", Default::default()))
        .unwrap();

    // Persistent listener twice, one-shot listener once.
    assert_eq!(loads.load(Ordering::SeqCst), 3);

    listeners.remove("oncommandload").unwrap();
    commands
        .load_instance(cogs_host::Command::new("c", Default::default()))
        .unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 3);
}
