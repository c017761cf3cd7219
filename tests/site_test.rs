//! Call-site tables, TOML loading and binding.

use std::sync::Arc;

use callscope::catalog::catalog;
use callscope::details::Details;
use callscope::label::{Label, TAG_ADDRESS};
use callscope::registry::Namespace;
use callscope::registry::memory::MemoryRegistry;
use callscope::scope::{Config, ValueKind};
use callscope::site::{Bound, CallSite, Table};

const SITES: &str = r#"
[[site]]
system = ["storage", "blob"]
name = "upload"
group = "driver.net"
tags = ["address"]
config = { value = "histogram", buckets = [1.0, 10.0, 100.0] }

[[site]]
name = "heartbeat"
config = { calls = false, latency = false, error = false, value = "gauge" }
"#;

#[test]
fn parses_toml_table() {
    let table = Table::from_toml(SITES, "inline").unwrap();
    assert_eq!(table.len(), 2);

    let upload = &table.sites()[0];
    assert_eq!(upload.key(), "storage.blob.upload");
    assert_eq!(upload.group, Details::DRIVER_NET);
    assert_eq!(upload.config.value_kind(), ValueKind::Histogram);
    assert_eq!(upload.config.buckets(), &[1.0, 10.0, 100.0]);
    assert_eq!(upload.tags, vec!["address".to_string()]);

    let heartbeat = &table.sites()[1];
    assert_eq!(heartbeat.key(), "heartbeat");
    assert_eq!(heartbeat.group, Details::ALL);
    assert!(!heartbeat.config.has_calls());
    assert_eq!(heartbeat.config.value_kind(), ValueKind::Gauge);
}

#[test]
fn rejects_unordered_buckets() {
    let toml = r#"
[[site]]
name = "bad"
config = { value = "histogram", buckets = [10.0, 1.0] }
"#;
    let err = Table::from_toml(toml, "bad.toml").unwrap_err();
    assert!(err.to_string().contains("bad.toml"), "{err}");
}

#[test]
fn rejects_unknown_fields() {
    let toml = r#"
[[site]]
name = "typo"
confg = {}
"#;
    assert!(Table::from_toml(toml, "typo.toml").is_err());
}

#[test]
fn rejects_duplicate_keys() {
    let site = CallSite::new(&["a"], "b", Details::ALL, Config::default(), &[]);
    assert!(Table::new(vec![site.clone(), site]).is_err());
}

#[test]
fn loads_directory_in_name_order() {
    let dir = std::env::temp_dir()
        .join("callscope-test")
        .join(uuid::Uuid::new_v4().to_string());
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("20-second.toml"), "[[site]]\nname = \"second\"\n").unwrap();
    std::fs::write(dir.join("10-first.toml"), "[[site]]\nname = \"first\"\n").unwrap();
    std::fs::write(dir.join("notes.txt"), "not a table").unwrap();

    let table = Table::load_from_dir(&dir).unwrap();
    let keys: Vec<String> = table.sites().iter().map(CallSite::key).collect();
    assert_eq!(keys, vec!["first", "second"]);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn detail_mask_gates_binding() {
    let registry = Arc::new(MemoryRegistry::new());
    let table = catalog();

    let ns = Namespace::new(registry.clone()).details(Details::RETRY | Details::DISCOVERY);
    let bound = Bound::bind(&ns, &table);
    assert_eq!(bound.len(), 2);
    assert!(bound.get("retry").is_some());
    assert!(bound.get("discovery").is_some());
    assert!(bound.get("driver.net.dial").is_none());

    let none = Bound::bind(&Namespace::new(registry).details(Details::NONE), &table);
    assert!(none.is_empty());
}

#[test]
fn catalog_is_complete_and_valid() {
    let table = catalog();
    assert_eq!(table.len(), 54);
    for site in table.sites() {
        site.config.validate().unwrap();
    }
    let groups = table
        .sites()
        .iter()
        .fold(Details::NONE, |acc, site| acc | site.group);
    assert_eq!(groups, Details::ALL);

    let value_sites: Vec<String> = table
        .sites()
        .iter()
        .filter(|site| site.config.value_kind() != ValueKind::None)
        .map(CallSite::key)
        .collect();
    assert_eq!(
        value_sites,
        vec![
            "driver.net.read",
            "driver.net.write",
            "driver.core.usages",
            "table.do",
            "table.do_tx",
            "table.pool.min",
            "table.pool.max",
            "retry",
            "discovery",
        ]
    );
}

#[test]
fn bound_catalog_names_follow_system_path() {
    let registry = Arc::new(MemoryRegistry::new());
    let ns = Namespace::new(registry.clone()).namespace("ydb");
    let bound = Bound::bind(&ns, &catalog());
    assert_eq!(bound.len(), 54);

    let dial = bound.get("driver.net.dial").unwrap();
    assert_eq!(dial.name(), "ydb.driver.net.dial");

    let trace = bound.start("table.session.new", &[]).unwrap();
    trace.sync(None, &[]);
    assert_eq!(
        registry.counter("ydb.table.session.new.calls", &[("success", "true")]),
        1
    );
}

struct Dial {
    host: &'static str,
}

fn dial_labels(info: &Dial) -> Vec<Label> {
    vec![Label::new(TAG_ADDRESS, info.host)]
}

#[test]
fn binding_extracts_labels_from_event_info() {
    let registry = Arc::new(MemoryRegistry::new());
    let bound = Bound::bind(&Namespace::new(registry.clone()), &catalog());
    let binding = bound.binding("driver.net.dial", dial_labels).unwrap();

    let info = Dial { host: "n1:2135" };
    let trace = binding.start(&info);
    trace.sync(None, &binding.labels(&info));

    assert_eq!(
        registry.counter(
            "driver.net.dial.calls",
            &[("success", "true"), ("address", "n1:2135")]
        ),
        1
    );
    assert!(bound.binding("no.such.site", dial_labels).is_none());
}

#[test]
fn merge_rejects_sites_already_in_catalog() {
    let extra = Table::from_toml("[[site]]\nname = \"retry\"\n", "inline").unwrap();
    assert!(catalog().merge(extra).is_err());
}
