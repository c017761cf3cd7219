use std::sync::{Arc, Mutex};

use callscope::config::Config;
use callscope::details::Details;
use callscope::registry::memory::MemoryRegistry;

// Tests in this file mutate process env; run them one at a time.
static ENV: Mutex<()> = Mutex::new(());

const VARS: &[&str] = &[
    "CALLSCOPE_VERSION",
    "CALLSCOPE_NAMESPACE",
    "CALLSCOPE_SEPARATOR",
    "CALLSCOPE_DETAILS",
    "CALLSCOPE_SITES",
    "OTEL_ENDPOINT",
    "LOG_LEVEL",
];

fn clear_env() {
    for var in VARS {
        unsafe {
            std::env::remove_var(var);
        }
    }
}

#[test]
fn config_from_env_uses_defaults() {
    let _lock = ENV.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let config = Config::from_env().unwrap();
    assert_eq!(config.separator, ".");
    assert_eq!(config.details, Details::ALL);
    assert_eq!(config.version.as_str(), env!("CARGO_PKG_VERSION"));
    assert!(config.namespace.is_empty());
    assert!(config.sites_dir.is_none());
    assert!(config.otel_endpoint.is_none());
    assert_eq!(config.log_level, "info");
}

#[test]
fn config_from_env_reads_overrides() {
    let _lock = ENV.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    unsafe {
        std::env::set_var("CALLSCOPE_VERSION", "driver/v3.11.0");
        std::env::set_var("CALLSCOPE_NAMESPACE", "app");
        std::env::set_var("CALLSCOPE_SEPARATOR", "_");
        std::env::set_var("CALLSCOPE_DETAILS", "retry,discovery");
        std::env::set_var("OTEL_ENDPOINT", "   ");
    }

    let config = Config::from_env().unwrap();
    assert_eq!(config.version.as_str(), "v3.11.0");
    assert_eq!(config.details, Details::RETRY | Details::DISCOVERY);
    // blank counts as unset
    assert!(config.otel_endpoint.is_none());

    let root = config.root(Arc::new(MemoryRegistry::new()));
    assert_eq!(root.with_system("retry").join("calls"), "app_retry_calls");
    assert_eq!(root.detail_mask(), Details::RETRY | Details::DISCOVERY);

    clear_env();
}

#[test]
fn config_from_env_rejects_unknown_detail_group() {
    let _lock = ENV.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    unsafe {
        std::env::set_var("CALLSCOPE_DETAILS", "driver.net,telepathy");
    }

    let err = Config::from_env().unwrap_err();
    assert!(err.to_string().contains("telepathy"), "{err}");

    clear_env();
}

#[test]
fn config_table_merges_sites_dir() {
    let _lock = ENV.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let dir = std::env::temp_dir()
        .join("callscope-config-test")
        .join(uuid::Uuid::new_v4().to_string());
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("app.toml"),
        "[[site]]\nsystem = [\"app\"]\nname = \"checkout\"\n",
    )
    .unwrap();
    unsafe {
        std::env::set_var("CALLSCOPE_SITES", &dir);
    }

    let table = Config::from_env().unwrap().table().unwrap();
    assert_eq!(table.len(), 55);
    assert!(table.sites().iter().any(|s| s.key() == "app.checkout"));

    clear_env();
    let _ = std::fs::remove_dir_all(&dir);
}
