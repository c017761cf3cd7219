//! Built-in call-site table for the database driver's traced operations.
//!
//! Every row here is plain data; nothing in this module knows about the
//! events themselves. Bind it with [`crate::site::Bound::bind`] and hand the
//! resulting scopes to the event source.

use tracing::error;

use crate::details::Details;
use crate::label::{
    TAG_ADDRESS, TAG_DATA_CENTER, TAG_ID, TAG_IDEMPOTENT, TAG_METHOD, TAG_NODE_ID, TAG_STAGE,
    TAG_STATE,
};
use crate::scope::{Config, ScopeOption, ValueKind};
use crate::site::{CallSite, Table};

/// Byte-size buckets for network read/write values.
pub const BYTES_BUCKETS: &[f64] = &[
    10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0, 20000.0, 50000.0,
    100000.0,
];

/// Attempt-count buckets for retry loops.
pub const ATTEMPTS_BUCKETS: &[f64] = &[
    1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 15.0, 20.0, 50.0, 100.0, 200.0,
];

const ENDPOINT: &[&str] = &[TAG_ADDRESS, TAG_DATA_CENTER];

fn plain() -> Config {
    Config::default()
}

fn gauge() -> Config {
    Config::new([ScopeOption::Value(ValueKind::Gauge)])
}

fn without(opts: impl IntoIterator<Item = ScopeOption>) -> Config {
    Config::new(opts)
}

/// The full catalog. Rows appear grouped by subsystem.
pub fn catalog() -> Table {
    use ScopeOption::*;

    let net = &["driver", "net"][..];
    let core = &["driver", "core"][..];
    let cluster = &["driver", "cluster"][..];
    let pool = &["table", "pool"][..];
    let session = &["table", "session"][..];
    let conn = &["database", "sql", "conn"][..];
    let tx = &["database", "sql", "tx"][..];
    let stmt = &["database", "sql", "stmt"][..];

    let rows = vec![
        // driver.net
        CallSite::new(net, "read", Details::DRIVER_NET, Config::histogram(BYTES_BUCKETS), &[TAG_ADDRESS]),
        CallSite::new(net, "write", Details::DRIVER_NET, Config::histogram(BYTES_BUCKETS), &[TAG_ADDRESS]),
        CallSite::new(net, "dial", Details::DRIVER_NET, plain(), &[TAG_ADDRESS]),
        CallSite::new(net, "close", Details::DRIVER_NET, plain(), &[TAG_ADDRESS]),
        // driver.core
        CallSite::new(core, "take", Details::DRIVER_CORE, plain(), ENDPOINT),
        CallSite::new(core, "usages", Details::DRIVER_CORE, Config::gauge_only(), &[TAG_ADDRESS]),
        CallSite::new(core, "state", Details::DRIVER_CORE, plain(), &[TAG_ADDRESS, TAG_DATA_CENTER, TAG_STATE]),
        CallSite::new(core, "invoke", Details::DRIVER_CORE, plain(), &[TAG_ADDRESS, TAG_DATA_CENTER, TAG_METHOD]),
        CallSite::new(
            core,
            "stream",
            Details::DRIVER_CORE,
            plain(),
            &[TAG_ADDRESS, TAG_DATA_CENTER, TAG_METHOD, TAG_STAGE],
        ),
        // driver.cluster
        CallSite::new(cluster, "init", Details::DRIVER_CLUSTER, without([WithoutCalls, WithoutError]), &[]),
        CallSite::new(cluster, "close", Details::DRIVER_CLUSTER, without([WithoutCalls]), &[]),
        CallSite::new(cluster, "get", Details::DRIVER_CLUSTER, plain(), ENDPOINT),
        CallSite::new(cluster, "insert", Details::DRIVER_CLUSTER, plain(), ENDPOINT),
        CallSite::new(cluster, "remove", Details::DRIVER_CLUSTER, plain(), ENDPOINT),
        CallSite::new(cluster, "update", Details::DRIVER_CLUSTER, plain(), ENDPOINT),
        CallSite::new(cluster, "pessimize", Details::DRIVER_CLUSTER, plain(), ENDPOINT),
        // driver.credentials
        CallSite::new(&["driver", "credentials"], "get", Details::DRIVER_CREDENTIALS, plain(), &[]),
        // table.pool
        CallSite::new(&["table"], "do", Details::TABLE_POOL, gauge(), &[TAG_IDEMPOTENT, TAG_STAGE]),
        CallSite::new(&["table"], "do_tx", Details::TABLE_POOL, gauge(), &[TAG_IDEMPOTENT, TAG_STAGE]),
        CallSite::new(
            pool,
            "min",
            Details::TABLE_POOL,
            without([WithoutCalls, WithoutLatency, Value(ValueKind::Gauge)]),
            &[],
        ),
        CallSite::new(
            pool,
            "max",
            Details::TABLE_POOL,
            without([WithoutCalls, WithoutLatency, Value(ValueKind::Gauge)]),
            &[],
        ),
        CallSite::new(&["table", "pool", "session"], "new", Details::TABLE_POOL, plain(), &[]),
        CallSite::new(&["table", "pool", "session"], "close", Details::TABLE_POOL, plain(), &[]),
        CallSite::new(&["table", "pool", "session"], "size", Details::TABLE_POOL, plain(), &[]),
        CallSite::new(pool, "put", Details::TABLE_POOL, plain(), &[TAG_NODE_ID]),
        CallSite::new(pool, "get", Details::TABLE_POOL, plain(), &[TAG_NODE_ID]),
        CallSite::new(pool, "wait", Details::TABLE_POOL, plain(), &[TAG_NODE_ID]),
        // table.session
        CallSite::new(session, "new", Details::TABLE_SESSION, plain(), &[TAG_NODE_ID]),
        CallSite::new(session, "delete", Details::TABLE_SESSION, plain(), &[TAG_NODE_ID]),
        CallSite::new(session, "keep_alive", Details::TABLE_SESSION, plain(), &[TAG_NODE_ID]),
        CallSite::new(&["table", "session", "query", "invoke"], "prepare", Details::TABLE_SESSION, plain(), &[TAG_NODE_ID]),
        CallSite::new(&["table", "session", "query", "invoke"], "execute", Details::TABLE_SESSION, plain(), &[TAG_NODE_ID]),
        CallSite::new(&["table", "session", "query", "stream"], "read", Details::TABLE_SESSION, plain(), &[TAG_STAGE, TAG_NODE_ID]),
        CallSite::new(&["table", "session", "query", "stream"], "execute", Details::TABLE_SESSION, plain(), &[TAG_STAGE, TAG_NODE_ID]),
        CallSite::new(&["table", "session", "transaction"], "begin", Details::TABLE_SESSION, plain(), &[TAG_NODE_ID]),
        CallSite::new(&["table", "session", "transaction"], "commit", Details::TABLE_SESSION, plain(), &[TAG_NODE_ID]),
        CallSite::new(&["table", "session", "transaction"], "rollback", Details::TABLE_SESSION, plain(), &[TAG_NODE_ID]),
        // retry
        CallSite::new(
            &[],
            "retry",
            Details::RETRY,
            Config::histogram(ATTEMPTS_BUCKETS),
            &[TAG_IDEMPOTENT, TAG_STAGE, TAG_ID],
        ),
        // discovery
        CallSite::new(&[], "discovery", Details::DISCOVERY, gauge(), &[TAG_ADDRESS]),
        // scripting
        CallSite::new(&["scripting"], "execute", Details::SCRIPTING, plain(), &[]),
        CallSite::new(&["scripting"], "explain", Details::SCRIPTING, plain(), &[]),
        CallSite::new(&["scripting", "stream"], "execute", Details::SCRIPTING, plain(), &[TAG_STAGE]),
        // database.sql
        CallSite::new(&["database", "sql", "connector"], "connect", Details::DATABASE_SQL, plain(), &[]),
        CallSite::new(conn, "ping", Details::DATABASE_SQL, plain(), &[]),
        CallSite::new(conn, "close", Details::DATABASE_SQL, plain(), &[]),
        CallSite::new(conn, "begin", Details::DATABASE_SQL, plain(), &[]),
        CallSite::new(conn, "prepare", Details::DATABASE_SQL, plain(), &[]),
        CallSite::new(conn, "exec", Details::DATABASE_SQL, plain(), &[]),
        CallSite::new(conn, "query", Details::DATABASE_SQL, plain(), &[]),
        CallSite::new(tx, "commit", Details::DATABASE_SQL, plain(), &[]),
        CallSite::new(tx, "rollback", Details::DATABASE_SQL, plain(), &[]),
        CallSite::new(stmt, "close", Details::DATABASE_SQL, plain(), &[]),
        CallSite::new(stmt, "exec", Details::DATABASE_SQL, plain(), &[]),
        CallSite::new(stmt, "query", Details::DATABASE_SQL, plain(), &[]),
    ];

    Table::new(rows).unwrap_or_else(|reason| {
        error!(%reason, "built-in call-site catalog is invalid, binding nothing from it");
        Table::default()
    })
}
