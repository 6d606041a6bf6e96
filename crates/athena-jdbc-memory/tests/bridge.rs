//! Bridge-level behaviour of the in-memory runtime.

use athena_jdbc_core::{
    DriverProperties, JdbcType, NativeError, Runtime, RuntimeOptions, Session, Value,
};
use athena_jdbc_memory::{MemoryColumn, MemoryRuntime, MemoryTable};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn started(runtime: &MemoryRuntime) -> Arc<dyn Session> {
    runtime.start(&RuntimeOptions::new()).unwrap();
    runtime.attach_current_thread().unwrap();
    runtime
        .connect(
            "jdbc:awsathena://athena.us-west-2.amazonaws.com:443/",
            &DriverProperties::new(),
        )
        .unwrap()
}

fn mixed_table() -> MemoryTable {
    MemoryTable::new()
        .column("n", JdbcType::BigInt)
        .column("d", JdbcType::Double)
        .column("b", JdbcType::Boolean)
        .column_with(MemoryColumn::new("s", JdbcType::VarChar).display_size(10))
        .row([Some("42"), Some("1.5"), Some("true"), Some("x")])
        .row([None::<&str>, None, None, None])
}

#[test]
fn getters_follow_jdbc_null_semantics() {
    let runtime = MemoryRuntime::new();
    runtime.respond_rows("SELECT mixed", mixed_table());
    let session = started(&runtime);
    let statement = session.create_statement().unwrap();
    assert!(statement.execute("SELECT mixed").unwrap());
    let mut rs = statement.result_set().unwrap().unwrap();

    assert!(rs.next().unwrap());
    assert_eq!(rs.get_long(1).unwrap(), 42);
    assert!(!rs.was_null().unwrap());
    assert!((rs.get_double(2).unwrap() - 1.5).abs() < f64::EPSILON);
    assert!(rs.get_boolean(3).unwrap());
    assert_eq!(rs.get_object(4).unwrap(), Value::Text("x".into()));

    assert!(rs.next().unwrap());
    assert_eq!(rs.get_long(1).unwrap(), 0);
    assert!(rs.was_null().unwrap());
    assert!(!rs.get_boolean(3).unwrap());
    assert!(rs.was_null().unwrap());
    assert_eq!(rs.get_string(4).unwrap(), None);
    assert_eq!(rs.get_object(1).unwrap(), Value::Null);

    assert!(!rs.next().unwrap());
    assert!(!rs.next().unwrap());
    assert!(rs.get_long(1).is_err());
}

#[test]
fn metadata_reports_columns_and_counts_reads() {
    let runtime = MemoryRuntime::new();
    runtime.respond_rows("SELECT mixed", mixed_table());
    let session = started(&runtime);
    let statement = session.create_statement().unwrap();
    statement.execute("SELECT mixed").unwrap();
    let mut rs = statement.result_set().unwrap().unwrap();
    let meta = rs.metadata().unwrap();

    assert_eq!(meta.column_count().unwrap(), 4);
    assert_eq!(meta.column_name(4).unwrap(), "s");
    assert_eq!(meta.column_type(1).unwrap(), JdbcType::BigInt.code());
    assert_eq!(meta.display_size(4).unwrap(), 10);
    assert_eq!(meta.is_nullable(1).unwrap(), 2);
    assert!(meta.column_name(0).is_err());
    assert!(meta.column_name(5).is_err());
    assert_eq!(runtime.metadata_calls(), 7);
}

#[test]
fn update_counts_and_failures() {
    let runtime = MemoryRuntime::new();
    runtime.respond_update_count("DROP TABLE t", 0);
    runtime.respond_error(
        "SELECT broken",
        NativeError::sql("java.sql.SQLException", "boom").with_sql_state("42000"),
    );
    let session = started(&runtime);
    let statement = session.create_statement().unwrap();

    assert!(!statement.execute("DROP TABLE t").unwrap());
    assert_eq!(statement.update_count().unwrap(), 0);
    assert!(statement.result_set().unwrap().is_none());

    let err = statement.execute("SELECT broken").unwrap_err();
    assert_eq!(err.sql_state(), Some("42000"));

    let err = statement.execute("SELECT nothing").unwrap_err();
    assert!(err.sql_exception);
    assert!(err.innermost_message().unwrap().contains("SELECT nothing"));
    assert_eq!(
        runtime.executed(),
        vec!["DROP TABLE t", "SELECT broken", "SELECT nothing"]
    );
}

#[test]
fn cancel_unblocks_a_slow_execute() {
    let runtime = MemoryRuntime::new().with_latency(Duration::from_secs(30));
    runtime.respond_update_count("SELECT slow", 0);
    let session = started(&runtime);
    let statement = session.create_statement().unwrap();

    let canceller = {
        let statement = Arc::clone(&statement);
        let runtime = runtime.clone();
        thread::spawn(move || {
            runtime.attach_current_thread().unwrap();
            while runtime.executed().is_empty() {
                thread::sleep(Duration::from_millis(1));
            }
            thread::sleep(Duration::from_millis(20));
            statement.cancel().unwrap();
        })
    };

    let err = statement.execute("SELECT slow").unwrap_err();
    canceller.join().unwrap();
    assert_eq!(err.message.as_deref(), Some("Query cancelled"));
    assert_eq!(runtime.cancels(), 1);
}

#[test]
fn closing_is_counted_once() {
    let runtime = MemoryRuntime::new();
    let session = started(&runtime);
    let statement = session.create_statement().unwrap();
    statement.close().unwrap();
    statement.close().unwrap();
    assert!(statement.execute("SELECT 1").is_err());
    session.close().unwrap();
    session.close().unwrap();
    assert!(session.is_closed());
    assert!(session.create_statement().is_err());
    assert_eq!(runtime.statement_closes(), 1);
    assert_eq!(runtime.session_closes(), 1);
}
