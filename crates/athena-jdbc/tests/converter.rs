//! Column decoding over in-memory result sets.

use athena_jdbc::{ParameterFormatter, Parameters, TypeCatalog, TypeConverter, Value};
use athena_jdbc_core::{DriverProperties, Error, JdbcType, ResultSet, Runtime, RuntimeOptions};
use athena_jdbc_memory::{MemoryRuntime, MemoryTable};
use chrono::NaiveDate;

/// Execute `table` through the bridge and position on its first row.
fn first_row(table: MemoryTable) -> Box<dyn ResultSet> {
    let runtime = MemoryRuntime::new();
    runtime.start(&RuntimeOptions::new()).unwrap();
    runtime.attach_current_thread().unwrap();
    runtime.respond_rows("SELECT * FROM t", table);
    let session = runtime
        .connect("jdbc:awsathena://athena.us-west-2.amazonaws.com:443/", &DriverProperties::new())
        .unwrap();
    let statement = session.create_statement().unwrap();
    assert!(statement.execute("SELECT * FROM t").unwrap());
    let mut rs = statement.result_set().unwrap().unwrap();
    assert!(rs.next().unwrap());
    rs
}

fn decode(converter: &TypeConverter, jdbc_type: JdbcType, cell: Option<&str>) -> Result<Value, Error> {
    let mut rs = first_row(MemoryTable::new().column("c", jdbc_type).row([cell]));
    converter.convert(jdbc_type.code(), &mut *rs, 1)
}

#[test]
fn null_decodes_to_null_for_every_type() {
    let converter = TypeConverter::standard();
    for jdbc_type in JdbcType::ALL {
        assert_eq!(
            decode(&converter, jdbc_type, None).unwrap(),
            Value::Null,
            "{jdbc_type:?}"
        );
    }
}

#[test]
fn scalar_columns_decode_to_native_values() {
    let converter = TypeConverter::standard();
    assert_eq!(decode(&converter, JdbcType::Boolean, Some("true")).unwrap(), Value::Bool(true));
    assert_eq!(decode(&converter, JdbcType::TinyInt, Some("-7")).unwrap(), Value::Int(-7));
    assert_eq!(
        decode(&converter, JdbcType::BigInt, Some("9223372036854775807")).unwrap(),
        Value::Int(i64::MAX)
    );
    assert_eq!(decode(&converter, JdbcType::Double, Some("0.5")).unwrap(), Value::Double(0.5));
    assert_eq!(decode(&converter, JdbcType::Float, Some("1.25")).unwrap(), Value::Double(1.25));
    assert_eq!(
        decode(&converter, JdbcType::VarChar, Some("a string")).unwrap(),
        Value::Text("a string".into())
    );
    assert_eq!(
        decode(&converter, JdbcType::Array, Some("[1, 2]")).unwrap(),
        Value::Text("[1, 2]".into())
    );
}

#[test]
fn dates_and_timestamps() {
    let converter = TypeConverter::standard();
    assert_eq!(
        decode(&converter, JdbcType::Date, Some("2017-01-01")).unwrap(),
        Value::Date(NaiveDate::from_ymd_opt(2017, 1, 1).unwrap())
    );
    let expected = NaiveDate::from_ymd_opt(2017, 1, 2)
        .unwrap()
        .and_hms_milli_opt(3, 4, 5, 678)
        .unwrap();
    assert_eq!(
        decode(&converter, JdbcType::Timestamp, Some("2017-01-02 03:04:05.678")).unwrap(),
        Value::Timestamp(expected)
    );
    assert_eq!(
        decode(&converter, JdbcType::Timestamp, Some("2017-01-02 03:04:05")).unwrap(),
        Value::Timestamp(
            NaiveDate::from_ymd_opt(2017, 1, 2)
                .unwrap()
                .and_hms_opt(3, 4, 5)
                .unwrap()
        )
    );
}

#[test]
fn malformed_date_is_a_data_error_naming_the_column() {
    let converter = TypeConverter::standard();
    let err = decode(&converter, JdbcType::Date, Some("2017-13-45")).unwrap_err();
    assert_eq!(err.class_name(), "DataError");
    assert!(err.is_database());
    match err {
        Error::Data(data) => assert_eq!(data.column, Some(1)),
        other => panic!("expected a data error, got {other:?}"),
    }
}

#[test]
fn decimals_stay_exact() {
    let converter = TypeConverter::standard();
    for text in ["0.0000000001", "12345678901234567890.123456789", "-0.10"] {
        assert_eq!(
            decode(&converter, JdbcType::Decimal, Some(text)).unwrap(),
            Value::Decimal(text.to_string())
        );
    }
    assert!(decode(&converter, JdbcType::Decimal, Some("1.2.3")).is_err());
}

#[test]
fn decimal_literal_round_trips() {
    let formatter = ParameterFormatter::new();
    let params = Parameters::new().set("d", Value::Decimal("0.0000000001".into()));
    let sql = formatter.format("SELECT %(d)s", Some(&params)).unwrap();
    assert_eq!(sql, "SELECT DECIMAL '0.0000000001'");

    let literal = sql
        .trim_start_matches("SELECT DECIMAL '")
        .trim_end_matches('\'');
    let converter = TypeConverter::standard();
    assert_eq!(
        decode(&converter, JdbcType::Decimal, Some(literal)).unwrap(),
        Value::Decimal("0.0000000001".into())
    );
}

#[test]
fn binary_is_decoded_from_spaced_hex() {
    let converter = TypeConverter::standard();
    assert_eq!(
        decode(&converter, JdbcType::VarBinary, Some("de ad be ef")).unwrap(),
        Value::Bytes(vec![0xde, 0xad, 0xbe, 0xef])
    );
    assert!(decode(&converter, JdbcType::Binary, Some("zz")).is_err());
}

#[test]
fn codes_without_a_decoder_fall_back_to_the_object_getter() {
    let converter = TypeConverter::standard();
    assert_eq!(
        decode(&converter, JdbcType::Other, Some("opaque")).unwrap(),
        Value::Text("opaque".into())
    );

    assert!(converter.unregister("INTEGER"));
    assert!(!converter.unregister("INTEGER"));
    assert_eq!(decode(&converter, JdbcType::Integer, Some("5")).unwrap(), Value::Int(5));
}

#[test]
fn custom_decoders_replace_defaults() {
    let converter = TypeConverter::standard();
    let registered = converter.register("VARCHAR", |rs: &mut dyn ResultSet, column: usize| {
        let text = rs.get_string(column)?;
        Ok(text.map_or(Value::Null, |s| Value::Text(s.to_uppercase())))
    });
    assert!(registered);
    assert_eq!(
        decode(&converter, JdbcType::VarChar, Some("shout")).unwrap(),
        Value::Text("SHOUT".into())
    );
}

#[test]
fn names_missing_from_the_catalog_are_skipped() {
    let catalog = TypeCatalog::from_entries([("INTEGER", 4), ("VARCHAR", 12)]);
    let converter = TypeConverter::new(catalog);
    assert!(converter.decoder("INTEGER").is_some());
    assert!(converter.decoder("TIMESTAMP_WITH_TIMEZONE").is_none());
    assert!(!converter.register("NOT_A_TYPE", |_: &mut dyn ResultSet, _: usize| Ok(Value::Null)));
    assert_eq!(converter.type_name(12), Some("VARCHAR"));
    assert_eq!(converter.type_code("DECIMAL"), None);
}
