//! Parameter formatting: splicing typed values into SQL text.
//!
//! Athena has no server-side parameter binding, so parameters are rendered
//! into SQL literals immediately before execution. Templates use pyformat
//! placeholders (`%(name)s`); `%%` is a literal percent sign.
//!
//! Two escaping dialects exist. Queries (`SELECT`/`WITH`) go to the Presto
//! engine, which only doubles single quotes. Everything else (DDL) is Hive
//! syntax, which backslash-escapes quotes, backslashes and control
//! characters.

use athena_jdbc_core::error::ProgrammingErrorKind;
use athena_jdbc_core::{Error, Result, Value, ValueKind};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

/// Escaping dialect for string literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeStyle {
    /// `'` becomes `''`
    Presto,
    /// Backslash escapes for `\`, `'`, CR, LF and TAB
    Hive,
}

impl EscapeStyle {
    /// Pick the dialect for a SQL template.
    pub fn for_query(sql: &str) -> Self {
        let sql = sql.trim_start();
        let starts_with = |keyword: &str| {
            sql.get(..keyword.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(keyword))
        };
        if starts_with("SELECT") || starts_with("WITH") {
            EscapeStyle::Presto
        } else {
            EscapeStyle::Hive
        }
    }

    /// Quote `text` as a string literal.
    pub fn escape(self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 2);
        out.push('\'');
        match self {
            EscapeStyle::Presto => {
                for c in text.chars() {
                    if c == '\'' {
                        out.push_str("''");
                    } else {
                        out.push(c);
                    }
                }
            }
            EscapeStyle::Hive => {
                for c in text.chars() {
                    match c {
                        '\\' => out.push_str("\\\\"),
                        '\'' => out.push_str("\\'"),
                        '\r' => out.push_str("\\r"),
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        c => out.push(c),
                    }
                }
            }
        }
        out.push('\'');
        out
    }
}

/// A rendered parameter before it is spliced into a template.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Finished SQL text
    Sql(String),
    /// A floating point number; its text depends on where it ends up
    Float(f64),
}

impl Literal {
    /// Text used when the parameter stands on its own.
    pub fn into_scalar(self) -> String {
        match self {
            Literal::Sql(sql) => sql,
            Literal::Float(v) => format!("{v:?}"),
        }
    }

    /// Text used inside a parenthesised sequence.
    pub fn into_element(self) -> String {
        match self {
            Literal::Sql(sql) => sql,
            Literal::Float(v) => format!("{v:.6}"),
        }
    }
}

/// A function rendering one kind of value.
///
/// It receives the formatter itself so sequence renderers can dispatch
/// their elements.
pub type FormatFn =
    Arc<dyn Fn(&ParameterFormatter, EscapeStyle, &Value) -> Result<Literal> + Send + Sync>;

/// Named parameters for a template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    values: HashMap<String, Value>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a parameter.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Parameters
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

impl From<HashMap<String, Value>> for Parameters {
    fn from(values: HashMap<String, Value>) -> Self {
        Self { values }
    }
}

/// Renders parameters into SQL literals, dispatching on [`ValueKind`].
pub struct ParameterFormatter {
    formatters: RwLock<HashMap<ValueKind, FormatFn>>,
}

impl fmt::Debug for ParameterFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<ValueKind> = self.read().keys().copied().collect();
        kinds.sort_unstable();
        f.debug_struct("ParameterFormatter")
            .field("kinds", &kinds)
            .finish()
    }
}

impl Default for ParameterFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterFormatter {
    /// A formatter with the default rendering table.
    pub fn new() -> Self {
        let formatter = Self::empty();
        formatter.register(ValueKind::Null, format_null);
        formatter.register(ValueKind::Bool, format_bool);
        formatter.register(ValueKind::Int, format_int);
        formatter.register(ValueKind::Double, format_double);
        formatter.register(ValueKind::Decimal, format_decimal);
        formatter.register(ValueKind::Text, format_text);
        formatter.register(ValueKind::Date, format_date);
        formatter.register(ValueKind::Timestamp, format_timestamp);
        formatter.register(ValueKind::Array, format_sequence);
        formatter
    }

    /// A formatter that can render nothing until kinds are registered.
    pub fn empty() -> Self {
        Self {
            formatters: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ValueKind, FormatFn>> {
        self.formatters.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Register (or replace) the renderer for `kind`.
    pub fn register<F>(&self, kind: ValueKind, format: F)
    where
        F: Fn(&ParameterFormatter, EscapeStyle, &Value) -> Result<Literal> + Send + Sync + 'static,
    {
        self.formatters
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(kind, Arc::new(format));
    }

    /// Remove the renderer for `kind`; returns whether one was registered.
    pub fn unregister(&self, kind: ValueKind) -> bool {
        self.formatters
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&kind)
            .is_some()
    }

    pub fn formatter(&self, kind: ValueKind) -> Option<FormatFn> {
        self.read().get(&kind).cloned()
    }

    pub fn is_registered(&self, kind: ValueKind) -> bool {
        self.read().contains_key(&kind)
    }

    /// Render a single value.
    pub fn render(&self, escape: EscapeStyle, value: &Value) -> Result<Literal> {
        // Clone the function out so recursive renders do not nest the read lock
        let format = self.formatter(value.kind()).ok_or_else(|| {
            Error::programming(
                ProgrammingErrorKind::UnsupportedParameter,
                format!("{} is not defined formatter.", value.kind()),
            )
        })?;
        format(self, escape, value)
    }

    /// Substitute `params` into `template`.
    ///
    /// Without parameters the trimmed template is returned as is, so `%` needs
    /// no escaping in parameterless queries.
    pub fn format(&self, template: &str, params: Option<&Parameters>) -> Result<String> {
        let template = template.trim();
        if template.is_empty() {
            return Err(Error::programming(
                ProgrammingErrorKind::EmptyQuery,
                "Query is none or empty.",
            ));
        }
        let Some(params) = params.filter(|p| !p.is_empty()) else {
            return Ok(template.to_string());
        };

        let escape = EscapeStyle::for_query(template);
        let mut rendered: HashMap<&str, String> = HashMap::new();
        let mut out = String::with_capacity(template.len());
        let mut last = 0;
        for caps in placeholder_regex()?.captures_iter(template) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            out.push_str(&template[last..whole.start()]);
            last = whole.end();
            match (caps.get(1), whole.as_str()) {
                (Some(name), _) => {
                    let name = name.as_str();
                    if let Some(text) = rendered.get(name) {
                        out.push_str(text);
                        continue;
                    }
                    let value = params.get(name).ok_or_else(|| {
                        Error::programming(
                            ProgrammingErrorKind::MissingParameter,
                            format!("Missing parameter: {name}"),
                        )
                    })?;
                    let text = self.render(escape, value)?.into_scalar();
                    out.push_str(&text);
                    rendered.insert(name, text);
                }
                (None, "%%") => out.push('%'),
                (None, _) => {
                    return Err(Error::programming(
                        ProgrammingErrorKind::InvalidTemplate,
                        format!(
                            "Unsupported format character at index {} (use %% for a literal percent)",
                            whole.start()
                        ),
                    ));
                }
            }
        }
        out.push_str(&template[last..]);
        Ok(out.trim().to_string())
    }
}

fn cached_regex(
    cell: &'static OnceLock<std::result::Result<Regex, regex::Error>>,
    pattern: &str,
) -> Result<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|e| {
            Error::programming(
                ProgrammingErrorKind::InvalidTemplate,
                format!("invalid regex pattern: {e}"),
            )
        })
}

fn placeholder_regex() -> Result<&'static Regex> {
    static RE: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    cached_regex(&RE, r"%\(([^)]*)\)s|%%|%")
}

fn decimal_regex() -> Result<&'static Regex> {
    static RE: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    cached_regex(&RE, r"^([+-])?([0-9]*)(?:\.([0-9]*))?(?:[eE]([+-]?[0-9]+))?$")
}

/// Largest exponent a decimal string may carry before it is rejected.
const MAX_DECIMAL_EXPONENT: i64 = 1000;

/// Rewrite a decimal string in plain fixed-point notation.
///
/// Exponents are expanded, leading zeros dropped and trailing fractional
/// zeros kept (`"1.50E+1"` is `"15.0"`). Returns `None` for anything that
/// is not a decimal number.
pub fn normalize_decimal(text: &str) -> Option<String> {
    let caps = decimal_regex().ok()?.captures(text.trim())?;
    let sign = caps.get(1).map_or("", |m| m.as_str());
    let int = caps.get(2).map_or("", |m| m.as_str());
    let frac = caps.get(3).map_or("", |m| m.as_str());
    if int.is_empty() && frac.is_empty() {
        return None;
    }
    let exponent: i64 = match caps.get(4) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    if exponent.abs() > MAX_DECIMAL_EXPONENT {
        return None;
    }

    let digits = format!("{int}{frac}");
    let len = i64::try_from(digits.len()).ok()?;
    let point = i64::try_from(int.len()).ok()? + exponent;
    let (int_part, frac_part) = if point <= 0 {
        let zeros = usize::try_from(-point).ok()?;
        ("0".to_string(), format!("{}{}", "0".repeat(zeros), digits))
    } else if point >= len {
        let zeros = usize::try_from(point - len).ok()?;
        (format!("{}{}", digits, "0".repeat(zeros)), String::new())
    } else {
        let split = usize::try_from(point).ok()?;
        (digits[..split].to_string(), digits[split..].to_string())
    };

    let int_part = int_part.trim_start_matches('0');
    let int_part = if int_part.is_empty() { "0" } else { int_part };
    let sign = if sign == "-" { "-" } else { "" };
    if frac_part.is_empty() {
        Some(format!("{sign}{int_part}"))
    } else {
        Some(format!("{sign}{int_part}.{frac_part}"))
    }
}

fn invalid(value: &Value, reason: &str) -> Error {
    Error::programming(
        ProgrammingErrorKind::InvalidParameter,
        format!("Cannot format {} parameter: {reason}", value.kind()),
    )
}

fn format_null(_: &ParameterFormatter, _: EscapeStyle, _: &Value) -> Result<Literal> {
    Ok(Literal::Sql("null".to_string()))
}

fn format_bool(_: &ParameterFormatter, _: EscapeStyle, value: &Value) -> Result<Literal> {
    match value {
        Value::Bool(true) => Ok(Literal::Sql("True".to_string())),
        Value::Bool(false) => Ok(Literal::Sql("False".to_string())),
        other => Err(invalid(other, "not a boolean")),
    }
}

fn format_int(_: &ParameterFormatter, _: EscapeStyle, value: &Value) -> Result<Literal> {
    match value {
        Value::Int(v) => Ok(Literal::Sql(v.to_string())),
        other => Err(invalid(other, "not an integer")),
    }
}

fn format_double(_: &ParameterFormatter, _: EscapeStyle, value: &Value) -> Result<Literal> {
    match value {
        Value::Double(v) if v.is_finite() => Ok(Literal::Float(*v)),
        Value::Double(v) => Err(invalid(value, &format!("{v} has no SQL literal"))),
        other => Err(invalid(other, "not a double")),
    }
}

fn format_decimal(_: &ParameterFormatter, escape: EscapeStyle, value: &Value) -> Result<Literal> {
    let Value::Decimal(text) = value else {
        return Err(invalid(value, "not a decimal"));
    };
    let plain =
        normalize_decimal(text).ok_or_else(|| invalid(value, &format!("malformed '{text}'")))?;
    Ok(Literal::Sql(format!("DECIMAL {}", escape.escape(&plain))))
}

fn format_text(_: &ParameterFormatter, escape: EscapeStyle, value: &Value) -> Result<Literal> {
    match value {
        Value::Text(text) => Ok(Literal::Sql(escape.escape(text))),
        other => Err(invalid(other, "not a string")),
    }
}

fn format_date(_: &ParameterFormatter, _: EscapeStyle, value: &Value) -> Result<Literal> {
    match value {
        Value::Date(d) => Ok(Literal::Sql(format!("DATE '{}'", d.format("%Y-%m-%d")))),
        other => Err(invalid(other, "not a date")),
    }
}

/// Milliseconds, truncated.
fn format_timestamp(_: &ParameterFormatter, _: EscapeStyle, value: &Value) -> Result<Literal> {
    match value {
        Value::Timestamp(ts) => Ok(Literal::Sql(format!(
            "TIMESTAMP '{}'",
            ts.format("%Y-%m-%d %H:%M:%S%.3f")
        ))),
        other => Err(invalid(other, "not a timestamp")),
    }
}

fn format_sequence(
    formatter: &ParameterFormatter,
    escape: EscapeStyle,
    value: &Value,
) -> Result<Literal> {
    let Value::Array(items) = value else {
        return Err(invalid(value, "not a sequence"));
    };
    let parts = items
        .iter()
        .map(|item| formatter.render(escape, item).map(Literal::into_element))
        .collect::<Result<Vec<_>>>()?;
    Ok(Literal::Sql(format!("({})", parts.join(", "))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn format(template: &str, params: Parameters) -> Result<String> {
        ParameterFormatter::new().format(template, Some(&params))
    }

    fn timestamp(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").unwrap()
    }

    #[test]
    fn escape_style_follows_statement_kind() {
        assert_eq!(EscapeStyle::for_query("  select 1"), EscapeStyle::Presto);
        assert_eq!(EscapeStyle::for_query("WITH t AS (SELECT 1) SELECT * FROM t"), EscapeStyle::Presto);
        assert_eq!(EscapeStyle::for_query("CREATE TABLE t (a int)"), EscapeStyle::Hive);
        assert_eq!(EscapeStyle::for_query("SEL"), EscapeStyle::Hive);
    }

    #[test]
    fn presto_escaping_doubles_quotes() {
        let sql = format(
            "SELECT * FROM t WHERE name = %(name)s",
            Parameters::new().set("name", "O'Brien"),
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE name = 'O''Brien'");
    }

    #[test]
    fn presto_escaping_leaves_backslashes_and_newlines() {
        assert_eq!(EscapeStyle::Presto.escape("a\\b\nc"), "'a\\b\nc'");
    }

    #[test]
    fn hive_escaping_truth_table() {
        let cases = [
            ("plain", "'plain'"),
            ("O'Brien", "'O\\'Brien'"),
            ("back\\slash", "'back\\\\slash'"),
            ("line\nbreak", "'line\\nbreak'"),
            ("carriage\rreturn", "'carriage\\rreturn'"),
            ("tab\there", "'tab\\there'"),
            ("", "''"),
        ];
        for (input, expected) in cases {
            assert_eq!(EscapeStyle::Hive.escape(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn ddl_statement_escapes_newline() {
        let sql = format(
            "ALTER TABLE t SET TBLPROPERTIES ('comment' = %(c)s)",
            Parameters::new().set("c", "a\nb"),
        )
        .unwrap();
        assert_eq!(sql, "ALTER TABLE t SET TBLPROPERTIES ('comment' = 'a\\nb')");
        assert!(!sql.contains('\n'));
    }

    #[test]
    fn scalar_literals() {
        let f = ParameterFormatter::new();
        let render = |v: Value| f.render(EscapeStyle::Presto, &v).unwrap().into_scalar();
        assert_eq!(render(Value::Null), "null");
        assert_eq!(render(Value::Bool(true)), "True");
        assert_eq!(render(Value::Bool(false)), "False");
        assert_eq!(render(Value::Int(-42)), "-42");
        assert_eq!(render(Value::Double(1.5)), "1.5");
        assert_eq!(render(Value::Double(2.0)), "2.0");
        assert_eq!(
            render(Value::Date(NaiveDate::from_ymd_opt(2017, 1, 2).unwrap())),
            "DATE '2017-01-02'"
        );
        assert_eq!(render(Value::decimal("0.0000000001")), "DECIMAL '0.0000000001'");
    }

    #[test]
    fn timestamp_truncates_to_milliseconds() {
        let f = ParameterFormatter::new();
        let ts = Value::Timestamp(timestamp("2017-01-02 03:04:05.678999"));
        assert_eq!(
            f.render(EscapeStyle::Presto, &ts).unwrap().into_scalar(),
            "TIMESTAMP '2017-01-02 03:04:05.678'"
        );
        let whole = Value::Timestamp(timestamp("2017-01-02 03:04:05.0"));
        assert_eq!(
            f.render(EscapeStyle::Presto, &whole).unwrap().into_scalar(),
            "TIMESTAMP '2017-01-02 03:04:05.000'"
        );
    }

    #[test]
    fn sequences_render_elements_recursively() {
        let sql = format(
            "SELECT * FROM t WHERE a IN %(a)s AND b IN %(b)s",
            Parameters::new()
                .set("a", vec![1_i64, 2])
                .set("b", vec!["a", "b"]),
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE a IN (1, 2) AND b IN ('a', 'b')");
    }

    #[test]
    fn floats_inside_sequences_use_fixed_notation() {
        let f = ParameterFormatter::new();
        let seq = Value::from(vec![0.5_f64, 2.0]);
        assert_eq!(
            f.render(EscapeStyle::Presto, &seq).unwrap().into_scalar(),
            "(0.500000, 2.000000)"
        );
        let mixed = Value::Array(vec![Value::Null, Value::Bool(true), Value::decimal("1.10")]);
        assert_eq!(
            f.render(EscapeStyle::Presto, &mixed).unwrap().into_scalar(),
            "(null, True, DECIMAL '1.10')"
        );
    }

    #[test]
    fn non_finite_doubles_are_rejected() {
        let err = format("SELECT %(x)s", Parameters::new().set("x", f64::NAN)).unwrap_err();
        assert_eq!(err.programming_kind(), Some(ProgrammingErrorKind::InvalidParameter));
    }

    #[test]
    fn decimal_normalization() {
        let cases = [
            ("0.0000000001", Some("0.0000000001")),
            ("1E-10", Some("0.0000000001")),
            ("1.50E+1", Some("15.0")),
            ("1e2", Some("100")),
            ("-1.5e-3", Some("-0.0015")),
            ("+007.10", Some("7.10")),
            (".5", Some("0.5")),
            ("12.", Some("12")),
            ("123.456", Some("123.456")),
            ("", None),
            (".", None),
            ("1.2.3", None),
            ("abc", None),
            ("1e", None),
            ("1e99999", None),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize_decimal(input).as_deref(), expected, "input {input:?}");
        }
    }

    #[test]
    fn malformed_decimal_is_rejected() {
        let err = format("SELECT %(d)s", Parameters::new().set("d", Value::decimal("1,5")))
            .unwrap_err();
        assert_eq!(err.programming_kind(), Some(ProgrammingErrorKind::InvalidParameter));
    }

    #[test]
    fn empty_template_is_rejected() {
        let f = ParameterFormatter::new();
        for template in ["", "   \n\t"] {
            let err = f.format(template, None).unwrap_err();
            assert_eq!(err.programming_kind(), Some(ProgrammingErrorKind::EmptyQuery));
        }
    }

    #[test]
    fn no_parameters_returns_trimmed_template_untouched() {
        let f = ParameterFormatter::new();
        assert_eq!(
            f.format("  SELECT '100%' \n", None).unwrap(),
            "SELECT '100%'"
        );
        assert_eq!(
            f.format("SELECT '%(x)s'", Some(&Parameters::new())).unwrap(),
            "SELECT '%(x)s'"
        );
    }

    #[test]
    fn percent_handling_with_parameters() {
        let sql = format(
            "SELECT * FROM t WHERE a LIKE '10%%' AND b = %(b)s",
            Parameters::new().set("b", 1_i64),
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE a LIKE '10%' AND b = 1");

        let err = format("SELECT '10%' = %(b)s", Parameters::new().set("b", 1_i64)).unwrap_err();
        assert_eq!(err.programming_kind(), Some(ProgrammingErrorKind::InvalidTemplate));
    }

    #[test]
    fn missing_parameter_names_it_and_extras_are_ignored() {
        let params = Parameters::new().set("a", 1_i64).set("unused", 2_i64);
        let err = format("SELECT %(a)s, %(b)s", params.clone()).unwrap_err();
        assert_eq!(err.programming_kind(), Some(ProgrammingErrorKind::MissingParameter));
        assert!(err.to_string().contains('b'));

        assert_eq!(format("SELECT %(a)s, %(a)s", params).unwrap(), "SELECT 1, 1");
    }

    #[test]
    fn unregistered_kind_is_a_hard_error() {
        let err = format(
            "SELECT %(blob)s",
            Parameters::new().set("blob", vec![0_u8, 1]),
        )
        .unwrap_err();
        assert_eq!(err.programming_kind(), Some(ProgrammingErrorKind::UnsupportedParameter));
        assert!(err.to_string().contains("VARBINARY"));
    }

    #[test]
    fn custom_formatters_can_be_registered_and_removed() {
        let f = ParameterFormatter::new();
        f.register(ValueKind::Bytes, |_, escape, value| {
            let hex = hex::encode(value.as_bytes().unwrap_or_default());
            Ok(Literal::Sql(format!("from_hex({})", escape.escape(&hex))))
        });
        let params = Parameters::new().set("b", vec![0xde_u8, 0xad]);
        assert_eq!(
            f.format("SELECT %(b)s", Some(&params)).unwrap(),
            "SELECT from_hex('dead')"
        );

        assert!(f.unregister(ValueKind::Bool));
        assert!(!f.unregister(ValueKind::Bool));
        assert!(!f.is_registered(ValueKind::Bool));
        assert!(f.format("SELECT %(x)s", Some(&Parameters::new().set("x", true))).is_err());
    }

    #[test]
    fn parameters_collect_from_pairs() {
        let params: Parameters = [("a", 1_i64), ("b", 2_i64)].into_iter().collect();
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("b"), Some(&Value::Int(2)));
    }
}
