//! Connection options.
//!
//! [`ConnectOptions`] collects everything needed to open a connection.
//! Unset values fall back to the environment when the options are resolved:
//!
//! | Setting          | Variable                    |
//! |------------------|-----------------------------|
//! | region           | `AWS_DEFAULT_REGION`        |
//! | staging location | `AWS_ATHENA_S3_STAGING_DIR` |
//! | work group       | `AWS_ATHENA_WORK_GROUP`     |
//! | profile          | `AWS_PROFILE`               |
//! | access key       | `AWS_ACCESS_KEY_ID`         |
//! | secret key       | `AWS_SECRET_ACCESS_KEY`     |
//! | session token    | `AWS_SESSION_TOKEN`         |

use crate::converter::TypeConverter;
use crate::credentials::{self, CredentialSettings, Credentials};
use crate::formatter::ParameterFormatter;
use crate::runtime::{default_driver_jar, startup_options};
use athena_jdbc_core::error::ProgrammingErrorKind;
use athena_jdbc_core::{DriverProperties, Error, Result, Runtime, RuntimeOptions};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub const ENV_REGION: &str = "AWS_DEFAULT_REGION";
pub const ENV_S3_STAGING_DIR: &str = "AWS_ATHENA_S3_STAGING_DIR";
pub const ENV_WORK_GROUP: &str = "AWS_ATHENA_WORK_GROUP";
pub const ENV_PROFILE: &str = "AWS_PROFILE";
pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";

/// Schema used when none is given.
pub const DEFAULT_SCHEMA: &str = "default";

/// Looks up an environment variable.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Options for opening a [`Connection`](crate::Connection).
#[derive(Clone)]
pub struct ConnectOptions {
    region: Option<String>,
    s3_staging_dir: Option<String>,
    schema_name: Option<String>,
    work_group: Option<String>,
    credentials: CredentialSettings,
    runtime_options: RuntimeOptions,
    driver_jar: Option<PathBuf>,
    driver_properties: Vec<(String, String)>,
    converter: Option<Arc<TypeConverter>>,
    formatter: Option<Arc<ParameterFormatter>>,
    runtime: Option<Arc<dyn Runtime>>,
    env: EnvLookup,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            region: None,
            s3_staging_dir: None,
            schema_name: None,
            work_group: None,
            credentials: CredentialSettings::default(),
            runtime_options: RuntimeOptions::default(),
            driver_jar: None,
            driver_properties: Vec::new(),
            converter: None,
            formatter: None,
            runtime: None,
            env: Arc::new(process_env),
        }
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("region", &self.region)
            .field("s3_staging_dir", &self.s3_staging_dir)
            .field("schema_name", &self.schema_name)
            .field("work_group", &self.work_group)
            .field("credentials", &self.credentials)
            .field("runtime_options", &self.runtime_options)
            .field("driver_jar", &self.driver_jar)
            .field(
                "driver_properties",
                &self.driver_properties.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .field("converter", &self.converter.is_some())
            .field("formatter", &self.formatter.is_some())
            .field("runtime", &self.runtime.is_some())
            .finish_non_exhaustive()
    }
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// S3 location the engine writes query results to.
    pub fn s3_staging_dir(mut self, dir: impl Into<String>) -> Self {
        self.s3_staging_dir = Some(dir.into());
        self
    }

    pub fn schema_name(mut self, schema: impl Into<String>) -> Self {
        self.schema_name = Some(schema.into());
        self
    }

    pub fn work_group(mut self, work_group: impl Into<String>) -> Self {
        self.work_group = Some(work_group.into());
        self
    }

    pub fn credential_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials.credential_file = Some(path.into());
        self
    }

    pub fn profile_name(mut self, profile: impl Into<String>) -> Self {
        self.credentials.profile_name = Some(profile.into());
        self
    }

    pub fn access_key(mut self, key: impl Into<String>) -> Self {
        self.credentials.access_key = Some(key.into());
        self
    }

    pub fn secret_key(mut self, key: impl Into<String>) -> Self {
        self.credentials.secret_key = Some(key.into());
        self
    }

    pub fn session_token(mut self, token: impl Into<String>) -> Self {
        self.credentials.session_token = Some(token.into());
        self
    }

    /// Path to the runtime's shared library.
    pub fn runtime_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.runtime_options.library_path = Some(path.into());
        self
    }

    /// Extra runtime startup argument, appended after the driver's own.
    pub fn runtime_arg(mut self, arg: impl Into<String>) -> Self {
        self.runtime_options.args.push(arg.into());
        self
    }

    /// Location of the JDBC driver jar; defaults to [`ATHENA_JAR`](crate::ATHENA_JAR).
    pub fn driver_jar(mut self, path: impl Into<PathBuf>) -> Self {
        self.driver_jar = Some(path.into());
        self
    }

    /// Extra JDBC driver property. Entries with an empty key or value are dropped.
    pub fn driver_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.driver_properties.push((key.into(), value.into()));
        self
    }

    /// Use `converter` instead of one built from the runtime's type catalog.
    pub fn converter(mut self, converter: Arc<TypeConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn formatter(mut self, formatter: Arc<ParameterFormatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Use `runtime` instead of the installed process-wide one.
    pub fn runtime(mut self, runtime: Arc<dyn Runtime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Read fallbacks through `lookup` instead of the process environment.
    pub fn environment<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(lookup);
        self
    }

    pub(crate) fn explicit_runtime(&self) -> Option<&Arc<dyn Runtime>> {
        self.runtime.as_ref()
    }

    pub(crate) fn converter_override(&self) -> Option<Arc<TypeConverter>> {
        self.converter.clone()
    }

    pub(crate) fn formatter_override(&self) -> Option<Arc<ParameterFormatter>> {
        self.formatter.clone()
    }

    /// Options the runtime is started with.
    pub fn startup_options(&self) -> RuntimeOptions {
        let jar = self
            .driver_jar
            .as_deref()
            .unwrap_or(default_driver_jar());
        startup_options(&self.runtime_options, jar)
    }

    /// Fill unset values from the environment and pick the credential strategy.
    pub fn resolve(&self) -> Result<ResolvedOptions> {
        let env = |name: &str| (self.env)(name).filter(|v| !v.trim().is_empty());

        let region = self
            .region
            .clone()
            .or_else(|| env(ENV_REGION))
            .ok_or_else(|| missing("region_name", ENV_REGION))?;
        let s3_staging_dir = self
            .s3_staging_dir
            .clone()
            .or_else(|| env(ENV_S3_STAGING_DIR))
            .ok_or_else(|| missing("s3_staging_dir", ENV_S3_STAGING_DIR))?;
        let schema_name = self
            .schema_name
            .clone()
            .unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
        let work_group = self.work_group.clone().or_else(|| env(ENV_WORK_GROUP));

        let env_credentials = CredentialSettings {
            credential_file: None,
            profile_name: env(ENV_PROFILE),
            access_key: env(ENV_ACCESS_KEY_ID),
            secret_key: env(ENV_SECRET_ACCESS_KEY),
            session_token: env(ENV_SESSION_TOKEN),
        };
        let credentials = credentials::resolve(self.credentials.clone(), env_credentials)?;

        if let Some((key, _)) = self
            .driver_properties
            .iter()
            .find(|(key, _)| credentials::is_credential_key(key))
        {
            return Err(Error::programming(
                ProgrammingErrorKind::Configuration,
                format!(
                    "Driver property `{key}` is reserved for credentials; \
                     use the credential settings instead."
                ),
            ));
        }

        Ok(ResolvedOptions {
            region,
            s3_staging_dir,
            schema_name,
            work_group,
            credentials,
            driver_properties: self.driver_properties.clone(),
        })
    }
}

fn missing(setting: &str, variable: &str) -> Error {
    Error::programming(
        ProgrammingErrorKind::Configuration,
        format!("Required argument `{setting}` not found (set it or {variable})."),
    )
}

/// Connection settings after environment fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub region: String,
    pub s3_staging_dir: String,
    pub schema_name: String,
    pub work_group: Option<String>,
    pub credentials: Credentials,
    pub driver_properties: Vec<(String, String)>,
}

impl ResolvedOptions {
    /// JDBC URL of the regional Athena endpoint.
    pub fn url(&self) -> String {
        crate::CONNECTION_STRING.replace("{region}", &self.region)
    }

    /// Properties passed to the JDBC driver on connect.
    pub fn driver_properties(&self) -> DriverProperties {
        let mut props = DriverProperties::new();
        self.credentials.apply(&mut props);
        props.set("s3_staging_dir", self.s3_staging_dir.as_str());
        props.set("schema_name", self.schema_name.as_str());
        if let Some(work_group) = &self.work_group {
            props.set("workgroup", work_group.as_str());
        }
        for (key, value) in &self.driver_properties {
            if key.is_empty() || value.is_empty() {
                continue;
            }
            if credentials::is_credential_key(key) {
                tracing::warn!(key = %key, "Ignoring driver property reserved for credentials");
                continue;
            }
            props.set(key.as_str(), value.as_str());
        }
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + Send + Sync + 'static {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn explicit_values_win_over_environment() {
        let options = ConnectOptions::new()
            .region("us-west-2")
            .s3_staging_dir("s3://explicit/")
            .environment(env(&[
                (ENV_REGION, "eu-west-1"),
                (ENV_S3_STAGING_DIR, "s3://env/"),
            ]));
        let resolved = options.resolve().unwrap();
        assert_eq!(resolved.region, "us-west-2");
        assert_eq!(resolved.s3_staging_dir, "s3://explicit/");
        assert_eq!(resolved.schema_name, DEFAULT_SCHEMA);
    }

    #[test]
    fn environment_fills_unset_values() {
        let options = ConnectOptions::new().environment(env(&[
            (ENV_REGION, "eu-west-1"),
            (ENV_S3_STAGING_DIR, "s3://env/"),
            (ENV_WORK_GROUP, "analysts"),
            (ENV_PROFILE, "env-profile"),
        ]));
        let resolved = options.resolve().unwrap();
        assert_eq!(resolved.region, "eu-west-1");
        assert_eq!(resolved.work_group.as_deref(), Some("analysts"));
        assert_eq!(resolved.credentials, Credentials::Profile("env-profile".into()));
        assert_eq!(
            resolved.url(),
            "jdbc:awsathena://athena.eu-west-1.amazonaws.com:443/"
        );
    }

    #[test]
    fn missing_region_or_staging_dir_is_a_programming_error() {
        let err = ConnectOptions::new()
            .s3_staging_dir("s3://bucket/")
            .environment(env(&[]))
            .resolve()
            .unwrap_err();
        assert_eq!(err.programming_kind(), Some(ProgrammingErrorKind::Configuration));
        assert!(err.to_string().contains("region_name"));

        let err = ConnectOptions::new()
            .region("us-west-2")
            .environment(env(&[(ENV_S3_STAGING_DIR, "  ")]))
            .resolve()
            .unwrap_err();
        assert!(err.to_string().contains("s3_staging_dir"));
    }

    #[test]
    fn driver_properties_order_and_filtering() {
        let resolved = ConnectOptions::new()
            .region("us-west-2")
            .s3_staging_dir("s3://bucket/path/")
            .schema_name("logs")
            .work_group("primary")
            .access_key("AKIA")
            .secret_key("secret")
            .driver_property("log_level", "6")
            .driver_property("", "dropped")
            .driver_property("empty", "")
            .environment(env(&[]))
            .resolve()
            .unwrap();
        let props = resolved.driver_properties();
        let keys: Vec<&str> = props.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec!["user", "password", "s3_staging_dir", "schema_name", "workgroup", "log_level"]
        );
        assert_eq!(props.get("schema_name"), Some("logs"));
    }

    #[test]
    fn credential_keys_cannot_be_overridden_by_driver_properties() {
        for key in credentials::CREDENTIAL_KEYS {
            let err = ConnectOptions::new()
                .region("us-west-2")
                .s3_staging_dir("s3://bucket/path/")
                .access_key("AKIA")
                .secret_key("secret")
                .driver_property(key, "other")
                .environment(env(&[]))
                .resolve()
                .unwrap_err();
            assert_eq!(err.programming_kind(), Some(ProgrammingErrorKind::Configuration));
            assert!(err.to_string().contains(key), "{err}");
        }

        let mut resolved = ConnectOptions::new()
            .region("us-west-2")
            .s3_staging_dir("s3://bucket/path/")
            .access_key("AKIA")
            .secret_key("secret")
            .environment(env(&[]))
            .resolve()
            .unwrap();
        resolved
            .driver_properties
            .push(("user".to_string(), "other".to_string()));
        let props = resolved.driver_properties();
        assert_eq!(props.get("user"), Some("AKIA"));
    }

    #[test]
    fn startup_options_carry_driver_jar_and_runtime_args() {
        let options = ConnectOptions::new()
            .driver_jar("/opt/drivers/AthenaJDBC41-1.0.0.jar")
            .runtime_library("/usr/lib/jvm/libjvm.so")
            .runtime_arg("-Xmx512m");
        let startup = options.startup_options();
        assert_eq!(startup.args[0], "-server");
        assert_eq!(
            startup.args[1],
            "-Djava.class.path=/opt/drivers/AthenaJDBC41-1.0.0.jar"
        );
        assert_eq!(startup.args[2], "-Xmx512m");
        assert!(startup.library_path.is_some());
    }

    #[test]
    fn debug_does_not_leak_secrets() {
        let options = ConnectOptions::new()
            .access_key("AKIA")
            .secret_key("hunter2")
            .driver_property("password", "s3cr3t");
        let debug = format!("{options:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("s3cr3t"));
    }
}
