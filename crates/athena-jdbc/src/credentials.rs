//! Credential resolution.
//!
//! Exactly one strategy is used, chosen in priority order: credential file,
//! profile name, access/secret key pair, then the default provider chain.
//! Explicit settings beat environment ones at every level; lower-priority
//! settings that lose to a winner from the same source are logged and
//! ignored.

use athena_jdbc_core::error::ProgrammingErrorKind;
use athena_jdbc_core::{DriverProperties, Error, Result};
use std::fmt;
use std::path::PathBuf;

const PROVIDER_CLASS: &str = "aws_credentials_provider_class";
const PROVIDER_ARGUMENTS: &str = "aws_credentials_provider_arguments";
const SHADED_AUTH: &str = "com.amazonaws.athena.jdbc.shaded.com.amazonaws.auth";

/// Driver property keys owned by the credential strategy.
pub const CREDENTIAL_KEYS: [&str; 5] = [
    "user",
    "password",
    "session_token",
    PROVIDER_CLASS,
    PROVIDER_ARGUMENTS,
];

/// Whether `key` selects or carries credentials.
pub fn is_credential_key(key: &str) -> bool {
    CREDENTIAL_KEYS.contains(&key)
}

/// The credential strategy handed to the driver.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A properties file with `accessKey`/`secretKey` entries
    File(PathBuf),
    /// A named profile from the shared credentials file
    Profile(String),
    Static {
        access_key: String,
        secret_key: String,
        session_token: Option<String>,
    },
    /// The driver's default provider chain
    DefaultChain,
}

impl Credentials {
    /// Name of the strategy, for logging.
    pub fn strategy(&self) -> &'static str {
        match self {
            Credentials::File(_) => "credential file",
            Credentials::Profile(_) => "profile",
            Credentials::Static { .. } => "access key",
            Credentials::DefaultChain => "default chain",
        }
    }

    /// Add the driver properties selecting this strategy.
    pub fn apply(&self, props: &mut DriverProperties) {
        match self {
            Credentials::File(path) => {
                props.set(
                    PROVIDER_CLASS,
                    format!("{SHADED_AUTH}.PropertiesFileCredentialsProvider"),
                );
                props.set(PROVIDER_ARGUMENTS, path.display().to_string());
            }
            Credentials::Profile(name) => {
                props.set(
                    PROVIDER_CLASS,
                    format!("{SHADED_AUTH}.profile.ProfileCredentialsProvider"),
                );
                props.set(PROVIDER_ARGUMENTS, name.as_str());
            }
            Credentials::Static {
                access_key,
                secret_key,
                session_token,
            } => {
                props.set("user", access_key.as_str());
                props.set("password", secret_key.as_str());
                if let Some(token) = session_token {
                    props.set("session_token", token.as_str());
                }
            }
            Credentials::DefaultChain => {
                props.set(
                    PROVIDER_CLASS,
                    format!("{SHADED_AUTH}.DefaultAWSCredentialsProviderChain"),
                );
            }
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::File(path) => f.debug_tuple("File").field(path).finish(),
            Credentials::Profile(name) => f.debug_tuple("Profile").field(name).finish(),
            Credentials::Static {
                access_key,
                session_token,
                ..
            } => f
                .debug_struct("Static")
                .field("access_key", access_key)
                .field("secret_key", &"<redacted>")
                .field("session_token", &session_token.as_ref().map(|_| "<redacted>"))
                .finish(),
            Credentials::DefaultChain => f.write_str("DefaultChain"),
        }
    }
}

/// Credential settings from one source (explicit options or the environment).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialSettings {
    pub credential_file: Option<PathBuf>,
    pub profile_name: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub session_token: Option<String>,
}

impl fmt::Debug for CredentialSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("CredentialSettings")
            .field("credential_file", &self.credential_file)
            .field("profile_name", &self.profile_name)
            .field("access_key", &self.access_key)
            .field("secret_key", &redact(&self.secret_key))
            .field("session_token", &redact(&self.session_token))
            .finish()
    }
}

impl CredentialSettings {
    pub fn is_empty(&self) -> bool {
        self.credential_file.is_none()
            && self.profile_name.is_none()
            && self.access_key.is_none()
            && self.secret_key.is_none()
            && self.session_token.is_none()
    }

    /// Pick the winning strategy among these settings, if any.
    fn select(self, source: &'static str) -> Result<Option<Credentials>> {
        let CredentialSettings {
            credential_file,
            profile_name,
            access_key,
            secret_key,
            session_token,
        } = self;
        let has_keys = access_key.is_some() || secret_key.is_some();

        if let Some(path) = credential_file {
            let mut ignored = Vec::new();
            if profile_name.is_some() {
                ignored.push("profile_name");
            }
            if has_keys {
                ignored.push("access_key/secret_key");
            }
            if session_token.is_some() {
                ignored.push("session_token");
            }
            warn_ignored(source, "credential file", &ignored);
            return Ok(Some(Credentials::File(path)));
        }

        if let Some(name) = profile_name {
            let mut ignored = Vec::new();
            if has_keys {
                ignored.push("access_key/secret_key");
            }
            if session_token.is_some() {
                ignored.push("session_token");
            }
            warn_ignored(source, "profile", &ignored);
            return Ok(Some(Credentials::Profile(name)));
        }

        match (access_key, secret_key) {
            (Some(access_key), Some(secret_key)) => Ok(Some(Credentials::Static {
                access_key,
                secret_key,
                session_token,
            })),
            (Some(_), None) | (None, Some(_)) => Err(Error::programming(
                ProgrammingErrorKind::Configuration,
                format!("Both access_key and secret_key are required ({source} settings)."),
            )),
            (None, None) => {
                if session_token.is_some() {
                    warn_ignored(source, "default chain", &["session_token"]);
                }
                Ok(None)
            }
        }
    }
}

fn warn_ignored(source: &'static str, winner: &'static str, ignored: &[&str]) {
    if !ignored.is_empty() {
        tracing::warn!(
            source,
            winner,
            ignored = ?ignored,
            "Ignoring lower-priority credential settings"
        );
    }
}

/// Resolve the credential strategy from explicit and environment settings.
pub fn resolve(explicit: CredentialSettings, env: CredentialSettings) -> Result<Credentials> {
    if let Some(credentials) = explicit.select("explicit")? {
        return Ok(credentials);
    }
    if let Some(credentials) = env.select("environment")? {
        return Ok(credentials);
    }
    Ok(Credentials::DefaultChain)
}
