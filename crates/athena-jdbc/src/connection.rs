//! Connection to Athena through the JDBC bridge.

use crate::config::ConnectOptions;
use crate::converter::TypeConverter;
use crate::cursor::Cursor;
use crate::formatter::ParameterFormatter;
use crate::guard::{self, lock};
use crate::runtime;
use athena_jdbc_core::{Error, Result, Runtime, Session};
use std::fmt;
use std::sync::{Arc, Mutex};

/// An open session against one Athena region and staging location.
///
/// The engine runs every statement in auto-commit mode: [`commit`](Self::commit)
/// does nothing and [`rollback`](Self::rollback) always fails.
pub struct Connection {
    runtime: Arc<dyn Runtime>,
    session: Mutex<Option<Arc<dyn Session>>>,
    converter: Arc<TypeConverter>,
    formatter: Arc<ParameterFormatter>,
    region: String,
    s3_staging_dir: String,
    schema_name: String,
    work_group: Option<String>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("region", &self.region)
            .field("s3_staging_dir", &self.s3_staging_dir)
            .field("schema_name", &self.schema_name)
            .field("work_group", &self.work_group)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Start the runtime if needed and open a session.
    pub fn open(options: &ConnectOptions) -> Result<Self> {
        let runtime = runtime::resolve(options.explicit_runtime())?;
        let resolved = options.resolve()?;
        runtime::ensure_started(&*runtime, &options.startup_options())?;

        let converter = match options.converter_override() {
            Some(converter) => converter,
            None => Arc::new(TypeConverter::new(runtime.type_catalog()?)),
        };
        let formatter = options
            .formatter_override()
            .unwrap_or_else(|| Arc::new(ParameterFormatter::new()));

        let url = resolved.url();
        tracing::debug!(
            url = %url,
            credentials = resolved.credentials.strategy(),
            schema = %resolved.schema_name,
            "Opening connection"
        );
        let session = runtime.connect(&url, &resolved.driver_properties())?;

        Ok(Self {
            runtime,
            session: Mutex::new(Some(session)),
            converter,
            formatter,
            region: resolved.region,
            s3_staging_dir: resolved.s3_staging_dir,
            schema_name: resolved.schema_name,
            work_group: resolved.work_group,
        })
    }

    fn with_session<T>(&self, f: impl FnOnce(&mut Option<Arc<dyn Session>>) -> Result<T>) -> Result<T> {
        guard::attached(&*self.runtime, || guard::synchronized(&self.session, f))
    }

    /// A new cursor on this connection's session.
    pub fn cursor(&self) -> Result<Cursor> {
        self.with_session(|session| {
            let session = match session {
                Some(session) if !session.is_closed() => Arc::clone(session),
                _ => return Err(Error::closed("Connection")),
            };
            let statement = session.create_statement()?;
            Ok(Cursor::new(
                Arc::clone(&self.runtime),
                session,
                statement,
                Arc::clone(&self.converter),
                Arc::clone(&self.formatter),
            ))
        })
    }

    /// Run `f` with a fresh cursor, closing it however `f` returns.
    pub fn with_cursor<T>(&self, f: impl FnOnce(&Cursor) -> Result<T>) -> Result<T> {
        let cursor = self.cursor()?;
        let result = f(&cursor);
        let closed = cursor.close();
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Close the session. Later calls do nothing.
    pub fn close(&self) -> Result<()> {
        self.with_session(|session| {
            let Some(session) = session.take() else {
                return Ok(());
            };
            tracing::debug!(region = %self.region, "Closing connection");
            if session.is_closed() {
                return Ok(());
            }
            session.close()?;
            Ok(())
        })
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.session)
            .as_ref()
            .is_none_or(|session| session.is_closed())
    }

    /// No-op: every statement is committed as it runs.
    pub fn commit(&self) -> Result<()> {
        Ok(())
    }

    pub fn rollback(&self) -> Result<()> {
        Err(Error::not_supported(
            "Athena JDBC connection is only supported for auto-commit mode.",
        ))
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn s3_staging_dir(&self) -> &str {
        &self.s3_staging_dir
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn work_group(&self) -> Option<&str> {
        self.work_group.as_deref()
    }

    pub fn converter(&self) -> &Arc<TypeConverter> {
        &self.converter
    }

    pub fn formatter(&self) -> &Arc<ParameterFormatter> {
        &self.formatter
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Err(err) = self.close() {
            tracing::debug!(error = %err, "Failed to close connection on drop");
        }
    }
}
