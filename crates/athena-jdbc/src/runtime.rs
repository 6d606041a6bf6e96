//! Process-wide runtime bootstrap.
//!
//! The native runtime hosting the JDBC driver can only be started once per
//! process. Starting is a double-checked, lock-guarded sequence so racing
//! first connections observe a single start.
//!
//! # Precedence
//!
//! The runtime a connection uses is chosen as follows (highest first):
//! 1. An explicit runtime on [`ConnectOptions`](crate::ConnectOptions)
//! 2. The process-wide runtime set with [`install`]
//! 3. None: connecting fails with a programming error

use crate::guard::{attach, lock};
use crate::ATHENA_JAR;
use athena_jdbc_core::error::ProgrammingErrorKind;
use athena_jdbc_core::{Error, Result, Runtime, RuntimeOptions};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

static INSTALLED: OnceLock<Arc<dyn Runtime>> = OnceLock::new();
static BOOTSTRAP: Mutex<()> = Mutex::new(());

/// Install the process-wide runtime. Can only be done once per process.
///
/// Returns `false` when a runtime was already installed; the new one is
/// dropped and the installed one stays.
pub fn install(runtime: Arc<dyn Runtime>) -> bool {
    INSTALLED.set(runtime).is_ok()
}

/// The process-wide runtime, if one was installed.
pub fn installed() -> Option<Arc<dyn Runtime>> {
    INSTALLED.get().cloned()
}

/// Pick the runtime for a connection: `explicit`, else the installed one.
pub fn resolve(explicit: Option<&Arc<dyn Runtime>>) -> Result<Arc<dyn Runtime>> {
    explicit
        .cloned()
        .or_else(installed)
        .ok_or_else(|| {
            Error::programming(
                ProgrammingErrorKind::Configuration,
                "No bridge runtime configured: pass one on ConnectOptions or install a default.",
            )
        })
}

/// Startup arguments: the server flag and the driver class path, then `options.args`.
pub fn startup_options(options: &RuntimeOptions, driver_jar: &Path) -> RuntimeOptions {
    let mut args = vec![
        "-server".to_string(),
        format!("-Djava.class.path={}", driver_jar.display()),
    ];
    args.extend(options.args.iter().cloned());
    RuntimeOptions {
        library_path: options.library_path.clone(),
        args,
    }
}

/// The default driver jar location.
pub fn default_driver_jar() -> &'static Path {
    Path::new(ATHENA_JAR)
}

/// Start `runtime` unless it already runs, then attach the calling thread.
pub fn ensure_started(runtime: &dyn Runtime, options: &RuntimeOptions) -> Result<()> {
    if !runtime.is_started() {
        let _bootstrap = lock(&BOOTSTRAP);
        if !runtime.is_started() {
            tracing::debug!(
                library_path = ?options.library_path,
                args = ?options.args,
                "Starting bridge runtime"
            );
            runtime
                .start(options)
                .map_err(|e| Error::from_native(e, None))?;
        }
    }
    attach(runtime)
}
