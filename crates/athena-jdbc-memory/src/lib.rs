//! In-memory native bridge for athena-jdbc.
//!
//! [`MemoryRuntime`] implements the bridge contract without a JVM: statements
//! are answered from scripted [`MemoryTable`]s, update counts or native
//! errors, keyed by SQL text. It keeps a record of what the driver asked for
//! (start calls, executed SQL, fetch sizes, metadata reads, closes) so the
//! driver's behaviour can be asserted from the outside.
//!
//! ```ignore
//! let runtime = MemoryRuntime::new();
//! runtime.respond_rows(
//!     "SELECT * FROM one_row",
//!     MemoryTable::new()
//!         .column("number_of_rows", JdbcType::Integer)
//!         .row([Some("1")]),
//! );
//! ```

pub mod result_set;
pub mod runtime;
pub mod session;
pub mod table;

pub use result_set::MemoryResultSet;
pub use runtime::{MemoryRuntime, Response};
pub use session::{MemorySession, MemoryStatement};
pub use table::{MemoryColumn, MemoryTable};
