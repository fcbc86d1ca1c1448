//! Interactive open-circuit voltage logger for battery cells.
//!
//! A human operator connects a cell across a bench digital multimeter,
//! identifies it by number, and the session controller triggers a
//! measurement, validates it, and durably appends it to a growing CSV log.
//! Prior entries are recovered at startup so re-entered cell numbers are
//! flagged as duplicates.
//!
//! The whole system is single-threaded and strictly sequential: one operator,
//! one instrument, one file handle. All I/O blocks, and cancellation is
//! purely operator-driven ('c' at the cell prompt).
//!
//! Module layout:
//! - [`bus`]: instrument transport traits plus serial, VISA and mock backends
//! - [`instrument`]: the DMM handle and address probing
//! - [`storage`]: the append-only measurement log with crash-safe recovery
//! - [`input`]: pure operator-input validators
//! - [`session`]: the state machine tying the above together
//! - [`config`]: Figment-based settings (`config/default.toml` + `OCVLOG_*`)
//! - [`error`]: the fatal-error taxonomy

pub mod bus;
pub mod config;
pub mod error;
pub mod input;
pub mod instrument;
pub mod session;
pub mod storage;

pub use config::Settings;
pub use error::{AppResult, CellLogError};
pub use session::SessionController;
pub use storage::{CellRecord, VoltageLog};
