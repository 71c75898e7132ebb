//! Output generation for downstream consumers.
//!
//! The narration stage reads one JSON document per run; files are
//! organized by date and edition so a day's sweep history stays browsable:
//!
//! ```text
//! rundowns/
//! └── 2025-08-05/
//!     ├── morning.json
//!     ├── afternoon.json
//!     └── evening.json
//! ```

pub mod json;
