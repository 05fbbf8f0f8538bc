//! seglog - Segmented, crash-durable write-ahead log
//!
//! Append opaque byte records, get back gapless sequence numbers, and replay
//! them in order after a restart.
//!
//! # Quick Start
//!
//! ```no_run
//! use seglog::{Wal, WalConfig};
//!
//! # fn main() -> Result<(), seglog::WalError> {
//! let wal = Wal::open("./data/wal", WalConfig::default())?;
//! wal.append(b"first")?;
//! wal.append(b"second")?;
//! wal.close()?;
//!
//! let wal = Wal::open("./data/wal", WalConfig::default())?;
//! assert_eq!(wal.read_all()?, vec![b"first".to_vec(), b"second".to_vec()]);
//! # Ok(())
//! # }
//! ```
//!
//! The implementation lives in `seglog-durability`; this crate re-exports
//! its public API.

pub use seglog_durability::*;
