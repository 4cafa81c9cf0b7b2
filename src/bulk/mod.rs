//! Bulk processors (C6): turn a batch of drained buffer rows into a
//! dimension upsert + fact apply, inside one transaction per chunk.
//!
//! Every processor follows the same shape as the original SQL processors:
//! load rows into a session-local temporary table, upsert the dimension
//! table from it (`INSERT IGNORE` for new keys, then a conditional
//! `UPDATE ... WHERE` for drifted name/coords), then apply the fact with a
//! single set-based `INSERT ... SELECT ... GROUP BY ... ON DUPLICATE KEY
//! UPDATE`. Temp-table population uses a hand-built multi-row `VALUES`
//! list (see [`crate::relational_store::sql_escape_string`]) rather than
//! diesel's typed bind, since the row count varies per chunk.
//!
//! Pokémon-IV and shiny-rate buffers pre-aggregate at increment time, so
//! by the time a batch reaches here the original per-event timestamp is
//! gone (folded into `month_year`); those two processors only ever write
//! the monthly aggregate tables. Raids and invasions buffers keep the
//! full per-event line and write both the monthly aggregate and the
//! corresponding daily event fact table. Quests has no monthly aggregate
//! at all: its processor writes only the two daily event tables, split
//! by reward kind (item vs. pokemon).

pub mod invasions;
pub mod pokemon_iv;
pub mod quests;
pub mod raids;
pub mod shiny;

/// Rows per transaction. Matches the chunk size used for bulk upserts
/// elsewhere in this codebase (parameter-count and lock-duration limit).
pub const CHUNK_SIZE: usize = 5000;

/// Deadlock/lock-timeout retry budget for one chunk's transaction.
pub const MAX_RETRIES: u32 = 8;
