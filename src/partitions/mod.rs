//! Partition Ensurer (C8) and Partition Cleaner (C9).
//!
//! Both read existing partitions from `information_schema.PARTITIONS` and
//! issue `ALTER TABLE ... REORGANIZE PARTITION` / `... DROP PARTITION`
//! batches against it. Neither module knows about buffers or event shapes;
//! they operate purely on table name + partitioning grain.

pub mod clean;
pub mod ensure;

use diesel::QueryableByName;
use diesel::sql_types::{Nullable, Text};

/// One row of `information_schema.PARTITIONS` for a given table, restricted
/// to the columns the ensurer/cleaner actually need.
#[derive(Debug, QueryableByName)]
pub struct PartitionRow {
    #[diesel(sql_type = Text)]
    pub partition_name: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub partition_description: Option<String>,
}

/// Grain a fact table is partitioned by, determining the upper-bound format
/// (`'YYYY-MM-DD'` vs. numeric `YYMM`) and the partition-name convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grain {
    Daily,
    Monthly,
}

/// A table this crate manages partitions for, plus its partitioning column.
#[derive(Debug, Clone)]
pub struct PartitionedTable {
    pub table: &'static str,
    pub column: &'static str,
    pub grain: Grain,
}

pub const MANAGED_TABLES: &[PartitionedTable] = &[
    PartitionedTable { table: "pokemon_iv_daily_events", column: "day_date", grain: Grain::Daily },
    PartitionedTable { table: "raids_daily_events", column: "day_date", grain: Grain::Daily },
    PartitionedTable { table: "invasions_daily_events", column: "day_date", grain: Grain::Daily },
    PartitionedTable { table: "quests_item_daily_events", column: "day_date", grain: Grain::Daily },
    PartitionedTable { table: "quests_pokemon_daily_events", column: "day_date", grain: Grain::Daily },
    PartitionedTable {
        table: "aggregated_pokemon_iv_monthly",
        column: "month_year",
        grain: Grain::Monthly,
    },
    PartitionedTable { table: "aggregated_raids", column: "month_year", grain: Grain::Monthly },
    PartitionedTable { table: "aggregated_invasions", column: "month_year", grain: Grain::Monthly },
    PartitionedTable { table: "shiny_username_rates", column: "month_year", grain: Grain::Monthly },
];
