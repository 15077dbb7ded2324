//! Schema for `logs.duckdb`, versioned apart from the marketplace tables

use crate::migrations::Migration;

pub const LOG_MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_migrations.sql",
        sql: include_str!("000_migrations.sql"),
    },
    Migration {
        name: "001_initial_schema.sql",
        sql: include_str!("001_initial_schema.sql"),
    },
];
