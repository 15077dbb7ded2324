//! Marketplace schema, as ordered SQL scripts compiled into the binary
//!
//! `000_migrations.sql` only creates the bookkeeping table and always comes
//! first. Add new scripts as `NNN_description.sql` at the end of the list.

/// One embedded SQL script, identified by its file name
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_migrations.sql",
        sql: include_str!("000_migrations.sql"),
    },
    Migration {
        name: "001_initial_schema.sql",
        sql: include_str!("001_initial_schema.sql"),
    },
];
