//! Migration service - brings a DuckDB file up to the embedded schema
//!
//! Applied script names are recorded in `sys_migrations`. Each pending script
//! runs in its own transaction together with its bookkeeping row, so a
//! failing script leaves no partial schema behind and is retried next open.

use std::collections::HashSet;

use duckdb::Connection;

use crate::domain::result::Result;
use crate::migrations::{Migration, MIGRATIONS};

/// What a `run_pending` call did
#[derive(Debug)]
pub struct MigrationResult {
    pub applied: Vec<String>,
    pub already_applied: usize,
}

pub struct MigrationService<'a> {
    conn: &'a Connection,
    migrations: &'static [Migration],
}

impl<'a> MigrationService<'a> {
    /// Marketplace schema
    pub fn new(conn: &'a Connection) -> Self {
        Self::for_set(conn, MIGRATIONS)
    }

    /// Any other embedded set, such as the log database's
    pub fn for_set(conn: &'a Connection, migrations: &'static [Migration]) -> Self {
        Self { conn, migrations }
    }

    pub fn run_pending(&self) -> Result<MigrationResult> {
        let (bootstrap, rest) = match self.migrations.split_first() {
            Some(split) => split,
            None => {
                return Ok(MigrationResult {
                    applied: Vec::new(),
                    already_applied: 0,
                })
            }
        };

        // The bookkeeping script is idempotent DDL and must exist before
        // anything can be looked up in it
        self.conn.execute_batch(bootstrap.sql)?;
        let mut applied_before = self.applied_names()?;
        let mut applied = Vec::new();
        if applied_before.insert(bootstrap.name.to_string()) {
            self.insert_name(bootstrap.name)?;
            applied.push(bootstrap.name.to_string());
        }

        let already_applied = applied_before.len() - applied.len();
        for migration in rest {
            if applied_before.contains(migration.name) {
                continue;
            }
            self.apply(migration)?;
            applied.push(migration.name.to_string());
        }

        Ok(MigrationResult {
            applied,
            already_applied,
        })
    }

    /// Script names not yet recorded, in run order
    pub fn pending(&self) -> Result<Vec<&'static str>> {
        let applied = if self.bookkeeping_exists()? {
            self.applied_names()?
        } else {
            HashSet::new()
        };
        Ok(self
            .migrations
            .iter()
            .map(|m| m.name)
            .filter(|name| !applied.contains(*name))
            .collect())
    }

    fn apply(&self, migration: &Migration) -> Result<()> {
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        let outcome = self
            .conn
            .execute_batch(migration.sql)
            .and_then(|_| self.insert_name(migration.name));
        match outcome {
            Ok(()) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(())
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e.into())
            }
        }
    }

    fn bookkeeping_exists(&self) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'sys_migrations'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn applied_names(&self) -> Result<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT migration_name FROM sys_migrations")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<duckdb::Result<HashSet<_>>>()?;
        Ok(names)
    }

    fn insert_name(&self, name: &str) -> duckdb::Result<()> {
        self.conn
            .execute("INSERT INTO sys_migrations (migration_name) VALUES (?)", [name])
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_migrations::LOG_MIGRATIONS;

    fn table_exists(conn: &Connection, table: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
            [table],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn test_fresh_database_gets_every_script_once() {
        let conn = Connection::open_in_memory().unwrap();
        let service = MigrationService::new(&conn);
        assert_eq!(service.pending().unwrap().len(), MIGRATIONS.len());

        let first = service.run_pending().unwrap();
        assert_eq!(first.applied.len(), MIGRATIONS.len());
        assert_eq!(first.already_applied, 0);

        let second = service.run_pending().unwrap();
        assert!(second.applied.is_empty());
        assert_eq!(second.already_applied, MIGRATIONS.len());
        assert!(service.pending().unwrap().is_empty());
    }

    #[test]
    fn test_schema_has_marketplace_tables() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationService::new(&conn).run_pending().unwrap();

        for table in ["users", "renovation_records", "jobs", "quotes", "expenses", "ratings"] {
            assert!(table_exists(&conn, table), "missing table {}", table);
        }
    }

    #[test]
    fn test_failing_script_is_rolled_back() {
        const BROKEN: &[Migration] = &[
            Migration {
                name: "000_migrations.sql",
                sql: include_str!("../migrations/000_migrations.sql"),
            },
            Migration {
                name: "001_broken.sql",
                sql: "CREATE TABLE half_done (id INTEGER); SELECT * FROM no_such_table;",
            },
        ];
        let conn = Connection::open_in_memory().unwrap();
        let service = MigrationService::for_set(&conn, BROKEN);

        assert!(service.run_pending().is_err());
        assert!(!table_exists(&conn, "half_done"));
        assert_eq!(service.pending().unwrap(), vec!["001_broken.sql"]);
    }

    #[test]
    fn test_log_set_is_independent() {
        let conn = Connection::open_in_memory().unwrap();
        let result = MigrationService::for_set(&conn, LOG_MIGRATIONS)
            .run_pending()
            .unwrap();
        assert_eq!(result.applied.len(), LOG_MIGRATIONS.len());
        assert!(table_exists(&conn, "sys_logs"));
        assert!(!table_exists(&conn, "users"));
    }
}
