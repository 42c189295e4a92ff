//! SQLite DDL generation for migration operations.

use crate::dialect::{quote_identifier, quote_literal, sql_type};
use crate::schema::{ColumnDescriptor, IndexDescriptor, TableDescriptor};

use super::operation::{CopyColumn, MigrationOp};

/// Prefix of the scratch table used while rebuilding a table.
pub const TEMP_PREFIX: &str = "temp_";

/// SQLite dialect for migration SQL generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Renders every statement for one operation, in execution order.
    #[must_use]
    pub fn statements(&self, op: &MigrationOp) -> Vec<String> {
        match op {
            MigrationOp::CreateTable(table) => vec![self.create_table(table, &table.name)],
            MigrationOp::DropTable { name } => {
                vec![format!("DROP TABLE {}", quote_identifier(name))]
            }
            MigrationOp::AddColumn { table, column } => vec![format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quote_identifier(table),
                self.column_definition(column, false)
            )],
            MigrationOp::DropColumn { table, column } => vec![format!(
                "ALTER TABLE {} DROP COLUMN {}",
                quote_identifier(table),
                quote_identifier(column)
            )],
            MigrationOp::RenameColumn { table, from, to } => vec![format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                quote_identifier(table),
                quote_identifier(from),
                quote_identifier(to)
            )],
            MigrationOp::CreateIndex { table, index } => vec![self.create_index(table, index)],
            MigrationOp::DropIndex { name, .. } => {
                vec![format!("DROP INDEX {}", quote_identifier(name))]
            }
            MigrationOp::RecreateTable { table, copy, .. } => self.recreate_table(table, copy),
        }
    }

    /// `CREATE TABLE` (or `CREATE VIRTUAL TABLE ... USING fts5`) for
    /// `table`'s definition under the given name.
    #[must_use]
    pub fn create_table(&self, table: &TableDescriptor, name: &str) -> String {
        if let Some(fts) = &table.fts {
            let mut args: Vec<String> = table
                .columns
                .iter()
                .map(|c| quote_identifier(&c.name))
                .collect();
            if let Some(tokenizer) = &fts.tokenizer {
                args.push(format!("tokenize = {}", quote_literal(tokenizer)));
            }
            return format!(
                "CREATE VIRTUAL TABLE {} USING fts5({})",
                quote_identifier(name),
                args.join(", ")
            );
        }

        let primary_key = table.primary_key();
        let inline_pk = primary_key.len() == 1;
        let mut parts: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c, inline_pk))
            .collect();
        if primary_key.len() > 1 {
            let cols: Vec<String> = primary_key
                .iter()
                .map(|c| quote_identifier(&c.name))
                .collect();
            parts.push(format!("PRIMARY KEY ({})", cols.join(", ")));
        }
        format!(
            "CREATE TABLE {} ({})",
            quote_identifier(name),
            parts.join(", ")
        )
    }

    /// A column definition as used in `CREATE TABLE` and `ADD COLUMN`.
    #[must_use]
    pub fn column_definition(&self, column: &ColumnDescriptor, inline_pk: bool) -> String {
        let mut sql = format!("{} {}", quote_identifier(&column.name), sql_type(column.ty));
        if column.primary_key && inline_pk {
            sql.push_str(" PRIMARY KEY");
            if column.autoincrement {
                sql.push_str(" AUTOINCREMENT");
            }
        }
        if !column.nullable {
            sql.push_str(" NOT NULL");
        }
        if column.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.to_sql());
        }
        if let Some(check) = &column.check {
            sql.push_str(&format!(" CHECK ({check})"));
        }
        if let Some(fk) = &column.references {
            sql.push_str(&format!(
                " REFERENCES {} ({}) ON DELETE {}",
                quote_identifier(&fk.table),
                quote_identifier(&fk.column),
                fk.on_delete.as_sql()
            ));
        }
        sql
    }

    /// `CREATE [UNIQUE] INDEX`.
    #[must_use]
    pub fn create_index(&self, table: &str, index: &IndexDescriptor) -> String {
        let cols: Vec<String> = index.columns.iter().map(|c| quote_identifier(c)).collect();
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            quote_identifier(&index.name),
            quote_identifier(table),
            cols.join(", ")
        )
    }

    fn recreate_table(&self, table: &TableDescriptor, copy: &[CopyColumn]) -> Vec<String> {
        let temp = format!("{TEMP_PREFIX}{}", table.name);
        let mut out = vec![self.create_table(table, &temp)];
        if !copy.is_empty() {
            let targets: Vec<String> = copy.iter().map(|c| quote_identifier(&c.target)).collect();
            let sources: Vec<String> = copy
                .iter()
                .map(|c| match &c.fallback {
                    Some(fallback) => format!(
                        "COALESCE({}, {})",
                        quote_identifier(&c.source),
                        fallback.to_sql()
                    ),
                    None => quote_identifier(&c.source),
                })
                .collect();
            out.push(format!(
                "INSERT INTO {} ({}) SELECT {} FROM {}",
                quote_identifier(&temp),
                targets.join(", "),
                sources.join(", "),
                quote_identifier(&table.name)
            ));
        }
        out.push(format!("DROP TABLE {}", quote_identifier(&table.name)));
        out.push(format!(
            "ALTER TABLE {} RENAME TO {}",
            quote_identifier(&temp),
            quote_identifier(&table.name)
        ));
        out.extend(
            table
                .effective_indexes()
                .iter()
                .map(|idx| self.create_index(&table.name, idx)),
        );
        out
    }
}
