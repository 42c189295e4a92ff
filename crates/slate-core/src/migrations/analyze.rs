//! Classification of raw migration SQL.
//!
//! Works on hand-written scripts as well as generated ones: the text is
//! split into statements and each statement is recognized by pattern.
//! The rebuild sequence emitted for a recreated table (create a scratch
//! table, copy rows, drop the original, rename the scratch table into
//! place) is reported as one recreate instead of a create and a drop.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// A `(table, column)` pair in an analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableColumn {
    /// Table name.
    pub table: String,
    /// Column name.
    pub column: String,
}

/// What a migration script does, by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationAnalysis {
    /// `true` if any table or column is dropped or any table rebuilt.
    pub is_destructive: bool,
    /// Dropped tables.
    pub drop_tables: Vec<String>,
    /// Dropped columns.
    pub drop_columns: Vec<TableColumn>,
    /// Created tables.
    pub add_tables: Vec<String>,
    /// Added columns.
    pub add_columns: Vec<TableColumn>,
    /// Tables rebuilt through a scratch copy.
    pub recreated_tables: Vec<String>,
}

const IDENT: &str = r#"(?:"(?:[^"]|"")+"|`[^`]+`|\[[^\]]+\]|[A-Za-z_][A-Za-z0-9_$]*)"#;

struct Patterns {
    create_table: Regex,
    drop_table: Regex,
    add_column: Regex,
    drop_column: Regex,
    rename_table: Regex,
    copy_rows: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let name = format!(r"(?:{IDENT}\s*\.\s*)?({IDENT})");
        let build = |pattern: String| Regex::new(&pattern).expect("Invalid migration pattern regex");
        Patterns {
            create_table: build(format!(
                r"(?i)^CREATE\s+(?:TEMP(?:ORARY)?\s+)?(?:VIRTUAL\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?{name}"
            )),
            drop_table: build(format!(r"(?i)^DROP\s+TABLE\s+(?:IF\s+EXISTS\s+)?{name}")),
            add_column: build(format!(
                r"(?i)^ALTER\s+TABLE\s+{name}\s+ADD\s+(?:COLUMN\s+)?({IDENT})"
            )),
            drop_column: build(format!(
                r"(?i)^ALTER\s+TABLE\s+{name}\s+DROP\s+(?:COLUMN\s+)?({IDENT})"
            )),
            rename_table: build(format!(
                r"(?i)^ALTER\s+TABLE\s+{name}\s+RENAME\s+TO\s+{name}"
            )),
            copy_rows: build(format!(
                r"(?is)^INSERT\s+INTO\s+{name}.*?\bSELECT\b.*?\bFROM\s+{name}"
            )),
        }
    })
}

/// Strips identifier quoting.
fn unquote(ident: &str) -> String {
    let inner = |open: char, close: char| {
        ident
            .strip_prefix(open)
            .and_then(|s| s.strip_suffix(close))
    };
    if let Some(s) = inner('"', '"') {
        s.replace("\"\"", "\"")
    } else if let Some(s) = inner('`', '`').or_else(|| inner('[', ']')) {
        s.to_string()
    } else {
        ident.to_string()
    }
}

fn starts_trigger(statement: &str) -> bool {
    let words: Vec<String> = statement
        .split_whitespace()
        .take(3)
        .map(str::to_ascii_uppercase)
        .collect();
    match words.as_slice() {
        [create, trigger, ..] if create == "CREATE" && trigger == "TRIGGER" => true,
        [create, temp, trigger]
            if create == "CREATE"
                && (temp == "TEMP" || temp == "TEMPORARY")
                && trigger == "TRIGGER" =>
        {
            true
        }
        _ => false,
    }
}

fn ends_block(statement: &str) -> bool {
    statement
        .split_whitespace()
        .last()
        .is_some_and(|w| w.eq_ignore_ascii_case("END"))
}

/// Splits SQL text into statements on `;`, ignoring semicolons inside
/// string literals, quoted identifiers, comments and trigger bodies.
/// Comments are removed from the output.
#[must_use]
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                current.push(c);
                for q in chars.by_ref() {
                    current.push(q);
                    if q == c {
                        break;
                    }
                }
            }
            '[' => {
                current.push(c);
                for q in chars.by_ref() {
                    current.push(q);
                    if q == ']' {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for q in chars.by_ref() {
                    if q == '\n' {
                        current.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for q in chars.by_ref() {
                    if prev == '*' && q == '/' {
                        break;
                    }
                    prev = q;
                }
                current.push(' ');
            }
            ';' => {
                if starts_trigger(&current) && !ends_block(&current) {
                    current.push(c);
                    continue;
                }
                let statement = current.trim();
                if !statement.is_empty() {
                    statements.push(statement.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    statements
}

enum Event {
    Create(String),
    Drop(String),
    AddColumn(String, String),
    DropColumn(String, String),
    Rename(String, String),
    Copy(String, String),
    Other,
}

fn classify(statement: &str) -> Event {
    let p = patterns();
    let group = |caps: &regex::Captures<'_>, i: usize| {
        caps.get(i).map(|m| unquote(m.as_str())).unwrap_or_default()
    };
    if let Some(caps) = p.create_table.captures(statement) {
        Event::Create(group(&caps, 1))
    } else if let Some(caps) = p.drop_table.captures(statement) {
        Event::Drop(group(&caps, 1))
    } else if let Some(caps) = p.rename_table.captures(statement) {
        Event::Rename(group(&caps, 1), group(&caps, 2))
    } else if let Some(caps) = p.add_column.captures(statement) {
        Event::AddColumn(group(&caps, 1), group(&caps, 2))
    } else if let Some(caps) = p.drop_column.captures(statement) {
        Event::DropColumn(group(&caps, 1), group(&caps, 2))
    } else if let Some(caps) = p.copy_rows.captures(statement) {
        Event::Copy(group(&caps, 1), group(&caps, 2))
    } else {
        Event::Other
    }
}

/// Classifies a migration script.
#[must_use]
pub fn analyze_migration(sql: &str) -> MigrationAnalysis {
    let events: Vec<Event> = split_statements(sql).iter().map(|s| classify(s)).collect();
    let mut consumed = vec![false; events.len()];
    let mut analysis = MigrationAnalysis::default();

    // create(A) ... drop(B) ... rename(A -> B) is a rebuild of B
    for (r, event) in events.iter().enumerate() {
        let Event::Rename(scratch, table) = event else {
            continue;
        };
        let created = (0..r)
            .rev()
            .find(|&i| !consumed[i] && matches!(&events[i], Event::Create(n) if n == scratch));
        let Some(created) = created else {
            continue;
        };
        let dropped = (created + 1..r)
            .find(|&i| !consumed[i] && matches!(&events[i], Event::Drop(n) if n == table));
        let Some(dropped) = dropped else {
            continue;
        };
        consumed[created] = true;
        consumed[dropped] = true;
        consumed[r] = true;
        for i in created + 1..r {
            if matches!(&events[i], Event::Copy(to, from) if to == scratch && from == table) {
                consumed[i] = true;
            }
        }
        if !analysis.recreated_tables.contains(table) {
            analysis.recreated_tables.push(table.clone());
        }
    }

    for (event, consumed) in events.into_iter().zip(consumed) {
        if consumed {
            continue;
        }
        match event {
            Event::Create(name) => analysis.add_tables.push(name),
            Event::Drop(name) => analysis.drop_tables.push(name),
            Event::AddColumn(table, column) => {
                analysis.add_columns.push(TableColumn { table, column });
            }
            Event::DropColumn(table, column) => {
                analysis.drop_columns.push(TableColumn { table, column });
            }
            Event::Rename(..) | Event::Copy(..) | Event::Other => {}
        }
    }

    analysis.is_destructive = !analysis.drop_tables.is_empty()
        || !analysis.drop_columns.is_empty()
        || !analysis.recreated_tables.is_empty();
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_outside_quotes_and_comments() {
        let sql = "CREATE TABLE \"a;b\" (x TEXT DEFAULT 'x;y'); -- trailing; comment\n\
                   /* block; */ DROP TABLE t;";
        assert_eq!(
            split_statements(sql),
            vec![
                "CREATE TABLE \"a;b\" (x TEXT DEFAULT 'x;y')".to_string(),
                "DROP TABLE t".to_string(),
            ]
        );
    }

    #[test]
    fn trigger_bodies_stay_whole() {
        let sql = "CREATE TRIGGER trg AFTER INSERT ON t BEGIN UPDATE t SET x = 1; END; DROP TABLE u";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].ends_with("END"));
    }

    #[test]
    fn additive_script() {
        let analysis = analyze_migration(
            "CREATE TABLE \"posts\" (\"id\" INTEGER PRIMARY KEY);\n\
             ALTER TABLE users ADD COLUMN bio TEXT;\n\
             CREATE INDEX idx ON posts (id);",
        );
        assert!(!analysis.is_destructive);
        assert_eq!(analysis.add_tables, vec!["posts"]);
        assert_eq!(
            analysis.add_columns,
            vec![TableColumn {
                table: "users".into(),
                column: "bio".into()
            }]
        );
    }

    #[test]
    fn destructive_script() {
        let analysis = analyze_migration(
            "DROP TABLE IF EXISTS main.legacy; ALTER TABLE `users` DROP COLUMN [nickname];",
        );
        assert!(analysis.is_destructive);
        assert_eq!(analysis.drop_tables, vec!["legacy"]);
        assert_eq!(analysis.drop_columns[0].column, "nickname");
        assert_eq!(analysis.drop_columns[0].table, "users");
    }

    #[test]
    fn rebuild_sequence_is_one_recreate() {
        let analysis = analyze_migration(
            "CREATE TABLE \"temp_users\" (\"id\" INTEGER PRIMARY KEY, \"email\" TEXT NOT NULL);\n\
             INSERT INTO \"temp_users\" (\"id\", \"email\") SELECT \"id\", \"email\" FROM \"users\";\n\
             DROP TABLE \"users\";\n\
             ALTER TABLE \"temp_users\" RENAME TO \"users\";\n\
             CREATE INDEX \"idx_users_email\" ON \"users\" (\"email\");",
        );
        assert!(analysis.is_destructive);
        assert_eq!(analysis.recreated_tables, vec!["users"]);
        assert!(analysis.add_tables.is_empty());
        assert!(analysis.drop_tables.is_empty());
    }

    #[test]
    fn rename_column_is_neither_add_nor_drop() {
        let analysis = analyze_migration("ALTER TABLE users RENAME COLUMN mail TO email");
        assert_eq!(analysis, MigrationAnalysis::default());
    }
}
