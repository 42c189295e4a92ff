//! Schema diff engine.
//!
//! Compares the declared (`current`) [`SchemaSnapshot`] with the one the
//! database was last migrated to (`previous`) and produces the
//! [`MigrationScript`] that takes the database from one to the other.
//! Changes SQLite cannot express with `ALTER TABLE` are planned as a
//! rebuild through a temporary table.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::schema::{
    ColumnDescriptor, DefaultValue, IndexDescriptor, SchemaSnapshot, TableDescriptor,
};

use super::operation::{CopyColumn, MigrationOp, RecreateReason};
use super::script::MigrationScript;

// ================================================================
// Public types
// ================================================================

/// Changes the differ noticed but deliberately did not turn into
/// operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiffWarning {
    /// Dropped and added columns of the same type that could not be
    /// paired one-to-one. They were planned as drop + add.
    AmbiguousRename {
        /// Table name.
        table: String,
        /// Dropped columns involved.
        dropped: Vec<String>,
        /// Added columns involved.
        added: Vec<String>,
    },
    /// The relative ordering of columns changed. SQLite cannot reorder
    /// columns in place, so the old order is kept.
    ColumnOrderChanged {
        /// Table name.
        table: String,
        /// Column names in the old order.
        old_order: Vec<String>,
        /// Column names in the new order.
        new_order: Vec<String>,
    },
}

impl fmt::Display for DiffWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AmbiguousRename {
                table,
                dropped,
                added,
            } => write!(
                f,
                "{table}: cannot pair dropped [{}] with added [{}]; treated as drop + add",
                dropped.join(", "),
                added.join(", ")
            ),
            Self::ColumnOrderChanged {
                table,
                old_order,
                new_order,
            } => write!(
                f,
                "{table}: column order changed from [{}] to [{}]",
                old_order.join(", "),
                new_order.join(", ")
            ),
        }
    }
}

// ================================================================
// Planning buckets
// ================================================================

/// Operations grouped by kind; [`Plan::finish`] concatenates them in
/// execution order.
///
/// Every index is created in the last bucket, after all drops, so an
/// index name freed by a dropped table or index can be reused.
#[derive(Default)]
struct Plan {
    create_tables: Vec<MigrationOp>,
    drop_indexes: Vec<MigrationOp>,
    drop_tables: Vec<MigrationOp>,
    renames: Vec<MigrationOp>,
    add_columns: Vec<MigrationOp>,
    drop_columns: Vec<MigrationOp>,
    recreates: Vec<MigrationOp>,
    create_indexes: Vec<MigrationOp>,
    warnings: Vec<DiffWarning>,
}

impl Plan {
    fn finish(self) -> MigrationScript {
        let ops = self
            .create_tables
            .into_iter()
            .chain(self.drop_indexes)
            .chain(self.drop_tables)
            .chain(self.renames)
            .chain(self.add_columns)
            .chain(self.drop_columns)
            .chain(self.recreates)
            .chain(self.create_indexes)
            .collect();
        MigrationScript {
            ops,
            warnings: self.warnings,
        }
    }
}

// ================================================================
// Column matching
// ================================================================

/// How the columns of one table correspond across two versions.
struct ColumnMatch<'a> {
    /// New column with the old column it continues, if any.
    pairs: Vec<(&'a ColumnDescriptor, Option<&'a ColumnDescriptor>)>,
    /// Old columns with no counterpart.
    dropped: Vec<&'a ColumnDescriptor>,
    /// Inferred renames, old name to new name.
    renames: Vec<(String, String)>,
}

impl<'a> ColumnMatch<'a> {
    fn added(&self) -> impl Iterator<Item = &'a ColumnDescriptor> + '_ {
        self.pairs
            .iter()
            .filter(|(_, old)| old.is_none())
            .map(|(new, _)| *new)
    }

    /// Old name of a column after renames are undone.
    fn old_name<'n>(&'n self, new_name: &'n str) -> &'n str {
        self.renames
            .iter()
            .find(|(_, to)| to == new_name)
            .map_or(new_name, |(from, _)| from.as_str())
    }
}

fn same_type<'a>(
    column: &ColumnDescriptor,
    pool: &[&'a ColumnDescriptor],
) -> Vec<&'a ColumnDescriptor> {
    pool.iter().copied().filter(|c| c.ty == column.ty).collect()
}

/// Pairs columns by name, then infers renames among the leftovers: a
/// dropped and an added column of the same type are a rename only when
/// each is the other's sole same-type candidate. Every other same-type
/// leftover is reported and planned as drop + add.
fn match_columns<'a>(
    old: &'a TableDescriptor,
    new: &'a TableDescriptor,
    warnings: &mut Vec<DiffWarning>,
) -> ColumnMatch<'a> {
    let removed: Vec<&ColumnDescriptor> = old
        .columns
        .iter()
        .filter(|c| new.column_named(&c.name).is_none())
        .collect();
    let added: Vec<&ColumnDescriptor> = new
        .columns
        .iter()
        .filter(|c| old.column_named(&c.name).is_none())
        .collect();

    let mut renames = Vec::new();
    let mut ambiguous_dropped = Vec::new();
    let mut ambiguous_added = BTreeSet::new();
    for d in &removed {
        let for_d = same_type(d, &added);
        match for_d.as_slice() {
            [] => {}
            [a] if same_type(a, &removed).len() == 1 => {
                renames.push((d.name.clone(), a.name.clone()));
            }
            several => {
                ambiguous_dropped.push(d.name.clone());
                ambiguous_added.extend(several.iter().map(|a| a.name.clone()));
            }
        }
    }
    if !ambiguous_dropped.is_empty() {
        let added_order: Vec<String> = added
            .iter()
            .filter(|a| ambiguous_added.contains(&a.name))
            .map(|a| a.name.clone())
            .collect();
        warnings.push(DiffWarning::AmbiguousRename {
            table: new.name.clone(),
            dropped: ambiguous_dropped,
            added: added_order,
        });
    }

    let pairs = new
        .columns
        .iter()
        .map(|c| {
            let old_name = renames
                .iter()
                .find(|(_, to)| to == &c.name)
                .map_or(c.name.as_str(), |(from, _)| from.as_str());
            (c, old.column_named(old_name))
        })
        .collect();
    let dropped = removed
        .into_iter()
        .filter(|d| !renames.iter().any(|(from, _)| from == &d.name))
        .collect();

    ColumnMatch {
        pairs,
        dropped,
        renames,
    }
}

// ================================================================
// Table diff
// ================================================================

/// First change in `old -> new` that `ALTER TABLE` cannot express.
fn recreate_reason(
    old: &TableDescriptor,
    new: &TableDescriptor,
    matched: &ColumnMatch<'_>,
) -> Option<RecreateReason> {
    if old.fts != new.fts {
        return Some(RecreateReason::FullTextChanged);
    }
    let virtual_table = new.is_full_text();
    for (column, source) in &matched.pairs {
        if let Some(source) = source {
            let renamed = source.name != column.name;
            if !source.same_definition(column) || (virtual_table && renamed) {
                return Some(RecreateReason::ColumnChanged(column.name.clone()));
            }
        }
    }
    if let Some(column) = matched
        .added()
        .find(|c| virtual_table || !c.is_addable())
    {
        return Some(RecreateReason::ColumnAdded(column.name.clone()));
    }
    if let Some(column) = matched
        .dropped
        .iter()
        .find(|c| virtual_table || !c.is_droppable())
    {
        return Some(RecreateReason::ColumnDropped(column.name.clone()));
    }
    None
}

/// Value substituted for NULLs when a nullable column becomes NOT NULL
/// and has a static, non-NULL default.
fn not_null_fallback(old: &ColumnDescriptor, new: &ColumnDescriptor) -> Option<DefaultValue> {
    if !old.nullable || new.nullable {
        return None;
    }
    new.default
        .as_ref()
        .filter(|d| d.is_static() && **d != DefaultValue::Null)
        .cloned()
}

fn plan_recreate(
    new: &TableDescriptor,
    matched: &ColumnMatch<'_>,
    reason: RecreateReason,
) -> MigrationOp {
    let copy = matched
        .pairs
        .iter()
        .filter_map(|(column, source)| {
            source.map(|source| CopyColumn {
                target: column.name.clone(),
                source: source.name.clone(),
                fallback: not_null_fallback(source, column),
            })
        })
        .collect();
    MigrationOp::RecreateTable {
        table: new.clone(),
        copy,
        dropped: matched.dropped.iter().map(|c| c.name.clone()).collect(),
        reason,
    }
}

/// Diffs the effective indexes of a table that is altered in place.
/// Old index columns are read through the inferred renames; a renamed
/// index is dropped and created again under its new name.
fn diff_indexes(
    old: &TableDescriptor,
    new: &TableDescriptor,
    matched: &ColumnMatch<'_>,
    plan: &mut Plan,
) {
    let old_indexes: Vec<IndexDescriptor> = old
        .effective_indexes()
        .into_iter()
        .map(|mut idx| {
            for column in &mut idx.columns {
                if let Some((_, to)) = matched.renames.iter().find(|(from, _)| from == column) {
                    *column = to.clone();
                }
            }
            idx
        })
        .collect();
    let new_indexes = new.effective_indexes();

    let mut kept = vec![false; old_indexes.len()];
    for index in &new_indexes {
        let existing = (0..old_indexes.len()).find(|&i| {
            !kept[i] && old_indexes[i].name == index.name && old_indexes[i].equivalent(index)
        });
        match existing {
            Some(i) => kept[i] = true,
            None => plan.create_indexes.push(MigrationOp::CreateIndex {
                table: new.name.clone(),
                index: index.clone(),
            }),
        }
    }
    for (index, kept) in old_indexes.iter().zip(kept) {
        if !kept {
            plan.drop_indexes.push(MigrationOp::DropIndex {
                table: old.name.clone(),
                name: index.name.clone(),
            });
        }
    }
}

/// Warns when columns present in both versions appear in a different
/// relative order.
fn detect_column_order_change(
    old: &TableDescriptor,
    new: &TableDescriptor,
    matched: &ColumnMatch<'_>,
    warnings: &mut Vec<DiffWarning>,
) {
    let new_order: Vec<String> = matched
        .pairs
        .iter()
        .filter(|(_, source)| source.is_some())
        .map(|(column, _)| column.name.clone())
        .collect();
    let common: BTreeSet<&str> = new_order.iter().map(|n| matched.old_name(n)).collect();
    let old_order: Vec<String> = old
        .columns
        .iter()
        .filter(|c| common.contains(c.name.as_str()))
        .map(|c| c.name.clone())
        .collect();
    let old_as_new: Vec<&str> = old_order
        .iter()
        .map(|n| {
            matched
                .renames
                .iter()
                .find(|(from, _)| from == n)
                .map_or(n.as_str(), |(_, to)| to.as_str())
        })
        .collect();

    if old_as_new != new_order {
        warnings.push(DiffWarning::ColumnOrderChanged {
            table: new.name.clone(),
            old_order,
            new_order,
        });
    }
}

fn diff_table(old: &TableDescriptor, new: &TableDescriptor, plan: &mut Plan) {
    let matched = match_columns(old, new, &mut plan.warnings);

    if let Some(reason) = recreate_reason(old, new, &matched) {
        plan.recreates.push(plan_recreate(new, &matched, reason));
        return;
    }

    for (from, to) in &matched.renames {
        plan.renames.push(MigrationOp::RenameColumn {
            table: new.name.clone(),
            from: from.clone(),
            to: to.clone(),
        });
    }
    for column in matched.added() {
        plan.add_columns.push(MigrationOp::AddColumn {
            table: new.name.clone(),
            column: column.clone(),
        });
    }
    for column in &matched.dropped {
        plan.drop_columns.push(MigrationOp::DropColumn {
            table: new.name.clone(),
            column: column.name.clone(),
        });
    }
    diff_indexes(old, new, &matched, plan);
    detect_column_order_change(old, new, &matched, &mut plan.warnings);
}

// ================================================================
// Schema diff
// ================================================================

/// Orders tables so that every table comes after the tables it
/// references; ties and cycles fall back to name order.
fn dependency_order<'a>(tables: Vec<&'a TableDescriptor>) -> Vec<&'a TableDescriptor> {
    let names: BTreeSet<&str> = tables.iter().map(|t| t.name.as_str()).collect();
    let mut placed: BTreeSet<&str> = BTreeSet::new();
    let mut pending = tables;
    let mut ordered = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let ready = pending.iter().position(|t| {
            t.columns.iter().all(|c| {
                c.references.as_ref().map_or(true, |fk| {
                    fk.table == t.name
                        || !names.contains(fk.table.as_str())
                        || placed.contains(fk.table.as_str())
                })
            })
        });
        let table = pending.remove(ready.unwrap_or(0));
        placed.insert(table.name.as_str());
        ordered.push(table);
    }
    ordered
}

/// Computes the migration from `previous` to `current`.
///
/// Without `previous` every table is created. Equal snapshots produce an
/// empty script.
#[must_use]
pub fn diff(current: &SchemaSnapshot, previous: Option<&SchemaSnapshot>) -> MigrationScript {
    let empty = SchemaSnapshot::new();
    let previous = previous.unwrap_or(&empty);
    let mut plan = Plan::default();

    let created: Vec<&TableDescriptor> = current
        .tables()
        .filter(|t| previous.table(&t.name).is_none())
        .collect();
    for table in dependency_order(created) {
        plan.create_tables.push(MigrationOp::CreateTable(table.clone()));
        for index in table.effective_indexes() {
            plan.create_indexes.push(MigrationOp::CreateIndex {
                table: table.name.clone(),
                index,
            });
        }
    }

    for new in current.tables() {
        if let Some(old) = previous.table(&new.name) {
            if old != new {
                diff_table(old, new, &mut plan);
            }
        }
    }

    let dropped: Vec<&TableDescriptor> = previous
        .tables()
        .filter(|t| current.table(&t.name).is_none())
        .collect();
    for table in dependency_order(dropped).into_iter().rev() {
        plan.drop_tables.push(MigrationOp::DropTable {
            name: table.name.clone(),
        });
    }

    plan.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{integer, real, text, FtsOptions};

    // ============================================================
    // Helpers
    // ============================================================

    fn users(extra: Vec<ColumnDescriptor>) -> TableDescriptor {
        let mut t = TableDescriptor::new("users")
            .column(integer("id").primary_key().autoincrement())
            .column(text("name"));
        t.columns.extend(extra);
        t
    }

    fn schema(tables: Vec<TableDescriptor>) -> SchemaSnapshot {
        SchemaSnapshot::from_tables(tables).unwrap()
    }

    fn kinds(script: &MigrationScript) -> Vec<&'static str> {
        script
            .ops
            .iter()
            .map(|op| match op {
                MigrationOp::CreateTable(_) => "create_table",
                MigrationOp::DropTable { .. } => "drop_table",
                MigrationOp::AddColumn { .. } => "add_column",
                MigrationOp::DropColumn { .. } => "drop_column",
                MigrationOp::RenameColumn { .. } => "rename_column",
                MigrationOp::CreateIndex { .. } => "create_index",
                MigrationOp::DropIndex { .. } => "drop_index",
                MigrationOp::RecreateTable { .. } => "recreate_table",
            })
            .collect()
    }

    // ============================================================
    // Table level
    // ============================================================

    #[test]
    fn identical_snapshots_produce_empty_script() {
        let s = schema(vec![users(vec![])]);
        let script = diff(&s, Some(&s));
        assert!(script.is_empty());
        assert!(script.warnings.is_empty());
    }

    #[test]
    fn no_previous_creates_referenced_tables_first() {
        let posts = TableDescriptor::new("a_posts")
            .column(integer("id").primary_key())
            .column(integer("author_id").references("users", "id"));
        let script = diff(&schema(vec![posts, users(vec![])]), None);
        let names: Vec<&str> = script.ops.iter().map(MigrationOp::table_name).collect();
        assert_eq!(names, vec!["users", "a_posts", "a_posts"]);
        assert_eq!(kinds(&script), vec!["create_table", "create_table", "create_index"]);
        assert!(!script.is_destructive());
    }

    #[test]
    fn dropped_tables_go_dependents_first() {
        let posts = TableDescriptor::new("posts")
            .column(integer("id").primary_key())
            .column(integer("author_id").references("users", "id"));
        let previous = schema(vec![users(vec![]), posts]);
        let script = diff(&SchemaSnapshot::new(), Some(&previous));
        let names: Vec<&str> = script.ops.iter().map(MigrationOp::table_name).collect();
        assert_eq!(names, vec!["posts", "users"]);
        assert!(script.is_destructive());
    }

    // ============================================================
    // Column level
    // ============================================================

    #[test]
    fn nullable_column_is_added_in_place() {
        let previous = schema(vec![users(vec![])]);
        let current = schema(vec![users(vec![text("bio").nullable()])]);
        let script = diff(&current, Some(&previous));
        assert_eq!(kinds(&script), vec!["add_column"]);
        assert!(!script.is_destructive());
    }

    #[test]
    fn not_null_without_default_forces_recreate() {
        let previous = schema(vec![users(vec![])]);
        let current = schema(vec![users(vec![integer("age")])]);
        let script = diff(&current, Some(&previous));
        assert!(matches!(
            &script.ops[..],
            [MigrationOp::RecreateTable { reason: RecreateReason::ColumnAdded(c), .. }] if c == "age"
        ));
    }

    #[test]
    fn nullable_to_not_null_recreates_with_fallback() {
        let previous = schema(vec![users(vec![
            text("email").nullable(),
            text("legacy").nullable(),
        ])]);
        let current = schema(vec![users(vec![
            text("email").default(DefaultValue::Text("unknown".into()))
        ])]);
        let script = diff(&current, Some(&previous));
        assert!(script.is_destructive());
        let MigrationOp::RecreateTable {
            copy,
            dropped,
            reason,
            ..
        } = &script.ops[0]
        else {
            panic!("expected recreate, got {:?}", script.ops);
        };
        assert_eq!(script.ops.len(), 1);
        assert_eq!(reason, &RecreateReason::ColumnChanged("email".into()));
        assert_eq!(dropped, &vec!["legacy".to_string()]);
        let email = copy.iter().find(|c| c.target == "email").unwrap();
        assert_eq!(email.fallback, Some(DefaultValue::Text("unknown".into())));
    }

    #[test]
    fn unique_column_drop_forces_recreate() {
        let previous = schema(vec![users(vec![text("email").unique()])]);
        let current = schema(vec![users(vec![])]);
        let script = diff(&current, Some(&previous));
        assert!(matches!(
            &script.ops[..],
            [MigrationOp::RecreateTable { reason: RecreateReason::ColumnDropped(c), .. }] if c == "email"
        ));
    }

    #[test]
    fn plain_column_drop() {
        let previous = schema(vec![users(vec![real("score").nullable()])]);
        let current = schema(vec![users(vec![])]);
        let script = diff(&current, Some(&previous));
        assert_eq!(kinds(&script), vec!["drop_column"]);
        assert!(script.is_destructive());
    }

    // ============================================================
    // Rename inference
    // ============================================================

    #[test]
    fn single_same_type_mismatch_is_a_rename() {
        let previous = schema(vec![users(vec![text("mail").nullable()])]);
        let current = schema(vec![users(vec![text("email").nullable()])]);
        let script = diff(&current, Some(&previous));
        assert_eq!(
            script.ops,
            vec![MigrationOp::RenameColumn {
                table: "users".into(),
                from: "mail".into(),
                to: "email".into(),
            }]
        );
        assert!(!script.is_destructive());
    }

    #[test]
    fn different_types_are_not_renamed() {
        let previous = schema(vec![users(vec![text("mail").nullable()])]);
        let current = schema(vec![users(vec![integer("age").nullable()])]);
        let script = diff(&current, Some(&previous));
        assert_eq!(kinds(&script), vec!["add_column", "drop_column"]);
        assert!(script.warnings.is_empty());
    }

    #[test]
    fn ambiguous_renames_fail_closed() {
        let previous = schema(vec![users(vec![
            text("a").nullable(),
            text("b").nullable(),
        ])]);
        let current = schema(vec![users(vec![
            text("c").nullable(),
            text("d").nullable(),
        ])]);
        let script = diff(&current, Some(&previous));
        assert_eq!(
            kinds(&script),
            vec!["add_column", "add_column", "drop_column", "drop_column"]
        );
        assert_eq!(
            script.warnings,
            vec![DiffWarning::AmbiguousRename {
                table: "users".into(),
                dropped: vec!["a".into(), "b".into()],
                added: vec!["c".into(), "d".into()],
            }]
        );
    }

    #[test]
    fn rename_with_changed_definition_folds_into_recreate() {
        let previous = schema(vec![users(vec![text("mail").nullable()])]);
        let current = schema(vec![users(vec![text("email").unique()])]);
        let script = diff(&current, Some(&previous));
        let MigrationOp::RecreateTable { copy, .. } = &script.ops[0] else {
            panic!("expected recreate");
        };
        assert!(copy.iter().any(|c| c.source == "mail" && c.target == "email"));
    }

    // ============================================================
    // Indexes
    // ============================================================

    #[test]
    fn identical_indexes_are_skipped_and_changes_detected() {
        let idx = IndexDescriptor::new("idx_users_name", &["name"]);
        let previous = schema(vec![users(vec![]).index(idx.clone())]);
        assert!(diff(&previous, Some(&previous)).is_empty());

        let current = schema(vec![users(vec![]).index(idx.unique())]);
        let script = diff(&current, Some(&previous));
        assert_eq!(kinds(&script), vec!["drop_index", "create_index"]);
    }

    #[test]
    fn renamed_index_is_dropped_and_recreated() {
        let previous = schema(vec![
            users(vec![]).index(IndexDescriptor::new("idx_users_name", &["name"]))
        ]);
        let current = schema(vec![
            users(vec![]).index(IndexDescriptor::new("idx_users_by_name", &["name"]))
        ]);
        let script = diff(&current, Some(&previous));
        assert!(matches!(
            &script.ops[..],
            [
                MigrationOp::DropIndex { name: dropped, .. },
                MigrationOp::CreateIndex { index, .. },
            ] if dropped == "idx_users_name" && index.name == "idx_users_by_name"
        ));
        assert_eq!(
            script.statements(),
            vec![
                "DROP INDEX \"idx_users_name\"".to_string(),
                "CREATE INDEX \"idx_users_by_name\" ON \"users\" (\"name\")".to_string(),
            ]
        );
    }

    #[test]
    fn index_name_moves_from_dropped_table_to_new_table() {
        let idx = IndexDescriptor::new("idx_title", &["title"]);
        let previous = schema(vec![TableDescriptor::new("posts")
            .column(integer("id").primary_key())
            .column(text("title"))
            .index(idx.clone())]);
        let current = schema(vec![TableDescriptor::new("articles")
            .column(integer("id").primary_key())
            .column(text("title"))
            .index(idx)]);
        let script = diff(&current, Some(&previous));
        assert_eq!(kinds(&script), vec!["create_table", "drop_table", "create_index"]);
        assert_eq!(script.ops[2].table_name(), "articles");
    }

    #[test]
    fn added_foreign_key_column_gets_implied_index() {
        let previous = schema(vec![
            users(vec![]),
            TableDescriptor::new("posts").column(integer("id").primary_key()),
        ]);
        let current = schema(vec![
            users(vec![]),
            TableDescriptor::new("posts")
                .column(integer("id").primary_key())
                .column(integer("author_id").nullable().references("users", "id")),
        ]);
        let script = diff(&current, Some(&previous));
        assert_eq!(kinds(&script), vec!["add_column", "create_index"]);
        let MigrationOp::CreateIndex { index, .. } = &script.ops[1] else {
            panic!("expected index");
        };
        assert_eq!(index.name, "idx_posts_author_id");
    }

    #[test]
    fn renamed_column_keeps_its_index() {
        let previous = schema(vec![users(vec![text("mail").nullable()])
            .index(IndexDescriptor::new("idx_users_mail", &["mail"]))]);
        let current = schema(vec![users(vec![text("email").nullable()])
            .index(IndexDescriptor::new("idx_users_mail", &["email"]))]);
        assert_eq!(kinds(&diff(&current, Some(&previous))), vec!["rename_column"]);
    }

    // ============================================================
    // Warnings and full-text
    // ============================================================

    #[test]
    fn column_order_change_is_only_a_warning() {
        let previous = schema(vec![users(vec![
            text("a").nullable(),
            integer("b").nullable(),
        ])]);
        let current = schema(vec![users(vec![
            integer("b").nullable(),
            text("a").nullable(),
        ])]);
        let script = diff(&current, Some(&previous));
        assert!(script.is_empty());
        assert!(matches!(
            &script.warnings[..],
            [DiffWarning::ColumnOrderChanged { table, .. }] if table == "users"
        ));
    }

    #[test]
    fn full_text_changes_recreate() {
        let docs = |tokenizer: Option<&str>| {
            TableDescriptor::new("docs")
                .column(text("body"))
                .full_text(FtsOptions {
                    tokenizer: tokenizer.map(str::to_string),
                })
        };
        let previous = schema(vec![docs(None)]);
        let current = schema(vec![docs(Some("porter"))]);
        let script = diff(&current, Some(&previous));
        assert!(matches!(
            &script.ops[..],
            [MigrationOp::RecreateTable { reason: RecreateReason::FullTextChanged, .. }]
        ));
    }

    #[test]
    fn op_ordering_across_tables() {
        let previous = schema(vec![
            users(vec![text("mail").nullable()]),
            TableDescriptor::new("legacy").column(integer("id").primary_key()),
        ]);
        let current = schema(vec![
            users(vec![text("email").nullable(), text("bio").nullable()]),
            TableDescriptor::new("tags").column(text("name").primary_key()),
        ]);
        let script = diff(&current, Some(&previous));
        assert_eq!(
            kinds(&script),
            vec![
                "create_table",
                "drop_table",
                "add_column",
                "add_column",
                "drop_column"
            ]
        );
        assert_eq!(
            script.warnings,
            vec![DiffWarning::AmbiguousRename {
                table: "users".into(),
                dropped: vec!["mail".into()],
                added: vec!["email".into(), "bio".into()],
            }]
        );
    }
}
