//! Mapping from catalog rows to [`DatabaseObject`]s.
//!
//! Every result set has one mapping function. Failures are per object so the
//! scanner can record them and continue with the rest of the database.

use super::types::*;
use crate::error::{Result, SyncError};
use std::collections::BTreeMap;
use tracing::debug;

/// Map one module row to a procedure, function, view or trigger.
pub fn map_module(database: &str, row: ModuleRow) -> Result<DatabaseObject> {
    let name = ObjectName::new(database, row.schema, row.name);

    let kind = ObjectKind::from_type_code(&row.type_code)
        .filter(|k| *k != ObjectKind::Table)
        .ok_or_else(|| {
            SyncError::render(
                name.to_string(),
                format!("unsupported object type '{}'", row.type_code.trim()),
            )
        })?;

    let definition = match row.definition {
        Some(d) if !d.trim().is_empty() => d,
        _ => {
            return Err(SyncError::render(
                name.to_string(),
                "definition is unavailable (encrypted module?)",
            ))
        }
    };

    let module = ModuleDefinition { name, definition };
    Ok(match kind {
        ObjectKind::Procedure => DatabaseObject::Procedure(module),
        ObjectKind::Function => DatabaseObject::Function(module),
        ObjectKind::View => DatabaseObject::View(module),
        ObjectKind::Trigger => DatabaseObject::Trigger(module),
        ObjectKind::Table => unreachable!("filtered above"),
    })
}

#[derive(Default)]
struct IndexBuilder {
    is_primary_key: bool,
    is_unique: bool,
    is_clustered: bool,
    filter: Option<String>,
    columns: Vec<KeyColumn>,
    include_cols: Vec<KeyColumn>,
}

/// Assemble table definitions from the table, column and index column result sets.
///
/// Returns one entry per table row, in table row order.
pub fn map_tables(database: &str, rows: TableRows) -> Vec<Result<DatabaseObject>> {
    let mut columns: BTreeMap<i32, Vec<Column>> = BTreeMap::new();
    for row in rows.columns {
        let identity = row.is_identity.then(|| Identity {
            seed: row.identity_seed.unwrap_or_else(|| "1".to_string()),
            increment: row.identity_increment.unwrap_or_else(|| "1".to_string()),
        });
        columns.entry(row.object_id).or_default().push(Column {
            name: row.name,
            data_type: row.data_type,
            max_length: row.max_length,
            precision: row.precision,
            scale: row.scale,
            is_nullable: row.is_nullable,
            identity,
            ordinal: row.column_id,
        });
    }

    let mut indexes: BTreeMap<i32, BTreeMap<String, IndexBuilder>> = BTreeMap::new();
    for row in rows.index_columns {
        let builder = indexes
            .entry(row.object_id)
            .or_default()
            .entry(row.index_name)
            .or_default();
        builder.is_primary_key = row.is_primary_key;
        builder.is_unique = row.is_unique;
        builder.is_clustered = row.is_clustered;
        builder.filter = row.filter_definition.filter(|f| !f.trim().is_empty());
        if row.is_included {
            builder.include_cols.push(KeyColumn {
                name: row.column_name,
                ordinal: row.index_column_id,
                descending: false,
            });
        } else {
            builder.columns.push(KeyColumn {
                name: row.column_name,
                ordinal: row.key_ordinal,
                descending: row.is_descending,
            });
        }
    }

    rows.tables
        .into_iter()
        .map(|table| {
            let name = ObjectName::new(database, table.schema, table.name);
            let table_columns = columns.remove(&table.object_id).unwrap_or_default();
            if table_columns.is_empty() {
                return Err(SyncError::render(name.to_string(), "table has no columns"));
            }

            let mut primary_key = None;
            let mut table_indexes = Vec::new();
            for (index_name, builder) in indexes.remove(&table.object_id).unwrap_or_default() {
                if builder.is_primary_key {
                    primary_key = Some(PrimaryKey {
                        name: index_name,
                        columns: builder.columns,
                        is_clustered: builder.is_clustered,
                    });
                } else if builder.columns.is_empty() {
                    debug!("Skipping index {} on {}: no key columns", index_name, name);
                } else {
                    table_indexes.push(Index {
                        name: index_name,
                        columns: builder.columns,
                        include_cols: builder.include_cols,
                        is_unique: builder.is_unique,
                        is_clustered: builder.is_clustered,
                        filter: builder.filter,
                    });
                }
            }

            Ok(DatabaseObject::Table(TableDefinition {
                name,
                columns: table_columns,
                primary_key,
                indexes: table_indexes,
            }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_row(type_code: &str, definition: Option<&str>) -> ModuleRow {
        ModuleRow {
            schema: "dbo".into(),
            name: "usp_Load".into(),
            type_code: type_code.into(),
            definition: definition.map(String::from),
        }
    }

    fn column(object_id: i32, column_id: i32, name: &str, identity: bool) -> ColumnRow {
        ColumnRow {
            object_id,
            column_id,
            name: name.into(),
            data_type: "int".into(),
            max_length: 4,
            precision: 10,
            scale: 0,
            is_nullable: !identity,
            is_identity: identity,
            identity_seed: identity.then(|| "100".to_string()),
            identity_increment: identity.then(|| "5".to_string()),
        }
    }

    fn index_col(object_id: i32, index: &str, col: &str, pk: bool, included: bool) -> IndexColumnRow {
        IndexColumnRow {
            object_id,
            index_name: index.into(),
            is_primary_key: pk,
            is_unique: pk,
            is_clustered: pk,
            filter_definition: None,
            column_name: col.into(),
            key_ordinal: if included { 0 } else { 1 },
            index_column_id: 1,
            is_descending: false,
            is_included: included,
        }
    }

    #[test]
    fn test_map_module_kinds() {
        let obj = map_module("SalesDB", module_row("P ", Some("CREATE PROC dbo.usp_Load AS SELECT 1"))).unwrap();
        assert_eq!(obj.kind(), ObjectKind::Procedure);
        assert_eq!(obj.name().database, "SalesDB");

        let obj = map_module("SalesDB", module_row("IF", Some("CREATE FUNCTION f() RETURNS TABLE AS RETURN SELECT 1 x"))).unwrap();
        assert_eq!(obj.kind(), ObjectKind::Function);

        let obj = map_module("SalesDB", module_row("TR", Some("CREATE TRIGGER t ON x AFTER INSERT AS SELECT 1"))).unwrap();
        assert_eq!(obj.kind(), ObjectKind::Trigger);
    }

    #[test]
    fn test_map_module_unsupported_type() {
        let err = map_module("SalesDB", module_row("SN", Some("x"))).unwrap_err();
        assert!(matches!(err, SyncError::Render { .. }));
        assert!(err.to_string().contains("unsupported object type 'SN'"));
    }

    #[test]
    fn test_map_module_encrypted() {
        let err = map_module("SalesDB", module_row("P", None)).unwrap_err();
        assert!(err.to_string().contains("encrypted"));
    }

    #[test]
    fn test_map_tables_groups_by_object_id() {
        let rows = TableRows {
            tables: vec![
                TableRow { object_id: 1, schema: "dbo".into(), name: "Orders".into() },
                TableRow { object_id: 2, schema: "dbo".into(), name: "Empty".into() },
            ],
            columns: vec![
                column(1, 2, "Total", false),
                column(1, 1, "Id", true),
                column(3, 1, "Orphan", false),
            ],
            index_columns: vec![
                index_col(1, "PK_Orders", "Id", true, false),
                index_col(1, "IX_Orders_Total", "Total", false, false),
                index_col(1, "IX_Orders_Total", "Id", false, true),
            ],
        };

        let mapped = map_tables("SalesDB", rows);
        assert_eq!(mapped.len(), 2);

        let DatabaseObject::Table(orders) = mapped[0].as_ref().unwrap() else {
            panic!("expected table");
        };
        assert_eq!(orders.columns.len(), 2);
        let id = orders.columns.iter().find(|c| c.name == "Id").unwrap();
        assert_eq!(
            id.identity,
            Some(Identity { seed: "100".into(), increment: "5".into() })
        );
        let pk = orders.primary_key.as_ref().unwrap();
        assert_eq!(pk.name, "PK_Orders");
        assert!(pk.is_clustered);
        assert_eq!(orders.indexes.len(), 1);
        assert_eq!(orders.indexes[0].include_cols[0].name, "Id");

        // A table without columns is a per-object failure
        assert!(mapped[1].is_err());
    }
}
