//! Table DDL generation.

use super::identifier::{display_ident, has_regular_shape, qualify};
use crate::catalog::{Column, Index, KeyColumn, TableDefinition};
use crate::error::{Result, SyncError};

/// Format a SQL Server column type from catalog metadata.
///
/// `max_length` is in bytes (-1 for max); nchar/nvarchar lengths are halved.
pub fn format_mssql_type(data_type: &str, max_length: i32, precision: i32, scale: i32) -> String {
    let lower = data_type.to_lowercase();
    match lower.as_str() {
        "char" | "varchar" | "binary" | "varbinary" => {
            if max_length == -1 {
                format!("{}(max)", lower)
            } else {
                format!("{}({})", lower, max_length)
            }
        }

        "nchar" | "nvarchar" => {
            if max_length == -1 {
                format!("{}(max)", lower)
            } else {
                format!("{}({})", lower, max_length / 2)
            }
        }

        "decimal" | "numeric" => format!("{}({},{})", lower, precision, scale),

        "float" => {
            if precision > 0 && precision != 53 {
                format!("float({})", precision)
            } else {
                "float".to_string()
            }
        }

        "datetime2" | "time" | "datetimeoffset" => {
            if scale != 7 {
                format!("{}({})", lower, scale)
            } else {
                lower
            }
        }

        // Alias and CLR types keep their catalog spelling
        _ if has_regular_shape(data_type) => data_type.to_string(),
        _ => format!("[{}]", data_type.replace(']', "]]")),
    }
}

fn format_column(column: &Column) -> Result<String> {
    let mut line = format!(
        "{} {}",
        display_ident(&column.name)?,
        format_mssql_type(
            &column.data_type,
            column.max_length,
            column.precision,
            column.scale
        )
    );
    if let Some(identity) = &column.identity {
        line.push_str(&format!(" IDENTITY({},{})", identity.seed, identity.increment));
    }
    line.push_str(if column.is_nullable { " NULL" } else { " NOT NULL" });
    Ok(line)
}

fn sorted(columns: &[KeyColumn]) -> Vec<&KeyColumn> {
    let mut cols: Vec<&KeyColumn> = columns.iter().collect();
    cols.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.name.cmp(&b.name)));
    cols
}

fn key_list(columns: &[KeyColumn]) -> Result<String> {
    let parts = sorted(columns)
        .into_iter()
        .map(|c| {
            let name = display_ident(&c.name)?;
            Ok(if c.descending {
                format!("{} DESC", name)
            } else {
                name
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(", "))
}

fn include_list(columns: &[KeyColumn]) -> Result<String> {
    let parts = sorted(columns)
        .into_iter()
        .map(|c| display_ident(&c.name))
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(", "))
}

fn format_index(table: &str, index: &Index) -> Result<String> {
    let mut sql = String::from("CREATE ");
    if index.is_unique {
        sql.push_str("UNIQUE ");
    }
    if index.is_clustered {
        sql.push_str("CLUSTERED ");
    }
    sql.push_str(&format!(
        "INDEX {} ON {} ({})",
        display_ident(&index.name)?,
        table,
        key_list(&index.columns)?
    ));
    if !index.include_cols.is_empty() {
        sql.push_str(&format!(" INCLUDE ({})", include_list(&index.include_cols)?));
    }
    if let Some(filter) = &index.filter {
        sql.push_str(&format!(" WHERE {}", filter.trim()));
    }
    sql.push(';');
    Ok(sql)
}

/// Generate the CREATE TABLE statement followed by one CREATE INDEX per index.
///
/// Columns are emitted in ordinal order and indexes in name order regardless
/// of the order the catalog returned them in.
pub fn render_table(table: &TableDefinition) -> Result<String> {
    let object = table.name.to_string();
    let with_object = |e: SyncError| match e {
        SyncError::Render { message, object: ident } => {
            SyncError::render(object.clone(), format!("{}: {}", message, ident))
        }
        other => other,
    };

    if table.columns.is_empty() {
        return Err(SyncError::render(object.clone(), "table has no columns"));
    }

    let qualified = qualify(&table.name.schema, &table.name.name).map_err(with_object)?;

    let mut columns: Vec<&Column> = table.columns.iter().collect();
    columns.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.name.cmp(&b.name)));

    let mut lines = columns
        .into_iter()
        .map(format_column)
        .collect::<Result<Vec<_>>>()
        .map_err(with_object)?;

    if let Some(pk) = &table.primary_key {
        if pk.columns.is_empty() {
            return Err(SyncError::render(
                object.clone(),
                format!("primary key {} has no columns", pk.name),
            ));
        }
        lines.push(format!(
            "CONSTRAINT {} PRIMARY KEY {}({})",
            display_ident(&pk.name).map_err(with_object)?,
            if pk.is_clustered { "" } else { "NONCLUSTERED " },
            key_list(&pk.columns).map_err(with_object)?
        ));
    }

    let mut sql = format!("CREATE TABLE {} (\n", qualified);
    sql.push_str(
        &lines
            .iter()
            .map(|l| format!("    {}", l))
            .collect::<Vec<_>>()
            .join(",\n"),
    );
    sql.push_str("\n);\n");

    let mut indexes: Vec<&Index> = table.indexes.iter().collect();
    indexes.sort_by(|a, b| a.name.cmp(&b.name));
    if !indexes.is_empty() {
        sql.push('\n');
    }
    for index in indexes {
        sql.push_str(&format_index(&qualified, index).map_err(with_object)?);
        sql.push('\n');
    }

    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Identity, ObjectName, PrimaryKey};

    fn col(name: &str, data_type: &str, ordinal: i32) -> Column {
        Column {
            name: name.to_string(),
            data_type: data_type.to_string(),
            max_length: 0,
            precision: 0,
            scale: 0,
            is_nullable: true,
            identity: None,
            ordinal,
        }
    }

    fn key(name: &str, ordinal: i32) -> KeyColumn {
        KeyColumn {
            name: name.to_string(),
            ordinal,
            descending: false,
        }
    }

    #[test]
    fn test_format_mssql_type() {
        assert_eq!(format_mssql_type("varchar", 50, 0, 0), "varchar(50)");
        assert_eq!(format_mssql_type("varchar", -1, 0, 0), "varchar(max)");
        assert_eq!(format_mssql_type("nvarchar", 100, 0, 0), "nvarchar(50)");
        assert_eq!(format_mssql_type("nchar", -1, 0, 0), "nchar(max)");
        assert_eq!(format_mssql_type("varbinary", 16, 0, 0), "varbinary(16)");
        assert_eq!(format_mssql_type("decimal", 9, 18, 2), "decimal(18,2)");
        assert_eq!(format_mssql_type("float", 8, 53, 0), "float");
        assert_eq!(format_mssql_type("float", 4, 24, 0), "float(24)");
        assert_eq!(format_mssql_type("datetime2", 8, 27, 7), "datetime2");
        assert_eq!(format_mssql_type("datetime2", 6, 23, 3), "datetime2(3)");
        assert_eq!(format_mssql_type("time", 3, 8, 0), "time(0)");
        assert_eq!(format_mssql_type("int", 4, 10, 0), "int");
        assert_eq!(format_mssql_type("Phone Number", 20, 0, 0), "[Phone Number]");
    }

    fn orders() -> TableDefinition {
        let mut id = col("Id", "int", 1);
        id.is_nullable = false;
        id.identity = Some(Identity {
            seed: "1".into(),
            increment: "1".into(),
        });
        let mut total = col("Total", "decimal", 2);
        total.is_nullable = false;
        total.precision = 18;
        total.scale = 2;

        TableDefinition {
            name: ObjectName::new("SalesDB", "dbo", "Orders"),
            columns: vec![id, total],
            primary_key: Some(PrimaryKey {
                name: "PK_Orders".into(),
                columns: vec![key("Id", 1)],
                is_clustered: true,
            }),
            indexes: vec![Index {
                name: "IX_Orders_Total".into(),
                columns: vec![key("Total", 1)],
                include_cols: vec![],
                is_unique: false,
                is_clustered: false,
                filter: None,
            }],
        }
    }

    #[test]
    fn test_orders_table() {
        let sql = render_table(&orders()).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE dbo.Orders (\n    \
             Id int IDENTITY(1,1) NOT NULL,\n    \
             Total decimal(18,2) NOT NULL,\n    \
             CONSTRAINT PK_Orders PRIMARY KEY (Id)\n\
             );\n\
             \n\
             CREATE INDEX IX_Orders_Total ON dbo.Orders (Total);\n"
        );
        assert_eq!(sql.matches("CREATE INDEX").count(), 1);
    }

    #[test]
    fn test_ordering_ignores_catalog_order() {
        let mut table = orders();
        table.columns.push(col("Notes", "nvarchar", 3));
        table.indexes.push(Index {
            name: "IX_A".into(),
            columns: vec![key("Notes", 2), key("Total", 1)],
            include_cols: vec![key("Id", 3)],
            is_unique: true,
            is_clustered: false,
            filter: Some("([Notes] IS NOT NULL)".into()),
        });
        let expected = render_table(&table).unwrap();

        table.columns.reverse();
        table.indexes.reverse();
        for index in &mut table.indexes {
            index.columns.reverse();
        }
        assert_eq!(render_table(&table).unwrap(), expected);

        let ix_a = expected.find("IX_A").unwrap();
        let ix_total = expected.find("IX_Orders_Total ON").unwrap();
        assert!(ix_a < ix_total);
        assert!(expected.contains(
            "CREATE UNIQUE INDEX IX_A ON dbo.Orders (Total, Notes) INCLUDE (Id) WHERE ([Notes] IS NOT NULL);"
        ));
    }

    #[test]
    fn test_nonclustered_pk_and_desc_keys() {
        let mut table = orders();
        table.primary_key = Some(PrimaryKey {
            name: "PK_Orders".into(),
            columns: vec![KeyColumn {
                name: "Id".into(),
                ordinal: 1,
                descending: true,
            }],
            is_clustered: false,
        });
        table.indexes[0].is_clustered = true;
        let sql = render_table(&table).unwrap();
        assert!(sql.contains("CONSTRAINT PK_Orders PRIMARY KEY NONCLUSTERED (Id DESC)"));
        assert!(sql.contains("CREATE CLUSTERED INDEX IX_Orders_Total"));
    }

    #[test]
    fn test_irregular_names_are_bracketed() {
        let mut table = orders();
        table.name = ObjectName::new("SalesDB", "sales ops", "Order");
        table.columns[1].name = "Total]Amount".into();
        table.indexes[0].columns[0].name = "Total]Amount".into();
        let sql = render_table(&table).unwrap();
        assert!(sql.starts_with("CREATE TABLE [sales ops].[Order] ("));
        assert!(sql.contains("[Total]]Amount] decimal(18,2) NOT NULL"));
    }

    #[test]
    fn test_invalid_column_name_is_render_error() {
        let mut table = orders();
        table.columns[0].name = String::new();
        let err = render_table(&table).unwrap_err();
        match err {
            SyncError::Render { object, .. } => assert_eq!(object, "SalesDB.dbo.Orders"),
            other => panic!("unexpected error: {}", other),
        }
    }
}
