//! Identifier validation and quoting for generated T-SQL.
//!
//! Regular identifiers are written bare so the generated scripts read the way
//! a DBA would write them. Everything else is bracket-quoted.

use crate::error::{Result, SyncError};

/// Maximum identifier length in SQL Server (sysname).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// T-SQL reserved keywords. Sorted; looked up with binary search.
const RESERVED: &[&str] = &[
    "ADD", "ALL", "ALTER", "AND", "ANY", "AS", "ASC", "AUTHORIZATION", "BACKUP", "BEGIN",
    "BETWEEN", "BREAK", "BROWSE", "BULK", "BY", "CASCADE", "CASE", "CHECK", "CHECKPOINT",
    "CLOSE", "CLUSTERED", "COALESCE", "COLLATE", "COLUMN", "COMMIT", "COMPUTE", "CONSTRAINT",
    "CONTAINS", "CONTAINSTABLE", "CONTINUE", "CONVERT", "CREATE", "CROSS", "CURRENT",
    "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "CURRENT_USER", "CURSOR", "DATABASE",
    "DBCC", "DEALLOCATE", "DECLARE", "DEFAULT", "DELETE", "DENY", "DESC", "DISK", "DISTINCT",
    "DISTRIBUTED", "DOUBLE", "DROP", "DUMP", "ELSE", "END", "ERRLVL", "ESCAPE", "EXCEPT",
    "EXEC", "EXECUTE", "EXISTS", "EXIT", "EXTERNAL", "FETCH", "FILE", "FILLFACTOR", "FOR",
    "FOREIGN", "FREETEXT", "FREETEXTTABLE", "FROM", "FULL", "FUNCTION", "GOTO", "GRANT",
    "GROUP", "HAVING", "HOLDLOCK", "IDENTITY", "IDENTITYCOL", "IDENTITY_INSERT", "IF", "IN",
    "INDEX", "INNER", "INSERT", "INTERSECT", "INTO", "IS", "JOIN", "KEY", "KILL", "LEFT",
    "LIKE", "LINENO", "LOAD", "MERGE", "NATIONAL", "NOCHECK", "NONCLUSTERED", "NOT", "NULL",
    "NULLIF", "OF", "OFF", "OFFSETS", "ON", "OPEN", "OPENDATASOURCE", "OPENQUERY",
    "OPENROWSET", "OPENXML", "OPTION", "OR", "ORDER", "OUTER", "OVER", "PERCENT", "PIVOT",
    "PLAN", "PRECISION", "PRIMARY", "PRINT", "PROC", "PROCEDURE", "PUBLIC", "RAISERROR",
    "READ", "READTEXT", "RECONFIGURE", "REFERENCES", "REPLICATION", "RESTORE", "RESTRICT",
    "RETURN", "REVERT", "REVOKE", "RIGHT", "ROLLBACK", "ROWCOUNT", "ROWGUIDCOL", "RULE",
    "SAVE", "SCHEMA", "SECURITYAUDIT", "SELECT", "SEMANTICKEYPHRASETABLE",
    "SEMANTICSIMILARITYDETAILSTABLE", "SEMANTICSIMILARITYTABLE", "SESSION_USER", "SET",
    "SETUSER", "SHUTDOWN", "SOME", "STATISTICS", "SYSTEM_USER", "TABLE", "TABLESAMPLE",
    "TEXTSIZE", "THEN", "TO", "TOP", "TRAN", "TRANSACTION", "TRIGGER", "TRUNCATE",
    "TRY_CONVERT", "TSEQUAL", "UNION", "UNIQUE", "UNPIVOT", "UPDATE", "UPDATETEXT", "USE",
    "USER", "VALUES", "VARYING", "VIEW", "WAITFOR", "WHEN", "WHERE", "WHILE", "WITH",
    "WITHIN", "WRITETEXT",
];

/// Validate an identifier read from the catalog.
///
/// Rejects empty identifiers, identifiers containing NUL and identifiers
/// longer than 128 characters.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SyncError::render(name, "identifier cannot be empty"));
    }

    if name.contains('\0') {
        return Err(SyncError::render(
            name.replace('\0', "\\0"),
            "identifier contains a null byte",
        ));
    }

    let len = name.chars().count();
    if len > MAX_IDENTIFIER_LENGTH {
        return Err(SyncError::render(
            name,
            format!(
                "identifier exceeds maximum length of {} characters (got {})",
                MAX_IDENTIFIER_LENGTH, len
            ),
        ));
    }

    Ok(())
}

/// Quote a SQL Server identifier using brackets.
///
/// Escapes closing brackets by doubling them and wraps in brackets.
pub fn quote_mssql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("[{}]", name.replace(']', "]]")))
}

fn is_reserved(name: &str) -> bool {
    RESERVED
        .binary_search(&name.to_ascii_uppercase().as_str())
        .is_ok()
}

/// Whether `name` only uses the characters of a regular identifier.
pub fn has_regular_shape(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '@' | '#' | '$'))
}

/// Whether `name` can be written without quoting.
pub fn is_regular_identifier(name: &str) -> bool {
    has_regular_shape(name) && !is_reserved(name)
}

/// Format an identifier for generated T-SQL: bare when regular, bracketed otherwise.
pub fn display_ident(name: &str) -> Result<String> {
    validate_identifier(name)?;
    if is_regular_identifier(name) {
        Ok(name.to_string())
    } else {
        quote_mssql(name)
    }
}

/// Format a `schema.name` pair.
pub fn qualify(schema: &str, name: &str) -> Result<String> {
    Ok(format!("{}.{}", display_ident(schema)?, display_ident(name)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_list_is_sorted() {
        let mut sorted = RESERVED.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, RESERVED);
    }

    #[test]
    fn test_quote_mssql() {
        assert_eq!(quote_mssql("users").unwrap(), "[users]");
        assert_eq!(quote_mssql("table]name").unwrap(), "[table]]name]");
        assert_eq!(quote_mssql("a]]b").unwrap(), "[a]]]]b]");
    }

    #[test]
    fn test_display_ident() {
        assert_eq!(display_ident("Orders").unwrap(), "Orders");
        assert_eq!(display_ident("_tmp$1").unwrap(), "_tmp$1");
        assert_eq!(display_ident("Order").unwrap(), "[Order]");
        assert_eq!(display_ident("order").unwrap(), "[order]");
        assert_eq!(display_ident("Order Details").unwrap(), "[Order Details]");
        assert_eq!(display_ident("1st").unwrap(), "[1st]");
        assert_eq!(display_ident("weird]name").unwrap(), "[weird]]name]");
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("dbo", "Orders").unwrap(), "dbo.Orders");
        assert_eq!(qualify("sales ops", "Key").unwrap(), "[sales ops].[Key]");
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("a\0b").is_err());
        assert!(validate_identifier(&"x".repeat(128)).is_ok());
        assert!(validate_identifier(&"x".repeat(129)).is_err());
        // Length counts characters, not bytes
        assert!(validate_identifier(&"é".repeat(128)).is_ok());
    }
}
