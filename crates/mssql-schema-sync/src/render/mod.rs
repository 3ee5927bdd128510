//! Object rendering.
//!
//! Turns one [`DatabaseObject`] into the canonical text stored in the
//! repository. Output is a pure function of the object: re-rendering an
//! unchanged object gives byte-identical text, whatever line endings or
//! trailing whitespace the server returned.

pub mod identifier;
mod module;
mod table;

pub use module::render_module;
pub use table::{format_mssql_type, render_table};

use crate::catalog::DatabaseObject;
use crate::error::Result;
use serde::Serialize;

/// One file of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedFile {
    /// Repository-relative path, `<Database>/<category>/<schema>.<name>.sql`.
    pub path: String,
    pub content: String,
}

/// Render a schema object into its file.
pub fn render(object: &DatabaseObject) -> Result<RenderedFile> {
    let text = match object {
        DatabaseObject::Procedure(m)
        | DatabaseObject::Function(m)
        | DatabaseObject::View(m)
        | DatabaseObject::Trigger(m) => render_module(object.kind(), m)?,
        DatabaseObject::Table(t) => render_table(t)?,
    };

    Ok(RenderedFile {
        path: object.path(),
        content: normalize_text(&text),
    })
}

/// Canonical text form.
///
/// CRLF and lone CR become LF, trailing whitespace is stripped from every
/// line, leading and trailing blank lines are dropped and the result ends
/// with exactly one newline.
pub fn normalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = unified.lines().map(str::trim_end).collect();

    let start = lines.iter().position(|l| !l.is_empty());
    let end = lines.iter().rposition(|l| !l.is_empty());
    match (start, end) {
        (Some(start), Some(end)) => {
            let mut out = lines[start..=end].join("\n");
            out.push('\n');
            out
        }
        _ => "\n".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ModuleDefinition, ObjectName};

    fn procedure(definition: &str) -> DatabaseObject {
        DatabaseObject::Procedure(ModuleDefinition {
            name: ObjectName::new("SalesDB", "dbo", "usp_Load"),
            definition: definition.to_string(),
        })
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("a\r\nb\rc"), "a\nb\nc\n");
        assert_eq!(normalize_text("\n\n  \nSELECT 1   \t\n\n\n"), "SELECT 1\n");
        assert_eq!(normalize_text("a\n\n\nb"), "a\n\n\nb\n");
        assert_eq!(normalize_text("   \r\n"), "\n");
    }

    #[test]
    fn test_render_is_idempotent() {
        let object = procedure("CREATE PROCEDURE dbo.usp_Load\nAS\nSELECT 1;\n");
        let first = render(&object).unwrap();
        let second = render(&object).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.path, "SalesDB/procedures/dbo.usp_Load.sql");
        assert_eq!(
            first.content,
            "CREATE OR ALTER PROCEDURE dbo.usp_Load\nAS\nSELECT 1;\n"
        );
    }

    #[test]
    fn test_line_endings_do_not_change_output() {
        let lf = render(&procedure("CREATE PROC p\nAS\n  SELECT 1\n")).unwrap();
        let crlf = render(&procedure("\r\nCREATE PROC p  \r\nAS\r\n  SELECT 1\r\n\r\n")).unwrap();
        assert_eq!(lf.content, crlf.content);
    }

    #[test]
    fn test_render_error_names_object() {
        let err = render(&procedure("SELECT 1")).unwrap_err();
        assert!(err.to_string().contains("SalesDB.dbo.usp_Load"));
    }
}
