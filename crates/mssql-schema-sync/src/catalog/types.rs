//! Catalog rows and schema object types.
//!
//! Row types mirror the result sets of the catalog queries one to one. The
//! mapping step in [`super::mapping`] turns them into [`DatabaseObject`]s.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One row of the module query (`sys.objects` joined with `sys.sql_modules`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRow {
    pub schema: String,
    pub name: String,
    /// SQL Server object type code (`P`, `FN`, `IF`, `TF`, `V`, `TR`).
    pub type_code: String,
    /// Module definition; `None` for encrypted modules.
    pub definition: Option<String>,
}

/// One row of the table query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub object_id: i32,
    pub schema: String,
    pub name: String,
}

/// One row of the column query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRow {
    pub object_id: i32,
    /// Catalog ordinal (`sys.columns.column_id`).
    pub column_id: i32,
    pub name: String,
    pub data_type: String,
    /// Maximum length in bytes (-1 for max).
    pub max_length: i32,
    pub precision: i32,
    pub scale: i32,
    pub is_nullable: bool,
    pub is_identity: bool,
    pub identity_seed: Option<String>,
    pub identity_increment: Option<String>,
}

/// One row of the index column query: one key or included column of one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumnRow {
    pub object_id: i32,
    pub index_name: String,
    pub is_primary_key: bool,
    pub is_unique: bool,
    pub is_clustered: bool,
    pub filter_definition: Option<String>,
    pub column_name: String,
    /// Position within the key (0 for included columns).
    pub key_ordinal: i32,
    pub index_column_id: i32,
    pub is_descending: bool,
    pub is_included: bool,
}

/// All table-related result sets of one database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableRows {
    pub tables: Vec<TableRow>,
    pub columns: Vec<ColumnRow>,
    pub index_columns: Vec<IndexColumnRow>,
}

/// Kind of schema object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Procedure,
    Function,
    View,
    Trigger,
    Table,
}

impl ObjectKind {
    /// Map a SQL Server object type code to a kind.
    pub fn from_type_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "P" => Some(Self::Procedure),
            "FN" | "IF" | "TF" => Some(Self::Function),
            "V" => Some(Self::View),
            "TR" => Some(Self::Trigger),
            "U" => Some(Self::Table),
            _ => None,
        }
    }

    /// Folder under the database directory holding files of this kind.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Procedure => "procedures",
            Self::Table => "tables",
            Self::View => "views",
            Self::Function | Self::Trigger => "others",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Procedure => "procedure",
            Self::Function => "function",
            Self::View => "view",
            Self::Trigger => "trigger",
            Self::Table => "table",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully qualified object name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectName {
    pub database: String,
    pub schema: String,
    pub name: String,
}

impl ObjectName {
    pub fn new(
        database: impl Into<String>,
        schema: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.database, self.schema, self.name)
    }
}

/// Stored definition of a procedure, function, view or trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    pub name: ObjectName,
    pub definition: String,
}

/// Identity specification of a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub seed: String,
    pub increment: String,
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,

    /// Data type (e.g., "int", "varchar", "datetime2").
    pub data_type: String,

    /// Maximum length in bytes for string/binary types (-1 for max).
    pub max_length: i32,

    pub precision: i32,

    pub scale: i32,

    pub is_nullable: bool,

    pub identity: Option<Identity>,

    /// Ordinal position (catalog column id).
    pub ordinal: i32,
}

/// One key column of an index or primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyColumn {
    pub name: String,
    pub ordinal: i32,
    pub descending: bool,
}

/// Primary key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKey {
    pub name: String,
    pub columns: Vec<KeyColumn>,
    pub is_clustered: bool,
}

/// Index metadata (primary keys excluded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,

    /// Key columns.
    pub columns: Vec<KeyColumn>,

    /// Included (non-key) columns; `ordinal` holds the index column id.
    pub include_cols: Vec<KeyColumn>,

    pub is_unique: bool,

    pub is_clustered: bool,

    /// Filter predicate of a filtered index.
    pub filter: Option<String>,
}

/// Table definition with columns, primary key and indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: ObjectName,
    pub columns: Vec<Column>,
    pub primary_key: Option<PrimaryKey>,
    pub indexes: Vec<Index>,
}

/// One schema object, keyed by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatabaseObject {
    Procedure(ModuleDefinition),
    Function(ModuleDefinition),
    View(ModuleDefinition),
    Trigger(ModuleDefinition),
    Table(TableDefinition),
}

impl DatabaseObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Procedure(_) => ObjectKind::Procedure,
            Self::Function(_) => ObjectKind::Function,
            Self::View(_) => ObjectKind::View,
            Self::Trigger(_) => ObjectKind::Trigger,
            Self::Table(_) => ObjectKind::Table,
        }
    }

    pub fn name(&self) -> &ObjectName {
        match self {
            Self::Procedure(m) | Self::Function(m) | Self::View(m) | Self::Trigger(m) => &m.name,
            Self::Table(t) => &t.name,
        }
    }

    /// Repository path of the file holding this object.
    pub fn path(&self) -> String {
        object_path(self.kind(), self.name())
    }
}

/// `<Database>/<category>/<schema>.<name>.sql`
pub fn object_path(kind: ObjectKind, name: &ObjectName) -> String {
    format!(
        "{}/{}/{}.{}.sql",
        name.database,
        kind.category(),
        name.schema,
        name.name
    )
}
