//! Fixed schema contract of the BelegManager database
//!
//! The schema is owned by BelegManager itself; belegsync never creates or
//! alters tables in a real store.

/// The only database version whose schema belegsync knows
pub const SUPPORTED_DATABASE_VERSION: i64 = 22003;

/// Tables that must exist before anything is written
pub const PRESUPPOSED_TABLES: [&str; 6] = [
    "BmDoc_Asset",
    "BmDoc_Beleg",
    "BmDoc_Kategorie",
    "BmDoc_LinkTable",
    "BmDoc_Person",
    "BmDoc_Steuerfall",
];

pub(crate) const DATABASE_VERSION_QUERY: &str =
    "SELECT CAST(propertyValue AS INTEGER) FROM Property WHERE propertyKey = 'databaseVersion'";

pub(crate) const PRESUPPOSED_TABLES_QUERY: &str = r#"
SELECT name FROM sqlite_master
WHERE type = 'table'
  AND name IN ('BmDoc_Asset', 'BmDoc_Beleg', 'BmDoc_Kategorie', 'BmDoc_LinkTable', 'BmDoc_Person', 'BmDoc_Steuerfall')
ORDER BY name
"#;
