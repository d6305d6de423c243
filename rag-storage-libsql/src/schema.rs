//! Database schema definitions for the libSQL fragment store

/// SQL to create the fragments table.
///
/// The two single-purpose embedding columns are intentionally absent here:
/// they arrived by migration and are added by `init_schema` when missing,
/// so legacy databases keep their rows untouched.
pub const CREATE_FRAGMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS fragments (
    id TEXT PRIMARY KEY NOT NULL,
    collection TEXT NOT NULL,
    category TEXT NOT NULL,
    content TEXT NOT NULL,
    content_length INTEGER NOT NULL,
    combined_embedding BLOB,
    embedding_dimension INTEGER,
    source_file TEXT,
    chunk_index INTEGER,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
)
"#;

/// Columns added after the single-embedding era; checked and added one by
/// one on init.
pub const MIGRATED_EMBEDDING_COLUMNS: &[(&str, &str)] = &[
    ("category_embedding", "ALTER TABLE fragments ADD COLUMN category_embedding BLOB"),
    ("content_embedding", "ALTER TABLE fragments ADD COLUMN content_embedding BLOB"),
];

/// Index on collection for scoped loads
pub const CREATE_COLLECTION_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_fragments_collection
ON fragments(collection)
"#;

/// Index on category for domain filtering
pub const CREATE_CATEGORY_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_fragments_category
ON fragments(category)
"#;

/// Index on content_length for statistics queries
pub const CREATE_CONTENT_LENGTH_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_fragments_content_length
ON fragments(content_length)
"#;

/// Index on created_at for chronological ordering
pub const CREATE_CREATED_AT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_fragments_created_at
ON fragments(created_at DESC)
"#;

/// Provenance uniqueness: within a collection, one row per (source_file,
/// chunk_index) when both are present.
pub const CREATE_PROVENANCE_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_fragments_provenance
ON fragments(collection, source_file, chunk_index)
WHERE source_file IS NOT NULL AND chunk_index IS NOT NULL
"#;
