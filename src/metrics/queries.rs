//! SQL text for PostgreSQL catalog and statistics views.
//!
//! Every query returns `text` columns so the connection layer can hand rows
//! back as a plain string matrix. `$1` is the table name; `{field}` is a
//! statistics-view column taken from the fixed template table, never from the
//! request.

/// Placeholder for the statistics-view column in field templates.
pub(super) const FIELD_PLACEHOLDER: &str = "{field}";

/// Placeholder for the bound table name.
pub(super) const OBJECT_PLACEHOLDER: &str = "$1";

// ── pg_stat_all_tables / pg_statio_all_tables ────────────────────────────────

pub(super) const STAT_FIELD: &str =
    "SELECT {field}::text FROM pg_stat_all_tables WHERE relname = $1";

pub(super) const STAT_FIELD_SUM: &str = "SELECT SUM({field})::text FROM pg_stat_all_tables";

pub(super) const STATIO_FIELD: &str =
    "SELECT {field}::text FROM pg_statio_all_tables WHERE relname = $1";

pub(super) const STATIO_FIELD_SUM: &str = "SELECT SUM({field})::text FROM pg_statio_all_tables";

/// Counter columns of `pg_stat_all_tables`. Columns newer than the server
/// fail at query time like any other SQL error.
pub(super) const STAT_COUNTER_FIELDS: &[&str] = &[
    "seq_scan",
    "seq_tup_read",
    "idx_scan",
    "idx_tup_fetch",
    "n_tup_ins",
    "n_tup_upd",
    "n_tup_del",
    "n_tup_hot_upd",
    "n_live_tup",
    "n_dead_tup",
    "n_tup_newpage_upd",
    "n_mod_since_analyze",
    "n_ins_since_vacuum",
    "vacuum_count",
    "autovacuum_count",
    "analyze_count",
    "autoanalyze_count",
];

/// Timestamp columns of `pg_stat_all_tables`. No database-wide form.
pub(super) const STAT_TIMESTAMP_FIELDS: &[&str] = &[
    "last_seq_scan",
    "last_idx_scan",
    "last_vacuum",
    "last_autovacuum",
    "last_analyze",
    "last_autoanalyze",
];

/// Columns of `pg_statio_all_tables`.
pub(super) const STATIO_FIELDS: &[&str] = &[
    "heap_blks_read",
    "heap_blks_hit",
    "idx_blks_read",
    "idx_blks_hit",
    "toast_blks_read",
    "toast_blks_hit",
    "tidx_blks_read",
    "tidx_blks_hit",
];

// ── pg_class ─────────────────────────────────────────────────────────────────

pub(super) const TABLE_SIZE: &str =
    "SELECT (relpages * 8192::bigint)::text FROM pg_class WHERE relkind = 'r' AND relname = $1";

pub(super) const TABLE_SIZE_SUM: &str =
    "SELECT (SUM(relpages) * 8192)::text FROM pg_class WHERE relkind = 'r'";

pub(super) const TABLE_ROWS: &str =
    "SELECT reltuples::text FROM pg_class WHERE relkind = 'r' AND relname = $1";

pub(super) const TABLE_ROWS_SUM: &str =
    "SELECT SUM(reltuples)::text FROM pg_class WHERE relkind = 'r'";

// ── pg_inherits ──────────────────────────────────────────────────────────────

pub(super) const CHILD_COUNT: &str =
    "SELECT COUNT(i.inhrelid)::text FROM pg_inherits i WHERE i.inhparent = $1::text::regclass";

pub(super) const CHILDREN_SIZE: &str = "SELECT (SUM(c.relpages) * 8192)::text \
     FROM pg_inherits i JOIN pg_class c ON i.inhrelid = c.oid \
     WHERE i.inhparent = $1::text::regclass";

pub(super) const CHILDREN_TUPLES: &str = "SELECT SUM(c.reltuples)::text \
     FROM pg_inherits i JOIN pg_class c ON i.inhrelid = c.oid \
     WHERE i.inhparent = $1::text::regclass";

// ── discovery ────────────────────────────────────────────────────────────────

pub(super) const DISCOVER_TABLES: &str = r#"
    SELECT
        c.oid::text,
        current_database()::text,
        n.nspname::text,
        CASE c.reltablespace
            WHEN 0 THEN (
                SELECT ds.spcname FROM pg_tablespace ds
                JOIN pg_database d ON d.dattablespace = ds.oid
                WHERE d.datname = current_database()
            )
            ELSE (SELECT spcname FROM pg_tablespace WHERE oid = c.reltablespace)
        END::text,
        c.relname::text,
        t.typname::text,
        a.rolname::text,
        CASE c.relpersistence
            WHEN 'p' THEN 'permanent'
            WHEN 'u' THEN 'unlogged'
            WHEN 't' THEN 'temporary'
            ELSE 'unknown'
        END,
        (SELECT COUNT(inhparent) FROM pg_inherits WHERE inhrelid = c.oid)::text
    FROM pg_class c
    JOIN pg_namespace n ON c.relnamespace = n.oid
    JOIN pg_type t ON c.reltype = t.oid
    JOIN pg_roles a ON c.relowner = a.oid
    WHERE c.relkind = 'r'
    ORDER BY n.nspname, c.relname
"#;

pub(super) const DISCOVER_TABLE_CHILDREN: &str = r#"
    SELECT
        c.oid::text,
        c.relname::text,
        n.nspname::text
    FROM pg_inherits i
    JOIN pg_class c ON i.inhrelid = c.oid
    JOIN pg_namespace n ON c.relnamespace = n.oid
    WHERE i.inhparent = $1::text::regclass
    ORDER BY n.nspname, c.relname
"#;
