//! Recognizes the `PRAGMA delete_database` statement the gateway
//! special-cases (spec §4.7): it never reaches the SQL engine, since no
//! such pragma exists in stock SQLite — it is this gateway's own
//! extension for safely retiring a replicated database file.

/// True if `sql`, once trimmed and case-folded, is exactly `PRAGMA
/// delete_database` (with or without a trailing semicolon).
#[must_use]
pub fn is_delete_database_pragma(sql: &str) -> bool {
    let trimmed = sql.trim().trim_end_matches(';').trim();
    trimmed.eq_ignore_ascii_case("pragma delete_database")
}
