//! Helpers for batched SQLite statements.

/// Maximum number of bind parameters placed in a single `IN (...)` clause.
///
/// SQLite caps bound parameters per statement (999 on older builds), so large
/// id lists are split with `chunk_for_sqlite` first.
pub const SQLITE_MAX_PARAMS_CHUNK: usize = 500;

/// Splits a slice into chunks of at most `SQLITE_MAX_PARAMS_CHUNK` items.
pub fn chunk_for_sqlite<T>(items: &[T]) -> impl Iterator<Item = &[T]> {
    items.chunks(SQLITE_MAX_PARAMS_CHUNK)
}
