//! Translation of `sqlx` failures into core error kinds.

use assetdesk_core::error::CoreError;

/// Map a `sqlx::Error` onto the core's error kinds.
///
/// - Unique violations (`23505`) and serialization/deadlock aborts
///   (`40001`, `40P01`) map to `Conflict`.
/// - Foreign key (`23503`) and check (`23514`) violations map to `Validation`.
/// - An exhausted pool maps to `Timeout`.
/// - Everything else is logged and becomes `Internal`.
pub fn map_sqlx_error(err: sqlx::Error) -> CoreError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let constraint = db_err.constraint().unwrap_or("unknown");
            match db_err.code().as_deref() {
                Some("23505") => {
                    return CoreError::Conflict(format!(
                        "Duplicate value violates unique constraint: {constraint}"
                    ))
                }
                Some("23503") => {
                    return CoreError::Validation(format!(
                        "Reference violates foreign key constraint: {constraint}"
                    ))
                }
                Some("23514") => {
                    return CoreError::Validation(format!(
                        "Value violates check constraint: {constraint}"
                    ))
                }
                Some("40001") | Some("40P01") => {
                    return CoreError::Conflict(
                        "Transaction aborted by a concurrent update".to_string(),
                    )
                }
                _ => {}
            }
            tracing::error!(error = %db_err, "Database error");
            CoreError::Internal("An internal database error occurred".to_string())
        }
        sqlx::Error::PoolTimedOut => {
            tracing::warn!("Timed out waiting for a database connection");
            CoreError::Timeout("Timed out waiting for a database connection".to_string())
        }
        other => {
            tracing::error!(error = %other, "Database error");
            CoreError::Internal("An internal database error occurred".to_string())
        }
    }
}
