use crate::StoreErr;

/// SQLSTATE `lock_not_available`: `NOWAIT` hit a held row, or `lock_timeout` expired
pub(crate) const LOCK_NOT_AVAILABLE: &str = "55P03";
/// SQLSTATE `deadlock_detected`
pub(crate) const DEADLOCK_DETECTED: &str = "40P01";
/// SQLSTATE `unique_violation`
pub(crate) const UNIQUE_VIOLATION: &str = "23505";

/// The SQLSTATE carried by a database error, if any
pub(crate) fn sqlstate(err: &sqlx::Error) -> Option<String> {
    err.as_database_error()
        .and_then(|e| e.code())
        .map(|code| code.into_owned())
}

/// Converts an [sqlx::error] execution error to a [StoreErr]
pub fn sqlx_error_to_exec_err(err: sqlx::Error) -> StoreErr {
    if sqlstate(&err).as_deref() == Some(UNIQUE_VIOLATION) {
        return StoreErr::UniqueViolation(err.to_string());
    }
    StoreErr::Exec(err.to_string())
}

/// Converts an [sqlx::error] query error to a [StoreErr]
pub fn sqlx_error_to_query_err(err: sqlx::Error) -> StoreErr {
    StoreErr::Query(err.to_string())
}

/// Converts an [sqlx::error] connection error to a [StoreErr]
pub fn sqlx_error_to_conn_err(err: sqlx::Error) -> StoreErr {
    StoreErr::Conn(err.to_string())
}

/// Converts an [sqlx::error] decoding error to a [StoreErr]
pub fn sqlx_error_to_type_err(err: sqlx::Error) -> StoreErr {
    StoreErr::Type(err.to_string())
}
