mod memory;
#[cfg(feature = "sqlx-dep")]
mod sqlx_common;
#[cfg(feature = "sqlx-postgres")]
mod sqlx_postgres;

pub use memory::*;
#[cfg(feature = "sqlx-dep")]
pub use sqlx_common::*;
#[cfg(feature = "sqlx-postgres")]
pub use sqlx_postgres::*;
