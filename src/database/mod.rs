mod connection;
pub mod statement;
mod transaction;

pub use connection::*;
pub use transaction::*;
