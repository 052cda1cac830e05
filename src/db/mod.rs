mod factory;
mod mongodb;
pub(crate) mod sqlite;
mod types;

pub use factory::connect;
pub use types::Database;
