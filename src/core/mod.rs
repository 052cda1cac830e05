pub mod future;
pub mod mongo_cursor;
pub mod text;
pub mod time;
pub mod values;
