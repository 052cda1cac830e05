pub mod upload;
pub mod user;
