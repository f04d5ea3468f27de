pub mod expenses;
pub mod files;
pub mod users;
