pub mod budget;
pub mod expenses;
pub mod users;
