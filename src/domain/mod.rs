pub mod messages;
pub mod order;
pub mod types;
pub mod worker;
