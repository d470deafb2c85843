pub mod coordinator;
pub mod machine;
pub mod projection;
pub mod store;
