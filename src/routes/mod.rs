pub mod admin;
pub mod display;
pub mod events;
pub mod queue;
