pub mod classes;
pub mod core;
pub mod curriculum;
pub mod holidays;
pub mod schedule;
pub mod setup;
