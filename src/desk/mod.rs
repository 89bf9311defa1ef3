pub mod actuator;
pub mod discovery;
pub mod polling;
pub mod rest;
