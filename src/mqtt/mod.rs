pub mod accessory;
pub mod events;
pub mod mqtt_desk;
pub mod topic;
