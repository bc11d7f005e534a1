pub mod catalog;
pub mod config;
pub mod model;
pub mod service;
pub mod sim;
pub mod wire;
