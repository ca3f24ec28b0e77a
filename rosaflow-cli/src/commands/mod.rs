pub mod catalog;
pub mod cluster;
