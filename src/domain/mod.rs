//! Domain types shared by the bridge and the billing collaborator ports.

pub mod activity;
pub mod codes;
pub mod operation;
pub mod ports;
pub mod product;
