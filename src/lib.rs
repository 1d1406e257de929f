//! FabricForge: deterministic address and identifier allocation for
//! EVPN/VXLAN spine-leaf fabrics, config rendering, and fabric health checks.

pub mod allocator;
pub mod config;
pub mod health;
pub mod models;
pub mod render;
pub mod report;
pub mod utils;
