//! Plant connections for the soft PLC.
//!
//! - [`ModbusPlant`]: Modbus-TCP client against the remote tank simulator.
//! - [`SimulatedPlant`]: in-process tank model for `--sim` runs and tests.
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

pub mod error;
pub mod modbus;
pub mod sim;

pub use error::PlantError;
pub use modbus::{resolve, Exchange, ModbusPlant, PlantMap};
pub use sim::{SimulatedPlant, TankModel};
