//! Modbus-TCP plant client on the tokio-modbus synchronous API.
//!
//! Every request goes through [`ModbusPlant::exchange`], which classifies
//! the nested `tokio_modbus::Result` into ok, exception or transport.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use softplc_traits::{BoxError, PlantInputs, PlantLink};
use tokio_modbus::client::sync::{self, Reader, Writer};
use tokio_modbus::Slave;

use crate::error::{PlantError, Result};

/// Register layout of the plant simulator. Addresses are protocol (0-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlantMap {
    pub unit: u8,
    /// First of four input registers: level, outflow, setpoint echo, timescale.
    pub inputs: u16,
    pub in_valve: u16,
    pub out_valve: u16,
    /// Coil: 1 = running.
    pub run: u16,
    /// Coil: 1 = paused.
    pub pause: u16,
}

impl Default for PlantMap {
    fn default() -> Self {
        Self {
            unit: 1,
            inputs: 0,
            in_valve: 0,
            out_valve: 1,
            run: 0,
            pause: 1,
        }
    }
}

/// Result of one classified exchange.
pub type Exchange<T> = Result<T>;

/// Resolve `host:port`, preferring IPv4.
pub fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| {
            PlantError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no address for {host}:{port}"),
            ))
        })
}

pub struct ModbusPlant {
    ctx: sync::Context,
    map: PlantMap,
    addr: SocketAddr,
}

impl core::fmt::Debug for ModbusPlant {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ModbusPlant")
            .field("addr", &self.addr)
            .field("map", &self.map)
            .finish()
    }
}

impl ModbusPlant {
    /// Connect to the plant. Failure here is fatal to the caller.
    pub fn connect(addr: SocketAddr, map: PlantMap, timeout: Duration) -> Result<Self> {
        let ctx = sync::tcp::connect_slave_with_timeout(addr, Slave(map.unit), Some(timeout))
            .map_err(|source| PlantError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        tracing::info!(%addr, unit = map.unit, "plant connected");
        Ok(Self { ctx, map, addr })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn map(&self) -> PlantMap {
        self.map
    }

    /// Run one request and classify its outcome.
    pub fn exchange<T>(
        &mut self,
        function: &'static str,
        f: impl FnOnce(&mut sync::Context) -> tokio_modbus::Result<T>,
    ) -> Exchange<T> {
        match f(&mut self.ctx) {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(code)) => {
                tracing::debug!(function, code = ?code, "plant exception response");
                Err(PlantError::Exception {
                    function,
                    code: format!("{code:?}"),
                })
            }
            Err(e) => {
                tracing::debug!(function, error = %e, "plant transport error");
                Err(PlantError::Transport {
                    function,
                    message: e.to_string(),
                })
            }
        }
    }
}

impl PlantLink for ModbusPlant {
    fn read_inputs(&mut self) -> std::result::Result<PlantInputs, BoxError> {
        let start = self.map.inputs;
        let regs = self.exchange("read input registers", |c| c.read_input_registers(start, 4))?;
        match regs[..] {
            [level, outflow, setpoint, timescale, ..] => Ok(PlantInputs {
                level,
                outflow,
                setpoint,
                timescale,
            }),
            _ => Err(Box::new(PlantError::Transport {
                function: "read input registers",
                message: format!("short response: {} registers", regs.len()),
            })),
        }
    }

    fn write_in_valve(&mut self, raw: u16) -> std::result::Result<(), BoxError> {
        let addr = self.map.in_valve;
        self.exchange("write in-valve", |c| c.write_single_register(addr, raw))?;
        Ok(())
    }

    fn write_out_valve(&mut self, raw: u16) -> std::result::Result<(), BoxError> {
        let addr = self.map.out_valve;
        self.exchange("write out-valve", |c| c.write_single_register(addr, raw))?;
        Ok(())
    }

    fn set_running(&mut self, running: bool) -> std::result::Result<(), BoxError> {
        let addr = self.map.run;
        self.exchange("write run coil", |c| c.write_single_coil(addr, running))?;
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) -> std::result::Result<(), BoxError> {
        let addr = self.map.pause;
        self.exchange("write pause coil", |c| c.write_single_coil(addr, paused))?;
        Ok(())
    }
}
