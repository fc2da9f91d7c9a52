//! Modbus-TCP front end over the register store.
//!
//! Every request is forwarded to [`RegisterStore`] with external origin, so
//! writes to mapped addresses become commands through the bridge task.

use std::future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use eyre::WrapErr;
use softplc_core::{Bank, Origin, PlcError, RegisterStore};
use tokio::net::TcpListener;
use tokio_modbus::prelude::*;
use tokio_modbus::server::tcp::{Server, accept_tcp_connection};

const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

#[derive(Clone)]
pub struct RegisterService {
    store: Arc<RegisterStore>,
}

impl RegisterService {
    pub fn new(store: Arc<RegisterStore>) -> Self {
        Self { store }
    }

    fn read(&self, bank: Bank, addr: u16, cnt: u16) -> Result<Vec<u16>, ExceptionCode> {
        self.store
            .try_read(bank, addr, usize::from(cnt))
            .map_err(|e| exception_for(&e))
    }

    fn read_bits(&self, bank: Bank, addr: u16, cnt: u16) -> Result<Vec<bool>, ExceptionCode> {
        Ok(self.read(bank, addr, cnt)?.into_iter().map(|v| v != 0).collect())
    }

    fn write(&self, bank: Bank, addr: u16, values: &[u16]) -> Result<(), ExceptionCode> {
        self.store
            .write(bank, addr, values, Origin::External)
            .map_err(|e| exception_for(&e))
    }

    fn handle(&self, req: Request<'static>) -> Result<Response, ExceptionCode> {
        match req {
            Request::ReadCoils(addr, cnt) => self.read_bits(Bank::Coil, addr, cnt).map(Response::ReadCoils),
            Request::ReadDiscreteInputs(addr, cnt) => self
                .read_bits(Bank::DiscreteInput, addr, cnt)
                .map(Response::ReadDiscreteInputs),
            Request::ReadHoldingRegisters(addr, cnt) => self
                .read(Bank::Holding, addr, cnt)
                .map(Response::ReadHoldingRegisters),
            Request::ReadInputRegisters(addr, cnt) => self
                .read(Bank::Input, addr, cnt)
                .map(Response::ReadInputRegisters),
            Request::WriteSingleCoil(addr, on) => self
                .write(Bank::Coil, addr, &[u16::from(on)])
                .map(|()| Response::WriteSingleCoil(addr, on)),
            Request::WriteSingleRegister(addr, value) => self
                .write(Bank::Holding, addr, &[value])
                .map(|()| Response::WriteSingleRegister(addr, value)),
            Request::WriteMultipleCoils(addr, coils) => {
                let values: Vec<u16> = coils.iter().map(|&c| u16::from(c)).collect();
                self.write(Bank::Coil, addr, &values)
                    .map(|()| Response::WriteMultipleCoils(addr, values.len() as u16))
            }
            Request::WriteMultipleRegisters(addr, words) => self
                .write(Bank::Holding, addr, &words)
                .map(|()| Response::WriteMultipleRegisters(addr, words.len() as u16)),
            other => {
                tracing::warn!(request = ?other, "unsupported function code");
                Err(ExceptionCode::IllegalFunction)
            }
        }
    }
}

impl tokio_modbus::server::Service for RegisterService {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        future::ready(self.handle(req))
    }
}

fn exception_for(e: &PlcError) -> ExceptionCode {
    match e {
        PlcError::OutOfRange { .. } => ExceptionCode::IllegalDataAddress,
        PlcError::MultiWrite { .. } => ExceptionCode::IllegalDataValue,
        _ => ExceptionCode::ServerDeviceFailure,
    }
}

/// Bind `addr` and serve on a dedicated runtime thread until `shutdown` is
/// raised. Binding happens before returning so a busy port fails fast.
pub fn spawn(
    addr: SocketAddr,
    store: Arc<RegisterStore>,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<(SocketAddr, JoinHandle<eyre::Result<()>>)> {
    let std_listener = std::net::TcpListener::bind(addr)
        .wrap_err_with(|| format!("bind register server on {addr}"))?;
    std_listener.set_nonblocking(true)?;
    let local = std_listener.local_addr()?;
    tracing::info!(addr = %local, "register server listening");

    let handle = thread::Builder::new()
        .name("modbus-server".into())
        .spawn(move || -> eyre::Result<()> {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .wrap_err("build server runtime")?;
            rt.block_on(serve(std_listener, RegisterService::new(store), shutdown))
        })
        .wrap_err("spawn server thread")?;
    Ok((local, handle))
}

async fn serve(
    std_listener: std::net::TcpListener,
    service: RegisterService,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<()> {
    let listener = TcpListener::from_std(std_listener)?;
    let server = Server::new(listener);
    let new_service = move |_addr| Ok(Some(service.clone()));
    let on_connected = move |stream, addr| {
        let new_service = new_service.clone();
        async move { accept_tcp_connection(stream, addr, new_service) }
    };
    let on_process_error = |err| tracing::warn!(error = %err, "register server connection error");

    tokio::select! {
        res = server.serve(&on_connected, on_process_error) => {
            res.wrap_err("register server stopped")?;
        }
        () = wait_for(shutdown) => {
            tracing::info!("register server shutting down");
        }
    }
    Ok(())
}

async fn wait_for(flag: Arc<AtomicBool>) {
    while !flag.load(Ordering::SeqCst) {
        tokio::time::sleep(SHUTDOWN_POLL).await;
    }
}
