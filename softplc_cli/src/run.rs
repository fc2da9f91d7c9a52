//! Process orchestration: plant connection, shared context, the bridge and
//! control threads and the register server.

use std::net::SocketAddr;
use std::path::Path;
use std::thread;
use std::time::Duration;

use eyre::{Result, WrapErr};
use softplc_config::Config;
use softplc_core::conversions::tunings_from;
use softplc_core::{
    BridgeCfg, CommandTranslator, ControlCfg, ControlLoop, CsvSnapshotLog, PlcContext,
    RegisterBanks, RegisterMap, RegisterStore, RunSummary, Scaling, StabilityCfg,
};
use softplc_plant::{ModbusPlant, PlantMap, SimulatedPlant, TankModel};
use softplc_traits::{PlantLink, Tunings};

use crate::cli::Cli;
use crate::server;

/// Effective settings after CLI overrides.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub plant_host: String,
    pub plant_port: u16,
    pub server_host: String,
    pub server_port: u16,
    pub tunings: Tunings,
    pub sim: bool,
    pub batch: bool,
}

impl RunPlan {
    pub fn new(cli: &Cli, cfg: &Config) -> Self {
        Self {
            plant_host: cli.plant_addr.clone().unwrap_or_else(|| cfg.plant.address.clone()),
            plant_port: cli.plant_port.unwrap_or(cfg.plant.port),
            server_host: cli.server_addr.clone().unwrap_or_else(|| cfg.server.bind.clone()),
            server_port: cli.server_port.unwrap_or(cfg.server.port),
            tunings: cli.tunings.unwrap_or_else(|| tunings_from(&cfg.pid)),
            sim: cli.sim,
            batch: cli.batch || cfg.stability.enabled,
        }
    }
}

fn connect_plant(plan: &RunPlan, cfg: &Config, control: &ControlCfg) -> Result<Box<dyn PlantLink + Send>> {
    if plan.sim {
        tracing::info!("using simulated plant");
        let model = TankModel {
            step: control.period,
            ..TankModel::default()
        };
        return Ok(Box::new(SimulatedPlant::new(model)));
    }
    let addr = softplc_plant::resolve(&plan.plant_host, plan.plant_port).map_err(eyre::Report::new)?;
    let map = PlantMap {
        unit: cfg.plant.unit_id,
        ..PlantMap::default()
    };
    let plant = ModbusPlant::connect(addr, map, Duration::from_millis(cfg.plant.timeout_ms))
        .map_err(eyre::Report::new)?;
    Ok(Box::new(plant))
}

fn server_addr(plan: &RunPlan) -> Result<SocketAddr> {
    let host = if plan.server_host.eq_ignore_ascii_case("localhost") {
        "127.0.0.1"
    } else {
        plan.server_host.as_str()
    };
    format!("{host}:{}", plan.server_port)
        .parse()
        .wrap_err_with(|| format!("invalid server address {host}:{}", plan.server_port))
}

/// Run until shutdown (ctrl-c) or, in batch mode, a stability timeout.
pub fn run(cli: &Cli, cfg: &Config) -> Result<RunSummary> {
    let plan = RunPlan::new(cli, cfg);
    let control = ControlCfg::from(&cfg.control);
    let mut stability = StabilityCfg::from(&cfg.stability);
    stability.enabled = plan.batch;
    let bridge_cfg = BridgeCfg::from(&cfg.bridge);

    // Fatal before anything else starts.
    let plant = connect_plant(&plan, cfg, &control)?;

    let store = RegisterStore::new(
        RegisterBanks::new(cfg.server.bank_size),
        RegisterMap::standard(),
        Scaling::from(&cfg.scaling),
        cfg.queues.capacity,
    );
    let ctx = PlcContext::new(store, cfg.queues.capacity);
    ctx.seed_registers(&control, plan.tunings)
        .map_err(eyre::Report::new)
        .wrap_err("seed register surface")?;

    let log = match cfg.logging.csv_file.as_deref() {
        Some(file) if cfg.logging.continue_run => CsvSnapshotLog::open(Path::new(file), true)?,
        _ => CsvSnapshotLog::create_in(Path::new(&cfg.logging.csv_dir), plan.tunings)?,
    };

    let mut control_loop = ControlLoop::builder()
        .with_plant(plant)
        .with_context(ctx.clone())
        .with_tunings(plan.tunings)
        .with_control(control)
        .with_stability(stability)
        .with_sink(log)
        .build()?;

    let flag = ctx.shutdown_flag();
    ctrlc::set_handler(move || {
        flag.store(true, std::sync::atomic::Ordering::SeqCst);
    })
    .wrap_err("install ctrl-c handler")?;

    let (_bound, server) = server::spawn(server_addr(&plan)?, ctx.store.clone(), ctx.shutdown_flag())?;

    let mut bridge = CommandTranslator::new(ctx.clone(), bridge_cfg);
    let bridge = thread::Builder::new()
        .name("bridge".into())
        .spawn(move || bridge.run())
        .wrap_err("spawn bridge thread")?;

    let control = thread::Builder::new()
        .name("control".into())
        .spawn(move || {
            control_loop.begin();
            control_loop.run()
        })
        .wrap_err("spawn control thread")?;

    let outcome = control
        .join()
        .map_err(|_| eyre::eyre!("control thread panicked"));
    ctx.request_shutdown();

    if bridge.join().is_err() {
        tracing::error!("bridge thread panicked");
    }
    match server.join() {
        Ok(Err(e)) => tracing::warn!(error = %e, "register server ended with error"),
        Err(_) => tracing::error!("server thread panicked"),
        Ok(Ok(())) => {}
    }
    ctx.log_drop_counters();

    outcome?
}
