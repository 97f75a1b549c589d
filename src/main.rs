//! Demodulator engine - headless runner
//!
//! Drives the engine against the simulated front end: cycles through every
//! mode, prints a JSON status line per mode and reports how much output each
//! collector produced.
//!
//! Usage: `demod-engine [CONFIG.toml] [MILLIS_PER_MODE]`

use anyhow::Context;
use demod_engine::{
    backend::{CarrierModulation, SimulatedCarrier, SimulatedFrontEnd},
    config::EngineConfig,
    demod::{Mode, OutputFamily},
    DemodEngine,
};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => EngineConfig::load(&path).with_context(|| format!("loading {}", path))?,
        None => EngineConfig::load_or_default(),
    };
    let dwell = match args.next() {
        Some(ms) => Duration::from_millis(ms.parse().context("MILLIS_PER_MODE must be a number")?),
        None => Duration::from_millis(250),
    };

    // File logging is kept alive by this guard until main returns
    let (file_layer, _guard) = match &config.logging.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "demod-engine.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    tracing::info!("Starting demodulator engine (simulated front end)");

    let center = config.front_end.frequency as f64;
    let front_end = SimulatedFrontEnd::new()
        .with_carrier(
            SimulatedCarrier::tone(center, 0.3).with_modulation(CarrierModulation::Fm {
                deviation: 2_500.0,
                tone: 1_000.0,
            }),
        )
        .with_carrier(
            SimulatedCarrier::tone(center + 100_000.0, 0.2)
                .with_modulation(CarrierModulation::Bpsk { symbol_rate: 4_000.0 }),
        )
        .with_noise(0.01);

    let engine = DemodEngine::new(config, Box::new(front_end)).context("building engine")?;
    engine.enable_gui_fft(true);
    engine.enable_gui_const(true);
    engine.start()?;

    for mode in Mode::ALL {
        engine.set_mode(mode)?;
        std::thread::sleep(dwell);

        let produced = match mode.family() {
            OutputFamily::Frames => engine.get_frame1().map_or(0, |f| f.len()),
            OutputFamily::Raw => engine.get_data().len(),
            OutputFamily::Audio => engine.get_audio().len(),
        };
        let status = serde_json::to_string(&engine.status())?;
        println!("{status}");
        tracing::info!("{}: {} items collected", mode, produced);

        if let Some(fault) = engine.fault() {
            anyhow::bail!("pipeline stopped: {}", fault);
        }
    }

    if let Some((freq, db)) = engine.spectrum().and_then(|s| s.peak()) {
        tracing::info!("Spectrum peak at {:.0} Hz ({:.1} dB)", freq, db);
    }

    engine.stop()?;
    tracing::info!("Shutting down...");
    Ok(())
}
