//! Handheld OSD daemon.
//!
//! Shows a system overview, a compact header bar and low-battery / CPU
//! temperature icons on top of whatever runs on the display. The OSDs are
//! requested with a gamepad key sequence, GPIO lines, `SIGUSR1`/`SIGUSR2`
//! or a signal file. `SIGINT`/`SIGTERM` exit cleanly.
//!
//! Usage: `osd [config.toml]`, or set `OSD_CONFIG`. Log verbosity follows
//! `RUST_LOG`.

mod pidfile;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::sync_channel;

use anyhow::{Context, Result};

use osd_backend_fb::FbdevSink;
use osd_core::{FrameSink, HeadlessSink, Scheduler, SoftwareCompositor, Triggers};
use osd_platform::SysfsSensors;
use osd_trigger::{GpioTriggers, SignalFile, evdev, signals};
use osd_types::config::{BackendKind, OsdConfig};

use pidfile::PidFile;

/// Display size of the headless backend.
const HEADLESS_SIZE: (u32, u32) = (640, 480);
/// Pending key sequence events before the detector drops new ones.
const EVENT_QUEUE: usize = 8;

fn load_config() -> OsdConfig {
    let Some(path) = std::env::args().nth(1).or_else(|| std::env::var("OSD_CONFIG").ok()) else {
        log::info!("no config file given, using defaults");
        return OsdConfig::default();
    };
    match OsdConfig::load(Path::new(&path)) {
        Ok(config) => {
            log::info!("loaded config {path}");
            config
        }
        Err(e) => {
            log::warn!("config {path}: {e}, using defaults");
            OsdConfig::default()
        }
    }
}

fn run<F: FrameSink>(config: &OsdConfig, sink: F, triggers: Triggers, stop: &AtomicBool) -> Result<()> {
    let compositor = SoftwareCompositor::new(sink).context("creating compositor")?;
    let sensors = SysfsSensors::new(config);
    let mut scheduler = Scheduler::new(config, compositor, sensors, triggers)?;
    scheduler.run(stop);
    scheduler.teardown().context("removing overlays")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config();
    log::info!("starting osd daemon, backend {:?}", config.display.backend);

    let pid_file = config
        .pid_file
        .clone()
        .or_else(PidFile::default_path)
        .map(PidFile::create);

    let signals = match signals::install() {
        Ok(()) => true,
        Err(e) => {
            log::warn!("signal handling disabled: {e}");
            false
        }
    };

    let stop = Arc::new(AtomicBool::new(false));
    let (events_tx, events_rx) = sync_channel(EVENT_QUEUE);
    let detector = evdev::spawn(
        &config.evdev,
        config.detect_interval(),
        config.tick_interval(),
        Arc::clone(&stop),
        events_tx,
    )
    .unwrap_or_else(|e| {
        log::warn!("key sequence detection disabled: {e}");
        None
    });

    let triggers = Triggers {
        events: Some(events_rx),
        gpio: GpioTriggers::from_config(&config.gpio),
        signal_file: config.signal_file.clone().map(SignalFile::new),
        signals,
    };

    let result = match config.display.backend {
        BackendKind::Fbdev => FbdevSink::open(config.display.number)
            .context("opening framebuffer")
            .and_then(|sink| run(&config, sink, triggers, &stop)),
        BackendKind::Headless => {
            let (w, h) = HEADLESS_SIZE;
            let sink = match &config.debug.export_dir {
                Some(dir) => HeadlessSink::new(w, h).with_export_dir(dir.clone()),
                None => HeadlessSink::new(w, h),
            };
            run(&config, sink, triggers, &stop)
        }
    };

    stop.store(true, Ordering::Relaxed);
    if detector.is_some_and(|handle| handle.join().is_err()) {
        log::warn!("key detector thread panicked");
    }
    if let Some(pid_file) = pid_file {
        pid_file.remove();
    }

    match &result {
        Ok(()) => log::info!("osd daemon stopped"),
        Err(e) => log::error!("osd daemon failed: {e:#}"),
    }
    result
}
