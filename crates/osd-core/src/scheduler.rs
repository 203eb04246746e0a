//! Frame scheduler: the single-threaded main loop.
//!
//! Each tick collects triggers, refreshes the readings, advances the
//! overlays (full OSD, compact OSD, battery icon, CPU icon) and submits all
//! element changes in one update. `tick` only depends on the `Instant` it is
//! given and on the injected services.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use osd_platform::SensorService;
use osd_render::PixelBuffer;
use osd_render::image::load_png;
use osd_render::procedural;
use osd_trigger::{GpioTriggers, OverlayTarget, SignalFile, TriggerEvent, signals};
use osd_types::config::{DebugConfig, OsdConfig, TinyOsdPosition};
use osd_types::error::Result;

use crate::builders::{ContentStyle, Readings, full, icons, tiny};
use crate::compositor::{Compositor, Rect, Update};
use crate::content::Frame;
use crate::geometry::{IconLayout, full_osd_size, tiny_osd_layout};
use crate::overlay::{OverlayKind, OverlaySlot};

/// OSD GPIO lines are polled at 4 Hz.
const GPIO_INTERVAL: Duration = Duration::from_millis(250);
/// Icon conditions are refreshed at 1 Hz, and the other readings too while
/// an OSD is showing.
const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);
/// The signal file is read at most once a second.
const SIGNAL_FILE_INTERVAL: Duration = Duration::from_secs(1);

/// Trigger sources handed to the scheduler. Absent sources stay quiet.
pub struct Triggers {
    /// Key sequence events from the detector thread.
    pub events: Option<Receiver<TriggerEvent>>,
    pub gpio: GpioTriggers,
    pub signal_file: Option<SignalFile>,
    /// Drain the process signal flags each tick.
    pub signals: bool,
}

impl Triggers {
    pub fn none() -> Self {
        Self {
            events: None,
            gpio: GpioTriggers::disabled(),
            signal_file: None,
            signals: false,
        }
    }
}

/// Whether `now` reached `due`, re-arming it one `interval` later.
fn due(next: &mut Option<Instant>, now: Instant, interval: Duration) -> bool {
    if next.is_some_and(|at| now < at) {
        return false;
    }
    *next = Some(now + interval);
    true
}

fn load_icon(path: &Path, fallback: fn() -> Result<PixelBuffer>, what: &str) -> Result<PixelBuffer> {
    match load_png(path) {
        Ok(image) => Ok(image),
        Err(e) => {
            log::warn!("{what} image: {e}, using the built-in icon");
            fallback()
        }
    }
}

pub struct Scheduler<C: Compositor, S: SensorService> {
    comp: C,
    sensors: S,
    triggers: Triggers,
    style: ContentStyle,
    debug: DebugConfig,
    low_limit: i32,
    temp_crit: i32,
    tick_interval: Duration,

    full: Option<OverlaySlot>,
    full_dest: Rect,
    tiny: Option<OverlaySlot>,
    tiny_dest: Rect,
    tiny_position: TinyOsdPosition,
    battery_icon: Option<OverlaySlot>,
    cpu_icon: Option<OverlaySlot>,
    icon_layout: IconLayout,

    readings: Readings,
    low_battery: bool,
    overheat: bool,
    next_gpio: Option<Instant>,
    next_sample: Option<Instant>,
    next_signal_file: Option<Instant>,
    /// The last sample covered every sensor, not only the icon conditions.
    detailed: bool,
    torn_down: bool,
}

impl<C: Compositor, S: SensorService> Scheduler<C, S> {
    pub fn new(config: &OsdConfig, comp: C, sensors: S, triggers: Triggers) -> Result<Self> {
        let display = comp.display_info();
        let layer = config.display.layer;
        let export_dir = config.debug.export_dir.clone();

        let full = config.osd.enabled.then(|| {
            let (w, h) = full_osd_size(display, config.osd.text_padding, config.osd.max_lines);
            log::info!("osd resolution {w}x{h}");
            OverlaySlot::new(OverlayKind::Full, layer, w, h)
                .with_timeout(config.timeout())
                .with_export_dir(export_dir.clone())
        });

        let tiny_layout = tiny_osd_layout(display, config.tiny_osd.height_percent, config.tiny_osd.position);
        let tiny = config.tiny_osd.enabled.then(|| {
            log::info!("tiny osd resolution {}x{}", tiny_layout.width, tiny_layout.height);
            OverlaySlot::new(OverlayKind::Tiny, layer, tiny_layout.width, tiny_layout.height)
                .with_timeout(config.timeout())
                .with_export_dir(export_dir.clone())
        });

        let icon_config = &config.icons;
        let battery_icon = icon_config
            .battery
            .then(|| load_icon(&icon_config.low_battery_image, procedural::battery_icon, "low battery"))
            .transpose()?
            .map(|base| {
                OverlaySlot::new(OverlayKind::LowBattery, layer, 0, 0)
                    .with_base(base)
                    .with_export_dir(export_dir.clone())
            });
        let cpu_icon = icon_config
            .cpu
            .then(|| load_icon(&icon_config.cpu_temp_image, procedural::cpu_icon, "cpu temperature"))
            .transpose()?
            .map(|base| {
                OverlaySlot::new(OverlayKind::CpuTemp, layer, 0, 0)
                    .with_base(base)
                    .with_export_dir(export_dir.clone())
            });

        log::info!("display {}x{}, layer {layer}", display.width, display.height);
        Ok(Self {
            comp,
            sensors,
            triggers,
            style: ContentStyle::from_config(config),
            debug: config.debug.clone(),
            low_limit: config.battery.low_limit,
            temp_crit: config.cpu.crit,
            tick_interval: config.tick_interval(),
            full,
            full_dest: Rect::new(0, 0, display.width, display.height),
            tiny,
            tiny_dest: tiny_layout.dest,
            tiny_position: config.tiny_osd.position,
            battery_icon,
            cpu_icon,
            icon_layout: IconLayout::new(
                display,
                icon_config.position,
                icon_config.height_percent,
                icon_config.padding,
            ),
            readings: Readings::default(),
            low_battery: false,
            overheat: false,
            next_gpio: None,
            next_sample: None,
            next_signal_file: None,
            detailed: false,
            torn_down: false,
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn compositor(&self) -> &C {
        &self.comp
    }

    pub fn full(&self) -> Option<&OverlaySlot> {
        self.full.as_ref()
    }

    pub fn tiny(&self) -> Option<&OverlaySlot> {
        self.tiny.as_ref()
    }

    pub fn battery_icon(&self) -> Option<&OverlaySlot> {
        self.battery_icon.as_ref()
    }

    pub fn cpu_icon(&self) -> Option<&OverlaySlot> {
        self.cpu_icon.as_ref()
    }

    pub fn readings(&self) -> &Readings {
        &self.readings
    }

    fn osd_active(&self) -> bool {
        self.full.as_ref().is_some_and(OverlaySlot::is_active)
            || self.tiny.as_ref().is_some_and(OverlaySlot::is_active)
    }

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------

    /// Tick at the configured rate until `stop` is set or, when signals are
    /// drained, a shutdown signal arrives.
    pub fn run(&mut self, stop: &AtomicBool) {
        log::info!("running at {:.1} Hz", 1.0 / self.tick_interval.as_secs_f64());
        loop {
            if stop.load(Ordering::Relaxed) || (self.triggers.signals && signals::shutdown_requested()) {
                break;
            }
            let started = Instant::now();
            self.tick(started);
            thread::sleep(self.tick_interval.saturating_sub(started.elapsed()));
        }
        log::info!("main loop stopped");
    }

    pub fn tick(&mut self, now: Instant) {
        self.collect_triggers(now);
        self.poll_gpio(now);
        if let Some(slot) = self.full.as_mut().filter(|_| self.debug.osd_test) {
            slot.force(now);
        }
        if let Some(slot) = self.tiny.as_mut().filter(|_| self.debug.tiny_osd_test) {
            slot.force(now);
        }
        self.sample(now);
        if self.osd_active() {
            self.readings.clock = Some(self.sensors.clock());
        }

        let mut update = Update::new();
        self.advance_full(now, &mut update);
        self.advance_tiny(now, &mut update);
        self.advance_icons(&mut update);

        if update.is_empty() {
            return;
        }
        if let Err(e) = self.comp.submit(update) {
            log::warn!("update rejected: {e}");
        }
    }

    fn activate(&mut self, target: OverlayTarget, now: Instant) {
        let slot = match target {
            OverlayTarget::Full => self.full.as_mut(),
            OverlayTarget::Tiny => self.tiny.as_mut(),
        };
        match slot {
            Some(slot) => {
                slot.trigger(now);
            }
            None => log::debug!("{target} disabled, request ignored"),
        }
    }

    fn collect_triggers(&mut self, now: Instant) {
        if self.triggers.signals {
            for target in signals::take_requests() {
                log::debug!("signal requests {target}");
                self.activate(target, now);
            }
        }

        let mut targets = Vec::new();
        if let Some(events) = &self.triggers.events {
            loop {
                match events.try_recv() {
                    Ok(event) => targets.push(event.target),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        log::debug!("key detector channel closed");
                        self.triggers.events = None;
                        break;
                    }
                }
            }
        }
        for target in targets {
            self.activate(target, now);
        }

        let active = self.osd_active();
        if active || self.triggers.signal_file.is_none() {
            return;
        }
        if !due(&mut self.next_signal_file, now, SIGNAL_FILE_INTERVAL) {
            return;
        }
        if let Some(target) = self.triggers.signal_file.as_mut().and_then(|sf| sf.poll(active)) {
            self.activate(target, now);
        }
    }

    fn poll_gpio(&mut self, now: Instant) {
        if !self.triggers.gpio.has_osd_lines() || !due(&mut self.next_gpio, now, GPIO_INTERVAL) {
            return;
        }
        let full_idle = !self.full.as_ref().is_some_and(OverlaySlot::is_active);
        if full_idle && self.triggers.gpio.osd() {
            self.activate(OverlayTarget::Full, now);
        }
        let tiny_idle = !self.tiny.as_ref().is_some_and(OverlaySlot::is_active);
        if tiny_idle && self.triggers.gpio.tiny() {
            self.activate(OverlayTarget::Tiny, now);
        }
    }

    /// Without an OSD only the battery and CPU temperature are read. An OSD
    /// that just activated gets a full sample on the same tick.
    fn sample(&mut self, now: Instant) {
        let active = self.osd_active();
        let sample_due = due(&mut self.next_sample, now, SAMPLE_INTERVAL);
        if !sample_due && !(active && !self.detailed) {
            return;
        }
        if active {
            let clock = self.readings.clock.take();
            self.readings = Readings::sample(&mut self.sensors);
            self.readings.clock = clock;
        } else {
            self.readings.refresh_conditions(&mut self.sensors);
        }
        self.detailed = active;

        self.low_battery =
            self.triggers.gpio.lowbat() || self.readings.battery.is_low(self.low_limit) || self.debug.lowbat_test;
        self.overheat = self.readings.cpu_temp.is_some_and(|t| t >= self.temp_crit) || self.debug.cputemp_test;
    }

    // -----------------------------------------------------------------------
    // Overlays
    // -----------------------------------------------------------------------

    fn advance_full(&mut self, now: Instant, update: &mut Update) {
        // A forced compact OSD keeps the full one off screen.
        let tiny_live = self.tiny.as_ref().is_some_and(OverlaySlot::is_live)
            || (self.debug.tiny_osd_test && self.tiny.is_some());
        let Some(slot) = self.full.as_mut() else {
            return;
        };
        match slot.expire(now, &mut self.comp, update) {
            Ok(true) => {
                if let Some(sf) = &mut self.triggers.signal_file {
                    sf.on_timeout(OverlayTarget::Full);
                }
            }
            Ok(false) => {}
            Err(e) => log::warn!("{}: {e}", slot.kind().name()),
        }
        if !slot.is_active() || tiny_live {
            return;
        }
        let frame = full::build(&self.readings, &self.style);
        if let Err(e) = slot.present(&mut self.comp, update, self.full_dest, &frame) {
            log::warn!("{}: {e}", slot.kind().name());
        }
    }

    fn advance_tiny(&mut self, now: Instant, update: &mut Update) {
        let full_live = self.full.as_ref().is_some_and(OverlaySlot::is_live);
        let Some(slot) = self.tiny.as_mut() else {
            return;
        };
        match slot.expire(now, &mut self.comp, update) {
            Ok(true) => {
                if let Some(sf) = &mut self.triggers.signal_file {
                    sf.on_timeout(OverlayTarget::Tiny);
                }
            }
            Ok(false) => {}
            Err(e) => log::warn!("{}: {e}", slot.kind().name()),
        }
        if !slot.is_active() || (full_live && !self.debug.tiny_osd_test) {
            return;
        }
        let (width, _) = slot.size();
        let frame = tiny::build(&self.readings, &self.style, width, self.tiny_position);
        if let Err(e) = slot.present(&mut self.comp, update, self.tiny_dest, &frame) {
            log::warn!("{}: {e}", slot.kind().name());
        }
    }

    /// Shown icons stack away from the configured corner.
    fn advance_icons(&mut self, update: &mut Update) {
        let layout = self.icon_layout;
        let mut y = layout.start_y();

        if let Some(slot) = self.battery_icon.as_mut() {
            let result = if self.low_battery {
                present_icon(slot, &mut self.comp, update, layout, &mut y, |base| {
                    icons::battery(self.readings.battery.soc, base, &self.style)
                })
            } else {
                slot.hide(&mut self.comp, update)
            };
            if let Err(e) = result {
                log::warn!("{}: {e}", slot.kind().name());
            }
        }

        if let Some(slot) = self.cpu_icon.as_mut() {
            let result = if self.overheat {
                present_icon(slot, &mut self.comp, update, layout, &mut y, |base| {
                    icons::cpu(self.readings.cpu_temp, base, &self.style)
                })
            } else {
                slot.hide(&mut self.comp, update)
            };
            if let Err(e) = result {
                log::warn!("{}: {e}", slot.kind().name());
            }
        }
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    /// Remove every live element in one final update, then free the
    /// resources. Later calls do nothing.
    pub fn teardown(&mut self) -> Result<()> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;

        let mut update = Update::new();
        let slots = [&mut self.full, &mut self.tiny, &mut self.battery_icon, &mut self.cpu_icon];
        for slot in slots.into_iter().flatten() {
            if let Err(e) = slot.release(&mut self.comp, &mut update) {
                log::warn!("{}: {e}", slot.kind().name());
            }
        }
        log::debug!("removing {} elements", update.len());
        self.comp.submit(update)?;

        let slots = [&mut self.full, &mut self.tiny, &mut self.battery_icon, &mut self.cpu_icon];
        for slot in slots.into_iter().flatten() {
            if let Err(e) = slot.delete_resource(&mut self.comp) {
                log::warn!("{}: {e}", slot.kind().name());
            }
        }
        Ok(())
    }
}

fn present_icon<C: Compositor>(
    slot: &mut OverlaySlot,
    comp: &mut C,
    update: &mut Update,
    layout: IconLayout,
    y: &mut i32,
    build: impl FnOnce(&PixelBuffer) -> Frame,
) -> Result<()> {
    let (w, h) = slot.size();
    let dest = layout.dest(layout.width_for(w, h), *y);
    *y += layout.step();
    let frame = match slot.base() {
        Some(base) => build(base),
        None => return Ok(()),
    };
    slot.present(comp, update, dest, &frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::{HeadlessSink, SoftwareCompositor};
    use osd_platform::services::{Backlight, BatteryStatus, MemoryUsage, NetInterface};
    use osd_platform::{ClockReading, SysfsSensors};
    use osd_trigger::TriggerSource;
    use osd_types::config::IconCorner;
    use proptest::prelude::*;
    use std::sync::mpsc::{SyncSender, sync_channel};

    type TestScheduler<S = FakeSensors> = Scheduler<SoftwareCompositor<HeadlessSink>, S>;

    #[derive(Default)]
    struct FakeSensors {
        soc: Option<i32>,
        temp: Option<i32>,
        clock_reads: usize,
        /// `memory`, `gpu_memory`, `backlight` and `network` calls.
        detail_reads: usize,
    }

    impl SensorService for FakeSensors {
        fn battery(&mut self) -> BatteryStatus {
            BatteryStatus {
                soc: self.soc,
                voltage: None,
            }
        }
        fn cpu_temp(&mut self) -> Option<i32> {
            self.temp
        }
        fn cpu_load(&mut self) -> Option<i32> {
            Some(3)
        }
        fn memory(&mut self) -> Option<MemoryUsage> {
            self.detail_reads += 1;
            None
        }
        fn gpu_memory(&mut self) -> Option<MemoryUsage> {
            self.detail_reads += 1;
            None
        }
        fn backlight(&mut self) -> Option<Backlight> {
            self.detail_reads += 1;
            None
        }
        fn network(&mut self) -> Vec<NetInterface> {
            self.detail_reads += 1;
            Vec::new()
        }
        fn clock(&mut self) -> ClockReading {
            self.clock_reads += 1;
            ClockReading::Uptime(self.clock_reads as u64)
        }
    }

    fn config() -> OsdConfig {
        let mut config = OsdConfig::default();
        config.gpio.enabled = false;
        config.evdev.enabled = false;
        config.icons.low_battery_image = "missing/low_battery.png".into();
        config.icons.cpu_temp_image = "missing/temp_warn.png".into();
        config
    }

    fn compositor() -> SoftwareCompositor<HeadlessSink> {
        SoftwareCompositor::new(HeadlessSink::new(640, 480)).unwrap()
    }

    fn with_channel(config: &OsdConfig, sensors: FakeSensors) -> (TestScheduler, SyncSender<TriggerEvent>) {
        let (tx, rx) = sync_channel(4);
        let triggers = Triggers {
            events: Some(rx),
            ..Triggers::none()
        };
        (Scheduler::new(config, compositor(), sensors, triggers).unwrap(), tx)
    }

    fn send(tx: &SyncSender<TriggerEvent>, target: OverlayTarget, at: Instant) {
        tx.try_send(TriggerEvent::new(TriggerSource::KeySequence, target, at)).unwrap();
    }

    fn live(slot: Option<&OverlaySlot>) -> bool {
        slot.is_some_and(OverlaySlot::is_live)
    }

    #[test]
    fn key_event_shows_then_times_out() {
        let (mut s, tx) = with_channel(&config(), FakeSensors::default());
        let t0 = Instant::now();
        send(&tx, OverlayTarget::Full, t0);
        s.tick(t0);
        assert!(live(s.full()));
        assert_eq!(s.compositor().element_count(), 1);
        assert!(matches!(s.readings().clock, Some(ClockReading::Uptime(1))));

        s.tick(t0 + Duration::from_secs(5));
        assert!(live(s.full()));
        s.tick(t0 + Duration::from_millis(5001));
        assert!(!live(s.full()));
        assert!(!s.full().unwrap().is_active());
        assert!(s.full().unwrap().buffer().is_some());
        assert_eq!(s.compositor().element_count(), 0);
    }

    #[test]
    fn unchanged_content_skips_submit() {
        let (mut s, tx) = with_channel(&config(), FakeSensors::default());
        let t0 = Instant::now();
        send(&tx, OverlayTarget::Tiny, t0);
        s.tick(t0);
        let submits = s.compositor().submits();
        // The clock keeps changing: one submit per tick.
        s.tick(t0 + Duration::from_millis(33));
        assert_eq!(s.compositor().submits(), submits + 1);

        let (mut idle, _tx) = with_channel(&config(), FakeSensors::default());
        idle.tick(t0);
        idle.tick(t0 + Duration::from_millis(33));
        assert_eq!(idle.compositor().submits(), 0);
    }

    #[test]
    fn full_wins_when_both_trigger() {
        let (mut s, tx) = with_channel(&config(), FakeSensors::default());
        let t0 = Instant::now();
        send(&tx, OverlayTarget::Full, t0);
        send(&tx, OverlayTarget::Tiny, t0);
        s.tick(t0);
        assert!(live(s.full()));
        assert!(!live(s.tiny()));
        assert!(s.tiny().unwrap().is_active());

        // Both time out together: the compact OSD never showed.
        s.tick(t0 + Duration::from_millis(5001));
        assert!(!live(s.full()));
        assert!(!live(s.tiny()));
    }

    #[test]
    fn suppressed_osd_shows_when_other_hides() {
        let (mut s, tx) = with_channel(&config(), FakeSensors::default());
        let t0 = Instant::now();
        send(&tx, OverlayTarget::Full, t0);
        s.tick(t0);
        let t1 = t0 + Duration::from_secs(2);
        send(&tx, OverlayTarget::Tiny, t1);
        s.tick(t1);
        assert!(!live(s.tiny()));

        s.tick(t0 + Duration::from_millis(5001));
        assert!(!live(s.full()));
        assert!(live(s.tiny()));
        assert_eq!(s.tiny().unwrap().activated_at(), Some(t1));
    }

    #[test]
    fn tiny_test_mode_ignores_suppression() {
        let mut config = config();
        config.debug.tiny_osd_test = true;
        let (mut s, tx) = with_channel(&config, FakeSensors::default());
        let t0 = Instant::now();
        s.tick(t0);
        assert!(live(s.tiny()));
        send(&tx, OverlayTarget::Full, t0);
        s.tick(t0 + Duration::from_secs(1));
        // The full OSD stays hidden behind the forced compact one.
        assert!(!live(s.full()));
        s.tick(t0 + Duration::from_secs(60));
        assert!(live(s.tiny()));
    }

    #[test]
    fn tiny_test_mode_keeps_full_off_from_the_first_tick() {
        let mut config = config();
        config.debug.tiny_osd_test = true;
        let (mut s, tx) = with_channel(&config, FakeSensors::default());
        let t0 = Instant::now();
        send(&tx, OverlayTarget::Full, t0);
        s.tick(t0);
        assert!(live(s.tiny()));
        assert!(!live(s.full()));
        assert_eq!(s.compositor().element_count(), 1);
    }

    #[test]
    fn idle_daemon_reads_only_icon_conditions() {
        let sensors = FakeSensors {
            soc: Some(60),
            temp: Some(50),
            ..FakeSensors::default()
        };
        let (mut s, tx) = with_channel(&config(), sensors);
        let t0 = Instant::now();
        let mut now = t0;
        for _ in 0..300 {
            s.tick(now);
            now += Duration::from_millis(33);
        }
        assert_eq!(s.sensors.detail_reads, 0);
        assert_eq!(s.sensors.clock_reads, 0);
        assert_eq!(s.readings().battery.soc, Some(60));

        // An OSD gets every reading on the tick it shows.
        send(&tx, OverlayTarget::Full, now);
        s.tick(now);
        assert!(live(s.full()));
        assert_eq!(s.sensors.detail_reads, 4);
        assert_eq!(s.readings().cpu_load, Some(3));
    }

    #[test]
    fn disabled_osd_ignores_requests() {
        let mut config = config();
        config.osd.enabled = false;
        let (mut s, tx) = with_channel(&config, FakeSensors::default());
        send(&tx, OverlayTarget::Full, Instant::now());
        s.tick(Instant::now());
        assert!(s.full().is_none());
        assert_eq!(s.compositor().element_count(), 0);
    }

    #[test]
    fn closed_channel_is_dropped() {
        let (mut s, tx) = with_channel(&config(), FakeSensors::default());
        drop(tx);
        s.tick(Instant::now());
        assert!(s.triggers.events.is_none());
    }

    #[test]
    fn icons_stack_from_top_right() {
        let mut config = config();
        config.debug.lowbat_test = true;
        config.debug.cputemp_test = true;
        let (mut s, _tx) = with_channel(&config, FakeSensors::default());
        s.tick(Instant::now());

        let battery = s.battery_icon().unwrap();
        let cpu = s.cpu_icon().unwrap();
        // 9% of 480 = 43 px high, 48x28 built-in icons.
        assert_eq!(battery.dest(), Rect::new(640 - 10 - 73, 10, 73, 43));
        assert_eq!(cpu.dest(), Rect::new(640 - 10 - 73, 53, 73, 43));
        assert_eq!(battery.layer(), 10002);
        assert_eq!(s.compositor().element_count(), 2);
    }

    #[test]
    fn icons_stack_upward_from_bottom() {
        let mut config = config();
        config.icons.position = IconCorner::BottomLeft;
        let sensors = FakeSensors {
            soc: Some(50),
            temp: Some(95),
            ..FakeSensors::default()
        };
        let (mut s, _tx) = with_channel(&config, sensors);
        s.tick(Instant::now());
        // Battery fine: the CPU icon takes the first slot.
        assert!(!live(s.battery_icon()));
        assert_eq!(s.cpu_icon().unwrap().dest(), Rect::new(10, 480 - 10 - 43, 73, 43));
    }

    #[test]
    fn icon_follows_condition() {
        let (mut s, _tx) = with_channel(&config(), FakeSensors {
            temp: Some(85),
            ..FakeSensors::default()
        });
        let t0 = Instant::now();
        s.tick(t0);
        assert!(live(s.cpu_icon()));
        s.sensors.temp = Some(60);
        // Not resampled before a second passed.
        s.tick(t0 + Duration::from_millis(500));
        assert!(live(s.cpu_icon()));
        s.tick(t0 + Duration::from_secs(1));
        assert!(!live(s.cpu_icon()));
    }

    #[test]
    fn battery_file_scenarios() {
        for (content, low) in [("5", true), ("50", false)] {
            let dir = tempfile::tempdir().unwrap();
            let capacity = dir.path().join("capacity");
            std::fs::write(&capacity, content).unwrap();
            let mut config = config();
            config.battery.capacity_path = capacity;
            config.battery.voltage_path = dir.path().join("voltage_now");
            config.cpu.thermal_path = dir.path().join("temp");
            config.data.iw_path = dir.path().join("iw");
            config.data.vcgencmd_path = dir.path().join("vcgencmd");
            config.data.timedatectl_path = dir.path().join("timedatectl");
            config.data.rtc_path = dir.path().join("rtc0");
            config.data.backlight_path = dir.path().join("backlight");
            config.data.backlight_max_path = dir.path().join("backlight_max");
            let sensors = SysfsSensors::with_proc_root(&config, dir.path().to_path_buf());

            let mut s: TestScheduler<SysfsSensors> =
                Scheduler::new(&config, compositor(), sensors, Triggers::none()).unwrap();
            s.tick(Instant::now());
            assert_eq!(live(s.battery_icon()), low, "capacity {content}");
        }
    }

    #[test]
    fn signal_file_reset_after_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("osd.signal");
        std::fs::write(&path, "12").unwrap();
        let triggers = Triggers {
            signal_file: Some(SignalFile::new(&path)),
            ..Triggers::none()
        };
        let mut s = Scheduler::new(&config(), compositor(), FakeSensors::default(), triggers).unwrap();
        let t0 = Instant::now();
        s.tick(t0);
        assert!(live(s.tiny()));
        s.tick(t0 + Duration::from_secs(6));
        assert!(!live(s.tiny()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0");
    }

    #[test]
    fn signal_file_read_once_a_second() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("osd.signal");
        std::fs::write(&path, "0").unwrap();
        let triggers = Triggers {
            signal_file: Some(SignalFile::new(&path)),
            ..Triggers::none()
        };
        let mut s = Scheduler::new(&config(), compositor(), FakeSensors::default(), triggers).unwrap();
        let t0 = Instant::now();
        s.tick(t0);
        std::fs::write(&path, "10").unwrap();
        s.tick(t0 + Duration::from_millis(500));
        assert!(!live(s.full()));
        s.tick(t0 + Duration::from_secs(1));
        assert!(live(s.full()));
    }

    #[test]
    fn teardown_is_one_transaction() {
        let mut config = config();
        config.debug.lowbat_test = true;
        let (mut s, tx) = with_channel(&config, FakeSensors::default());
        let t0 = Instant::now();
        send(&tx, OverlayTarget::Full, t0);
        s.tick(t0);
        assert_eq!(s.compositor().element_count(), 2);
        let submits = s.compositor().submits();

        s.teardown().unwrap();
        assert_eq!(s.compositor().submits(), submits + 1);
        assert_eq!(s.compositor().element_count(), 0);
        assert_eq!(s.compositor().resource_count(), 0);

        s.teardown().unwrap();
        assert_eq!(s.compositor().submits(), submits + 1);
    }

    #[test]
    fn run_returns_when_stopped() {
        let (mut s, _tx) = with_channel(&config(), FakeSensors::default());
        let stop = AtomicBool::new(true);
        s.run(&stop);
        assert_eq!(s.compositor().submits(), 0);
    }

    #[test]
    fn due_rearms() {
        let t0 = Instant::now();
        let mut next = None;
        assert!(due(&mut next, t0, GPIO_INTERVAL));
        assert!(!due(&mut next, t0 + Duration::from_millis(249), GPIO_INTERVAL));
        assert!(due(&mut next, t0 + GPIO_INTERVAL, GPIO_INTERVAL));
    }

    proptest! {
        #[test]
        fn osds_never_composited_together(
            steps in proptest::collection::vec((0u8..3, 0u64..3000), 1..40)
        ) {
            let (mut s, tx) = with_channel(&config(), FakeSensors::default());
            let timeout = Duration::from_secs(5);
            let mut now = Instant::now();
            for (request, advance_ms) in steps {
                now += Duration::from_millis(advance_ms);
                match request {
                    1 => send(&tx, OverlayTarget::Full, now),
                    2 => send(&tx, OverlayTarget::Tiny, now),
                    _ => {}
                }
                s.tick(now);
                prop_assert!(!(live(s.full()) && live(s.tiny())));
                for slot in [s.full(), s.tiny()].into_iter().flatten() {
                    if let Some(at) = slot.activated_at() {
                        prop_assert!(now.duration_since(at) <= timeout);
                    } else {
                        prop_assert!(!slot.is_live());
                    }
                }
            }
        }

        #[test]
        fn activation_needs_a_trigger(advances in proptest::collection::vec(0u64..3000, 1..30)) {
            let (mut s, _tx) = with_channel(&config(), FakeSensors::default());
            let mut now = Instant::now();
            for advance_ms in advances {
                now += Duration::from_millis(advance_ms);
                s.tick(now);
                prop_assert!(!s.full().unwrap().is_active());
                prop_assert!(!s.tiny().unwrap().is_active());
            }
        }
    }
}
