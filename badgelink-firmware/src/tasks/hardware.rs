//! Hardware tick task
//!
//! Runs the event loop on a fixed ticker:
//! 1. Reads the accelerometer when a sample is due
//! 2. Ticks the event loop (buttons, inbound commands, periodic reports)
//! 3. Pushes the LED frame out over RMT if a command changed it

use defmt::*;
use embassy_time::{Duration, Ticker, Timer};

use badgelink_core::traits::LED_COUNT;
use badgelink_core::{BridgeConfig, HardwareEventLoop, HardwarePort, TickReport};
use badgelink_drivers::leds::ws2812::RESET_US;

use crate::board::{self, Accelerometer, BadgePeripherals, LedChannel};
use crate::now_ms;

/// Ticks between loop statistics logs
const STATS_LOG_TICKS: u32 = 3000;

#[embassy_executor::task]
pub async fn hardware_task(
    config: &'static BridgeConfig,
    mut badge: BadgePeripherals,
    mut accelerometer: Option<Accelerometer>,
    mut leds: LedChannel,
    mut port: HardwarePort<'static>,
) {
    info!("Hardware task started (tick={}ms)", config.tick_period_ms);

    let mut event_loop = HardwareEventLoop::new(config);
    let mut ticker = Ticker::every(Duration::from_millis(config.tick_period_ms as u64));
    let mut frame = [0u32; LED_COUNT];
    let mut last_sample_ms = now_ms();

    loop {
        ticker.next().await;
        let now = now_ms();

        // Prefetch so the synchronous tick finds a fresh sample
        if let Some(sensor) = accelerometer.as_mut() {
            if now.wrapping_sub(last_sample_ms) >= config.sensor_interval_ms {
                last_sample_ms = now;
                match sensor.sample().await {
                    Ok(sample) => badge.store_sample(sample),
                    Err(e) => warn!("Accelerometer read failed: {:?}", e),
                }
            }
        }

        let report = event_loop.tick(now, &mut badge, &mut port);
        log_report(&report);

        if badge.strip_mut().take_dirty() {
            badge.strip().encode(&mut frame);
            // Channel RAM fits one pixel at a time
            for word in frame {
                if let Err(e) = leds.transmit(&board::rmt_pulses(word)).await {
                    warn!("LED transmit failed: {:?}", e);
                    break;
                }
            }
            Timer::after_micros(RESET_US).await;
        }

        let stats = event_loop.stats();
        if stats.ticks % STATS_LOG_TICKS == 0 {
            info!(
                "Loop: ticks={} dropped={} peripheral_errors={} rejected={} uptime={}s",
                stats.ticks,
                stats.dropped_outbound,
                stats.peripheral_errors,
                stats.rejected_commands,
                event_loop.uptime_s(now)
            );
        }
    }
}

fn log_report(report: &TickReport) {
    if report.button_events > 0 {
        debug!("Button events: {}", report.button_events);
    }
    if report.has_faults() {
        warn!(
            "Tick faults: dropped={} peripheral_errors={} rejected={}",
            report.dropped, report.peripheral_errors, report.rejected
        );
    }
}
