//! Badgelink - websocket bridge firmware
//!
//! Exposes the badge's buttons, LEDs and accelerometer to a browser
//! frontend over one long-lived websocket session.
//!
//! Task layout (single executor):
//! - `wifi_task` keeps the station connected, `net_task` runs the stack
//! - `session_task` accepts one client and polls the session
//! - `reject_task` answers 503 on the same port while a session is active
//! - `hardware_task` ticks the event loop and refreshes the LED strip

#![no_std]
#![no_main]

extern crate alloc;

use defmt::*;
use embassy_executor::Spawner;
use embassy_time::Instant;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Input, InputConfig, Pull};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::interrupt::software::SoftwareInterruptControl;
use esp_hal::rmt::Rmt;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use static_cell::StaticCell;
use {esp_backtrace as _, esp_println as _};

use badgelink_core::BadgeConfig;
use badgelink_drivers::buttons::ButtonBank;
use badgelink_drivers::sensor::lis2dh12::{Lis2dh12, DEFAULT_ADDRESS};
use badgelink_drivers::Badge;

mod board;
mod channels;
mod config;
mod tasks;
mod transport;

esp_bootloader_esp_idf::esp_app_desc!();

static BADGE_CONFIG: StaticCell<BadgeConfig> = StaticCell::new();

/// Milliseconds since boot on the wrapping 32-bit clock the core expects
pub fn now_ms() -> u32 {
    Instant::now().as_millis() as u32
}

#[esp_rtos::main]
async fn main(spawner: Spawner) {
    let peripherals = esp_hal::init(esp_hal::Config::default().with_cpu_clock(CpuClock::max()));

    // Heap for the radio driver and the Wi-Fi credentials
    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 64 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_int = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0, sw_int.software_interrupt0);

    info!("Badgelink firmware starting...");

    let config: &'static BadgeConfig = BADGE_CONFIG.init(config::load());
    info!(
        "Bridge config: port={} path={} max_frame={} idle={}ms tick={}ms",
        config.bridge.port,
        config.bridge.path.as_str(),
        config.bridge.max_frame_bytes,
        config.bridge.idle_timeout_ms,
        config.bridge.tick_period_ms
    );

    let (network_port, hardware_port) = channels::init_bridge();

    // Buttons: GPIO2-5, active-low with internal pull-ups
    let input_config = InputConfig::default().with_pull(Pull::Up);
    let buttons = ButtonBank::new([
        Input::new(peripherals.GPIO2, input_config),
        Input::new(peripherals.GPIO3, input_config),
        Input::new(peripherals.GPIO4, input_config),
        Input::new(peripherals.GPIO5, input_config),
    ]);
    let badge = Badge::new(buttons);

    // WS2812 strip on GPIO10 through RMT channel 0
    let rmt = unwrap!(Rmt::new(peripherals.RMT, Rate::from_mhz(board::RMT_CLOCK_MHZ))).into_async();
    let led_channel = unwrap!(board::led_channel(rmt.channel0, peripherals.GPIO10));

    // LIS2DH12 on I2C0: SDA GPIO6, SCL GPIO7
    let i2c = unwrap!(I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(board::I2C_FREQUENCY_KHZ)),
    ))
    .with_sda(peripherals.GPIO6)
    .with_scl(peripherals.GPIO7)
    .into_async();
    let mut accelerometer = Lis2dh12::new(i2c, DEFAULT_ADDRESS);
    let accelerometer = match accelerometer.init().await {
        Ok(()) => {
            info!("LIS2DH12 initialized");
            Some(accelerometer)
        }
        Err(e) => {
            warn!("LIS2DH12 init failed, running without sensors: {:?}", e);
            None
        }
    };

    unwrap!(spawner.spawn(tasks::hardware_task(
        &config.bridge,
        badge,
        accelerometer,
        led_channel,
        hardware_port,
    )));

    let stack = tasks::spawn_network(&spawner, peripherals.WIFI, &config.wifi);

    unwrap!(spawner.spawn(tasks::session_task(stack, &config.bridge, network_port)));
    unwrap!(spawner.spawn(tasks::reject_task(stack, config.bridge.port)));

    info!("All tasks spawned");
}
