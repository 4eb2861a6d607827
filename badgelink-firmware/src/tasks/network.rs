//! Wi-Fi station and network stack
//!
//! The station reconnects forever; the session and reject tasks wait for
//! the stack configuration before listening.

use alloc::string::String;

use defmt::*;
use embassy_executor::Spawner;
use embassy_net::{Config as NetConfig, DhcpConfig, Runner, Stack, StackResources};
use embassy_time::{Duration, Timer};
use esp_hal::peripherals::WIFI;
use esp_hal::rng::Rng;
use esp_radio::wifi::{self, ClientConfig, ModeConfig, WifiController, WifiDevice, WifiEvent};
use esp_radio::Controller as RadioController;
use static_cell::StaticCell;

use badgelink_core::WifiConfig;

/// Session socket, reject socket, DHCP
const SOCKET_COUNT: usize = 3;

/// Wait between connection attempts after a failure
const RETRY_DELAY: Duration = Duration::from_secs(5);

static RADIO_CONTROLLER: StaticCell<RadioController<'static>> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<SOCKET_COUNT>> = StaticCell::new();

/// Bring up the radio and network stack, spawning their tasks
///
/// The badge is useless without the radio, so init failures panic.
pub fn spawn_network(
    spawner: &Spawner,
    wifi_peripheral: WIFI<'static>,
    wifi_config: &'static WifiConfig,
) -> Stack<'static> {
    let radio = RADIO_CONTROLLER.init(unwrap!(esp_radio::init()));
    let (controller, interfaces) =
        unwrap!(wifi::new(radio, wifi_peripheral, Default::default()));

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    let resources = NET_RESOURCES.init(StackResources::new());
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        NetConfig::dhcpv4(DhcpConfig::default()),
        resources,
        seed,
    );

    unwrap!(spawner.spawn(wifi_task(controller, stack, wifi_config)));
    unwrap!(spawner.spawn(net_task(runner)));
    stack
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await;
}

#[embassy_executor::task]
async fn wifi_task(
    mut controller: WifiController<'static>,
    stack: Stack<'static>,
    config: &'static WifiConfig,
) {
    info!("Wi-Fi task started (ssid=\"{}\")", config.ssid.as_str());

    let client_config = ModeConfig::Client(
        ClientConfig::default()
            .with_ssid(String::from(config.ssid.as_str()))
            .with_password(String::from(config.password.as_str())),
    );

    loop {
        if !matches!(controller.is_started(), Ok(true)) {
            if let Err(e) = controller.set_config(&client_config) {
                warn!("Wi-Fi set_config error: {:?}", e);
                Timer::after(RETRY_DELAY).await;
                continue;
            }
            if let Err(e) = controller.start_async().await {
                warn!("Wi-Fi start error: {:?}", e);
                Timer::after(RETRY_DELAY).await;
                continue;
            }
            info!("Wi-Fi station started");
        }

        match controller.connect_async().await {
            Ok(()) => {
                stack.wait_config_up().await;
                if let Some(cfg) = stack.config_v4() {
                    info!("Wi-Fi link up: ip={}", cfg.address.address());
                }

                controller.wait_for_event(WifiEvent::StaDisconnected).await;
                warn!("Wi-Fi disconnected, reconnecting");
            }
            Err(e) => {
                warn!("Wi-Fi connect error: {:?}", e);
            }
        }
        Timer::after(RETRY_DELAY).await;
    }
}
