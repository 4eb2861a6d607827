//! Inter-task communication
//!
//! The bridge queue pair lives in a static cell and is split once at boot:
//! the session task gets the network end, the hardware task the hardware
//! end. `SESSION_ACTIVE` tells the reject task when to listen.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::watch::Watch;
use static_cell::StaticCell;

use badgelink_core::{Bridge, HardwarePort, NetworkPort};

/// Receivers of the session flag (the reject task)
const SESSION_WATCHERS: usize = 1;

static BRIDGE: StaticCell<Bridge> = StaticCell::new();

/// True while the session slot is occupied
pub static SESSION_ACTIVE: Watch<CriticalSectionRawMutex, bool, SESSION_WATCHERS> =
    Watch::new_with(false);

/// Create the bridge and split it into its two ends
///
/// Panics if called twice.
pub fn init_bridge() -> (NetworkPort<'static>, HardwarePort<'static>) {
    BRIDGE.init(Bridge::new()).split()
}

pub fn set_session_active(active: bool) {
    SESSION_ACTIVE.sender().send(active);
}
