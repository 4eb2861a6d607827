//! Hardware event loop
//!
//! One `tick` per period, in this order:
//!
//! 1. Sample inputs, emit a `ButtonEvent` per changed button (ascending id)
//! 2. Drain every inbound command and apply it
//! 3. Emit sensor readings when the sensor interval has elapsed
//! 4. Emit a heartbeat and the status counters when the heartbeat interval
//!    has elapsed
//!
//! The loop never waits. A full outbound queue drops the message and counts
//! it; a failed peripheral write is skipped and counted.

use badgelink_protocol::{ApplicationMessage, SensorId, StatusField};

use crate::bridge::HardwarePort;
use crate::config::BridgeConfig;
use crate::elapsed_ms;
use crate::traits::{Peripherals, SensorSample, BUTTON_COUNT, LED_COUNT};

use super::state::PeripheralState;

/// Counters accumulated since boot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoopStats {
    pub ticks: u32,
    /// Outbound messages lost to a full queue
    pub dropped_outbound: u32,
    /// Peripheral writes that failed
    pub peripheral_errors: u32,
    /// Inbound messages that are not commands
    pub rejected_commands: u32,
}

/// What happened during one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    pub button_events: u8,
    pub commands_applied: u8,
    pub dropped: u8,
    pub peripheral_errors: u8,
    pub rejected: u8,
    pub sensors_sampled: bool,
    pub heartbeat_sent: bool,
}

impl TickReport {
    /// True when something worth logging went wrong
    pub fn has_faults(&self) -> bool {
        self.dropped > 0 || self.peripheral_errors > 0 || self.rejected > 0
    }
}

/// Periodic schedule within the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct Schedule {
    heartbeat_interval_ms: u32,
    sensor_interval_ms: u32,
}

/// Drives the peripherals and translates between them and messages
pub struct HardwareEventLoop {
    schedule: Schedule,
    state: PeripheralState,
    stats: LoopStats,
    started_ms: Option<u32>,
    last_heartbeat_ms: u32,
    last_sensor_ms: u32,
    heartbeat_seq: u32,
}

impl HardwareEventLoop {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            schedule: Schedule {
                heartbeat_interval_ms: config.heartbeat_interval_ms,
                sensor_interval_ms: config.sensor_interval_ms,
            },
            state: PeripheralState::new(),
            stats: LoopStats::default(),
            started_ms: None,
            last_heartbeat_ms: 0,
            last_sensor_ms: 0,
            heartbeat_seq: 0,
        }
    }

    pub fn state(&self) -> &PeripheralState {
        &self.state
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Seconds since the first tick
    pub fn uptime_s(&self, now_ms: u32) -> u32 {
        self.started_ms
            .map(|start| elapsed_ms(now_ms, start) / 1000)
            .unwrap_or(0)
    }

    /// Run one iteration
    pub fn tick<P: Peripherals>(
        &mut self,
        now_ms: u32,
        peripherals: &mut P,
        port: &mut HardwarePort<'_>,
    ) -> TickReport {
        let mut report = TickReport::default();

        if self.started_ms.is_none() {
            self.started_ms = Some(now_ms);
            self.last_heartbeat_ms = now_ms;
            self.last_sensor_ms = now_ms;
        }
        self.stats.ticks = self.stats.ticks.wrapping_add(1);

        self.poll_inputs(peripherals, port, &mut report);
        self.apply_inbound(peripherals, port, &mut report);

        if elapsed_ms(now_ms, self.last_sensor_ms) >= self.schedule.sensor_interval_ms {
            self.last_sensor_ms = now_ms;
            if let Some(sample) = peripherals.sample_sensors() {
                self.emit_sample(&sample, port, &mut report);
                report.sensors_sampled = true;
            }
        }

        if elapsed_ms(now_ms, self.last_heartbeat_ms) >= self.schedule.heartbeat_interval_ms {
            self.last_heartbeat_ms = now_ms;
            self.emit_heartbeat(now_ms, port, &mut report);
            report.heartbeat_sent = true;
        }

        report
    }

    fn poll_inputs<P: Peripherals>(
        &mut self,
        peripherals: &mut P,
        port: &mut HardwarePort<'_>,
        report: &mut TickReport,
    ) {
        let snapshot = peripherals.read_inputs();
        let changed = self.state.update_inputs(snapshot);
        if changed == 0 {
            return;
        }

        for id in 0..BUTTON_COUNT as u8 {
            if changed & (1 << id) != 0 {
                let event = ApplicationMessage::ButtonEvent {
                    id,
                    pressed: snapshot.is_pressed(id),
                };
                if self.emit(event, port, report) {
                    report.button_events += 1;
                }
            }
        }
    }

    fn apply_inbound<P: Peripherals>(
        &mut self,
        peripherals: &mut P,
        port: &mut HardwarePort<'_>,
        report: &mut TickReport,
    ) {
        while let Some(message) = port.inbound.try_recv() {
            match message {
                ApplicationMessage::LedCommand { id, color } => {
                    match peripherals.write_output(id, color) {
                        Ok(()) => {
                            self.state.set_led(id, color);
                            report.commands_applied += 1;
                        }
                        Err(_) => {
                            self.stats.peripheral_errors =
                                self.stats.peripheral_errors.saturating_add(1);
                            report.peripheral_errors += 1;
                        }
                    }
                }
                ApplicationMessage::LedQuery => {
                    for id in 0..LED_COUNT as u8 {
                        let color = self.state.led(id).unwrap_or_default();
                        self.emit(ApplicationMessage::LedState { id, color }, port, report);
                    }
                    report.commands_applied += 1;
                }
                ApplicationMessage::Heartbeat { seq } => {
                    self.emit(ApplicationMessage::Heartbeat { seq }, port, report);
                    report.commands_applied += 1;
                }
                ApplicationMessage::ButtonEvent { .. }
                | ApplicationMessage::StatusReport { .. }
                | ApplicationMessage::LedState { .. }
                | ApplicationMessage::SensorReading { .. } => {
                    self.stats.rejected_commands =
                        self.stats.rejected_commands.saturating_add(1);
                    report.rejected += 1;
                }
            }
        }
    }

    fn emit_sample(
        &mut self,
        sample: &SensorSample,
        port: &mut HardwarePort<'_>,
        report: &mut TickReport,
    ) {
        let axes = [SensorId::AccelX, SensorId::AccelY, SensorId::AccelZ];
        for (sensor, value) in axes.into_iter().zip(sample.accel_mg) {
            self.emit(ApplicationMessage::SensorReading { sensor, value }, port, report);
        }
        if let Some(value) = sample.temperature_centi {
            self.emit(
                ApplicationMessage::SensorReading {
                    sensor: SensorId::Temperature,
                    value,
                },
                port,
                report,
            );
        }
    }

    fn emit_heartbeat(&mut self, now_ms: u32, port: &mut HardwarePort<'_>, report: &mut TickReport) {
        let seq = self.heartbeat_seq;
        self.heartbeat_seq = seq.wrapping_add(1);
        self.emit(ApplicationMessage::Heartbeat { seq }, port, report);

        for field in StatusField::ALL {
            let value = match field {
                StatusField::UptimeSeconds => self.uptime_s(now_ms),
                StatusField::DroppedEvents => self.stats.dropped_outbound,
                StatusField::PeripheralErrors => self.stats.peripheral_errors,
                StatusField::RejectedCommands => self.stats.rejected_commands,
            };
            let value = i32::try_from(value).unwrap_or(i32::MAX);
            self.emit(ApplicationMessage::StatusReport { field, value }, port, report);
        }
    }

    /// Queue one outbound message, counting it if the queue is full
    fn emit(
        &mut self,
        message: ApplicationMessage,
        port: &mut HardwarePort<'_>,
        report: &mut TickReport,
    ) -> bool {
        match port.outbound.try_send(message) {
            Ok(()) => true,
            Err(_) => {
                self.stats.dropped_outbound = self.stats.dropped_outbound.wrapping_add(1);
                report.dropped = report.dropped.saturating_add(1);
                false
            }
        }
    }
}
