//! Application messages exchanged with the frontend
//!
//! Every message travels as a flat record `{type, id, value}`:
//!
//! | type             | direction | id                  | value                 |
//! |------------------|-----------|---------------------|-----------------------|
//! | `button_event`   | badge →   | button index        | 1 pressed, 0 released |
//! | `led_command`    | → badge   | LED index           | color `0xRRGGBB`      |
//! | `status_report`  | badge →   | [`StatusField`]     | counter value         |
//! | `heartbeat`      | both      | 0                   | sequence number       |
//! | `led_query`      | → badge   | 0                   | 0                     |
//! | `led_state`      | badge →   | LED index           | color `0xRRGGBB`      |
//! | `sensor_reading` | badge →   | [`SensorId`]        | scaled reading        |

use serde::{Deserialize, Serialize};

/// Upper bound on an encoded message, in any codec
pub const MAX_MESSAGE_SIZE: usize = 96;

/// 24-bit LED color
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Pack as `0xRRGGBB`
    pub const fn to_u32(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// Unpack `0xRRGGBB`; `None` if any of the top 8 bits are set
    pub const fn from_u32(value: u32) -> Option<Self> {
        if value > 0x00FF_FFFF {
            return None;
        }
        Some(Self {
            r: (value >> 16) as u8,
            g: (value >> 8) as u8,
            b: value as u8,
        })
    }
}

/// Counter carried by a [`ApplicationMessage::StatusReport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StatusField {
    UptimeSeconds = 0,
    DroppedEvents = 1,
    PeripheralErrors = 2,
    RejectedCommands = 3,
}

impl StatusField {
    pub const ALL: [StatusField; 4] = [
        StatusField::UptimeSeconds,
        StatusField::DroppedEvents,
        StatusField::PeripheralErrors,
        StatusField::RejectedCommands,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }
}

/// Sensor channel carried by a [`ApplicationMessage::SensorReading`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SensorId {
    /// Acceleration in milli-g
    AccelX = 0,
    AccelY = 1,
    AccelZ = 2,
    /// Temperature in hundredths of a degree Celsius
    Temperature = 3,
}

impl SensorId {
    pub const ALL: [SensorId; 4] = [
        SensorId::AccelX,
        SensorId::AccelY,
        SensorId::AccelZ,
        SensorId::Temperature,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }
}

/// Messages between the badge and its frontend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApplicationMessage {
    /// A button changed state
    ButtonEvent { id: u8, pressed: bool },
    /// Set one LED
    LedCommand { id: u8, color: Rgb },
    /// Periodic counter report
    StatusReport { field: StatusField, value: i32 },
    /// Liveness marker; inbound heartbeats are echoed back
    Heartbeat { seq: u32 },
    /// Request the full LED table
    LedQuery,
    /// Current color of one LED
    LedState { id: u8, color: Rgb },
    /// One sensor channel sample
    SensorReading { sensor: SensorId, value: i32 },
}

impl ApplicationMessage {
    /// True for messages the frontend may send to the badge
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            ApplicationMessage::LedCommand { .. }
                | ApplicationMessage::LedQuery
                | ApplicationMessage::Heartbeat { .. }
        )
    }

    /// Flatten into the wire record
    pub fn to_record(&self) -> WireRecord {
        let (kind, id, value) = match *self {
            ApplicationMessage::ButtonEvent { id, pressed } => {
                (MessageKind::ButtonEvent, id, pressed as i32)
            }
            ApplicationMessage::LedCommand { id, color } => {
                (MessageKind::LedCommand, id, color.to_u32() as i32)
            }
            ApplicationMessage::StatusReport { field, value } => {
                (MessageKind::StatusReport, field as u8, value)
            }
            ApplicationMessage::Heartbeat { seq } => (MessageKind::Heartbeat, 0, seq as i32),
            ApplicationMessage::LedQuery => (MessageKind::LedQuery, 0, 0),
            ApplicationMessage::LedState { id, color } => {
                (MessageKind::LedState, id, color.to_u32() as i32)
            }
            ApplicationMessage::SensorReading { sensor, value } => {
                (MessageKind::SensorReading, sensor as u8, value)
            }
        };
        WireRecord { kind, id, value }
    }

    /// Rebuild from a wire record, rejecting out-of-range fields
    pub fn from_record(record: &WireRecord) -> Option<Self> {
        let WireRecord { kind, id, value } = *record;
        let message = match kind {
            MessageKind::ButtonEvent => ApplicationMessage::ButtonEvent {
                id,
                pressed: match value {
                    0 => false,
                    1 => true,
                    _ => return None,
                },
            },
            MessageKind::LedCommand => ApplicationMessage::LedCommand {
                id,
                color: Rgb::from_u32(u32::try_from(value).ok()?)?,
            },
            MessageKind::StatusReport => ApplicationMessage::StatusReport {
                field: StatusField::from_u8(id)?,
                value,
            },
            MessageKind::Heartbeat => ApplicationMessage::Heartbeat { seq: value as u32 },
            MessageKind::LedQuery => ApplicationMessage::LedQuery,
            MessageKind::LedState => ApplicationMessage::LedState {
                id,
                color: Rgb::from_u32(u32::try_from(value).ok()?)?,
            },
            MessageKind::SensorReading => ApplicationMessage::SensorReading {
                sensor: SensorId::from_u8(id)?,
                value,
            },
        };
        Some(message)
    }
}

/// The `type` tag of a wire record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    ButtonEvent,
    LedCommand,
    StatusReport,
    Heartbeat,
    LedQuery,
    LedState,
    SensorReading,
}

/// Flat `{type, id, value}` record as serialized by every codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WireRecord {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub id: u8,
    pub value: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_packing() {
        let color = Rgb::new(0x12, 0x34, 0x56);
        assert_eq!(color.to_u32(), 0x123456);
        assert_eq!(Rgb::from_u32(0x123456), Some(color));
        assert_eq!(Rgb::from_u32(0x0100_0000), None);
    }

    #[test]
    fn test_record_mapping() {
        let record = ApplicationMessage::ButtonEvent { id: 2, pressed: true }.to_record();
        assert_eq!(
            record,
            WireRecord {
                kind: MessageKind::ButtonEvent,
                id: 2,
                value: 1
            }
        );

        let record = ApplicationMessage::StatusReport {
            field: StatusField::DroppedEvents,
            value: 7,
        }
        .to_record();
        assert_eq!(record.id, 1);
        assert_eq!(record.value, 7);
    }

    #[test]
    fn test_heartbeat_sequence_wraps_through_i32() {
        let message = ApplicationMessage::Heartbeat { seq: u32::MAX };
        let record = message.to_record();
        assert_eq!(record.value, -1);
        assert_eq!(ApplicationMessage::from_record(&record), Some(message));
    }

    #[test]
    fn test_invalid_records_rejected() {
        let bad = [
            WireRecord { kind: MessageKind::ButtonEvent, id: 0, value: 2 },
            WireRecord { kind: MessageKind::LedCommand, id: 0, value: -1 },
            WireRecord { kind: MessageKind::LedCommand, id: 0, value: 0x0100_0000 },
            WireRecord { kind: MessageKind::StatusReport, id: 9, value: 0 },
            WireRecord { kind: MessageKind::SensorReading, id: 4, value: 0 },
        ];
        for record in bad {
            assert_eq!(ApplicationMessage::from_record(&record), None, "{record:?}");
        }
    }

    #[test]
    fn test_command_classification() {
        assert!(ApplicationMessage::LedQuery.is_command());
        assert!(ApplicationMessage::Heartbeat { seq: 1 }.is_command());
        assert!(!ApplicationMessage::ButtonEvent { id: 0, pressed: true }.is_command());
        assert!(!ApplicationMessage::LedState { id: 0, color: Rgb::OFF }.is_command());
    }
}
