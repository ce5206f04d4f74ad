//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements   | Connects to                    |
//! |-------------|--------------|--------------------------------|
//! | `board`     | DevicePorts  | bundles wifi/mqtt/portal/system|
//! | `eeprom`    | EepromPort   | NVS blob / in-memory image     |
//! | `log_sink`  | EventSink    | Serial log output              |
//! | `mqtt`      | BusPort      | ESP-IDF MQTT client            |
//! | `portal`    | PortalPort   | ESP-IDF HTTP server            |
//! | `system`    | SystemPort   | Reset trigger GPIO, restart    |
//! | `uart`      | Transport    | UART to the downstream unit    |
//! | `wifi`      | WifiPort     | ESP-IDF WiFi STA + soft AP     |
//!
//! `device_id` and `time` are helpers for identity and the monotonic clock.

pub mod board;
pub mod device_id;
pub mod eeprom;
pub mod log_sink;
pub mod mqtt;
pub mod portal;
pub mod system;
pub mod time;
pub mod uart;
pub mod wifi;
