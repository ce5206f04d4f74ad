//! RelayLink firmware entry point
//!
//! Hexagonal architecture with a single cooperative control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  Board (WifiAdapter · MqttAdapter · PortalAdapter · System)    │
//! │  EepromAdapter     UartTransport     LogEventSink              │
//! │  (EepromPort)      (Transport)       (EventSink)               │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            RelayController (pure logic)                │    │
//! │  │  FSM · Gateway · Relay · Monitor · CredentialStore     │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! On the device the loop ticks every [`TICK_MS`] forever.  On hosts the
//! same wiring runs against the simulation adapters and a scripted
//! scenario on a virtual clock.
#![deny(unused_must_use)]

use anyhow::Result;

/// Control loop period.
const TICK_MS: u64 = 10;

fn main() -> Result<()> {
    #[cfg(target_os = "espidf")]
    {
        device::run()
    }

    #[cfg(not(target_os = "espidf"))]
    {
        simulation::run()
    }
}

// ───────────────────────────────────────────────────────────────
// Device
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod device {
    use anyhow::{Result, anyhow};
    use esp_idf_hal::gpio::AnyIOPin;
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_hal::uart::{UartDriver, config::Config as UartConfig};
    use esp_idf_hal::units::Hertz;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::wifi::EspWifi;
    use log::info;

    use relaylink::adapters::board::Board;
    use relaylink::adapters::device_id;
    use relaylink::adapters::eeprom::EepromAdapter;
    use relaylink::adapters::log_sink::LogEventSink;
    use relaylink::adapters::mqtt::MqttAdapter;
    use relaylink::adapters::portal::PortalAdapter;
    use relaylink::adapters::system::SystemAdapter;
    use relaylink::adapters::time::MonotonicClock;
    use relaylink::adapters::uart::{BAUD_RATE, UartTransport};
    use relaylink::adapters::wifi::WifiAdapter;
    use relaylink::app::service::RelayController;
    use relaylink::config::RelayConfig;
    use relaylink::pins;

    pub fn run() -> Result<()> {
        // ── 1. ESP-IDF bootstrap ──────────────────────────────────
        esp_idf_svc::sys::link_patches();
        esp_idf_logger::init()?;
        info!("RelayLink v{}", env!("CARGO_PKG_VERSION"));

        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;
        let nvs = EspDefaultNvsPartition::take()?;

        // ── 2. Adapters ───────────────────────────────────────────
        let config = RelayConfig::default();
        let eeprom = EepromAdapter::new().map_err(relaylink::Error::from)?;

        let wifi = EspWifi::new(peripherals.modem, sysloop, Some(nvs))?;
        // SAFETY: the link pins are claimed nowhere else.
        let (tx, rx) = unsafe {
            (
                AnyIOPin::new(pins::LINK_TX_GPIO),
                AnyIOPin::new(pins::LINK_RX_GPIO),
            )
        };
        let uart = UartDriver::new(
            peripherals.uart1,
            tx,
            rx,
            Option::<AnyIOPin>::None,
            Option::<AnyIOPin>::None,
            &UartConfig::default().baudrate(Hertz(BAUD_RATE)),
        )?;

        let system = SystemAdapter::new()
            .map_err(|rc| anyhow!("reset trigger GPIO config failed (rc={rc})"))?;
        let mut board = Board::new(
            WifiAdapter::new(wifi),
            MqttAdapter::new(&config.broker_host, config.broker_port),
            PortalAdapter::new(),
            system,
        );
        let mut sink = LogEventSink::new();
        let clock = MonotonicClock::new();

        let client_id = device_id::bus_client_id(&device_id::read_mac())?;
        info!("Bus client id: {}", client_id);

        // ── 3. Controller ─────────────────────────────────────────
        let mut app = RelayController::new(config, eeprom, UartTransport::new(uart), &client_id)?;
        app.boot(clock.uptime_ms(), &mut board, &mut sink);

        info!("System ready. Entering control loop.");
        loop {
            app.tick(clock.uptime_ms(), &mut board, &mut sink);
            std::thread::sleep(std::time::Duration::from_millis(super::TICK_MS));
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Host simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod simulation {
    use std::io::Write;

    use anyhow::{Context, Result};
    use env_logger::{Builder, Env, Target};
    use log::{info, warn};

    use relaylink::adapters::board::Board;
    use relaylink::adapters::device_id;
    use relaylink::adapters::eeprom::EepromAdapter;
    use relaylink::adapters::log_sink::LogEventSink;
    use relaylink::adapters::mqtt::MqttAdapter;
    use relaylink::adapters::portal::PortalAdapter;
    use relaylink::adapters::system::SystemAdapter;
    use relaylink::adapters::uart::UartTransport;
    use relaylink::adapters::wifi::{SimNetwork, WifiAdapter};
    use relaylink::app::commands::PortalRequest;
    use relaylink::app::service::RelayController;
    use relaylink::config::RelayConfig;
    use relaylink::fsm::DeviceMode;

    use super::TICK_MS;

    const SIM_SSID: &str = "HomeNet";
    const SIM_PASSPHRASE: &str = "password1";

    type Controller = RelayController<EepromAdapter, UartTransport>;

    /// Environment variable naming a JSON file of configuration overrides.
    const CONFIG_ENV: &str = "RELAYLINK_CONFIG";

    fn load_config() -> Result<RelayConfig> {
        let Ok(path) = std::env::var(CONFIG_ENV) else {
            return Ok(RelayConfig::default());
        };
        let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
        let config = RelayConfig::from_json(&text).map_err(relaylink::Error::from)?;
        info!("Config loaded from {}", path);
        Ok(config)
    }

    /// The host harness: controller, board and a virtual clock.
    struct Sim {
        app: Controller,
        board: Board,
        sink: LogEventSink,
        now: u64,
    }

    impl Sim {
        fn step(&mut self) {
            self.now += TICK_MS;
            self.app.tick(self.now, &mut self.board, &mut self.sink);
        }

        /// Tick until `done` holds or `limit_ms` of virtual time passes.
        fn run_until(&mut self, limit_ms: u64, done: impl Fn(&Self) -> bool) -> bool {
            let deadline = self.now + limit_ms;
            while self.now < deadline {
                if done(self) {
                    return true;
                }
                self.step();
            }
            done(self)
        }

        /// Play the downstream unit: answer every frame with a completion line.
        fn answer_downstream(&mut self) {
            let sent = self.app.relay_mut().transport_mut().take_tx();
            for frame in String::from_utf8_lossy(&sent).lines() {
                info!("SIM   | downstream received {}", frame);
                let script = serde_json::from_str::<serde_json::Value>(frame)
                    .ok()
                    .and_then(|v| v.get("ducky_script").and_then(|s| s.as_str()).map(String::from))
                    .unwrap_or_default();
                let report = serde_json::json!({
                    "command": script,
                    "status": "success",
                    "execution_time": 420,
                });
                let done = format!("PICO_DONE:{report}\n");
                self.app.relay_mut().transport_mut().feed_rx(done.as_bytes());
            }
        }
    }

    pub fn run() -> Result<()> {
        let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
        builder.format(|f, record| writeln!(f, "[{:5}] {}", record.level(), record.args()));
        builder.target(Target::Stdout).init();

        info!("RelayLink v{} (host simulation)", env!("CARGO_PKG_VERSION"));

        let config = load_config()?;
        let command_topic = config.command_topic.to_string();
        let board = Board::new(
            WifiAdapter::new(vec![SimNetwork {
                ssid: SIM_SSID.into(),
                passphrase: SIM_PASSPHRASE.into(),
                rssi: -58,
            }]),
            MqttAdapter::new(&config.broker_host, config.broker_port),
            PortalAdapter::new(),
            SystemAdapter::new(false),
        );
        let eeprom = EepromAdapter::new().map_err(relaylink::Error::from)?;
        let client_id = device_id::bus_client_id(&device_id::read_mac())?;
        let app = RelayController::new(config, eeprom, UartTransport::new(), &client_id)?;

        let mut sim = Sim {
            app,
            board,
            sink: LogEventSink::new(),
            now: 0,
        };
        sim.app.boot(sim.now, &mut sim.board, &mut sim.sink);

        // ── Provision through the portal ──────────────────────────
        sim.board.portal.submit(PortalRequest::Scan);
        sim.board.portal.submit(PortalRequest::Connect {
            ssid: SIM_SSID.into(),
            passphrase: SIM_PASSPHRASE.into(),
        });
        if !sim.run_until(30_000, |s| s.app.mode() == DeviceMode::Managed) {
            warn!("SIM   | never reached managed mode");
        }
        for response in sim.board.portal.take_responses() {
            info!("SIM   | portal answered {:?}", response);
        }

        // ── Relay one command, then a duplicate ───────────────────
        let command = br#"{"script":"STRING hello","password":"1234"}"#;
        for _ in 0..2 {
            sim.board.bus.deliver(&command_topic, command);
            sim.step();
            sim.answer_downstream();
            sim.run_until(100, |s| !s.app.relay().awaiting_ack());
        }

        for msg in sim.board.bus.take_published() {
            info!(
                "SIM   | published on '{}': {}",
                msg.topic,
                String::from_utf8_lossy(&msg.payload)
            );
        }
        info!("SIM   | stats {:?}", sim.app.stats());
        Ok(())
    }
}
