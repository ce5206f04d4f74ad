//! Chip-level control: the boot-time reset trigger and restarts.
//!
//! Implements [`SystemPort`].  On hardware the reset trigger is a
//! pulled-up input that reads LOW while held.

use log::{info, warn};

use crate::app::ports::SystemPort;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use crate::pins;

pub struct SystemAdapter {
    #[cfg(not(target_os = "espidf"))]
    reset_asserted: bool,
    #[cfg(not(target_os = "espidf"))]
    restarts: u32,
}

#[cfg(target_os = "espidf")]
impl SystemAdapter {
    /// Configure the reset trigger input.
    pub fn new() -> Result<Self, i32> {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pins::RESET_TRIGGER_GPIO,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        // SAFETY: called once from main() before the control loop starts.
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }
        Ok(Self {})
    }
}

#[cfg(target_os = "espidf")]
impl SystemPort for SystemAdapter {
    fn reset_requested(&mut self) -> bool {
        // SAFETY: register read of an already-configured input pin.
        let held = unsafe { gpio_get_level(pins::RESET_TRIGGER_GPIO) } == 0;
        if held {
            warn!("System: reset trigger held at boot");
        }
        held
    }

    fn restart(&mut self) {
        info!("System: restarting");
        // SAFETY: esp_restart never returns.
        unsafe { esp_restart() };
    }
}

#[cfg(not(target_os = "espidf"))]
impl SystemAdapter {
    /// Simulation: `reset_asserted` is what the trigger reads at boot.
    pub fn new(reset_asserted: bool) -> Self {
        Self {
            reset_asserted,
            restarts: 0,
        }
    }

    /// Restarts requested so far.
    pub fn restarts(&self) -> u32 {
        self.restarts
    }
}

#[cfg(not(target_os = "espidf"))]
impl SystemPort for SystemAdapter {
    fn reset_requested(&mut self) -> bool {
        if self.reset_asserted {
            warn!("System(sim): reset trigger held at boot");
        }
        self.reset_asserted
    }

    fn restart(&mut self) {
        self.restarts += 1;
        info!("System(sim): restart #{} requested", self.restarts);
    }
}
