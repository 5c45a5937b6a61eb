//! Task Watchdog Timer (TWDT) driver.
//!
//! Resets the coordinator if the tick loop stalls.  The loop calls `feed()`
//! once per iteration; a tick that blocks longer than the timeout panics the
//! task and reboots into a fresh registry restore.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::{
    ESP_OK, esp_task_wdt_add, esp_task_wdt_config_t, esp_task_wdt_reconfigure, esp_task_wdt_reset,
};

use log::{info, warn};

pub const DEFAULT_TIMEOUT_MS: u32 = 10_000;

pub struct Watchdog {
    timeout_ms: u32,
    subscribed: bool,
    feeds: u32,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_MS)
    }
}

impl Watchdog {
    /// Configure the TWDT and subscribe the calling task.
    pub fn new(timeout_ms: u32) -> Self {
        let subscribed = Self::subscribe(timeout_ms);
        if subscribed {
            info!("watchdog: armed, {} ms timeout", timeout_ms);
        } else {
            warn!("watchdog: not subscribed, loop stalls will go unnoticed");
        }
        Self {
            timeout_ms,
            subscribed,
            feeds: 0,
        }
    }

    #[cfg(target_os = "espidf")]
    fn subscribe(timeout_ms: u32) -> bool {
        // SAFETY: plain ESP-IDF calls with a valid config; a null task
        // handle subscribes the current task.
        unsafe {
            let cfg = esp_task_wdt_config_t {
                timeout_ms,
                idle_core_mask: 0,
                trigger_panic: true,
            };
            let ret = esp_task_wdt_reconfigure(&cfg);
            if ret != ESP_OK {
                warn!("watchdog: reconfigure returned {} (already configured?)", ret);
            }
            esp_task_wdt_add(core::ptr::null_mut()) == ESP_OK
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn subscribe(_timeout_ms: u32) -> bool {
        true
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// Feeds since boot.
    pub fn feeds(&self) -> u32 {
        self.feeds
    }

    pub fn feed(&mut self) {
        if !self.subscribed {
            return;
        }
        self.feeds = self.feeds.wrapping_add(1);
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: resets the TWDT for the current, subscribed task.
            unsafe {
                esp_task_wdt_reset();
            }
        }
    }
}
