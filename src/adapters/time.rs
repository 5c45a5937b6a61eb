//! Monotonic clock.
//!
//! Every timestamp in the coordinator is milliseconds since boot from this
//! clock.  None of them are wall-clock and none survive a reboot.
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` (µs, monotonic).
//! - **`not(target_os = "espidf")`**: `std::time::Instant` for simulation.

pub struct MonotonicClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Milliseconds since boot.
    #[cfg(target_os = "espidf")]
    pub fn now_ms(&self) -> u64 {
        // SAFETY: reads the free-running high-resolution timer; no state.
        let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
        us.max(0) as u64 / 1_000
    }

    /// Milliseconds since this clock was created.
    #[cfg(not(target_os = "espidf"))]
    pub fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
