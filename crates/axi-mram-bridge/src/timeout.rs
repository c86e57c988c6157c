//! Device liveness watchdog shared by both controllers.

/// Counts consecutive cycles a controller spends waiting on a busy device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutMonitor {
    count: u32,
    budget: u32,
}

impl TimeoutMonitor {
    #[must_use]
    pub fn new(budget: u32) -> Self {
        Self { count: 0, budget }
    }

    /// Sample one cycle. The counter advances only while some controller is
    /// waiting and the device reports busy; any other cycle clears it.
    pub fn update(&mut self, waiting: bool, busy: bool) {
        if waiting && busy {
            self.count = self.count.saturating_add(1);
        } else {
            self.count = 0;
        }
    }

    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.count >= self.budget
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[must_use]
    pub fn budget(&self) -> u32 {
        self.budget
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}
