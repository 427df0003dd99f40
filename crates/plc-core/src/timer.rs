//! Timer instances (TON/TOFF/TP) keyed case-insensitively by name.
//!
//! Instances are created lazily by the first execution of their instruction
//! node and synchronized (preset refreshed, new names created disabled) when
//! a program is deployed.

/// Maximum number of live timer instances.
pub const MAX_TIMERS: usize = 10;

/// Timing disciplines supported by timer instruction nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerMode {
    /// On-delay: output rises `preset` ms after the input rises.
    OnDelay,
    /// Off-delay: output holds for `preset` ms after the input falls.
    OffDelay,
    /// Pulse: output holds for `preset` ms from a rising edge, input-agnostic.
    Pulse,
}

/// One live timer instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerInstance {
    name: String,
    mode: TimerMode,
    preset_ms: u64,
    start_ms: u64,
    enabled: bool,
    q: bool,
    remaining_ms: u64,
}

impl TimerInstance {
    fn new(name: String, mode: TimerMode, preset_ms: u64) -> Self {
        Self {
            name,
            mode,
            preset_ms,
            start_ms: 0,
            enabled: false,
            q: false,
            remaining_ms: 0,
        }
    }

    /// Canonical (uppercased) instance name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Timing discipline, fixed at first creation.
    #[must_use]
    pub const fn mode(&self) -> TimerMode {
        self.mode
    }

    /// Configured preset in milliseconds.
    #[must_use]
    pub const fn preset_ms(&self) -> u64 {
        self.preset_ms
    }

    /// Output bit.
    #[must_use]
    pub const fn q(&self) -> bool {
        self.q
    }

    /// True while the timer is actively timing.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Milliseconds left on the running interval (off-delay and pulse).
    #[must_use]
    pub const fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    /// Elapsed run time capped at the preset (on-delay progress view).
    #[must_use]
    pub fn elapsed_capped_ms(&self, now_ms: u64) -> u64 {
        if self.enabled {
            now_ms.saturating_sub(self.start_ms).min(self.preset_ms)
        } else {
            0
        }
    }

    /// Advances the instance by one scan and returns the output bit.
    ///
    /// `signal` is the rung condition reaching the instruction node this
    /// cycle, `prev_signal` the condition of the previous cycle.
    pub fn drive(&mut self, signal: bool, prev_signal: bool, now_ms: u64) -> bool {
        match self.mode {
            TimerMode::OnDelay => self.drive_on_delay(signal, now_ms),
            TimerMode::OffDelay => self.drive_off_delay(signal, prev_signal, now_ms),
            TimerMode::Pulse => self.drive_pulse(signal, prev_signal, now_ms),
        }
    }

    fn drive_on_delay(&mut self, signal: bool, now_ms: u64) -> bool {
        if signal && !self.enabled {
            self.start_ms = now_ms;
            self.enabled = true;
            self.q = false;
        }
        if !signal {
            self.enabled = false;
            self.q = false;
            self.start_ms = 0;
        }
        if self.enabled && now_ms.saturating_sub(self.start_ms) >= self.preset_ms {
            self.q = true;
        }
        self.q
    }

    fn drive_off_delay(&mut self, signal: bool, prev_signal: bool, now_ms: u64) -> bool {
        if signal {
            self.q = true;
            self.enabled = false;
            self.start_ms = 0;
            self.remaining_ms = self.preset_ms;
            return self.q;
        }
        if prev_signal {
            // Falling edge: start the hold-off countdown.
            self.start_ms = now_ms;
            self.enabled = true;
            self.q = true;
        }
        if self.enabled {
            let elapsed = now_ms.saturating_sub(self.start_ms);
            if elapsed >= self.preset_ms {
                self.q = false;
                self.enabled = false;
                self.remaining_ms = 0;
            } else {
                self.q = true;
                self.remaining_ms = self.preset_ms - elapsed;
            }
        } else {
            self.q = false;
            self.remaining_ms = 0;
        }
        self.q
    }

    fn drive_pulse(&mut self, signal: bool, prev_signal: bool, now_ms: u64) -> bool {
        if signal && !prev_signal && !self.enabled {
            self.start_ms = now_ms;
            self.enabled = true;
            self.q = true;
            self.remaining_ms = self.preset_ms;
        }
        if self.enabled {
            // The pulse runs to completion regardless of the input.
            let elapsed = now_ms.saturating_sub(self.start_ms);
            if elapsed >= self.preset_ms {
                self.q = false;
                self.enabled = false;
                self.remaining_ms = 0;
            } else {
                self.q = true;
                self.remaining_ms = self.preset_ms - elapsed;
            }
        }
        self.q
    }

    /// Clears all runtime state, preserving name, mode and preset.
    pub fn clear_runtime(&mut self) {
        self.enabled = false;
        self.q = false;
        self.start_ms = 0;
        self.remaining_ms = 0;
    }
}

/// Capacity-capped collection of timer instances.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerBank {
    timers: Vec<TimerInstance>,
}

impl TimerBank {
    /// Creates an empty bank.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// True when no instances exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Looks up an instance by canonical name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TimerInstance> {
        self.timers.iter().find(|timer| timer.name == name)
    }

    /// Output bit of a named timer; unknown names read as `false`.
    #[must_use]
    pub fn q(&self, name: &str) -> bool {
        self.get(name).is_some_and(TimerInstance::q)
    }

    /// Returns the named instance, creating it when absent. Returns `None`
    /// when the bank is at capacity.
    pub fn get_or_create(
        &mut self,
        name: &str,
        mode: TimerMode,
        preset_ms: u64,
    ) -> Option<&mut TimerInstance> {
        if let Some(index) = self.timers.iter().position(|timer| timer.name == name) {
            return self.timers.get_mut(index);
        }
        if self.timers.len() >= MAX_TIMERS {
            tracing::warn!(name, limit = MAX_TIMERS, "timer capacity reached, instance dropped");
            return None;
        }
        self.timers
            .push(TimerInstance::new(name.to_string(), mode, preset_ms));
        self.timers.last_mut()
    }

    /// Program-deploy synchronization: refreshes the preset of an existing
    /// instance (runtime state untouched) or creates a disabled one.
    pub fn sync(&mut self, name: &str, mode: TimerMode, preset_ms: u64) {
        match self.timers.iter_mut().find(|timer| timer.name == name) {
            Some(timer) => timer.preset_ms = preset_ms,
            None => {
                let _ = self.get_or_create(name, mode, preset_ms);
            }
        }
    }

    /// Clears runtime state of every instance, presets preserved.
    pub fn clear_all_runtime(&mut self) {
        for timer in &mut self.timers {
            timer.clear_runtime();
        }
    }

    /// Clears runtime state of one named instance.
    pub fn clear_runtime(&mut self, name: &str) {
        if let Some(timer) = self.timers.iter_mut().find(|timer| timer.name == name) {
            timer.clear_runtime();
        }
    }

    /// Removes every instance.
    pub fn remove_all(&mut self) {
        self.timers.clear();
    }

    /// Iterates live instances in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &TimerInstance> {
        self.timers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::{TimerBank, TimerMode, MAX_TIMERS};

    #[test]
    fn on_delay_rises_after_preset_and_follows_input_down() {
        let mut bank = TimerBank::new();
        let timer = bank
            .get_or_create("0", TimerMode::OnDelay, 1000)
            .expect("capacity available");

        assert!(!timer.drive(true, false, 0));
        assert!(!timer.drive(true, true, 990));
        assert!(timer.drive(true, true, 1000));
        assert!(timer.drive(true, true, 5000), "output is sticky while input holds");
        assert!(!timer.drive(false, true, 5010), "input drop clears the output");
    }

    #[test]
    fn off_delay_holds_through_the_countdown() {
        let mut bank = TimerBank::new();
        let timer = bank
            .get_or_create("HOLD", TimerMode::OffDelay, 500)
            .expect("capacity available");

        assert!(timer.drive(true, false, 0));
        assert!(timer.drive(false, true, 10), "falling edge starts the countdown");
        assert_eq!(timer.remaining_ms(), 500);
        assert!(timer.drive(false, false, 400));
        assert!(!timer.drive(false, false, 510));
        assert_eq!(timer.remaining_ms(), 0);
    }

    #[test]
    fn pulse_runs_to_completion_regardless_of_input() {
        let mut bank = TimerBank::new();
        let timer = bank
            .get_or_create("1", TimerMode::Pulse, 500)
            .expect("capacity available");

        assert!(timer.drive(true, false, 0));
        assert!(timer.drive(false, true, 10), "input drop does not cut the pulse");
        assert!(timer.drive(false, false, 490));
        assert!(!timer.drive(false, false, 500));
        assert!(
            !timer.drive(true, false, 505),
            "re-trigger requires a fresh rising edge after completion"
        );
    }

    #[test]
    fn pulse_does_not_retrigger_while_input_is_held() {
        let mut bank = TimerBank::new();
        let timer = bank
            .get_or_create("1", TimerMode::Pulse, 100)
            .expect("capacity available");

        assert!(timer.drive(true, false, 0));
        assert!(!timer.drive(true, true, 100));
        assert!(!timer.drive(true, true, 150), "held input cannot restart the pulse");
    }

    #[test]
    fn sync_refreshes_preset_without_touching_runtime() {
        let mut bank = TimerBank::new();
        let timer = bank
            .get_or_create("0", TimerMode::OnDelay, 1000)
            .expect("capacity available");
        timer.drive(true, false, 0);
        assert!(timer.enabled());

        bank.sync("0", TimerMode::OnDelay, 2000);
        let timer = bank.get("0").expect("instance survives sync");
        assert_eq!(timer.preset_ms(), 2000);
        assert!(timer.enabled());

        bank.sync("NEW", TimerMode::Pulse, 50);
        let fresh = bank.get("NEW").expect("sync creates missing instances");
        assert!(!fresh.enabled());
        assert!(!fresh.q());
    }

    #[test]
    fn capacity_overflow_drops_new_instances() {
        let mut bank = TimerBank::new();
        for index in 0..MAX_TIMERS {
            assert!(bank
                .get_or_create(&index.to_string(), TimerMode::OnDelay, 10)
                .is_some());
        }
        assert!(bank.get_or_create("OVERFLOW", TimerMode::OnDelay, 10).is_none());
        assert_eq!(bank.len(), MAX_TIMERS);
    }

    #[test]
    fn runtime_clear_preserves_presets() {
        let mut bank = TimerBank::new();
        let timer = bank
            .get_or_create("0", TimerMode::OnDelay, 300)
            .expect("capacity available");
        timer.drive(true, false, 0);
        timer.drive(true, true, 300);
        assert!(bank.q("0"));

        bank.clear_all_runtime();
        let timer = bank.get("0").expect("instance retained");
        assert!(!timer.q());
        assert!(!timer.enabled());
        assert_eq!(timer.preset_ms(), 300);
    }

    #[test]
    fn unknown_names_read_false() {
        let bank = TimerBank::new();
        assert!(!bank.q("MISSING"));
    }
}
