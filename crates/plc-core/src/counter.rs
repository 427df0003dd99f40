//! Counter instances (CTU/CTD) keyed case-insensitively by name.

/// Maximum number of live counter instances.
pub const MAX_COUNTERS: usize = 10;

/// Counting direction of a counter instruction node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterKind {
    /// Counts up from zero; output latches at `current >= preset`.
    Up,
    /// Counts down from the preset; output latches at `current <= 0`.
    Down,
}

/// One live counter instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterInstance {
    name: String,
    kind: CounterKind,
    preset: i32,
    current: i32,
    q: bool,
}

impl CounterInstance {
    fn new(name: String, kind: CounterKind, preset: i32) -> Self {
        let current = match kind {
            CounterKind::Up => 0,
            CounterKind::Down => preset,
        };
        Self {
            name,
            kind,
            preset,
            current,
            q: false,
        }
    }

    /// Canonical (uppercased) instance name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Counting direction, fixed at first creation.
    #[must_use]
    pub const fn kind(&self) -> CounterKind {
        self.kind
    }

    /// Configured preset count.
    #[must_use]
    pub const fn preset(&self) -> i32 {
        self.preset
    }

    /// Current count.
    #[must_use]
    pub const fn current(&self) -> i32 {
        self.current
    }

    /// Output bit; sticky until an explicit reset.
    #[must_use]
    pub const fn q(&self) -> bool {
        self.q
    }

    /// Applies one rising edge of the rung condition and returns the output.
    pub fn count_edge(&mut self) -> bool {
        match self.kind {
            CounterKind::Up => {
                self.current = self.current.saturating_add(1);
                if self.current >= self.preset {
                    self.q = true;
                }
            }
            CounterKind::Down => {
                self.current = self.current.saturating_sub(1);
                if self.current <= 0 {
                    self.q = true;
                }
            }
        }
        self.q
    }

    /// Clears the count and output, preserving name, kind and preset.
    pub fn clear_runtime(&mut self) {
        self.current = 0;
        self.q = false;
    }
}

/// Capacity-capped collection of counter instances.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterBank {
    counters: Vec<CounterInstance>,
}

impl CounterBank {
    /// Creates an empty bank.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// True when no instances exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Looks up an instance by canonical name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CounterInstance> {
        self.counters.iter().find(|counter| counter.name == name)
    }

    /// Output bit of a named counter; unknown names read as `false`.
    #[must_use]
    pub fn q(&self, name: &str) -> bool {
        self.get(name).is_some_and(CounterInstance::q)
    }

    /// Returns the named instance, creating it when absent. Returns `None`
    /// when the bank is at capacity.
    pub fn get_or_create(
        &mut self,
        name: &str,
        kind: CounterKind,
        preset: i32,
    ) -> Option<&mut CounterInstance> {
        if let Some(index) = self.counters.iter().position(|counter| counter.name == name) {
            return self.counters.get_mut(index);
        }
        if self.counters.len() >= MAX_COUNTERS {
            tracing::warn!(name, limit = MAX_COUNTERS, "counter capacity reached, instance dropped");
            return None;
        }
        self.counters
            .push(CounterInstance::new(name.to_string(), kind, preset));
        self.counters.last_mut()
    }

    /// Program-deploy synchronization: refreshes the preset of an existing
    /// instance (count untouched) or creates a fresh one.
    pub fn sync(&mut self, name: &str, kind: CounterKind, preset: i32) {
        match self.counters.iter_mut().find(|counter| counter.name == name) {
            Some(counter) => counter.preset = preset,
            None => {
                let _ = self.get_or_create(name, kind, preset);
            }
        }
    }

    /// Clears count and output of every instance, presets preserved.
    pub fn clear_all_runtime(&mut self) {
        for counter in &mut self.counters {
            counter.clear_runtime();
        }
    }

    /// Clears count and output of one named instance.
    pub fn clear_runtime(&mut self, name: &str) {
        if let Some(counter) = self.counters.iter_mut().find(|counter| counter.name == name) {
            counter.clear_runtime();
        }
    }

    /// Removes every instance.
    pub fn remove_all(&mut self) {
        self.counters.clear();
    }

    /// Iterates live instances in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &CounterInstance> {
        self.counters.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::{CounterBank, CounterKind, MAX_COUNTERS};

    #[test]
    fn up_counter_latches_at_preset() {
        let mut bank = CounterBank::new();
        let counter = bank
            .get_or_create("0", CounterKind::Up, 3)
            .expect("capacity available");

        assert!(!counter.count_edge());
        assert!(!counter.count_edge());
        assert!(counter.count_edge());
        assert_eq!(counter.current(), 3);
        assert!(counter.count_edge(), "output stays latched past the preset");
    }

    #[test]
    fn down_counter_starts_at_preset_and_latches_at_zero() {
        let mut bank = CounterBank::new();
        let counter = bank
            .get_or_create("DN", CounterKind::Down, 2)
            .expect("capacity available");

        assert_eq!(counter.current(), 2);
        assert!(!counter.count_edge());
        assert!(counter.count_edge());
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn runtime_clear_zeroes_count_and_output() {
        let mut bank = CounterBank::new();
        let counter = bank
            .get_or_create("0", CounterKind::Up, 1)
            .expect("capacity available");
        counter.count_edge();
        assert!(bank.q("0"));

        bank.clear_runtime("0");
        let counter = bank.get("0").expect("instance retained");
        assert_eq!(counter.current(), 0);
        assert!(!counter.q());
        assert_eq!(counter.preset(), 1);
    }

    #[test]
    fn sync_refreshes_preset_and_creates_missing_instances() {
        let mut bank = CounterBank::new();
        bank.sync("A", CounterKind::Down, 5);
        assert_eq!(bank.get("A").expect("created").current(), 5);

        bank.sync("A", CounterKind::Down, 9);
        let counter = bank.get("A").expect("retained");
        assert_eq!(counter.preset(), 9);
        assert_eq!(counter.current(), 5, "sync does not disturb the count");
    }

    #[test]
    fn capacity_overflow_drops_new_instances() {
        let mut bank = CounterBank::new();
        for index in 0..MAX_COUNTERS {
            assert!(bank
                .get_or_create(&index.to_string(), CounterKind::Up, 1)
                .is_some());
        }
        assert!(bank.get_or_create("OVERFLOW", CounterKind::Up, 1).is_none());
        assert_eq!(bank.len(), MAX_COUNTERS);
    }

    #[test]
    fn unknown_names_read_false() {
        let bank = CounterBank::new();
        assert!(!bank.q("MISSING"));
    }
}
