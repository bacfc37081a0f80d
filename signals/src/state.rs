use std::collections::HashMap;

use crate::types::{AlertKey, Regime};

/// Last committed regime per tracked series.
///
/// Lives for one monitoring run and is owned by the loop that evaluates, so it
/// needs no locking.
#[derive(Debug, Default)]
pub struct AlertStateStore {
    regimes: HashMap<AlertKey, Regime>,
}

impl AlertStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &AlertKey) -> Option<Regime> {
        self.regimes.get(key).copied()
    }

    /// Records `regime` and returns the previous one.
    pub fn set(&mut self, key: AlertKey, regime: Regime) -> Option<Regime> {
        self.regimes.insert(key, regime)
    }

    pub fn len(&self) -> usize {
        self.regimes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regimes.is_empty()
    }

    pub fn clear(&mut self) {
        self.regimes.clear();
    }
}
