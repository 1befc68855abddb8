use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::attributes::Attributes;
use crate::counter::Counter;

/// A named counter family, which holds one `Counter` for each unique set
/// of `Attributes`.
#[derive(Clone, Debug)]
pub struct Metric {
    pub(crate) name: &'static str,
    pub(crate) description: &'static str,
    pub(crate) series: Arc<Mutex<BTreeMap<Attributes, Counter>>>,
}

impl Metric {
    pub(crate) fn new(name: &'static str, description: &'static str) -> Self {
        Metric {
            name,
            description,
            series: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the counter of the series, it will be created if not exists.
    pub fn recorder(&self, attributes: impl Into<Attributes>) -> Counter {
        self.series
            .lock()
            .entry(attributes.into())
            .or_default()
            .clone()
    }

    /// Snapshot of every series and its current value.
    pub fn observe(&self) -> Vec<(Attributes, u64)> {
        self.series
            .lock()
            .iter()
            .map(|(attrs, counter)| (attrs.clone(), counter.fetch()))
            .collect()
    }
}
