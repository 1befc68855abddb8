use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::attributes::{Attributes, assert_legal_key};
use crate::metric::Metric;

/// A set of metrics, there is no global instance, whoever needs one
/// gets it passed in.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    counters: Arc<Mutex<BTreeMap<&'static str, Metric>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a counter, registering the same name again returns the
    /// already registered one.
    pub fn register_counter(&self, name: &'static str, description: &'static str) -> Metric {
        assert_legal_key(name);

        self.counters
            .lock()
            .entry(name)
            .or_insert_with(|| Metric::new(name, description))
            .clone()
    }

    pub fn report(&self, reporter: &mut impl Reporter) {
        let counters = self.counters.lock().values().cloned().collect::<Vec<_>>();

        for metric in counters {
            reporter.start_metric(metric.name, metric.description);
            for (attrs, value) in metric.observe() {
                reporter.report(&attrs, value);
            }
            reporter.finish_metric();
        }
    }
}

pub trait Reporter {
    fn start_metric(&mut self, name: &'static str, description: &'static str);

    fn report(&mut self, attrs: &Attributes, value: u64);

    /// Finish recording a given metric
    fn finish_metric(&mut self);
}
