#![forbid(unsafe_code)]
#![deny(unused)]
#![deny(dead_code)]

mod attributes;
mod counter;
mod metric;
mod registry;
mod text;

pub use attributes::Attributes;
pub use counter::Counter;
pub use metric::Metric;
pub use registry::{Registry, Reporter};
pub use text::TextEncoder;
