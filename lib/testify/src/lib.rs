pub mod http;
mod portpicker;
mod socket;
pub mod temp;
pub mod wait;

pub use socket::next_addr;
