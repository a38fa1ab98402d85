//! Small process-level helpers.

mod signal;
mod time;

pub use signal::setup_ctrl_c_handler;
pub use time::{now_us, secs_to_us};
