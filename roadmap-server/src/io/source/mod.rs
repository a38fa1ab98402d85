//! Sensor/pose source.

mod tcp_receiver;

pub use tcp_receiver::{ReceiverConfig, ReceiverStats, TcpSensorReceiver};
