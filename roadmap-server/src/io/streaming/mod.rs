//! Roadmap sinks: TCP clients and in-process channels.

mod channel_sink;
mod tcp_publisher;

pub use channel_sink::ChannelSink;
pub use tcp_publisher::TcpRoadmapPublisher;
