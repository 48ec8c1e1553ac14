//! USB oxygen probe: wire codec, status decoding and the request driver.

pub mod driver;
pub mod errors;
pub mod reader;
pub mod watch;
pub mod writer;

pub use driver::ProbeDriver;
pub use errors::SensorFlag;
pub use reader::{PacketReader, ProbeAnswer, ProbeFrame};
pub use writer::PacketWriter;
