// Acquisition: sensor boundary, per-channel smoothing and classification.
// Raw readings come in once per poll; metric updates come out once per 30 accepted samples.

pub mod aggregator;
pub mod classifier;
pub mod sensor;
pub mod window;

pub use aggregator::{bucket_percentage, Aggregator, Channel, MetricUpdate};
pub use classifier::{classify, AirQuality};
pub use sensor::{Reading, SensorPort, SimulatedSensor};
pub use window::ChannelWindow;
