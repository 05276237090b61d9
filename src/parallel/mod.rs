pub mod cancel;
pub mod fan_in;

pub use cancel::CancelToken;
pub use fan_in::{Combined, FanIn, FanInOutcome, Fanned, PartitionFailure, PartitionSink};
