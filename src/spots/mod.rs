mod board;
mod region;
mod status;

pub use board::{OccupancySnapshot, OccupancySummary, SpotReport, StatusBoard, StatusSink};
pub use region::{
    derive_regions, ComponentStats, ConnectedComponents, RegionError, SpotLayout, SpotRegion,
};
pub use status::{OccupancyStateCache, OccupancyStatus};
