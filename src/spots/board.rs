use std::fmt;
use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::camera::Frame;

use super::{OccupancyStateCache, OccupancyStatus, SpotLayout, SpotRegion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpotReport {
    pub index: usize,
    pub region: SpotRegion,
    pub status: OccupancyStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct OccupancySummary {
    pub free: usize,
    pub occupied: usize,
    pub unknown: usize,
    pub total: usize,
}

impl fmt::Display for OccupancySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} free", self.free, self.total)
    }
}

/// Read-only view of every spot's status at one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OccupancySnapshot {
    pub frame_index: u64,
    pub spots: Vec<SpotReport>,
    pub summary: OccupancySummary,
}

impl OccupancySnapshot {
    pub fn capture(frame_index: u64, layout: &SpotLayout, cache: &OccupancyStateCache) -> Self {
        let mut summary = OccupancySummary {
            total: layout.len(),
            ..Default::default()
        };

        let spots = layout
            .regions()
            .iter()
            .enumerate()
            .map(|(index, region)| {
                let status = cache.get(index);
                match status {
                    OccupancyStatus::Empty => summary.free += 1,
                    OccupancyStatus::Occupied => summary.occupied += 1,
                    OccupancyStatus::Unknown => summary.unknown += 1,
                }
                SpotReport {
                    index,
                    region: *region,
                    status,
                }
            })
            .collect();

        Self {
            frame_index,
            spots,
            summary,
        }
    }

    pub fn status(&self, index: usize) -> Option<OccupancyStatus> {
        self.spots.get(index).map(|s| s.status)
    }
}

/// Receives the current snapshot for every frame, sampled or not.
pub trait StatusSink {
    fn render(&mut self, frame: &Frame, snapshot: &OccupancySnapshot);
}

/// Shared holder of the most recent snapshot, read by the HTTP API.
#[derive(Clone, Default)]
pub struct StatusBoard {
    latest: Arc<RwLock<Option<OccupancySnapshot>>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: OccupancySnapshot) {
        match self.latest.write() {
            Ok(mut latest) => *latest = Some(snapshot),
            Err(_) => tracing::error!("status board lock poisoned"),
        }
    }

    pub fn latest(&self) -> Option<OccupancySnapshot> {
        self.latest.read().ok()?.clone()
    }

    pub fn summary(&self) -> Option<(u64, OccupancySummary)> {
        let latest = self.latest.read().ok()?;
        latest.as_ref().map(|s| (s.frame_index, s.summary))
    }
}

impl StatusSink for StatusBoard {
    fn render(&mut self, _frame: &Frame, snapshot: &OccupancySnapshot) {
        let changed = self
            .summary()
            .map_or(true, |(_, summary)| summary != snapshot.summary);
        if changed {
            tracing::info!(
                frame = snapshot.frame_index,
                free = snapshot.summary.free,
                occupied = snapshot.summary.occupied,
                total = snapshot.summary.total,
                "occupancy changed: {}",
                snapshot.summary
            );
        }
        self.publish(snapshot.clone());
    }
}
