use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OccupancyStatus {
    #[default]
    Unknown,
    Empty,
    Occupied,
}

impl fmt::Display for OccupancyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OccupancyStatus::Unknown => "unknown",
            OccupancyStatus::Empty => "empty",
            OccupancyStatus::Occupied => "occupied",
        };
        f.write_str(name)
    }
}

/// Last known status of every spot, sized once to the spot count.
#[derive(Debug, Clone)]
pub struct OccupancyStateCache {
    statuses: Vec<OccupancyStatus>,
}

impl OccupancyStateCache {
    pub fn new(spot_count: usize) -> Self {
        Self {
            statuses: vec![OccupancyStatus::Unknown; spot_count],
        }
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn get(&self, index: usize) -> OccupancyStatus {
        self.statuses.get(index).copied().unwrap_or_default()
    }

    /// Overwrites the status at `index` and returns the previous one.
    ///
    /// Returns `None` without storing anything if `index` is not a spot.
    pub fn set(&mut self, index: usize, status: OccupancyStatus) -> Option<OccupancyStatus> {
        let slot = self.statuses.get_mut(index)?;
        Some(std::mem::replace(slot, status))
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, OccupancyStatus)> + '_ {
        self.statuses.iter().copied().enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unknown() {
        let cache = OccupancyStateCache::new(4);
        assert_eq!(cache.len(), 4);
        assert!((0..4).all(|i| cache.get(i) == OccupancyStatus::Unknown));
    }

    #[test]
    fn set_only_touches_one_entry() {
        let mut cache = OccupancyStateCache::new(3);
        let previous = cache.set(1, OccupancyStatus::Occupied);

        assert_eq!(previous, Some(OccupancyStatus::Unknown));
        assert_eq!(cache.get(0), OccupancyStatus::Unknown);
        assert_eq!(cache.get(1), OccupancyStatus::Occupied);
        assert_eq!(cache.get(2), OccupancyStatus::Unknown);
    }

    #[test]
    fn set_overwrites_unconditionally() {
        let mut cache = OccupancyStateCache::new(1);
        cache.set(0, OccupancyStatus::Empty);
        assert_eq!(cache.set(0, OccupancyStatus::Empty), Some(OccupancyStatus::Empty));
        assert_eq!(cache.set(0, OccupancyStatus::Occupied), Some(OccupancyStatus::Empty));
        assert_eq!(cache.get(0), OccupancyStatus::Occupied);
    }

    #[test]
    fn never_grows() {
        let mut cache = OccupancyStateCache::new(2);
        assert_eq!(cache.set(2, OccupancyStatus::Empty), None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(2), OccupancyStatus::Unknown);
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&OccupancyStatus::Occupied).unwrap();
        assert_eq!(json, "\"occupied\"");
    }
}
