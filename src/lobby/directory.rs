//! Room directory kept by the coordinator

use crate::types::RoomInfo;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct RoomDirectory {
    rooms: BTreeMap<String, RoomInfo>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge changed entries by name, dropping removed rooms
    pub fn apply_update(&mut self, update: &[RoomInfo]) {
        for info in update {
            if info.removed {
                self.rooms.remove(&info.name);
            } else {
                self.rooms.insert(info.name.clone(), info.clone());
            }
        }
    }

    /// Replace the whole directory with a full snapshot
    pub fn replace_all(&mut self, snapshot: &[RoomInfo]) {
        self.rooms = snapshot
            .iter()
            .filter(|info| !info.removed)
            .map(|info| (info.name.clone(), info.clone()))
            .collect();
    }

    pub fn get(&self, name: &str) -> Option<&RoomInfo> {
        self.rooms.get(name)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &RoomInfo> {
        self.rooms.values()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
