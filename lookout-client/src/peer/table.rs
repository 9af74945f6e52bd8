use lookout_core::PeerId;
use std::collections::HashMap;

/// Handle to a table slot. A key stays invalid forever once its entry is
/// removed, even if the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    index: u32,
    generation: u32,
}

struct Slot<T> {
    generation: u32,
    entry: Option<(PeerId, T)>,
}

/// Arena of per-peer entries with at most one entry per peer id.
pub struct PeerTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    index: HashMap<PeerId, SlotKey>,
}

impl<T> PeerTable<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Inserts an entry for `peer_id`, or returns `None` if one exists.
    pub fn insert_with(&mut self, peer_id: PeerId, make: impl FnOnce(SlotKey) -> T) -> Option<SlotKey> {
        if self.index.contains_key(&peer_id) {
            return None;
        }

        let key = match self.free.pop() {
            Some(index) => SlotKey {
                index,
                generation: self.slots[index as usize].generation,
            },
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: None,
                });
                SlotKey {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };

        self.slots[key.index as usize].entry = Some((peer_id.clone(), make(key)));
        self.index.insert(peer_id, key);
        Some(key)
    }

    fn slot(&self, key: SlotKey) -> Option<&Slot<T>> {
        self.slots
            .get(key.index as usize)
            .filter(|s| s.generation == key.generation)
    }

    pub fn get(&self, key: SlotKey) -> Option<&T> {
        self.slot(key)?.entry.as_ref().map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: SlotKey) -> Option<&mut T> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|s| s.generation == key.generation)?
            .entry
            .as_mut()
            .map(|(_, v)| v)
    }

    pub fn key_of(&self, peer_id: &PeerId) -> Option<SlotKey> {
        self.index.get(peer_id).copied()
    }

    pub fn remove(&mut self, key: SlotKey) -> Option<(PeerId, T)> {
        let slot = self
            .slots
            .get_mut(key.index as usize)
            .filter(|s| s.generation == key.generation)?;
        let (peer_id, value) = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        self.index.remove(&peer_id);
        Some((peer_id, value))
    }

    pub fn keys(&self) -> Vec<SlotKey> {
        self.index.values().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotKey, &PeerId, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            let (peer, value) = s.entry.as_ref()?;
            let key = SlotKey {
                index: i as u32,
                generation: s.generation,
            };
            Some((key, peer, value))
        })
    }
}

impl<T> Default for PeerTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
