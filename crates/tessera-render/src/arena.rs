//! Generational arena for tiles
//!
//! Tiles and surfaces are addressed by `TileId`s handed out by this arena.
//! A freed slot bumps its generation, so an id that outlived its tile
//! resolves to nothing instead of to whatever reused the slot.

/// Generational index of a tile (and of the surface backed by it)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    index: u32,
    generation: u32,
}

impl TileId {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Generational arena (slot map)
pub struct GenArena<T> {
    items: Vec<Option<(T, u32)>>,
    free_list: Vec<u32>,
    generations: Vec<u32>,
}

impl<T> GenArena<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            free_list: Vec::new(),
            generations: Vec::new(),
        }
    }

    /// Insert item
    pub fn insert(&mut self, value: T) -> TileId {
        if let Some(index) = self.free_list.pop() {
            let generation = self.generations[index as usize];
            self.items[index as usize] = Some((value, generation));
            TileId { index, generation }
        } else {
            let index = self.items.len() as u32;
            self.items.push(Some((value, 0)));
            self.generations.push(0);
            TileId { index, generation: 0 }
        }
    }

    /// Get item
    pub fn get(&self, id: TileId) -> Option<&T> {
        self.items
            .get(id.index as usize)
            .and_then(|opt| opt.as_ref())
            .filter(|(_, g)| *g == id.generation)
            .map(|(val, _)| val)
    }

    pub fn get_mut(&mut self, id: TileId) -> Option<&mut T> {
        self.items
            .get_mut(id.index as usize)
            .and_then(|opt| opt.as_mut())
            .filter(|(_, g)| *g == id.generation)
            .map(|(val, _)| val)
    }

    pub fn contains(&self, id: TileId) -> bool {
        self.get(id).is_some()
    }

    /// Remove item
    pub fn remove(&mut self, id: TileId) -> Option<T> {
        let slot = self.items.get_mut(id.index as usize)?;
        if !matches!(slot, Some((_, g)) if *g == id.generation) {
            return None;
        }

        let (val, _) = slot.take()?;
        self.generations[id.index as usize] = id.generation.wrapping_add(1);
        self.free_list.push(id.index);
        Some(val)
    }

    pub fn len(&self) -> usize {
        self.items.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for GenArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gen_arena() {
        let mut arena = GenArena::new();
        let idx = arena.insert(42);

        assert_eq!(arena.get(idx), Some(&42));
        arena.remove(idx);
        assert_eq!(arena.get(idx), None);
        assert!(arena.is_empty());
    }

    #[test]
    fn test_stale_id_after_reuse() {
        let mut arena = GenArena::new();
        let old = arena.insert("a");
        arena.remove(old);
        let new = arena.insert("b");

        assert_eq!(old.index(), new.index());
        assert_ne!(old, new);
        assert_eq!(arena.get(old), None);
        assert_eq!(arena.remove(old), None);
        assert_eq!(arena.get_mut(new).map(|v| *v), Some("b"));
        assert_eq!(arena.len(), 1);
    }
}
