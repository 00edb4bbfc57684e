/// Index of an occupied entry in a [`SlotTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotHandle(usize);

impl SlotHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Fixed-capacity table of connection slots.
///
/// The table never grows past the capacity it was built with. New entries take
/// the lowest free slot, so handles of departed entries are reused.
#[derive(Debug)]
pub struct SlotTable<T> {
    slots: Vec<Option<T>>,
    occupied: usize,
}

impl<T> SlotTable<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            occupied: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.occupied
    }

    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    pub fn is_full(&self) -> bool {
        self.occupied == self.slots.len()
    }

    /// Stores `value` in the first free slot, handing it back when the table is full.
    pub fn insert(&mut self, value: T) -> Result<SlotHandle, T> {
        let Some(index) = self.slots.iter().position(Option::is_none) else {
            return Err(value);
        };

        self.slots[index] = Some(value);
        self.occupied += 1;
        Ok(SlotHandle(index))
    }

    pub fn get(&self, handle: SlotHandle) -> Option<&T> {
        self.slots.get(handle.0)?.as_ref()
    }

    pub fn get_mut(&mut self, handle: SlotHandle) -> Option<&mut T> {
        self.slots.get_mut(handle.0)?.as_mut()
    }

    pub fn remove(&mut self, handle: SlotHandle) -> Option<T> {
        let value = self.slots.get_mut(handle.0)?.take()?;
        self.occupied -= 1;
        Some(value)
    }

    /// Handle of slot `index` if it is occupied.
    pub fn handle_at(&self, index: usize) -> Option<SlotHandle> {
        self.slots
            .get(index)?
            .as_ref()
            .map(|_| SlotHandle(index))
    }

    pub fn handles(&self) -> Vec<SlotHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| SlotHandle(index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_lowest_free_slot() {
        let mut table = SlotTable::with_capacity(3);

        let a = table.insert("a").unwrap();
        let b = table.insert("b").unwrap();
        let c = table.insert("c").unwrap();
        assert_eq!((a.index(), b.index(), c.index()), (0, 1, 2));
        assert!(table.is_full());

        assert_eq!(table.remove(b), Some("b"));
        assert_eq!(table.len(), 2);

        let d = table.insert("d").unwrap();
        assert_eq!(d.index(), 1);
        assert_eq!(table.get(d), Some(&"d"));
    }

    #[test]
    fn full_table_returns_value() {
        let mut table = SlotTable::with_capacity(1);
        table.insert(1).unwrap();

        assert_eq!(table.insert(2), Err(2));
        assert_eq!(table.len(), 1);
        assert_eq!(table.capacity(), 1);
    }

    #[test]
    fn stale_handles_resolve_to_nothing() {
        let mut table = SlotTable::with_capacity(2);
        let handle = table.insert(String::from("x")).unwrap();

        table.remove(handle);
        assert!(table.get(handle).is_none());
        assert!(table.remove(handle).is_none());
        assert!(table.handle_at(handle.index()).is_none());
        assert!(table.handle_at(7).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn handles_lists_occupied_slots() {
        let mut table = SlotTable::with_capacity(4);
        let handles = (0..4).map(|n| table.insert(n).unwrap()).collect::<Vec<_>>();
        table.remove(handles[1]);
        table.remove(handles[3]);

        assert_eq!(table.handles(), vec![handles[0], handles[2]]);
        *table.get_mut(handles[2]).unwrap() += 10;
        assert_eq!(table.get(handles[2]), Some(&12));
    }
}
