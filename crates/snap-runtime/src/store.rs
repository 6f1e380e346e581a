//! Array storage and the copy-in/copy-out protocol.
//!
//! Each array lives in one `Mutex<Vec<f64>>`. Callbacks never see that
//! buffer: before a callback runs, [`ArrayStorage::map_in`] builds a private
//! buffer for each requirement, and after it succeeds
//! [`ArrayStorage::map_out`] merges the buffer back. The mutex is held only
//! for the copy, so tasks on disjoint ranges of one array run concurrently.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use indexmap::IndexMap;
use snap_core::{AccessMode, ArrayDef, ArrayId, ZoneRange};
use snap_task::ReductionOp;

/// Backing storage for one array.
pub(crate) struct ArrayStorage {
    def: Arc<ArrayDef>,
    data: Mutex<Vec<f64>>,
}

impl ArrayStorage {
    fn new(def: Arc<ArrayDef>) -> Self {
        let data = vec![def.fill; def.shape.len()];
        Self {
            def,
            data: Mutex::new(data),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<f64>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build the private buffer a callback sees for `zones` under `access`.
    ///
    /// Read modes copy the current contents; write-discard starts at zero;
    /// reduce starts at the operator identity.
    pub(crate) fn map_in(
        &self,
        zones: ZoneRange,
        access: AccessMode,
        reduction: Option<ReductionOp>,
    ) -> Vec<f64> {
        let range = self.def.shape.element_range(zones);
        match access {
            AccessMode::ReadOnly | AccessMode::ReadWrite => self.lock()[range].to_vec(),
            AccessMode::WriteDiscard => vec![0.0; range.len()],
            AccessMode::Reduce(_) => {
                let identity = reduction.map_or(0.0, |op| op.identity());
                vec![identity; range.len()]
            }
        }
    }

    /// Merge a callback's buffer back into the array.
    pub(crate) fn map_out(
        &self,
        zones: ZoneRange,
        access: AccessMode,
        reduction: Option<ReductionOp>,
        buffer: &[f64],
    ) {
        let range = self.def.shape.element_range(zones);
        match (access, reduction) {
            (AccessMode::ReadOnly, _) => {}
            (AccessMode::ReadWrite | AccessMode::WriteDiscard, _) => {
                self.lock()[range].copy_from_slice(buffer);
            }
            (AccessMode::Reduce(_), Some(op)) => op.fold_into(&mut self.lock()[range], buffer),
            (AccessMode::Reduce(id), None) => {
                tracing::error!(array = %self.def.name, redop = %id, "reduce buffer without operator dropped");
            }
        }
    }

    /// Copy of the whole array.
    pub(crate) fn snapshot(&self) -> Vec<f64> {
        self.lock().clone()
    }
}

/// Every array a runtime owns, by id.
#[derive(Default)]
pub(crate) struct ArrayStore {
    arrays: RwLock<IndexMap<ArrayId, Arc<ArrayStorage>>>,
}

impl ArrayStore {
    /// Allocate storage for `def` and return its id.
    pub(crate) fn create(&self, def: Arc<ArrayDef>) -> ArrayId {
        let mut arrays = self.arrays.write().unwrap_or_else(PoisonError::into_inner);
        let id = ArrayId(arrays.len() as u32);
        arrays.insert(id, Arc::new(ArrayStorage::new(def)));
        id
    }

    pub(crate) fn get(&self, id: ArrayId) -> Option<Arc<ArrayStorage>> {
        self.arrays
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.arrays
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snap_core::ArrayShape;
    use snap_task::{builtin_reductions, SUM_REDUCTION_ID};

    fn storage(fill: f64) -> ArrayStorage {
        let shape = ArrayShape::new([4, 1, 1], 2).unwrap();
        ArrayStorage::new(Arc::new(ArrayDef::new("q", shape).with_fill(fill)))
    }

    #[test]
    fn new_storage_holds_fill_value() {
        let s = storage(-1.0);
        assert_eq!(s.snapshot(), vec![-1.0; 8]);
    }

    #[test]
    fn read_write_round_trips_range() {
        let s = storage(1.0);
        let zones = ZoneRange::new(1, 3);
        let mut buf = s.map_in(zones, AccessMode::ReadWrite, None);
        assert_eq!(buf, vec![1.0; 4]);
        buf.iter_mut().for_each(|v| *v = 9.0);
        s.map_out(zones, AccessMode::ReadWrite, None, &buf);
        assert_eq!(s.snapshot(), vec![1.0, 1.0, 9.0, 9.0, 9.0, 9.0, 1.0, 1.0]);
    }

    #[test]
    fn write_discard_starts_zeroed_and_read_only_never_writes_back() {
        let s = storage(5.0);
        let zones = ZoneRange::new(0, 4);
        assert_eq!(s.map_in(zones, AccessMode::WriteDiscard, None), vec![0.0; 8]);
        s.map_out(zones, AccessMode::ReadOnly, None, &[7.0; 8]);
        assert_eq!(s.snapshot(), vec![5.0; 8]);
    }

    #[test]
    fn reduce_folds_into_existing_contents() {
        let [sum, ..] = builtin_reductions();
        let s = storage(2.0);
        let zones = ZoneRange::new(3, 4);
        let access = AccessMode::Reduce(SUM_REDUCTION_ID);
        let mut buf = s.map_in(zones, access, Some(sum));
        assert_eq!(buf, vec![0.0, 0.0]);
        buf[1] = 3.0;
        s.map_out(zones, access, Some(sum), &buf);
        s.map_out(zones, access, Some(sum), &buf);
        assert_eq!(s.snapshot()[6..], [2.0, 8.0]);
    }

    #[test]
    fn store_assigns_sequential_ids() {
        let store = ArrayStore::default();
        let shape = ArrayShape::new([2, 2, 2], 1).unwrap();
        let a = store.create(Arc::new(ArrayDef::new("a", shape)));
        let b = store.create(Arc::new(ArrayDef::new("b", shape)));
        assert_eq!((a, b), (ArrayId(0), ArrayId(1)));
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(b).unwrap().def.name, "b");
        assert!(store.get(ArrayId(2)).is_none());
    }
}
