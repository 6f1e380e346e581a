//! Debug-mode write coverage tracking for write-discard regions.
//!
//! A write-discard region starts zeroed rather than holding the array's
//! prior contents, so an element the callback forgets to write silently
//! becomes zero. [`FullWriteGuard`] tracks which elements were written in
//! debug builds and warns on drop if any were missed. Release builds pay
//! nothing.

/// Guard that tracks write coverage over a region's element buffer.
pub struct FullWriteGuard<'a> {
    data: &'a mut [f64],
    #[cfg(debug_assertions)]
    written: Vec<bool>,
    #[cfg(debug_assertions)]
    task: String,
    #[cfg(debug_assertions)]
    array: String,
}

impl<'a> FullWriteGuard<'a> {
    /// Wrap a mutable element buffer.
    ///
    /// `task` and `array` only appear in the debug-build diagnostic.
    pub fn new(
        data: &'a mut [f64],
        #[cfg_attr(not(debug_assertions), allow(unused_variables))] task: &str,
        #[cfg_attr(not(debug_assertions), allow(unused_variables))] array: &str,
    ) -> Self {
        Self {
            #[cfg(debug_assertions)]
            written: vec![false; data.len()],
            #[cfg(debug_assertions)]
            task: task.to_string(),
            #[cfg(debug_assertions)]
            array: array.to_string(),
            data,
        }
    }

    /// Write one element by local index.
    pub fn write_at(&mut self, index: usize, value: f64) {
        self.data[index] = value;
        #[cfg(debug_assertions)]
        {
            self.written[index] = true;
        }
    }

    /// Fill a contiguous run of elements starting at `start`.
    pub fn fill_run(&mut self, start: usize, values: impl IntoIterator<Item = f64>) {
        for (offset, value) in values.into_iter().enumerate() {
            self.write_at(start + offset, value);
        }
    }

    /// Number of elements in the buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fraction of elements written (always 1.0 in release builds).
    pub fn coverage(&self) -> f64 {
        #[cfg(debug_assertions)]
        {
            if self.data.is_empty() {
                return 1.0;
            }
            let count = self.written.iter().filter(|&&w| w).count();
            count as f64 / self.data.len() as f64
        }
        #[cfg(not(debug_assertions))]
        {
            1.0
        }
    }
}

#[cfg(debug_assertions)]
impl Drop for FullWriteGuard<'_> {
    fn drop(&mut self) {
        let total = self.written.len();
        let count = self.written.iter().filter(|&&w| w).count();
        if count < total {
            tracing::warn!(
                task = %self.task,
                array = %self.array,
                written = count,
                total,
                "write-discard region left partially unwritten"
            );
        }
    }
}
