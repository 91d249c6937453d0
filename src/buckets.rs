use std::sync::{RwLock, RwLockWriteGuard};

pub const NB_BUCKETS: usize = 255;

#[inline]
pub fn bucket_of(key: u64) -> usize {
    (key % NB_BUCKETS as u64) as usize
}

/// Fixed set of independently locked shards. A key always lands in bucket `key % NB_BUCKETS`.
pub struct Buckets<T> {
    data: [RwLock<T>; NB_BUCKETS],
}

impl<T> Buckets<T> {
    pub fn new<F>(function: F) -> Self
    where
        F: Fn() -> T,
    {
        let data: [RwLock<T>; NB_BUCKETS] = std::array::from_fn(|_i| RwLock::new(function()));
        Self { data }
    }

    pub fn write_bucket(&self, id: usize) -> RwLockWriteGuard<T> {
        self.data[id % NB_BUCKETS]
            .write()
            .expect("could not acquire write lock")
    }

    /// Moves every shard out, leaving `T::default()` behind.
    pub fn take_all(&self) -> Vec<T>
    where
        T: Default,
    {
        self.data
            .iter()
            .map(|chunk| std::mem::take(&mut *chunk.write().expect("could not acquire write lock")))
            .collect()
    }
}
