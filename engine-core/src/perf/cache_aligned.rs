//! Cache-line aligned wrapper for values that are hammered by multiple
//! threads, to keep them off a cache line shared with something else
//! (spec §4.12's "last available index" hint for each worker pool).

use std::ops::{Deref, DerefMut};

#[repr(C, align(64))]
pub struct CacheAligned<T>(pub T);

impl<T> CacheAligned<T> {
    pub const fn new(value: T) -> Self {
        CacheAligned(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for CacheAligned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for CacheAligned<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}
