//! Shared access to one instance from several threads.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::acset::Acset;

/// A cloneable handle to an `Acset` behind a single read-write lock.
///
/// Every mutation holds the write lock for its whole duration, so readers
/// never observe a half-applied operation.
#[derive(Debug, Clone)]
pub struct SharedAcset {
    inner: Arc<RwLock<Acset>>,
}

impl SharedAcset {
    pub fn new(acset: Acset) -> Self {
        Self {
            inner: Arc::new(RwLock::new(acset)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&Acset) -> R) -> R {
        f(&self.inner.read())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut Acset) -> R) -> R {
        f(&mut self.inner.write())
    }

    /// Clone the instance out from under the lock.
    pub fn to_acset(&self) -> Acset {
        self.inner.read().clone()
    }

    /// Recover the instance if this is the last handle.
    pub fn try_unwrap(self) -> Result<Acset, Self> {
        Arc::try_unwrap(self.inner)
            .map(RwLock::into_inner)
            .map_err(|inner| Self { inner })
    }
}

impl From<Acset> for SharedAcset {
    fn from(acset: Acset) -> Self {
        Self::new(acset)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use acsets_schema::{Ob, Schema};

    use super::*;

    #[test]
    fn concurrent_writers_serialize() {
        let schema = Arc::new(Schema::builder("Bag").ob(Ob::new("X")).build().unwrap());
        let x = schema.ob_ref("X").unwrap();
        let shared = SharedAcset::new(Acset::new(schema));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        shared.write(|a| a.add_part(x)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(shared.read(|a| a.nparts(x)).unwrap(), 100);
        let acset = shared.try_unwrap().unwrap();
        assert!(acset.check_integrity().ok());
    }
}
