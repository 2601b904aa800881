use crate::{
    adapters::ErasedPoisonError,
    domain::Class,
    ports::catalog::{CatalogPort, Error},
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, RwLock},
};
use uuid::Uuid;

/// In-memory class catalog
///
/// Same locking shape as the account ledger: a per-class `Mutex` makes
/// `try_increment` a single check-and-increment step, so N callers racing
/// for the last seat produce exactly one winner.
#[derive(Clone, Debug, Default)]
pub struct MemoryCatalog {
    classes: Arc<RwLock<HashMap<Uuid, Arc<Mutex<Class>>>>>,
}

impl MemoryCatalog {
    fn entry(&self, class_id: Uuid) -> Result<Arc<Mutex<Class>>, Error> {
        self.classes
            .read()?
            .get(&class_id)
            .cloned()
            .ok_or(Error::ClassDoesNotExist(class_id))
    }
}

#[async_trait::async_trait]
impl CatalogPort for MemoryCatalog {
    async fn get_class(&self, class_id: Uuid) -> Result<Class, Error> {
        let entry = self.entry(class_id)?;
        let class = entry.lock()?;
        Ok(class.clone())
    }

    async fn insert_class(&self, class: Class) -> Result<Class, Error> {
        let class_id = class.class_id;
        self.classes
            .write()?
            .insert(class_id, Arc::new(Mutex::new(class.clone())));
        Ok(class)
    }

    async fn find_by_instructor(&self, instructor: &str) -> Result<Vec<Class>, Error> {
        let entries: Vec<_> = self.classes.read()?.values().cloned().collect();
        let mut classes = Vec::new();
        for entry in entries {
            let class = entry.lock()?;
            if class.instructor == instructor {
                classes.push(class.clone());
            }
        }
        Ok(classes)
    }

    async fn try_increment(&self, class_id: Uuid) -> Result<Class, Error> {
        let entry = self.entry(class_id)?;
        let mut class = entry.lock()?;
        // Check-and-increment under the per-class lock: the authoritative
        // capacity enforcement, regardless of what the caller observed.
        if class.current_bookings >= class.capacity {
            return Err(Error::CapacityExceeded {
                class_id,
                capacity: class.capacity,
            });
        }
        class.current_bookings += 1;
        Ok(class.clone())
    }

    async fn decrement(&self, class_id: Uuid) -> Result<Class, Error> {
        let entry = self.entry(class_id)?;
        let mut class = entry.lock()?;
        if class.current_bookings == 0 {
            return Err(Error::CounterUnderflow(class_id));
        }
        class.current_bookings -= 1;
        Ok(class.clone())
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}
