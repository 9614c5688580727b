//! In-memory cache tier over the storage engine.
//!
//! Each cacheable collection is an optional shared list, `None` meaning
//! "not loaded". Reads return the cached `Arc` (an immutable shared view)
//! unless absent or a refresh is forced; writes invalidate coarsely — any
//! patient write drops the whole patients collection, while a message write
//! drops only its conversation's entry. Over-invalidation costs a reload;
//! stale reads cannot happen.
//!
//! All state sits behind `RwLock`s so invalidation is linearized against
//! concurrent readers. Poisoned locks surface as `LockPoisoned`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::db::DatabaseError;
use crate::models::{Message, Patient, Referral, Specialist};

type Slot<T> = RwLock<Option<Arc<Vec<T>>>>;

pub struct Cache {
    patients: Slot<Patient>,
    specialists: Slot<Specialist>,
    referrals: Slot<Referral>,
    /// Messages cached per conversation id.
    conversations: RwLock<HashMap<String, Arc<Vec<Message>>>>,
}

impl Cache {
    pub fn new() -> Self {
        Self {
            patients: RwLock::new(None),
            specialists: RwLock::new(None),
            referrals: RwLock::new(None),
            conversations: RwLock::new(HashMap::new()),
        }
    }

    // ── Read path ────────────────────────────────────────

    pub fn patients<F>(&self, force_refresh: bool, load: F) -> Result<Arc<Vec<Patient>>, DatabaseError>
    where
        F: FnOnce() -> Result<Vec<Patient>, DatabaseError>,
    {
        fetch(&self.patients, force_refresh, load)
    }

    pub fn specialists<F>(
        &self,
        force_refresh: bool,
        load: F,
    ) -> Result<Arc<Vec<Specialist>>, DatabaseError>
    where
        F: FnOnce() -> Result<Vec<Specialist>, DatabaseError>,
    {
        fetch(&self.specialists, force_refresh, load)
    }

    pub fn referrals<F>(
        &self,
        force_refresh: bool,
        load: F,
    ) -> Result<Arc<Vec<Referral>>, DatabaseError>
    where
        F: FnOnce() -> Result<Vec<Referral>, DatabaseError>,
    {
        fetch(&self.referrals, force_refresh, load)
    }

    pub fn conversation<F>(
        &self,
        conversation_id: &str,
        force_refresh: bool,
        load: F,
    ) -> Result<Arc<Vec<Message>>, DatabaseError>
    where
        F: FnOnce() -> Result<Vec<Message>, DatabaseError>,
    {
        if !force_refresh {
            let guard = self
                .conversations
                .read()
                .map_err(|_| DatabaseError::LockPoisoned)?;
            if let Some(cached) = guard.get(conversation_id) {
                return Ok(Arc::clone(cached));
            }
        }
        let mut guard = self
            .conversations
            .write()
            .map_err(|_| DatabaseError::LockPoisoned)?;
        let loaded = Arc::new(load()?);
        guard.insert(conversation_id.to_string(), Arc::clone(&loaded));
        Ok(loaded)
    }

    // ── Invalidation (write path) ────────────────────────

    pub fn invalidate_patients(&self) {
        invalidate(&self.patients);
    }

    pub fn invalidate_specialists(&self) {
        invalidate(&self.specialists);
    }

    pub fn invalidate_referrals(&self) {
        invalidate(&self.referrals);
    }

    /// Drop one conversation's messages; other conversations stay cached.
    pub fn invalidate_conversation(&self, conversation_id: &str) {
        if let Ok(mut guard) = self.conversations.write() {
            guard.remove(conversation_id);
        }
    }

    /// Drop every cached conversation (cascading deletes can touch
    /// messages across conversations).
    pub fn invalidate_conversations(&self) {
        if let Ok(mut guard) = self.conversations.write() {
            guard.clear();
        }
    }

    /// Administrative clear: drop every cached collection.
    pub fn clear(&self) {
        self.invalidate_patients();
        self.invalidate_specialists();
        self.invalidate_referrals();
        if let Ok(mut guard) = self.conversations.write() {
            guard.clear();
        }
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

fn fetch<T, F>(slot: &Slot<T>, force_refresh: bool, load: F) -> Result<Arc<Vec<T>>, DatabaseError>
where
    F: FnOnce() -> Result<Vec<T>, DatabaseError>,
{
    if !force_refresh {
        let guard = slot.read().map_err(|_| DatabaseError::LockPoisoned)?;
        if let Some(cached) = guard.as_ref() {
            return Ok(Arc::clone(cached));
        }
    }
    // Write lock held across the reload so no reader can observe a window
    // between invalidation and the fresh load.
    let mut guard = slot.write().map_err(|_| DatabaseError::LockPoisoned)?;
    let loaded = Arc::new(load()?);
    *guard = Some(Arc::clone(&loaded));
    Ok(loaded)
}

fn invalidate<T>(slot: &Slot<T>) {
    if let Ok(mut guard) = slot.write() {
        *guard = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::Gender;
    use chrono::NaiveDate;

    fn patient(name: &str, mrn: &str) -> Patient {
        Patient::new(
            name,
            mrn,
            NaiveDate::from_ymd_opt(1980, 1, 1).unwrap(),
            Gender::Other,
        )
    }

    #[test]
    fn miss_loads_then_hit_returns_same_list() {
        let cache = Cache::new();
        let first = cache
            .patients(false, || Ok(vec![patient("Ada", "MRN-1")]))
            .unwrap();
        // Second read must not invoke the loader
        let second = cache
            .patients(false, || panic!("loader called on cache hit"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn invalidate_forces_reload() {
        let cache = Cache::new();
        cache
            .patients(false, || Ok(vec![patient("Ada", "MRN-1")]))
            .unwrap();
        cache.invalidate_patients();
        let reloaded = cache
            .patients(false, || {
                Ok(vec![patient("Ada", "MRN-1"), patient("Grace", "MRN-2")])
            })
            .unwrap();
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn force_refresh_bypasses_cache() {
        let cache = Cache::new();
        cache
            .patients(false, || Ok(vec![patient("Ada", "MRN-1")]))
            .unwrap();
        let refreshed = cache.patients(true, || Ok(Vec::new())).unwrap();
        assert!(refreshed.is_empty());
    }

    #[test]
    fn conversation_invalidation_is_per_conversation() {
        let cache = Cache::new();
        cache
            .conversation("conv-a", false, || {
                Ok(vec![Message::new("conv-a", "u1", "hello")])
            })
            .unwrap();
        cache
            .conversation("conv-b", false, || {
                Ok(vec![Message::new("conv-b", "u2", "hi")])
            })
            .unwrap();

        cache.invalidate_conversation("conv-a");

        // conv-b still cached, conv-a reloads
        cache
            .conversation("conv-b", false, || panic!("conv-b was invalidated"))
            .unwrap();
        let reloaded = cache.conversation("conv-a", false, || Ok(Vec::new())).unwrap();
        assert!(reloaded.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let cache = Cache::new();
        cache
            .patients(false, || Ok(vec![patient("Ada", "MRN-1")]))
            .unwrap();
        cache
            .conversation("conv-a", false, || {
                Ok(vec![Message::new("conv-a", "u1", "hello")])
            })
            .unwrap();

        cache.clear();

        let patients = cache.patients(false, || Ok(Vec::new())).unwrap();
        assert!(patients.is_empty());
        let msgs = cache.conversation("conv-a", false, || Ok(Vec::new())).unwrap();
        assert!(msgs.is_empty());
    }

    #[test]
    fn loader_error_leaves_cache_unpopulated() {
        let cache = Cache::new();
        let result = cache.patients(false, || {
            Err(DatabaseError::ConstraintViolation("boom".into()))
        });
        assert!(result.is_err());
        // Next read still goes to the loader
        let loaded = cache
            .patients(false, || Ok(vec![patient("Ada", "MRN-1")]))
            .unwrap();
        assert_eq!(loaded.len(), 1);
    }
}
