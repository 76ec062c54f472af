//! The persistence walk.
//!
//! Promotion is bottom-up: every non-embedded child is stored before its
//! parent, so a successful store of a parent happens-after the stores of
//! all its children. A reader that observes a parent in the store can
//! therefore load every transitive child (the closure property).

use std::time::Instant;

use lode_cells::{decode, CellError, CellRef, Status, Value};
use lode_types::Hash;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::ContentStore;

/// Promote `r` and its descendants to at least `required` status,
/// writing each newly stored cell's encoding under its hash.
///
/// Idempotent: a ref already at or above `required` is returned
/// unchanged. Embedded refs are terminal and never written, but their
/// children are still walked.
pub fn store_ref(r: &CellRef, required: Status, store: &dyn ContentStore) -> StoreResult<CellRef> {
    store_ref_with(r, required, store, &mut |_| {})
}

/// Like [`store_ref`], invoking `novelty` once for each cell that was
/// actually written (used to drive gossip).
pub fn store_ref_with(
    r: &CellRef,
    required: Status,
    store: &dyn ContentStore,
    novelty: &mut dyn FnMut(&CellRef),
) -> StoreResult<CellRef> {
    store_walk(r, required, store, novelty)?;
    Ok(r.clone())
}

fn store_walk(
    r: &CellRef,
    required: Status,
    store: &dyn ContentStore,
    novelty: &mut dyn FnMut(&CellRef),
) -> StoreResult<()> {
    if r.is_embedded() {
        // Embedded cells live inside their parent's encoding; only their
        // non-embedded descendants need storing.
        let value = r.value()?;
        for i in 0..value.ref_count() {
            store_walk(&value.child_ref(i), required, store, novelty)?;
        }
        return Ok(());
    }
    if r.status() >= required {
        return Ok(());
    }
    let value = match r.cell() {
        Some(v) => v.clone(),
        // Dehydrated but below the required status: load from the store
        // to reach the children.
        None => hydrate(r, store)?,
    };
    for i in 0..value.ref_count() {
        store_walk(&value.child_ref(i), required, store, novelty)?;
    }
    let hash = r.hash();
    if !store.contains(&hash)? {
        store.write(&hash, value.encoding())?;
        debug!(
            hash = %hash.short_hex(),
            bytes = value.encoding().len(),
            "stored novel cell"
        );
        novelty(r);
    }
    r.raise_status(required);
    Ok(())
}

/// Promote only the root cell, assuming children already meet the
/// status requirement.
pub fn store_top_ref(
    r: &CellRef,
    required: Status,
    store: &dyn ContentStore,
) -> StoreResult<CellRef> {
    if r.is_embedded() || r.status() >= required {
        return Ok(r.clone());
    }
    let value = r.value()?;
    let hash = r.hash();
    if !store.contains(&hash)? {
        store.write(&hash, value.encoding())?;
        debug!(hash = %hash.short_hex(), "stored root cell");
    }
    r.raise_status(required);
    Ok(r.clone())
}

/// Persist a value and return its persisted ref.
pub fn persist(value: &Value, store: &dyn ContentStore) -> StoreResult<CellRef> {
    store_ref(&CellRef::direct(value.clone()), Status::Persisted, store)
}

/// Look up a persisted ref by hash: a dehydrated `Persisted` ref when
/// the store holds the hash, `None` on a miss. Callers decide whether a
/// miss is an error.
pub fn ref_for_hash(hash: &Hash, store: &dyn ContentStore) -> StoreResult<Option<CellRef>> {
    if store.contains(hash)? {
        Ok(Some(CellRef::soft(*hash, Status::Persisted)))
    } else {
        Ok(None)
    }
}

/// Read, strictly decode, and verify the cell stored under `hash`.
///
/// A store miss or an expired `deadline` is `MissingData(hash)`
/// (recoverable: fetch and retry); corrupt bytes are `HashMismatch` or
/// `BadFormat` and are never reported as missing data.
pub fn acquire(
    hash: &Hash,
    store: &dyn ContentStore,
    deadline: Option<Instant>,
) -> StoreResult<Value> {
    if let Some(d) = deadline {
        if Instant::now() >= d {
            return Err(CellError::MissingData(*hash).into());
        }
    }
    let bytes = store
        .read(hash)?
        .ok_or(CellError::MissingData(*hash))?;
    let computed = Hash::digest(&bytes);
    if computed != *hash {
        return Err(StoreError::HashMismatch {
            expected: *hash,
            computed,
        });
    }
    let value = decode(&bytes)?;
    debug!(hash = %hash.short_hex(), bytes = bytes.len(), "acquired cell");
    Ok(value)
}

/// Hydrate one dehydrated ref from the store, filling its shared inner
/// state so every holder sees the target.
pub fn hydrate(r: &CellRef, store: &dyn ContentStore) -> StoreResult<Value> {
    if let Some(v) = r.cell() {
        return Ok(v.clone());
    }
    let value = acquire(&r.hash(), store, None)?;
    r.fill(value.clone())?;
    Ok(value)
}

/// Acquire the cell under `hash` and every transitive descendant,
/// leaving the returned tree fully loaded.
pub fn acquire_tree(hash: &Hash, store: &dyn ContentStore) -> StoreResult<Value> {
    let root = acquire(hash, store, None)?;
    hydrate_children(&root, store)?;
    Ok(root)
}

fn hydrate_children(value: &Value, store: &dyn ContentStore) -> StoreResult<()> {
    for i in 0..value.ref_count() {
        let r = value.child_ref(i);
        let child = hydrate(&r, store)?;
        hydrate_children(&child, store)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use lode_cells::{Map, Value, Vector};
    use std::time::Duration;

    /// A value whose tree spans embedded and non-embedded cells; the
    /// root itself is large enough to be stored under its own hash.
    fn sample_state() -> Value {
        let accounts = Map::of((0..40).map(|i| {
            (
                Value::address(i),
                Value::blob(&vec![i as u8; 300 + i as usize]),
            )
        }))
        .unwrap();
        let params = Map::of(
            (0..12).map(|i| (Value::long(i), Value::long(i * 1000))),
        )
        .unwrap();
        let log = Vector::from_values((0..50).map(Value::long)).unwrap();
        Map::of([
            (
                Value::keyword("accounts").unwrap(),
                accounts.into_value(),
            ),
            (Value::keyword("params").unwrap(), params.into_value()),
            (Value::keyword("log").unwrap(), log.into_value()),
            (
                Value::keyword("genesis").unwrap(),
                Value::blob(&[0xAB; 200]),
            ),
        ])
        .unwrap()
        .into_value()
    }

    fn descendant_hashes(value: &Value, out: &mut Vec<Hash>) {
        for i in 0..value.ref_count() {
            let r = value.child_ref(i);
            let child = r.value().unwrap();
            if !child.is_embedded() {
                out.push(r.hash());
            }
            descendant_hashes(&child, out);
        }
    }

    // -----------------------------------------------------------------------
    // Closure property
    // -----------------------------------------------------------------------

    #[test]
    fn persist_stores_every_non_embedded_descendant() {
        let store = InMemoryStore::new();
        let state = sample_state();
        assert!(!state.is_embedded());
        let root = persist(&state, &store).unwrap();
        assert_eq!(root.status(), Status::Persisted);

        let mut hashes = vec![root.hash()];
        descendant_hashes(&state, &mut hashes);
        for h in hashes {
            assert!(store.contains(&h).unwrap(), "missing descendant {h}");
        }
    }

    #[test]
    fn persisted_tree_is_recoverable_by_hash() {
        let store = InMemoryStore::new();
        let state = sample_state();
        let root = persist(&state, &store).unwrap();

        let recovered = acquire_tree(&root.hash(), &store).unwrap();
        assert_eq!(recovered, state);
        // Spot-check deep content through the recovered tree.
        let accounts = recovered
            .as_map()
            .unwrap()
            .get(&Value::keyword("accounts").unwrap())
            .unwrap()
            .unwrap();
        let blob = accounts
            .as_map()
            .unwrap()
            .get(&Value::address(7))
            .unwrap()
            .unwrap();
        assert_eq!(blob.as_blob().unwrap().count(), 307);
    }

    #[test]
    fn persist_is_idempotent() {
        let store = InMemoryStore::new();
        let state = sample_state();
        persist(&state, &store).unwrap();
        let count = store.len();

        let mut novel = 0;
        store_ref_with(
            &CellRef::direct(state),
            Status::Persisted,
            &store,
            &mut |_| novel += 1,
        )
        .unwrap();
        assert_eq!(novel, 0);
        assert_eq!(store.len(), count);
    }

    // -----------------------------------------------------------------------
    // Novelty
    // -----------------------------------------------------------------------

    #[test]
    fn novelty_fires_once_per_stored_cell() {
        let store = InMemoryStore::new();
        let state = sample_state();
        let mut novel = Vec::new();
        store_ref_with(
            &CellRef::direct(state),
            Status::Persisted,
            &store,
            &mut |r| novel.push(r.hash()),
        )
        .unwrap();
        assert_eq!(novel.len(), store.len());
        novel.sort();
        novel.dedup();
        assert_eq!(novel.len(), store.len());
    }

    #[test]
    fn embedded_root_stores_only_descendants() {
        // A small map holding one big blob: the root inlines into any
        // parent, so it is never written itself, but its non-embedded
        // child still is.
        let store = InMemoryStore::new();
        let blob = Value::blob(&[9u8; 500]);
        let blob_hash = blob.hash();
        let root = Map::of([(Value::keyword("data").unwrap(), blob)])
            .unwrap()
            .into_value();
        assert!(root.is_embedded());

        let r = persist(&root, &store).unwrap();
        assert_eq!(r.status(), Status::Embedded);
        assert_eq!(store.len(), 1);
        assert!(store.contains(&blob_hash).unwrap());
        assert!(!store.contains(&root.hash()).unwrap());
    }

    #[test]
    fn store_top_ref_skips_children() {
        let store = InMemoryStore::new();
        let state = sample_state();
        let r = CellRef::direct(state);
        store_top_ref(&r, Status::Stored, &store).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.contains(&r.hash()).unwrap());
    }

    // -----------------------------------------------------------------------
    // Lookup / acquire
    // -----------------------------------------------------------------------

    #[test]
    fn ref_for_hash_hit_and_miss() {
        let store = InMemoryStore::new();
        let value = Value::blob(&[3u8; 400]);
        let root = persist(&value, &store).unwrap();

        let found = ref_for_hash(&root.hash(), &store).unwrap().unwrap();
        assert_eq!(found.status(), Status::Persisted);
        assert!(found.is_missing());
        assert_eq!(found.hash(), root.hash());

        let absent = Value::blob(&[4u8; 400]).hash();
        assert!(ref_for_hash(&absent, &store).unwrap().is_none());
    }

    #[test]
    fn acquire_miss_is_missing_data() {
        let store = InMemoryStore::new();
        let hash = Value::long(1).hash();
        let err = acquire(&hash, &store, None).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Cell(CellError::MissingData(h)) if h == hash
        ));
    }

    #[test]
    fn acquire_honours_deadline() {
        let store = InMemoryStore::new();
        let value = Value::blob(&[5u8; 400]);
        let root = persist(&value, &store).unwrap();

        let expired = Instant::now() - Duration::from_millis(1);
        let err = acquire(&root.hash(), &store, Some(expired)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Cell(CellError::MissingData(_))
        ));

        let future = Instant::now() + Duration::from_secs(60);
        assert!(acquire(&root.hash(), &store, Some(future)).is_ok());
    }

    #[test]
    fn acquire_detects_corruption() {
        struct LyingStore;
        impl ContentStore for LyingStore {
            fn write(&self, _: &Hash, _: &[u8]) -> StoreResult<()> {
                Ok(())
            }
            fn read(&self, _: &Hash) -> StoreResult<Option<Vec<u8>>> {
                Ok(Some(Value::long(99).encoding().to_vec()))
            }
            fn contains(&self, _: &Hash) -> StoreResult<bool> {
                Ok(true)
            }
        }
        let wanted = Value::long(1).hash();
        let err = acquire(&wanted, &LyingStore, None).unwrap_err();
        assert!(matches!(err, StoreError::HashMismatch { .. }));
    }

    // -----------------------------------------------------------------------
    // Rehydration and re-persistence
    // -----------------------------------------------------------------------

    #[test]
    fn decoded_root_promotes_soft_children() {
        let store = InMemoryStore::new();
        let state = sample_state();
        let root = persist(&state, &store).unwrap();

        // Decode the root from raw bytes: children come back dehydrated
        // at `Stored` status.
        let raw = store.read(&root.hash()).unwrap().unwrap();
        let reloaded = decode(&raw).unwrap();

        // Promoting the decoded root to `Persisted` hydrates each soft
        // child through the store and raises it in place.
        let r = CellRef::direct(reloaded.clone());
        store_ref(&r, Status::Persisted, &store).unwrap();
        for i in 0..reloaded.ref_count() {
            let child = reloaded.child_ref(i);
            if !child.is_embedded() {
                assert_eq!(child.status(), Status::Persisted);
            }
        }
        let recovered = acquire_tree(&root.hash(), &store).unwrap();
        assert_eq!(recovered, state);
    }

    #[test]
    fn hydrate_fills_shared_ref() {
        let store = InMemoryStore::new();
        let state = sample_state();
        let root = persist(&state, &store).unwrap();

        let raw = store.read(&root.hash()).unwrap().unwrap();
        let reloaded = decode(&raw).unwrap();
        let map = reloaded.as_map().unwrap();
        let key = Value::keyword("accounts").unwrap();

        // The child is dehydrated until hydrated through its ref.
        assert!(matches!(
            map.get(&key),
            Err(CellError::MissingData(_))
        ));
        for i in 0..reloaded.ref_count() {
            hydrate(&reloaded.child_ref(i), &store).unwrap();
        }
        assert!(map.get(&key).unwrap().is_some());
    }
}
