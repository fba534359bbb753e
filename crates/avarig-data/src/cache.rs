//! Process-wide cache of loaded reference data.
//!
//! Skeletons are immutable after load and shared behind [`Arc`]. The cache
//! is keyed by data source, rig type, and joint type, and can be cleared
//! when the data files change on disk.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use log::debug;

use crate::appearance::DriverGraph;
use crate::bundled::DataSource;
use crate::error::DataResult;
use crate::skeleton::{JointType, RigType, Skeleton};

type SkeletonKey = (DataSource, RigType, JointType);

#[derive(Default)]
struct Cache {
    skeletons: HashMap<SkeletonKey, Arc<Skeleton>>,
    graphs: HashMap<DataSource, Arc<DriverGraph>>,
}

fn cache() -> MutexGuard<'static, Cache> {
    static CACHE: OnceLock<Mutex<Cache>> = OnceLock::new();
    let lock = CACHE.get_or_init(|| Mutex::new(Cache::default()));
    // A panic while holding the lock leaves plain maps behind; they are
    // still consistent.
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Returns the cached skeleton, loading it on first use.
pub fn skeleton(source: &DataSource, rig: RigType, joint: JointType) -> DataResult<Arc<Skeleton>> {
    let key = (source.clone(), rig, joint);
    if let Some(found) = cache().skeletons.get(&key) {
        return Ok(Arc::clone(found));
    }
    let loaded = Arc::new(source.load_skeleton(rig, joint)?);
    debug!("Cached {} / {} skeleton", rig.as_str(), joint.as_str());
    let mut guard = cache();
    let entry = guard.skeletons.entry(key).or_insert(loaded);
    Ok(Arc::clone(entry))
}

/// Returns the cached driver graph, loading it on first use.
pub fn driver_graph(source: &DataSource) -> DataResult<Arc<DriverGraph>> {
    if let Some(found) = cache().graphs.get(source) {
        return Ok(Arc::clone(found));
    }
    let loaded = Arc::new(source.load_appearance()?);
    let mut guard = cache();
    let entry = guard.graphs.entry(source.clone()).or_insert(loaded);
    Ok(Arc::clone(entry))
}

/// Drops every cached document.
pub fn clear() {
    let mut guard = cache();
    guard.skeletons.clear();
    guard.graphs.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_returns_shared_instance() {
        let a = skeleton(&DataSource::Bundled, RigType::Basic, JointType::Pivot).unwrap();
        let b = skeleton(&DataSource::Bundled, RigType::Basic, JointType::Pivot).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let c = skeleton(&DataSource::Bundled, RigType::Basic, JointType::Pos).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_missing_file_is_not_cached() {
        let source = DataSource::from_dir("/nonexistent-avarig-data");
        assert!(skeleton(&source, RigType::Basic, JointType::Pos).is_err());
        assert!(driver_graph(&source).is_err());
    }
}
