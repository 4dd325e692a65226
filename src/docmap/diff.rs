use super::{DocumentMap, RemoteId};

/// Differences between two document maps.
///
/// - `added`: paths present in the new map but not in the old one
/// - `changed`: paths present in both whose content hash or remote id differs,
///   or where either is missing on one side
/// - `removed`: remote ids indexed by the old map but not by the new one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapDiff {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub removed: Vec<RemoteId>,
}

impl MapDiff {
    pub fn between(new: &DocumentMap, old: &DocumentMap) -> Self {
        let mut diff = MapDiff::default();

        for (path, record) in new.iter() {
            match old.get(path) {
                None => diff.added.push(path.to_string()),
                Some(previous) => {
                    // A missing attribute never compares equal
                    let same_hash = matches!(
                        (&record.content_hash, &previous.content_hash),
                        (Some(a), Some(b)) if a == b
                    );
                    let same_id = matches!(
                        (&record.remote_id, &previous.remote_id),
                        (Some(a), Some(b)) if a == b
                    );
                    if !same_hash || !same_id {
                        diff.changed.push(path.to_string());
                    }
                }
            }
        }

        diff.removed = old
            .remote_ids()
            .filter(|id| new.get_by_remote_id(id).is_none())
            .cloned()
            .collect();

        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.changed.len() + self.removed.len()
    }
}
