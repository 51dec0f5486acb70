//! Conflict Resolution for Sync Operations
//!
//! Decides which side of a tracked pair wins when both exist.
//!
//! ## Overview
//!
//! A local track and its remote object each carry a modification time in
//! milliseconds. The newer one wins:
//! - **Push**: the local track is newer, upload it
//! - **Pull**: the remote object is newer, download it
//! - **NoOp**: equal times, nothing to do
//!
//! The decision looks at the two timestamps only, so it gives the same answer
//! regardless of which pass or which order asks.
//!
//! ## Usage
//!
//! ```
//! use core_sync::conflict_resolver::{ConflictResolver, MergeDirection};
//!
//! assert_eq!(ConflictResolver::resolve(2_000, 1_000), MergeDirection::Push);
//! assert_eq!(ConflictResolver::resolve(1_000, 2_000), MergeDirection::Pull);
//! assert_eq!(ConflictResolver::resolve(1_000, 1_000), MergeDirection::NoOp);
//! ```

use bridge_traits::RemoteObject;
use core_library::models::Track;
use std::cmp::Ordering;

/// Which side a merge copies from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDirection {
    /// Local wins; upload
    Push,
    /// Remote wins; download
    Pull,
    NoOp,
}

/// Stateless last-writer-wins resolver
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver;

impl ConflictResolver {
    pub fn resolve(local_modified: i64, remote_modified: i64) -> MergeDirection {
        match local_modified.cmp(&remote_modified) {
            Ordering::Greater => MergeDirection::Push,
            Ordering::Less => MergeDirection::Pull,
            Ordering::Equal => MergeDirection::NoOp,
        }
    }

    /// Resolve a tracked pair. Tracks shared with the account are pull-only.
    pub fn resolve_track(track: &Track, remote: &RemoteObject) -> MergeDirection {
        match Self::resolve(track.modified_time, remote.modified_time) {
            MergeDirection::Push if track.shared_with_me => MergeDirection::NoOp,
            direction => direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(modified_time: i64) -> RemoteObject {
        RemoteObject {
            id: "f1".to_string(),
            parent_ids: vec!["folder".to_string()],
            title: "Run.kmz".to_string(),
            modified_time,
            trashed: false,
            shared_with_me: false,
            extension: Some("kmz".to_string()),
            download_url: None,
        }
    }

    #[test]
    fn test_resolve_is_symmetric() {
        for (a, b) in [(0, 1), (5, 3), (-1, 7), (i64::MAX, i64::MIN)] {
            let forward = ConflictResolver::resolve(a, b);
            let backward = ConflictResolver::resolve(b, a);
            match forward {
                MergeDirection::Push => assert_eq!(backward, MergeDirection::Pull),
                MergeDirection::Pull => assert_eq!(backward, MergeDirection::Push),
                MergeDirection::NoOp => unreachable!("distinct timestamps"),
            }
        }
        assert_eq!(ConflictResolver::resolve(42, 42), MergeDirection::NoOp);
    }

    #[test]
    fn test_shared_track_never_pushes() {
        let mut track = Track::new("Run".to_string(), vec![1], 2_000);
        assert_eq!(
            ConflictResolver::resolve_track(&track, &remote(1_000)),
            MergeDirection::Push
        );

        track.shared_with_me = true;
        assert_eq!(
            ConflictResolver::resolve_track(&track, &remote(1_000)),
            MergeDirection::NoOp
        );
        assert_eq!(
            ConflictResolver::resolve_track(&track, &remote(3_000)),
            MergeDirection::Pull
        );
    }
}
