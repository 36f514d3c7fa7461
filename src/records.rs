//! Domain records for discovered EC2 resources and backup artifacts
//!
//! The AWS client layer converts SDK response types into these records so
//! that manager logic never touches SDK types directly. All records are
//! read-only after discovery.

use crate::tags::TagMap;
use chrono::{DateTime, Utc};

/// An EBS volume marked for snapshot backup
#[derive(Debug, Clone)]
pub struct VolumeRecord {
    pub volume_id: String,
    pub tags: TagMap,
}

/// An EC2 instance marked for image backup
#[derive(Debug, Clone)]
pub struct InstanceRecord {
    pub instance_id: String,
    pub tags: TagMap,
}

/// A managed EBS snapshot, candidate for retention pruning
#[derive(Debug, Clone)]
pub struct SnapshotRecord {
    pub snapshot_id: String,
    /// Snapshot start time; EC2 reports this as a native timestamp.
    pub start_time: DateTime<Utc>,
    pub tags: TagMap,
}

/// A managed AMI, candidate for retention pruning
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub image_id: String,
    pub name: String,
    /// Creation date as EC2 returns it: an RFC 3339 string, parsed only
    /// when cleanup needs to order images.
    pub creation_date: String,
    pub tags: TagMap,
}
