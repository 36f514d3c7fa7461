//! EC2 client for backup and retention operations
//!
//! Wraps the AWS SDK behind the [`Ec2Backup`] trait so manager logic can be
//! unit tested against a mock. All methods convert SDK responses into the
//! domain records in [`crate::records`].

use crate::aws::context::AwsContext;
use crate::records::{ImageRecord, InstanceRecord, SnapshotRecord, VolumeRecord};
use crate::tags::TagMap;
use anyhow::{Context, Result};
use aws_sdk_ec2::Client;
use aws_sdk_ec2::types::{Filter, Tag};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Page size for volume/instance discovery
const DISCOVERY_PAGE_SIZE: i32 = 500;

/// Page size for snapshot listing
const SNAPSHOT_PAGE_SIZE: i32 = 1000;

/// Provider operations consumed by the backup manager.
///
/// Abstracted as a trait to enable unit testing of backup/retention logic
/// without hitting real AWS.
#[allow(async_fn_in_trait)] // Internal use only, Send+Sync bounds on trait are sufficient
#[cfg_attr(test, mockall::automock)]
pub trait Ec2Backup: Send + Sync {
    /// List volumes carrying the given tag, following pagination.
    async fn list_volumes_by_tag(&self, key: &str, value: &str) -> Result<Vec<VolumeRecord>>;

    /// List instances carrying the given tag, following pagination.
    async fn list_instances_by_tag(&self, key: &str, value: &str) -> Result<Vec<InstanceRecord>>;

    /// Create a snapshot of a volume, returning the new snapshot id.
    async fn create_snapshot(&self, volume_id: &str) -> Result<String>;

    /// Create an image of an instance, returning the new image id.
    async fn create_image(&self, instance_id: &str, name: &str, no_reboot: bool) -> Result<String>;

    /// Apply tags to a resource.
    async fn create_tags(&self, resource_id: &str, tags: Vec<(String, String)>) -> Result<()>;

    /// List snapshots carrying the given tag, following pagination.
    async fn list_snapshots_by_tag(&self, key: &str, value: &str) -> Result<Vec<SnapshotRecord>>;

    /// List images owned by this account carrying the given tag.
    async fn list_images_by_tag(&self, key: &str, value: &str) -> Result<Vec<ImageRecord>>;

    /// Delete a snapshot.
    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()>;

    /// Deregister an image.
    async fn deregister_image(&self, image_id: &str) -> Result<()>;
}

/// EC2 client for managing backup artifacts
pub struct Ec2Client {
    client: Client,
}

impl Ec2Client {
    /// Create an EC2 client from a pre-loaded AWS context.
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.ec2_client(),
        }
    }
}

fn tag_filter(key: &str, value: &str) -> Filter {
    Filter::builder()
        .name(format!("tag:{key}"))
        .values(value)
        .build()
}

/// Pagination tokens can come back as empty strings; treat those as done.
fn next_page(token: Option<&str>) -> Option<String> {
    token.filter(|t| !t.is_empty()).map(str::to_string)
}

impl Ec2Backup for Ec2Client {
    async fn list_volumes_by_tag(&self, key: &str, value: &str) -> Result<Vec<VolumeRecord>> {
        let mut volumes = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .describe_volumes()
                .filters(tag_filter(key, value))
                .max_results(DISCOVERY_PAGE_SIZE)
                .set_next_token(next_token)
                .send()
                .await
                .context("Failed to describe volumes")?;

            for volume in response.volumes() {
                let Some(volume_id) = volume.volume_id() else {
                    continue;
                };
                volumes.push(VolumeRecord {
                    volume_id: volume_id.to_string(),
                    tags: TagMap::from_ec2(volume.tags()),
                });
            }

            next_token = next_page(response.next_token());
            if next_token.is_none() {
                break;
            }
        }

        debug!(count = volumes.len(), tag = %key, "Found volumes");
        Ok(volumes)
    }

    async fn list_instances_by_tag(&self, key: &str, value: &str) -> Result<Vec<InstanceRecord>> {
        let mut instances = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .describe_instances()
                .filters(tag_filter(key, value))
                .max_results(DISCOVERY_PAGE_SIZE)
                .set_next_token(next_token)
                .send()
                .await
                .context("Failed to describe instances")?;

            for reservation in response.reservations() {
                for instance in reservation.instances() {
                    let Some(instance_id) = instance.instance_id() else {
                        continue;
                    };
                    instances.push(InstanceRecord {
                        instance_id: instance_id.to_string(),
                        tags: TagMap::from_ec2(instance.tags()),
                    });
                }
            }

            next_token = next_page(response.next_token());
            if next_token.is_none() {
                break;
            }
        }

        debug!(count = instances.len(), tag = %key, "Found instances");
        Ok(instances)
    }

    async fn create_snapshot(&self, volume_id: &str) -> Result<String> {
        let response = self
            .client
            .create_snapshot()
            .volume_id(volume_id)
            .send()
            .await
            .with_context(|| format!("Failed to create snapshot of volume '{volume_id}'"))?;

        response
            .snapshot_id()
            .map(str::to_string)
            .context("CreateSnapshot returned no snapshot id")
    }

    async fn create_image(&self, instance_id: &str, name: &str, no_reboot: bool) -> Result<String> {
        let response = self
            .client
            .create_image()
            .instance_id(instance_id)
            .name(name)
            .no_reboot(no_reboot)
            .send()
            .await
            .with_context(|| format!("Failed to create image of instance '{instance_id}'"))?;

        response
            .image_id()
            .map(str::to_string)
            .context("CreateImage returned no image id")
    }

    async fn create_tags(&self, resource_id: &str, tags: Vec<(String, String)>) -> Result<()> {
        let mut request = self.client.create_tags().resources(resource_id);
        for (key, value) in tags {
            request = request.tags(Tag::builder().key(key).value(value).build());
        }

        request
            .send()
            .await
            .with_context(|| format!("Failed to tag resource '{resource_id}'"))?;
        Ok(())
    }

    async fn list_snapshots_by_tag(&self, key: &str, value: &str) -> Result<Vec<SnapshotRecord>> {
        let mut snapshots = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .describe_snapshots()
                .filters(tag_filter(key, value))
                .max_results(SNAPSHOT_PAGE_SIZE)
                .set_next_token(next_token)
                .send()
                .await
                .context("Failed to describe snapshots")?;

            for snapshot in response.snapshots() {
                let Some(snapshot_id) = snapshot.snapshot_id() else {
                    continue;
                };
                let start_time = snapshot
                    .start_time()
                    .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC);

                snapshots.push(SnapshotRecord {
                    snapshot_id: snapshot_id.to_string(),
                    start_time,
                    tags: TagMap::from_ec2(snapshot.tags()),
                });
            }

            next_token = next_page(response.next_token());
            if next_token.is_none() {
                break;
            }
        }

        debug!(count = snapshots.len(), "Found managed snapshots");
        Ok(snapshots)
    }

    async fn list_images_by_tag(&self, key: &str, value: &str) -> Result<Vec<ImageRecord>> {
        let response = self
            .client
            .describe_images()
            .owners("self")
            .filters(tag_filter(key, value))
            .send()
            .await
            .context("Failed to describe images")?;

        let mut images = Vec::new();
        for image in response.images() {
            let Some(image_id) = image.image_id() else {
                continue;
            };
            images.push(ImageRecord {
                image_id: image_id.to_string(),
                name: image.name().unwrap_or_default().to_string(),
                creation_date: image.creation_date().unwrap_or_default().to_string(),
                tags: TagMap::from_ec2(image.tags()),
            });
        }

        debug!(count = images.len(), "Found managed images");
        Ok(images)
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        self.client
            .delete_snapshot()
            .snapshot_id(snapshot_id)
            .send()
            .await
            .with_context(|| format!("Failed to delete snapshot '{snapshot_id}'"))?;
        Ok(())
    }

    async fn deregister_image(&self, image_id: &str) -> Result<()> {
        self.client
            .deregister_image()
            .image_id(image_id)
            .send()
            .await
            .with_context(|| format!("Failed to deregister image '{image_id}'"))?;
        Ok(())
    }
}
