//! Backup and retention manager
//!
//! The manager ties the whole flow together: [`BackupManager::search`]
//! discovers tagged volumes and instances, [`BackupManager::backup`] creates
//! snapshots/images with provenance tags, and [`BackupManager::cleanup`]
//! prunes artifacts beyond each resource's retention count.
//!
//! `backup` and `cleanup` take a [`Discovered`] value, which only `search`
//! can produce. That makes the search-before-backup sequencing a type-level
//! invariant instead of a calling convention: discovery lists are written
//! once and read-only afterwards.

use crate::aws::{Ec2Backup, ignore_not_found};
use crate::executor::{BatchReport, fan_out};
use crate::policy::Policy;
use crate::records::{ImageRecord, InstanceRecord, SnapshotRecord, VolumeRecord};
use crate::tags::{INSTANCE_ID_TAG, VOLUME_ID_TAG};
use crate::template::{NameTemplate, RenderContext, TemplateError};
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// A discovered instance with its name template resolved at discovery time.
///
/// The override template (if any) is parsed during search so a malformed
/// override fails fast, before any provider mutation. The parse failure is
/// carried here and becomes that instance's unit error during backup.
#[derive(Debug, Clone)]
pub struct InstancePlan {
    pub record: InstanceRecord,
    name_template: Result<NameTemplate, TemplateError>,
}

/// Resources discovered by one search invocation. Read-only.
#[derive(Debug, Default)]
pub struct Discovered {
    volumes: Vec<VolumeRecord>,
    instances: Vec<InstancePlan>,
}

impl Discovered {
    pub fn volumes(&self) -> &[VolumeRecord] {
        &self.volumes
    }

    pub fn instances(&self) -> impl Iterator<Item = &InstanceRecord> {
        self.instances.iter().map(|p| &p.record)
    }
}

/// Manages snapshot/image backups of tagged EC2 resources
pub struct BackupManager<C> {
    client: C,
    policy: Policy,
}

impl<C: Ec2Backup> BackupManager<C> {
    pub fn new(client: C, policy: Policy) -> Self {
        Self { client, policy }
    }

    /// Discover volumes and instances marked for backup.
    ///
    /// Both queries run concurrently; if one fails the other still completes,
    /// and the first observed error is returned.
    pub async fn search(&self) -> Result<Discovered> {
        info!(
            tag = %self.policy.backup_tag_key,
            value = %self.policy.backup_tag_value,
            "Searching for volumes to back up"
        );
        info!(
            tag = %self.policy.image_tag_key,
            value = %self.policy.image_tag_value,
            "Searching for instances to back up"
        );

        let (volumes, instances) = tokio::join!(
            self.client
                .list_volumes_by_tag(&self.policy.backup_tag_key, &self.policy.backup_tag_value),
            self.client
                .list_instances_by_tag(&self.policy.image_tag_key, &self.policy.image_tag_value),
        );

        let (volumes, instances) = match (volumes, instances) {
            (Ok(v), Ok(i)) => (v, i),
            (Err(e), _) | (_, Err(e)) => return Err(e).context("Resource discovery failed"),
        };

        let instances = instances
            .into_iter()
            .map(|record| {
                let name_template = self.policy.image_name_template(&record);
                if let Err(e) = &name_template {
                    warn!(
                        instance_id = %record.instance_id,
                        error = %e,
                        "Instance has a malformed image name template override"
                    );
                }
                InstancePlan {
                    record,
                    name_template,
                }
            })
            .collect::<Vec<_>>();

        info!(
            volumes = volumes.len(),
            instances = instances.len(),
            "Discovery complete"
        );

        Ok(Discovered { volumes, instances })
    }

    /// Back up every discovered resource: snapshot each volume, image each
    /// instance, and tag the artifacts with the managed marker plus a
    /// back-reference to their source. Unit failures are isolated.
    pub async fn backup(&self, discovered: &Discovered) -> BatchReport {
        let limit = self.policy.concurrency;

        let (mut volumes, instances) = tokio::join!(
            fan_out(
                limit,
                discovered.volumes.iter().collect(),
                |v: &&VolumeRecord| v.volume_id.clone(),
                |v| self.backup_volume(v),
            ),
            fan_out(
                limit,
                discovered.instances.iter().collect(),
                |p: &&InstancePlan| p.record.instance_id.clone(),
                |p| self.backup_instance(p),
            ),
        );

        volumes.merge(instances);
        volumes
    }

    async fn backup_volume(&self, volume: &VolumeRecord) -> Result<()> {
        let snapshot_id = self.client.create_snapshot(&volume.volume_id).await?;
        info!(
            snapshot_id = %snapshot_id,
            volume_id = %volume.volume_id,
            "Created snapshot"
        );

        self.client
            .create_tags(
                &snapshot_id,
                self.provenance_tags(VOLUME_ID_TAG, &volume.volume_id),
            )
            .await?;
        info!(snapshot_id = %snapshot_id, "Tagged snapshot");
        Ok(())
    }

    async fn backup_instance(&self, plan: &InstancePlan) -> Result<()> {
        let instance = &plan.record;
        let template = plan.name_template.as_ref().map_err(|e| {
            anyhow!(e.clone()).context(format!(
                "Invalid image name template override on instance '{}'",
                instance.instance_id
            ))
        })?;

        let name = template.render(&RenderContext::now(instance.tags.name()));
        let reboot = self.policy.reboot_on_image(instance);

        let image_id = self
            .client
            .create_image(&instance.instance_id, &name, !reboot)
            .await?;
        info!(
            image_id = %image_id,
            name = %name,
            instance_id = %instance.instance_id,
            reboot,
            "Created image"
        );

        self.client
            .create_tags(
                &image_id,
                self.provenance_tags(INSTANCE_ID_TAG, &instance.instance_id),
            )
            .await?;
        info!(image_id = %image_id, "Tagged image");
        Ok(())
    }

    /// Prune artifacts beyond each resource's retention count. Snapshot and
    /// image cleanup run concurrently, each fanning out per resource.
    pub async fn cleanup(&self, discovered: &Discovered) -> BatchReport {
        let (mut snapshots, images) = tokio::join!(
            self.cleanup_snapshots(discovered),
            self.cleanup_images(discovered),
        );

        snapshots.merge(images);
        snapshots
    }

    async fn cleanup_snapshots(&self, discovered: &Discovered) -> BatchReport {
        info!("Starting cleanup of old EBS snapshots");

        let snapshots = match self
            .client
            .list_snapshots_by_tag(&self.policy.managed_tag_key, &self.policy.managed_tag_value)
            .await
        {
            Ok(snapshots) => snapshots,
            Err(e) => {
                let mut report = BatchReport::default();
                report.push("list-snapshots", Err(e));
                return report;
            }
        };
        let snapshots = &snapshots;

        fan_out(
            self.policy.concurrency,
            discovered.volumes.iter().collect(),
            |v: &&VolumeRecord| v.volume_id.clone(),
            |volume| self.cleanup_volume_snapshots(volume, snapshots),
        )
        .await
    }

    async fn cleanup_volume_snapshots(
        &self,
        volume: &VolumeRecord,
        snapshots: &[SnapshotRecord],
    ) -> Result<()> {
        let max_keep = self.policy.max_keep_snapshots(volume)?;

        let mine: Vec<&SnapshotRecord> = snapshots
            .iter()
            .filter(|s| s.tags.get(VOLUME_ID_TAG) == Some(volume.volume_id.as_str()))
            .collect();
        info!(
            volume_id = %volume.volume_id,
            found = mine.len(),
            max_keep,
            "Snapshot retention check"
        );

        for snapshot in beyond_retention(mine, max_keep, |s| s.start_time) {
            ignore_not_found(self.client.delete_snapshot(&snapshot.snapshot_id).await)?;
            info!(
                snapshot_id = %snapshot.snapshot_id,
                volume_id = %volume.volume_id,
                "Deleted snapshot"
            );
        }
        Ok(())
    }

    async fn cleanup_images(&self, discovered: &Discovered) -> BatchReport {
        info!("Starting cleanup of old images");

        let images = match self
            .client
            .list_images_by_tag(&self.policy.managed_tag_key, &self.policy.managed_tag_value)
            .await
        {
            Ok(images) => images,
            Err(e) => {
                let mut report = BatchReport::default();
                report.push("list-images", Err(e));
                return report;
            }
        };
        let images = &images;

        fan_out(
            self.policy.concurrency,
            discovered.instances.iter().map(|p| &p.record).collect(),
            |i: &&InstanceRecord| i.instance_id.clone(),
            |instance| self.cleanup_instance_images(instance, images),
        )
        .await
    }

    async fn cleanup_instance_images(
        &self,
        instance: &InstanceRecord,
        images: &[ImageRecord],
    ) -> Result<()> {
        let max_keep = self.policy.max_keep_images(instance)?;

        let mine: Vec<&ImageRecord> = images
            .iter()
            .filter(|i| i.tags.get(INSTANCE_ID_TAG) == Some(instance.instance_id.as_str()))
            .collect();
        info!(
            instance_id = %instance.instance_id,
            found = mine.len(),
            max_keep,
            "Image retention check"
        );

        if mine.len() <= max_keep {
            return Ok(());
        }

        // A creation date that fails to parse aborts this instance's sort
        // entirely rather than skipping the one bad image; with a corrupt
        // timestamp the newest-first ordering cannot be trusted, and deleting
        // on an untrusted order could remove a current backup.
        let dated: Vec<(DateTime<Utc>, &ImageRecord)> = mine
            .into_iter()
            .map(|image| {
                let when = DateTime::parse_from_rfc3339(&image.creation_date)
                    .map(|t| t.with_timezone(&Utc))
                    .with_context(|| {
                        format!(
                            "Unparseable creation date '{}' on image '{}'",
                            image.creation_date, image.image_id
                        )
                    })?;
                Ok((when, image))
            })
            .collect::<Result<_>>()?;

        for (_, image) in beyond_retention(dated, max_keep, |(when, _)| *when) {
            ignore_not_found(self.client.deregister_image(&image.image_id).await)?;
            info!(
                image_id = %image.image_id,
                name = %image.name,
                instance_id = %instance.instance_id,
                "Deregistered image"
            );
        }
        Ok(())
    }

    fn provenance_tags(&self, back_ref_key: &str, source_id: &str) -> Vec<(String, String)> {
        vec![
            (
                self.policy.managed_tag_key.clone(),
                self.policy.managed_tag_value.clone(),
            ),
            (back_ref_key.to_string(), source_id.to_string()),
        ]
    }
}

/// Entries past the retention horizon: keep the `max_keep` newest by key
/// (ties preserve input order, the sort is stable) and return the rest.
fn beyond_retention<T, K: Ord>(mut items: Vec<T>, max_keep: usize, key: impl Fn(&T) -> K) -> Vec<T> {
    if items.len() <= max_keep {
        return Vec::new();
    }
    items.sort_by(|a, b| key(b).cmp(&key(a)));
    items.split_off(max_keep)
}
