//! Resolved backup policy
//!
//! A [`Policy`] is the validated, immutable form of [`Settings`]: the default
//! name template is parsed up front and retention/reboot defaults are typed.
//! Constructing a policy fails on configuration errors, before any provider
//! call is made. Per-resource tag overrides are resolved against the policy
//! at use time; the override wins when present and parseable.

use crate::config::Settings;
use crate::records::{InstanceRecord, VolumeRecord};
use crate::template::{NameTemplate, TemplateError};
use thiserror::Error;

/// Configuration errors fatal to constructing a manager
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid default image name template '{template}'")]
    DefaultTemplate {
        template: String,
        #[source]
        source: TemplateError,
    },
}

/// Errors resolving a per-resource tag override
#[derive(Debug, Error)]
pub enum OverrideError {
    #[error("tag '{tag}' on {resource_id} is not an integer: '{value}'")]
    Retention {
        resource_id: String,
        tag: String,
        value: String,
    },
}

/// Immutable backup/retention policy for one invocation
#[derive(Debug, Clone)]
pub struct Policy {
    pub backup_tag_key: String,
    pub backup_tag_value: String,
    pub image_tag_key: String,
    pub image_tag_value: String,
    pub image_name_tag: String,
    pub managed_tag_key: String,
    pub managed_tag_value: String,
    pub max_keep_images_tag: String,
    pub max_keep_snapshots_tag: String,
    pub reboot_on_image_tag: String,

    pub default_image_name_template: NameTemplate,
    pub default_max_keep_images: usize,
    pub default_max_keep_snapshots: usize,
    pub default_reboot_on_image: bool,

    pub concurrency: usize,
}

impl Policy {
    /// Validate settings into a policy. Fails if the default name template
    /// does not parse.
    pub fn new(settings: &Settings) -> Result<Self, PolicyError> {
        let default_image_name_template = NameTemplate::parse(&settings.default_image_name_format)
            .map_err(|source| PolicyError::DefaultTemplate {
                template: settings.default_image_name_format.clone(),
                source,
            })?;

        Ok(Self {
            backup_tag_key: settings.backup_tag_key.clone(),
            backup_tag_value: settings.backup_tag_value.clone(),
            image_tag_key: settings.image_tag_key.clone(),
            image_tag_value: settings.image_tag_value.clone(),
            image_name_tag: settings.image_name_tag.clone(),
            managed_tag_key: settings.managed_tag_key.clone(),
            managed_tag_value: settings.managed_tag_value.clone(),
            max_keep_images_tag: settings.max_keep_images_tag.clone(),
            max_keep_snapshots_tag: settings.max_keep_snapshots_tag.clone(),
            reboot_on_image_tag: settings.reboot_on_image_tag.clone(),
            default_image_name_template,
            default_max_keep_images: settings.default_max_keep_images,
            default_max_keep_snapshots: settings.default_max_keep_snapshots,
            default_reboot_on_image: settings.default_reboot_on_image,
            concurrency: settings.concurrency.max(1),
        })
    }

    /// Effective snapshot retention for a volume: integer tag override wins,
    /// otherwise the default.
    pub fn max_keep_snapshots(&self, volume: &VolumeRecord) -> Result<usize, OverrideError> {
        match volume.tags.get(&self.max_keep_snapshots_tag) {
            Some(value) => value.parse().map_err(|_| OverrideError::Retention {
                resource_id: volume.volume_id.clone(),
                tag: self.max_keep_snapshots_tag.clone(),
                value: value.to_string(),
            }),
            None => Ok(self.default_max_keep_snapshots),
        }
    }

    /// Effective image retention for an instance: integer tag override wins,
    /// otherwise the default.
    pub fn max_keep_images(&self, instance: &InstanceRecord) -> Result<usize, OverrideError> {
        match instance.tags.get(&self.max_keep_images_tag) {
            Some(value) => value.parse().map_err(|_| OverrideError::Retention {
                resource_id: instance.instance_id.clone(),
                tag: self.max_keep_images_tag.clone(),
                value: value.to_string(),
            }),
            None => Ok(self.default_max_keep_images),
        }
    }

    /// Effective reboot behavior for an instance. An override tag counts as
    /// true only when it equals "true" case-insensitively.
    pub fn reboot_on_image(&self, instance: &InstanceRecord) -> bool {
        match instance.tags.get(&self.reboot_on_image_tag) {
            Some(value) => value.eq_ignore_ascii_case("true"),
            None => self.default_reboot_on_image,
        }
    }

    /// The name template for an instance: per-instance tag override when
    /// present (parsed, so a malformed override is that instance's error),
    /// otherwise the validated default.
    pub fn image_name_template(
        &self,
        instance: &InstanceRecord,
    ) -> Result<NameTemplate, TemplateError> {
        match instance.tags.get(&self.image_name_tag) {
            Some(template) => NameTemplate::parse(template),
            None => Ok(self.default_image_name_template.clone()),
        }
    }
}
