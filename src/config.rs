//! Backup policy settings
//!
//! Every setting is a CLI flag with an environment-variable fallback and a
//! hard-coded default, so the tool works unchanged whether it is driven by
//! flags, a scheduler environment, or nothing at all. Settings are parsed
//! once and converted into an immutable [`Policy`](crate::policy::Policy);
//! no other component reads process state.

/// Tag-driven backup and retention settings
#[derive(clap::Args, Debug, Clone)]
pub struct Settings {
    /// Volume tag key that marks a volume for snapshot backup
    #[arg(long, env = "BACKUP_TAG_KEY", default_value = "lambda-ebs-backup/backup")]
    pub backup_tag_key: String,

    /// Volume tag value that marks a volume for snapshot backup
    #[arg(long, env = "BACKUP_TAG_VALUE", default_value = "true")]
    pub backup_tag_value: String,

    /// Instance tag key that marks an instance for image backup
    #[arg(long, env = "IMAGE_TAG_KEY", default_value = "lambda-ebs-backup/image")]
    pub image_tag_key: String,

    /// Instance tag value that marks an instance for image backup
    #[arg(long, env = "IMAGE_TAG_VALUE", default_value = "true")]
    pub image_tag_value: String,

    /// Instance tag key holding a per-instance image name template override
    #[arg(long, env = "IMAGE_NAME_TAG", default_value = "lambda-ebs-backup/image-name")]
    pub image_name_tag: String,

    /// Default image name template ({{.Name}}, {{.Date}}, {{.FullDate}})
    #[arg(
        long,
        env = "DEFAULT_IMAGE_NAME_FORMAT",
        default_value = "{{.Name}}-{{.Date}}"
    )]
    pub default_image_name_format: String,

    /// Instance tag key holding a per-instance image retention override
    #[arg(
        long,
        env = "MAX_KEEP_IMAGES_TAG",
        default_value = "lambda-ebs-backup/max-keep-images"
    )]
    pub max_keep_images_tag: String,

    /// Number of images to keep per instance when no override tag is set
    #[arg(long, env = "DEFAULT_MAX_KEEP_IMAGES", default_value_t = 2)]
    pub default_max_keep_images: usize,

    /// Volume tag key holding a per-volume snapshot retention override
    #[arg(
        long,
        env = "MAX_KEEP_SNAPSHOTS_TAG",
        default_value = "lambda-ebs-backup/max-keep-snapshots"
    )]
    pub max_keep_snapshots_tag: String,

    /// Number of snapshots to keep per volume when no override tag is set
    #[arg(long, env = "DEFAULT_MAX_KEEP_SNAPSHOTS", default_value_t = 2)]
    pub default_max_keep_snapshots: usize,

    /// Instance tag key holding a per-instance reboot-on-image override
    #[arg(
        long,
        env = "REBOOT_ON_IMAGE_TAG",
        default_value = "lambda-ebs-backup/reboot-on-image"
    )]
    pub reboot_on_image_tag: String,

    /// Whether instances reboot during image creation when no override tag is set
    #[arg(
        long,
        env = "DEFAULT_REBOOT_ON_IMAGE",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub default_reboot_on_image: bool,

    /// Tag key applied to every artifact this tool creates
    #[arg(long, env = "MANAGED_TAG_KEY", default_value = "lambda-ebs-backup/managed")]
    pub managed_tag_key: String,

    /// Tag value applied to every artifact this tool creates
    #[arg(long, env = "MANAGED_TAG_VALUE", default_value = "true")]
    pub managed_tag_value: String,

    /// Maximum number of concurrent per-resource operations
    #[arg(long, env = "BACKUP_CONCURRENCY", default_value_t = 16)]
    pub concurrency: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Harness {
        #[command(flatten)]
        settings: Settings,
    }

    #[test]
    fn defaults_match_contract() {
        let args = Harness::parse_from(["test"]).settings;

        assert_eq!(args.backup_tag_key, "lambda-ebs-backup/backup");
        assert_eq!(args.backup_tag_value, "true");
        assert_eq!(args.image_tag_key, "lambda-ebs-backup/image");
        assert_eq!(args.image_tag_value, "true");
        assert_eq!(args.image_name_tag, "lambda-ebs-backup/image-name");
        assert_eq!(args.default_image_name_format, "{{.Name}}-{{.Date}}");
        assert_eq!(args.max_keep_images_tag, "lambda-ebs-backup/max-keep-images");
        assert_eq!(args.default_max_keep_images, 2);
        assert_eq!(
            args.max_keep_snapshots_tag,
            "lambda-ebs-backup/max-keep-snapshots"
        );
        assert_eq!(args.default_max_keep_snapshots, 2);
        assert_eq!(args.reboot_on_image_tag, "lambda-ebs-backup/reboot-on-image");
        assert!(args.default_reboot_on_image);
        assert_eq!(args.managed_tag_key, "lambda-ebs-backup/managed");
        assert_eq!(args.managed_tag_value, "true");
        assert_eq!(args.concurrency, 16);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Harness::parse_from([
            "test",
            "--backup-tag-key",
            "acme/backup",
            "--default-max-keep-snapshots",
            "5",
            "--default-reboot-on-image",
            "false",
        ])
        .settings;

        assert_eq!(args.backup_tag_key, "acme/backup");
        assert_eq!(args.default_max_keep_snapshots, 5);
        assert!(!args.default_reboot_on_image);
    }
}
