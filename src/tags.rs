//! EC2 tag handling
//!
//! Every backup artifact is tagged with the managed marker plus a
//! back-reference to the resource it was created from. The back-reference is
//! how cleanup groups snapshots/images by owner.
//!
//! ## Tag Schema
//!
//! | Tag Key | Description |
//! |---------|-------------|
//! | `<managed tag key>` | Marks an artifact as created by this tool |
//! | `lambda-ebs-backup/volume-id` | Source volume of a snapshot |
//! | `lambda-ebs-backup/instance-id` | Source instance of an image |

use std::collections::HashMap;

/// Tag key recording the source volume of a snapshot
pub const VOLUME_ID_TAG: &str = "lambda-ebs-backup/volume-id";

/// Tag key recording the source instance of an image
pub const INSTANCE_ID_TAG: &str = "lambda-ebs-backup/instance-id";

/// Tag key EC2 uses for a resource's display name
pub const NAME_TAG: &str = "Name";

/// A resource's tag set as a key -> value map with lookup-with-default
/// semantics.
#[derive(Debug, Clone, Default)]
pub struct TagMap {
    map: HashMap<String, String>,
}

impl TagMap {
    /// Build a tag map from EC2 SDK tags. Tags missing a key or value are
    /// dropped.
    pub fn from_ec2(tags: &[aws_sdk_ec2::types::Tag]) -> Self {
        tags.iter()
            .filter_map(|t| match (t.key(), t.value()) {
                (Some(k), Some(v)) => Some((k.to_string(), v.to_string())),
                _ => None,
            })
            .collect()
    }

    /// Get the value of a tag, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    /// Get the value of a tag, falling back to a default when absent.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Value of the "Name" tag, or empty string when absent.
    pub fn name(&self) -> &str {
        self.get_or(NAME_TAG, "")
    }
}

impl FromIterator<(String, String)> for TagMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ec2::types::Tag;

    fn tag(key: &str, value: &str) -> Tag {
        Tag::builder().key(key).value(value).build()
    }

    #[test]
    fn lookup_and_default() {
        let tags = TagMap::from_ec2(&[tag("Name", "TestName"), tag("TestKey", "TestValue")]);

        assert_eq!(tags.get("TestKey"), Some("TestValue"));
        assert_eq!(tags.get("MissingKey"), None);
        assert_eq!(tags.get_or("Name", "defaultName"), "TestName");
        assert_eq!(tags.get_or("MissingKey", "defaultValue"), "defaultValue");
    }

    #[test]
    fn name_defaults_to_empty() {
        let tags = TagMap::from_ec2(&[tag("other", "x")]);
        assert_eq!(tags.name(), "");

        let tags = TagMap::from_ec2(&[tag("Name", "web1")]);
        assert_eq!(tags.name(), "web1");
    }

    #[test]
    fn drops_incomplete_sdk_tags() {
        let tags = TagMap::from_ec2(&[Tag::builder().key("orphan-key").build()]);
        assert_eq!(tags.get("orphan-key"), None);
    }

    #[test]
    fn from_pairs() {
        let tags: TagMap = [("a".to_string(), "1".to_string())].into_iter().collect();
        assert_eq!(tags.get("a"), Some("1"));
    }
}
