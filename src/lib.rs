//! ebs-backup - tag-driven EBS snapshot/AMI backup and retention
//!
//! Discovers volumes and instances marked by tag, snapshots/images them with
//! provenance tags, and prunes old artifacts per a per-resource retention
//! policy. Stateless: the tags on EC2-side resources are the only durable
//! state between invocations.

pub mod aws;
pub mod config;
pub mod executor;
pub mod manager;
pub mod policy;
pub mod records;
pub mod tags;
pub mod template;
