//! AWS integration tests - actually call EC2 APIs
//!
//! These tests are marked `#[ignore]` and only run with:
//! ```
//! AWS_PROFILE=your_profile cargo test --test aws_integration -- --ignored
//! ```
//!
//! They are read-only: discovery queries against whatever account the
//! credentials resolve to. No snapshots or images are created or deleted.

use ebs_backup::aws::{AwsContext, Ec2Backup, Ec2Client};

fn test_region() -> Option<String> {
    std::env::var("AWS_REGION").ok()
}

#[tokio::test]
#[ignore = "requires AWS credentials"]
async fn discovery_queries_succeed() {
    let aws = AwsContext::new(test_region().as_deref()).await;
    let client = Ec2Client::from_context(&aws);

    // A tag nothing should carry: both queries must succeed and come back empty
    let volumes = client
        .list_volumes_by_tag("ebs-backup-test/nonexistent", "true")
        .await
        .expect("DescribeVolumes should succeed");
    assert!(volumes.is_empty());

    let instances = client
        .list_instances_by_tag("ebs-backup-test/nonexistent", "true")
        .await
        .expect("DescribeInstances should succeed");
    assert!(instances.is_empty());
}

#[tokio::test]
#[ignore = "requires AWS credentials"]
async fn managed_artifact_queries_succeed() {
    let aws = AwsContext::new(test_region().as_deref()).await;
    let client = Ec2Client::from_context(&aws);

    client
        .list_snapshots_by_tag("ebs-backup-test/nonexistent", "true")
        .await
        .expect("DescribeSnapshots should succeed");

    client
        .list_images_by_tag("ebs-backup-test/nonexistent", "true")
        .await
        .expect("DescribeImages should succeed");
}
