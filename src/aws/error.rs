//! AWS error classification
//!
//! Cleanup deletes artifacts that may already be gone (a parallel invocation
//! or a human may have removed them). Deleting an absent snapshot or AMI is
//! treated as success; everything else propagates.

/// Known EC2 error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "InvalidSnapshot.NotFound",
    "InvalidAMIID.NotFound",
    "InvalidAMIID.Unavailable",
    "InvalidVolume.NotFound",
    "InvalidInstanceID.NotFound",
];

/// Whether an error chain contains an EC2 "not found" error code.
pub fn is_not_found(error: &anyhow::Error) -> bool {
    use aws_sdk_ec2::error::ProvideErrorMetadata;

    for cause in error.chain() {
        if let Some(e) = cause.downcast_ref::<aws_sdk_ec2::error::SdkError<
            aws_sdk_ec2::operation::delete_snapshot::DeleteSnapshotError,
        >>() {
            return code_is_not_found(ProvideErrorMetadata::code(e));
        }
        if let Some(e) = cause.downcast_ref::<aws_sdk_ec2::error::SdkError<
            aws_sdk_ec2::operation::deregister_image::DeregisterImageError,
        >>() {
            return code_is_not_found(ProvideErrorMetadata::code(e));
        }
    }

    // Fallback for errors that lost their type through context wrapping
    let debug_str = format!("{error:?}");
    NOT_FOUND_CODES.iter().any(|code| debug_str.contains(code))
}

fn code_is_not_found(code: Option<&str>) -> bool {
    code.is_some_and(|c| NOT_FOUND_CODES.contains(&c))
}

/// Map a "not found" error to success, for idempotent deletes.
pub fn ignore_not_found(result: anyhow::Result<()>) -> anyhow::Result<()> {
    match result {
        Err(e) if is_not_found(&e) => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_code_in_debug_fallback() {
        let err = anyhow::anyhow!("SdkError {{ code: \"InvalidSnapshot.NotFound\" }}");
        assert!(is_not_found(&err));
        assert!(ignore_not_found(Err(err)).is_ok());
    }

    #[test]
    fn other_errors_propagate() {
        let err = anyhow::anyhow!("RequestLimitExceeded");
        assert!(!is_not_found(&err));
        assert!(ignore_not_found(Err(anyhow::anyhow!("boom"))).is_err());
        assert!(ignore_not_found(Ok(())).is_ok());
    }

    #[test]
    fn code_matching() {
        assert!(code_is_not_found(Some("InvalidAMIID.NotFound")));
        assert!(!code_is_not_found(Some("Throttling")));
        assert!(!code_is_not_found(None));
    }
}
