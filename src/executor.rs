//! Bounded fan-out over independent units of work
//!
//! Backup and cleanup treat every resource as an independent unit: all units
//! run to completion regardless of sibling failures, and the caller gets a
//! per-unit outcome rather than a single collapsed error. Concurrency is
//! capped so a large fleet does not turn into an unbounded burst of EC2
//! calls.

use anyhow::Result;
use futures::StreamExt;
use futures::stream;
use std::future::Future;

/// Outcome of one unit of work
#[derive(Debug)]
pub struct UnitOutcome {
    /// Identifies the unit, e.g. a volume or instance id
    pub label: String,
    pub result: Result<()>,
}

/// Aggregated outcomes of a fan-out batch
#[derive(Debug, Default)]
pub struct BatchReport {
    outcomes: Vec<UnitOutcome>,
}

impl BatchReport {
    pub fn push(&mut self, label: impl Into<String>, result: Result<()>) {
        self.outcomes.push(UnitOutcome {
            label: label.into(),
            result,
        });
    }

    pub fn merge(&mut self, other: BatchReport) {
        self.outcomes.extend(other.outcomes);
    }

    pub fn outcomes(&self) -> &[UnitOutcome] {
        &self.outcomes
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn is_ok(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Collapse to a single result: `Ok` when every unit succeeded,
    /// otherwise an error naming the failed units.
    pub fn into_result(self) -> Result<()> {
        let failed: Vec<String> = self
            .outcomes
            .iter()
            .filter_map(|o| {
                o.result
                    .as_ref()
                    .err()
                    .map(|e| format!("{}: {e:#}", o.label))
            })
            .collect();

        if failed.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "{} of {} units failed: [{}]",
                failed.len(),
                self.outcomes.len(),
                failed.join("; ")
            )
        }
    }
}

/// Run one unit of work per item, at most `limit` concurrently, and wait for
/// every unit to finish. Unit failures never abort siblings.
pub async fn fan_out<T, F, Fut>(
    limit: usize,
    items: Vec<T>,
    label: impl Fn(&T) -> String,
    work: F,
) -> BatchReport
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let outcomes = stream::iter(items)
        .map(|item| {
            let label = label(&item);
            let fut = work(item);
            async move {
                UnitOutcome {
                    label,
                    result: fut.await,
                }
            }
        })
        .buffer_unordered(limit.max(1))
        .collect::<Vec<_>>()
        .await;

    BatchReport { outcomes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn all_units_run_despite_failures() {
        let completed = Arc::new(AtomicUsize::new(0));

        let report = fan_out(
            4,
            vec![1, 2, 3],
            |n| format!("unit-{n}"),
            |n| {
                let completed = completed.clone();
                async move {
                    if n == 2 {
                        anyhow::bail!("unit 2 broke")
                    }
                    completed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        )
        .await;

        // Units 1 and 3 finished their side effects even though 2 failed
        assert_eq!(completed.load(Ordering::SeqCst), 2);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.failures().next().unwrap().label, "unit-2");
        assert!(report.into_result().is_err());
    }

    #[tokio::test]
    async fn empty_batch_is_ok() {
        let report = fan_out(4, Vec::<u32>::new(), |_| String::new(), |_| async { Ok(()) }).await;
        assert!(report.is_ok());
        assert!(report.into_result().is_ok());
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let report = fan_out(
            2,
            (0..16).collect(),
            |n| n.to_string(),
            |_: u32| {
                let active = active.clone();
                let peak = peak.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        )
        .await;

        assert!(report.is_ok());
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn zero_limit_still_makes_progress() {
        let report = fan_out(0, vec![1], |n| n.to_string(), |_| async { Ok(()) }).await;
        assert!(report.is_ok());
    }

    #[test]
    fn report_collapses_to_error_with_labels() {
        let mut report = BatchReport::default();
        report.push("vol-1", Ok(()));
        report.push("vol-2", Err(anyhow::anyhow!("boom")));
        report.push("vol-3", Err(anyhow::anyhow!("bang")));

        let err = report.into_result().unwrap_err().to_string();
        assert!(err.contains("2 of 3 units failed"));
        assert!(err.contains("vol-2"));
        assert!(err.contains("vol-3"));
    }
}
