//! Contract Test: Bulk Replace-Sync
//!
//! Constraints verified:
//! - Any set difference triggers exactly one replace per record type
//! - The replace carries the full desired list in document order
//! - Reported changes are |len(desired) − len(current)|, not an edit count
//! - Set-equal lists trigger nothing
//!
//! If this test fails, bulk reconciliation is broken.

mod common;

use common::*;
use dnssync_core::error::Error;
use dnssync_core::reconciler::Reconciler;
use dnssync_core::SyncStrategy;

#[tokio::test]
async fn differing_sets_issue_single_replace_with_coarse_count() {
    let target = MemoryTarget::new(&["10.0.0.1 a.local", "10.0.0.2 b.local"], &[]);
    let desired = desired(&[("10.0.0.1", "a.local"), ("10.0.0.3", "c.local")], &[]);

    let changes = Reconciler::new(SyncStrategy::Bulk)
        .reconcile(&target, &desired.hosts)
        .await
        .expect("reconcile succeeds");

    assert_eq!(changes, 0, "count is the length delta, 2 desired vs 2 current");
    assert_eq!(
        target.mutation_calls(),
        vec![Call::ReplaceHosts(wire(&["10.0.0.1 a.local", "10.0.0.3 c.local"]))]
    );
}

#[tokio::test]
async fn length_delta_is_reported() {
    let target = MemoryTarget::new(&[], &["alias.local,a.local"]);
    let desired = desired(
        &[],
        &[
            ("alias.local", "a.local"),
            ("www.local", "a.local"),
            ("mail.local", "a.local"),
        ],
    );

    let changes = Reconciler::new(SyncStrategy::Bulk)
        .reconcile(&target, &desired.cnames)
        .await
        .unwrap();

    assert_eq!(changes, 2);
    assert_eq!(target.cnames().len(), 3);
}

#[tokio::test]
async fn empty_document_replaces_with_empty_lists() {
    let target = MemoryTarget::new(&["10.0.0.1 a.local"], &["alias.local,a.local"]);
    let desired = desired(&[], &[]);
    let reconciler = Reconciler::new(SyncStrategy::Bulk);

    reconciler.reconcile(&target, &desired.hosts).await.unwrap();
    reconciler.reconcile(&target, &desired.cnames).await.unwrap();

    assert_eq!(
        target.mutation_calls(),
        vec![Call::ReplaceHosts(Vec::new()), Call::ReplaceCnames(Vec::new())]
    );
}

#[tokio::test]
async fn replace_failure_is_mutation_error() {
    let target = MemoryTarget::new(&["10.0.0.1 a.local"], &[]).failing_mutation_on("hosts");
    let desired = desired(&[("10.0.0.2", "b.local")], &[]);

    let err = Reconciler::new(SyncStrategy::Bulk)
        .reconcile(&target, &desired.hosts)
        .await
        .expect_err("replace fails");

    assert!(matches!(err, Error::Mutation { .. }));
    assert_eq!(target.hosts(), wire(&["10.0.0.1 a.local"]));
}
