//! Nested read evaluation against committed snapshots.

use super::fixtures::{commit, principals, CugFixture};
use crate::cug::nested::get_nested_paths;
use crate::cug::{CugConfig, EffectiveAccess};

// ========== Section 1: Nested Scenarios ==========

#[tokio::test]
async fn test_member_of_outer_and_first_nested_group() {
    let fixture = CugFixture::new();
    let head = fixture.nested_content().await;
    let accessor = principals(&["g1", "g3", "everyone"]);

    let access = |at: &str| fixture.evaluator.has_read_access(head.root(), at, &accessor);
    assert_eq!(access("/content/a"), EffectiveAccess::Granted);
    assert_eq!(access("/content/a/b1"), EffectiveAccess::Granted);
    assert_eq!(access("/content/a/b2"), EffectiveAccess::Denied);
    assert_eq!(access("/content/a/c"), EffectiveAccess::Granted);
}

#[tokio::test]
async fn test_member_of_outer_and_second_nested_group() {
    let fixture = CugFixture::new();
    let head = fixture.nested_content().await;
    let accessor = principals(&["g2", "g3"]);

    let access = |at: &str| fixture.evaluator.has_read_access(head.root(), at, &accessor);
    assert_eq!(access("/content/a/b1"), EffectiveAccess::Denied);
    assert_eq!(access("/content/a/b2"), EffectiveAccess::Granted);
}

#[tokio::test]
async fn test_nested_grant_does_not_require_outer_membership() {
    let fixture = CugFixture::new();
    let head = fixture.nested_content().await;
    let accessor = principals(&["g1"]);

    let access = |at: &str| fixture.evaluator.has_read_access(head.root(), at, &accessor);
    assert_eq!(access("/content/a"), EffectiveAccess::Denied);
    assert_eq!(access("/content/a/b1"), EffectiveAccess::Granted);
    assert_eq!(access("/content/a/b1/deep/child"), EffectiveAccess::Granted);
    assert_eq!(access("/content/a/c"), EffectiveAccess::Denied);
}

#[tokio::test]
async fn test_paths_without_cug_are_not_applicable() {
    let fixture = CugFixture::new();
    let head = fixture.nested_content().await;
    let accessor = principals(&["g1", "g2", "g3"]);

    for at in ["/", "/content", "/content/other", "/content/ab"] {
        assert_eq!(
            fixture.evaluator.has_read_access(head.root(), at, &accessor),
            EffectiveAccess::NotApplicable,
            "{at} is outside every cug"
        );
    }
}

// ========== Section 2: Policy Changes ==========

#[tokio::test]
async fn test_removed_nested_cug_falls_back_to_enclosing_policy() {
    let fixture = CugFixture::new();
    fixture.nested_content().await;

    let mut root = fixture.root().await;
    fixture.policies.remove_policy(&mut root, "/content/a/b1").unwrap();
    let head = commit(&mut root).await;

    assert!(!get_nested_paths(head.root(), "/content/a").contains("b1"));
    let evaluate = |names: &[&str]| {
        fixture
            .evaluator
            .has_read_access(head.root(), "/content/a/b1", &principals(names))
    };
    assert_eq!(evaluate(&["g3"]), EffectiveAccess::Granted);
    assert_eq!(evaluate(&["g1"]), EffectiveAccess::Denied);
}

#[tokio::test]
async fn test_replaced_principals_take_effect_after_commit_only() {
    let fixture = CugFixture::new();
    let before = fixture.nested_content().await;
    let g4 = principals(&["g4"]);

    let mut root = fixture.root().await;
    fixture.policies.set_policy(&mut root, "/content/a", ["g4"]).unwrap();
    assert_eq!(
        fixture.evaluator.has_read_access(before.root(), "/content/a", &g4),
        EffectiveAccess::Denied
    );

    let after = commit(&mut root).await;
    assert_eq!(
        fixture.evaluator.has_read_access(after.root(), "/content/a", &g4),
        EffectiveAccess::Granted
    );
}

#[tokio::test]
async fn test_empty_principal_set_denies_everyone() {
    let fixture = CugFixture::new();
    let mut root = fixture.root().await;
    root.ensure_path("/content/locked").unwrap();
    fixture
        .policies
        .set_policy(&mut root, "/content/locked", Vec::<String>::new())
        .unwrap();
    let head = commit(&mut root).await;

    assert_eq!(
        fixture
            .evaluator
            .has_read_access(head.root(), "/content/locked", &principals(&["everyone"])),
        EffectiveAccess::Denied
    );
}

// ========== Section 3: Configuration ==========

#[tokio::test]
async fn test_excluded_principal_bypasses_cugs() {
    let fixture = CugFixture::with_config(
        CugConfig::default()
            .with_supported_paths(["/content"])
            .with_excluded_principal("administrators"),
    );
    let head = fixture.nested_content().await;

    assert_eq!(
        fixture.evaluator.has_read_access(
            head.root(),
            "/content/a/b1",
            &principals(&["administrators"])
        ),
        EffectiveAccess::NotApplicable
    );
}

#[tokio::test]
async fn test_disabled_evaluation_still_maintains_index() {
    let fixture = CugFixture::with_config(
        CugConfig::default()
            .with_supported_paths(["/content"])
            .with_enabled(false),
    );
    let head = fixture.nested_content().await;

    assert_eq!(get_nested_paths(head.root(), "/content/a").len(), 2);
    assert_eq!(
        fixture
            .evaluator
            .has_read_access(head.root(), "/content/a/b2", &principals(&["g1"])),
        EffectiveAccess::NotApplicable
    );
}
