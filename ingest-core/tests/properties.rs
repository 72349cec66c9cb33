//! Property-based tests for identifier determinism and the threshold policy.

use ingest_core::incremental::updater::should_full_reingest;
use ingest_core::schemas::{commit12, file_doc_id, module_doc_id, repo_doc_id, symbol_doc_id};
use proptest::prelude::*;

proptest! {
    /// Same key ⇒ same identifier, for every document kind.
    #[test]
    fn identifiers_are_deterministic(
        repo in "[a-z]{1,8}/[a-z]{1,8}",
        path in "[a-z]{1,8}(/[a-z]{1,8}){0,3}\\.py",
        name in "[A-Za-z_][A-Za-z0-9_]{0,12}(\\.[a-z_]{1,8})?",
        commit in "[0-9a-f]{7,40}",
    ) {
        prop_assert_eq!(
            symbol_doc_id(&repo, &path, &name, &commit),
            symbol_doc_id(&repo, &path, &name, &commit)
        );
        prop_assert_eq!(
            file_doc_id(&repo, &path, &commit),
            file_doc_id(&repo, &path, &commit)
        );
        prop_assert_eq!(
            module_doc_id(&repo, &path, &commit),
            module_doc_id(&repo, &path, &commit)
        );
        prop_assert_eq!(repo_doc_id(&repo, &commit), repo_doc_id(&repo, &commit));
    }

    /// Identifiers depend only on the first 12 commit characters.
    #[test]
    fn identifiers_use_short_commit(
        repo in "[a-z]{1,8}/[a-z]{1,8}",
        path in "[a-z]{1,8}\\.py",
        prefix in "[0-9a-f]{12}",
        tail_a in "[0-9a-f]{0,28}",
        tail_b in "[0-9a-f]{0,28}",
    ) {
        let commit_a = format!("{prefix}{tail_a}");
        let commit_b = format!("{prefix}{tail_b}");
        prop_assert_eq!(commit12(&commit_a), commit12(&commit_b));
        prop_assert_eq!(
            file_doc_id(&repo, &path, &commit_a),
            file_doc_id(&repo, &path, &commit_b)
        );
    }

    /// Different document kinds never collide on the same location.
    #[test]
    fn kinds_never_collide(
        repo in "[a-z]{1,8}/[a-z]{1,8}",
        path in "[a-z]{1,8}\\.py",
        commit in "[0-9a-f]{12,40}",
    ) {
        let file = file_doc_id(&repo, &path, &commit);
        let module = module_doc_id(&repo, &path, &commit);
        let symbol = symbol_doc_id(&repo, &path, "x", &commit);
        prop_assert_ne!(&file, &module);
        prop_assert_ne!(&file, &symbol);
        prop_assert_ne!(&module, &symbol);
    }

    /// full_reingest ⇔ changed/N > threshold OR stored commit absent.
    #[test]
    fn threshold_policy(
        changed in 0usize..500,
        existing in 0u64..500,
        threshold in 0.0f64..1.0,
        has_stored in any::<bool>(),
    ) {
        let expected = !has_stored
            || (changed as f64 / existing.max(1) as f64) > threshold;
        prop_assert_eq!(
            should_full_reingest(changed, existing, threshold, has_stored),
            expected
        );
    }
}
