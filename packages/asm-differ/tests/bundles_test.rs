//! Bundling behavior across policies, driven through the public API.

use std::collections::HashMap;

use asm_differ::bundles::{
    build_bundle_family, FunctionGroup, IndexT, MatchedFunction, NamedFunction, INVALID_INDEX,
};
use asm_differ::compare_types::{
    ComparisonRecord, InstructionPair, MatchBundleType, MismatchInfo,
};

struct Fixture {
    named: [Vec<NamedFunction>; 2],
    matched: Vec<MatchedFunction>,
    name_map: HashMap<String, IndexT>,
}

/// Matched functions f, g, h present on both sides; no unmatched ones.
fn fixture() -> Fixture {
    let mut named: [Vec<NamedFunction>; 2] = [Vec::new(), Vec::new()];
    let mut matched = Vec::new();
    for (i, name) in ["f", "g", "h"].iter().enumerate() {
        for side_functions in named.iter_mut() {
            side_functions.push(NamedFunction {
                name: name.to_string(),
                matched_index: i as IndexT,
                ..Default::default()
            });
        }
        matched.push(MatchedFunction {
            name: name.to_string(),
            named_indices: [i as IndexT, i as IndexT],
            ..Default::default()
        });
    }
    let name_map = named[0]
        .iter()
        .enumerate()
        .map(|(i, f)| (f.name.clone(), i as IndexT))
        .collect();
    Fixture {
        named,
        matched,
        name_map,
    }
}

fn pdb_style_groups() -> Vec<FunctionGroup> {
    vec![
        FunctionGroup {
            name: "src1".to_string(),
            function_names: vec!["f".to_string(), "g".to_string()],
        },
        FunctionGroup {
            name: "src2".to_string(),
            function_names: vec!["h".to_string()],
        },
    ]
}

#[test]
fn source_file_bundling_yields_two_bundles() {
    let fx = fixture();
    let family = build_bundle_family(
        MatchBundleType::SourceFile,
        &pdb_style_groups(),
        &fx.named,
        &fx.matched,
        &fx.name_map,
        0,
    );
    assert_eq!(family.bundles.len(), 2);
    assert_eq!(family.bundles[0].matched_indices.len(), 2);
    assert_eq!(family.bundles[1].matched_indices.len(), 1);
}

#[test]
fn none_bundling_yields_single_all_bundle() {
    let fx = fixture();
    let family = build_bundle_family(
        MatchBundleType::None,
        &pdb_style_groups(), // ignored by this policy
        &fx.named,
        &fx.matched,
        &fx.name_map,
        0,
    );
    assert_eq!(family.bundles.len(), 1);
    assert_eq!(family.bundles[0].name, "all");
    assert_eq!(family.bundles[0].matched_indices, vec![0, 1, 2]);
}

#[test]
fn every_function_lands_in_exactly_one_bundle_with_none() {
    let mut fx = fixture();
    fx.named[0].push(NamedFunction {
        name: "left_only".to_string(),
        matched_index: INVALID_INDEX,
        ..Default::default()
    });
    let family = build_bundle_family(
        MatchBundleType::None,
        &[],
        &fx.named,
        &fx.matched,
        &fx.name_map,
        0,
    );
    let bundle = &family.bundles[0];
    let mut seen: Vec<(usize, IndexT)> = Vec::new();
    for &matched_idx in &bundle.matched_indices {
        let m = &fx.matched[matched_idx as usize];
        seen.push((0, m.named_indices[0]));
        seen.push((1, m.named_indices[1]));
    }
    for (side, unmatched) in bundle.unmatched_indices.iter().enumerate() {
        for &idx in unmatched {
            seen.push((side, idx));
        }
    }
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), fx.named[0].len() + fx.named[1].len());
}

#[test]
fn grouped_bundling_claims_each_function_at_most_once() {
    let fx = fixture();
    let mut groups = pdb_style_groups();
    groups[0].function_names.push("h".to_string()); // h listed twice
    let family = build_bundle_family(
        MatchBundleType::SourceFile,
        &groups,
        &fx.named,
        &fx.matched,
        &fx.name_map,
        0,
    );
    let total: usize = family
        .bundles
        .iter()
        .map(|b| b.matched_indices.len())
        .sum();
    assert_eq!(total, 3);
}

#[test]
fn comparison_progress_uses_compared_counter() {
    let mut fx = fixture();
    let mut family = build_bundle_family(
        MatchBundleType::None,
        &[],
        &fx.named,
        &fx.matched,
        &fx.name_map,
        0,
    );

    fx.matched[0].comparison.records.push(ComparisonRecord::Instructions(InstructionPair {
        indices: [Some(0), Some(0)],
        mismatch_info: MismatchInfo::default(),
    }));
    fx.matched[0].comparison.match_count = 1;

    family.update_compared_count(&fx.matched);
    family.update_linked_source_file_count(&fx.named, &fx.matched);
    assert_eq!(family.compared_count, 1);
    // Comparing a function must not leak into the source-linking progress.
    assert_eq!(family.linked_source_file_count, 0);
    assert!(!family.has_completed_comparison());

    for m in fx.matched.iter_mut().skip(1) {
        m.comparison.records.push(ComparisonRecord::Instructions(InstructionPair {
            indices: [Some(0), Some(0)],
            mismatch_info: MismatchInfo::default(),
        }));
    }
    family.update_compared_count(&fx.matched);
    assert!(family.has_completed_comparison());
}
