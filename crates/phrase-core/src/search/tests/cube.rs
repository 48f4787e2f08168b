use super::super::cube::frontier::CubeFrontier;
use super::super::testutil::{abc_sentence, chain_sentence, gap_sentence, Fixture};
use super::{decode, texts};
use crate::search::DecodeFailure;
use crate::settings::{SearchAlgorithm, Settings};

fn cube(s: &mut Settings) {
    s.search.algorithm = SearchAlgorithm::Cube;
}

#[test]
fn test_cube_decodes_abc() {
    let derivation = decode(abc_sentence(), cube).unwrap();
    assert_eq!(derivation.target_text(), "AB C");
    assert_eq!(derivation.score(), -2.5);
    assert!(derivation.stats().cube_pops > 0);
}

#[test]
fn test_cube_single_pop_per_bucket() {
    // Bucket 1 pops C (estimate -2.5), bucket 2 pops AB from the root and
    // bucket 3 finishes AB with C.
    let derivation = decode(abc_sentence(), |s| {
        cube(s);
        s.cube.pop_limit = 1;
    })
    .unwrap();
    assert_eq!(derivation.target_text(), "AB C");
    assert_eq!(derivation.score(), -2.5);
    assert_eq!(derivation.stats().cube_pops, 3);
    assert_eq!(derivation.stats().stack_sizes, vec![1, 1, 1, 1]);
}

#[test]
fn test_cube_diversity_fills_every_container() {
    let derivation = decode(abc_sentence(), |s| {
        cube(s);
        s.cube.pop_limit = 1;
        s.cube.diversity = 1;
    })
    .unwrap();
    // {0}, {1} and {2} each contribute one hypothesis.
    assert_eq!(derivation.stats().stack_sizes[1], 3);
    assert_eq!(derivation.target_text(), "AB C");
}

#[test]
fn test_cube_uncoverable_word() {
    let err = decode(gap_sentence(), cube).unwrap_err();
    assert_eq!(err, DecodeFailure::NoCompleteHypothesis);
}

#[test]
fn test_cube_matches_normal_search() {
    for limit in [0, 2, -1] {
        let normal = decode(chain_sentence(7), |s| s.search.distortion_limit = limit).unwrap();
        let cubed = decode(chain_sentence(7), |s| {
            cube(s);
            s.search.distortion_limit = limit;
        })
        .unwrap();
        assert_eq!(cubed.target_text(), normal.target_text(), "limit {limit}");
        assert_eq!(cubed.score(), normal.score(), "limit {limit}");
    }
}

#[test]
fn test_cube_deterministic() {
    let fx = Fixture::new(chain_sentence(8), |s| {
        cube(s);
        s.cube.pop_limit = 5;
        s.search.distortion_limit = 3;
    });
    let first = fx.decoder.decode(&fx.sentence).unwrap();
    let second = fx.decoder.decode(&fx.sentence).unwrap();
    assert_eq!(first.best(), second.best());
    assert_eq!(first.stats(), second.stats());
}

#[test]
fn test_cube_scores_fewer_pairs_than_exhaustive() {
    let derivation = decode(chain_sentence(8), |s| {
        cube(s);
        s.cube.pop_limit = 4;
        s.search.distortion_limit = -1;
    })
    .unwrap();
    let stats = derivation.stats();
    assert!(stats.cube_pops <= 4 * 8);
    assert!(stats.cube_materialized >= stats.cube_pops);
}

#[test]
fn test_cube_nbest_arcs() {
    let derivation = decode(abc_sentence(), |s| {
        cube(s);
        s.nbest.enabled = true;
    })
    .unwrap();
    assert_eq!(
        texts(&derivation, 2),
        vec![("AB C".to_string(), -2.5), ("A B C".to_string(), -3.0)]
    );
}

#[test]
fn test_cube_hypothesis_budget() {
    let err = decode(chain_sentence(6), |s| {
        cube(s);
        s.search.max_hypotheses = 3;
    })
    .unwrap_err();
    assert!(matches!(err, DecodeFailure::Aborted { .. }));
}

#[test]
fn test_frontier_visits_grid_in_order() {
    let mut frontier = CubeFrontier::new(vec![0.0, -1.0, -5.0], vec![-0.5, -0.75]);
    let mut scores = Vec::new();
    while let Some(cursor) = frontier.pop() {
        scores.push(cursor.score);
    }
    assert_eq!(scores, vec![-0.5, -0.75, -1.5, -1.75, -5.5, -5.75]);
    assert_eq!(frontier.materialized(), 6);
}
