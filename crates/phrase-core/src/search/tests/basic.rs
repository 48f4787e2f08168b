use super::super::testutil::{abc_sentence, chain_sentence, gap_sentence, Fixture, ToySentence};
use super::{decode, texts};
use crate::options::{Span, TranslationOption};
use crate::search::DecodeFailure;
use crate::settings::Settings;

#[test]
fn test_decode_prefers_phrase() {
    let derivation = decode(abc_sentence(), |_| {}).unwrap();

    // AB(-1.5) + C(-1.0) beats A + B + C and every reordering.
    assert_eq!(derivation.target_text(), "AB C");
    assert_eq!(derivation.score(), -2.5);
    assert!(!derivation.interrupted());

    let segments = derivation.segments();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].source, Span::new(0, 1));
    assert_eq!(segments[0].target_start, 0);
    assert_eq!(segments[1].source, Span::new(2, 2));
    assert_eq!(segments[1].target_start, 1);
}

#[test]
fn test_decode_monotone_only() {
    let derivation = decode(abc_sentence(), |s| s.search.distortion_limit = 0).unwrap();
    assert_eq!(derivation.target_text(), "AB C");
    assert_eq!(derivation.score(), -2.5);
}

#[test]
fn test_decode_picks_best_option() {
    let toy = ToySentence::new("a b")
        .option(0, 0, "A", -5.0)
        .option(1, 1, "B", -1.0)
        .option(0, 0, "A'", -0.5);
    let derivation = decode(toy, |_| {}).unwrap();
    assert_eq!(derivation.target_text(), "A' B");
    assert_eq!(derivation.score(), -1.5);
}

#[test]
fn test_distortion_penalty_charged() {
    // Every reordering pays for its jumps, so the monotone order wins.
    let toy = ToySentence::new("a b c")
        .option(0, 0, "A", -1.0)
        .option(1, 1, "B", -1.0)
        .option(2, 2, "C", -1.0);
    let derivation = decode(toy, |_| {}).unwrap();
    assert_eq!(derivation.target_text(), "A B C");
    assert_eq!(derivation.score(), -3.0);

    // Without the penalty every permutation costs the same.
    let toy = ToySentence::new("a b c")
        .option(0, 0, "A", -1.0)
        .option(1, 1, "B", -1.0)
        .option(2, 2, "C", -1.0);
    let derivation = decode(toy, |s| s.weights.distortion = 0.0).unwrap();
    assert_eq!(derivation.score(), -3.0);
}

#[test]
fn test_decode_uncoverable_word() {
    let err = decode(gap_sentence(), |_| {}).unwrap_err();
    assert_eq!(err, DecodeFailure::NoCompleteHypothesis);
}

#[test]
fn test_zero_distortion_limit_is_monotone() {
    let derivation = decode(abc_sentence(), |s| {
        s.search.distortion_limit = 0;
        s.nbest.enabled = true;
    })
    .unwrap();
    assert_eq!(
        texts(&derivation, 10),
        vec![("AB C".to_string(), -2.5), ("A B C".to_string(), -3.0)]
    );
}

#[test]
fn test_decode_empty_sentence() {
    let derivation = decode(ToySentence::new(""), |_| {}).unwrap();
    assert_eq!(derivation.target_text(), "");
    assert_eq!(derivation.score(), 0.0);
    assert!(derivation.segments().is_empty());
    assert_eq!(derivation.complete_hypotheses(), 1);
}

#[test]
fn test_decode_single_word() {
    let toy = ToySentence::new("a").option(0, 0, "A", -0.25);
    let derivation = decode(toy, |_| {}).unwrap();
    assert_eq!(derivation.target_tokens(), vec!["A"]);
    assert_eq!(derivation.score(), -0.25);
}

#[test]
fn test_decode_empty_target() {
    // Deleting a word yields a segment with no target words.
    let toy = ToySentence::new("a b")
        .option(0, 0, "A", -1.0)
        .option(1, 1, "", -0.5);
    let derivation = decode(toy, |_| {}).unwrap();
    assert_eq!(derivation.target_text(), "A");
    assert_eq!(derivation.segments().len(), 2);
}

#[test]
fn test_word_alignment_offsets() {
    let mut toy = ToySentence::new("a b c").option(2, 2, "C", -1.0);
    toy.options.push(
        TranslationOption::new(
            Span::new(0, 1),
            vec!["X".to_string(), "Y".to_string()],
            -1.0,
        )
        .with_alignment(vec![(0, 1), (1, 0)]),
    );
    let derivation = decode(toy, |_| {}).unwrap();
    assert_eq!(derivation.target_text(), "X Y C");
    assert_eq!(derivation.word_alignment(), vec![(0, 1), (1, 0)]);
}

#[test]
fn test_decode_deterministic() {
    let fx = Fixture::new(chain_sentence(8), |s| s.search.stack_size = 5);
    let first = fx.decoder.decode(&fx.sentence).unwrap();
    let second = fx.decoder.decode(&fx.sentence).unwrap();
    assert_eq!(first.best(), second.best());
    assert_eq!(first.stats(), second.stats());
}

#[test]
fn test_stack_sizes_bounded() {
    let derivation = decode(chain_sentence(8), |s| {
        s.search.stack_size = 3;
        s.search.distortion_limit = -1;
    })
    .unwrap();
    let stats = derivation.stats();
    assert_eq!(stats.stack_sizes.len(), 9);
    assert!(stats.stack_sizes.iter().all(|&n| n <= 3));
    assert!(stats.pruned > 0);
}

#[test]
fn test_narrow_beam_still_completes() {
    let derivation = decode(chain_sentence(6), |s| {
        s.search.beam_width = 0.0;
        s.search.stack_size = 1;
    })
    .unwrap();
    assert_eq!(derivation.target_text(), "T0 T1 T2 T3 T4 T5");
    assert_eq!(derivation.score(), -6.0);
}

fn early_discarding_sentence() -> ToySentence {
    ToySentence::new("a b")
        .option(0, 0, "A", -1.0)
        .option(0, 0, "X", -5.0)
        .option(1, 1, "B", -1.0)
}

#[test]
fn test_early_discarding_skips_hopeless_expansion() {
    let narrow = |threshold: f32| {
        move |s: &mut Settings| {
            s.search.distortion_limit = 0;
            s.search.beam_width = 1.0;
            s.search.early_discarding_threshold = threshold;
        }
    };
    let plain = decode(early_discarding_sentence(), narrow(f32::NEG_INFINITY)).unwrap();
    assert_eq!(plain.stats().early_discarded, 0);

    // A fills stack 1 first and lifts its threshold to -3; X is estimated at
    // -6 and never built.
    let derivation = decode(early_discarding_sentence(), narrow(0.0)).unwrap();
    assert_eq!(derivation.target_text(), "A B");
    assert_eq!(derivation.score(), -2.0);
    assert_eq!(derivation.stats().early_discarded, 1);
    assert_eq!(derivation.stats().created + 1, plain.stats().created);
    assert_eq!(derivation.stats().discarded + 1, plain.stats().discarded);

    let loose = decode(early_discarding_sentence(), narrow(-10.0)).unwrap();
    assert_eq!(loose.stats().early_discarded, 0);
    assert_eq!(loose.stats(), plain.stats());
}

#[test]
fn test_hypothesis_budget_aborts() {
    let err = decode(chain_sentence(5), |s| s.search.max_hypotheses = 2).unwrap_err();
    assert!(matches!(err, DecodeFailure::Aborted { hypotheses } if hypotheses >= 2));
}

#[test]
fn test_hypothesis_budget_keeps_early_completion() {
    // Expanding the root creates A, AB and B; AB already covers the sentence.
    let toy = ToySentence::new("a b")
        .option(0, 0, "A", -1.0)
        .option(1, 1, "B", -1.0)
        .option(0, 1, "AB", -3.0);
    let derivation = decode(toy, |s| s.search.max_hypotheses = 3).unwrap();
    assert!(derivation.interrupted());
    assert_eq!(derivation.target_text(), "AB");
}

#[test]
fn test_arena_reclaims_pruned_hypotheses() {
    let derivation = decode(chain_sentence(10), |s| s.search.stack_size = 2).unwrap();
    let stats = derivation.stats();
    assert!(stats.reclaimed > 0);
    assert!(stats.reclaimed <= stats.created);
}

#[test]
fn test_max_phrase_length_drops_long_options() {
    let toy = ToySentence::new("a b")
        .option(0, 0, "A", -2.0)
        .option(1, 1, "B", -2.0)
        .option(0, 1, "AB", -1.0);
    let derivation = decode(toy, |s| s.search.max_phrase_length = 1).unwrap();
    assert_eq!(derivation.target_text(), "A B");
}
