mod basic;
mod cube;

use super::testutil::{Fixture, ToySentence};
use super::{DecodeFailure, Derivation};
use crate::settings::Settings;

pub(super) fn decode(
    toy: ToySentence,
    tweak: impl FnOnce(&mut Settings),
) -> Result<Derivation, DecodeFailure> {
    let fx = Fixture::new(toy, tweak);
    fx.decoder.decode(&fx.sentence)
}

pub(super) fn texts(derivation: &Derivation, n: usize) -> Vec<(String, f32)> {
    derivation
        .alternatives()
        .take(n)
        .map(|p| (p.target_text(), p.score))
        .collect()
}
