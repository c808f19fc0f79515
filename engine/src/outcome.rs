use rand::Rng;

/// Weighted coin flip: one uniform draw from `[0, 1)`, win iff it lands at or
/// below `win_probability`. The generator is supplied by the caller so
/// outcomes can be replayed deterministically.
pub fn outcome(win_probability: f64, rng: &mut impl Rng) -> bool {
    rng.gen::<f64>() <= win_probability
}
