// render.rs — Divergence map → displayable intensity.
//
// The evaluator's output is iteration counts, not pixels. Consumers
// that want to look at the map (the demo binaries, an image writer)
// scale the counts into 0..=255 by the maximum observed value, so the
// slowest-diverging points render brightest and in-set points stay
// black. This lives outside the evaluator core — it is presentation,
// not computation.

use crate::map::DivergenceMap;

/// Scale every entry into `0..=255` by the map's maximum divergence.
///
/// In-set entries (0) stay 0; the maximum entry maps to 255. A map
/// where no point diverged comes back all-zero rather than dividing
/// by zero.
pub fn normalize(map: &DivergenceMap) -> Vec<u8> {
    let max = map.max_divergence();
    if max == 0 {
        return vec![0u8; map.as_slice().len()];
    }
    map.as_slice()
        .iter()
        .map(|&v| (v as f32 / max as f32 * 255.0) as u8)
        .collect()
}
