// tests/test_map.rs — Integration tests for parameters, the map
// container, and display normalization.

use mandelmap::escape::CpuEvaluator;
use mandelmap::map::{DivergenceMap, EscapeParams, ParamsError};
use mandelmap::render::normalize;

// ===== Parameter validation =====

#[test]
fn params_reject_degenerate_grids() {
    // Width or height below 2 would make the pixel→plane mapping
    // divide by zero; both must be caught before any evaluation.
    assert!(matches!(
        EscapeParams::new(1, 100, 10),
        Err(ParamsError::GridTooSmall { .. })
    ));
    assert!(matches!(
        EscapeParams::new(100, 1, 10),
        Err(ParamsError::GridTooSmall { .. })
    ));
    assert!(matches!(
        EscapeParams::new(0, 0, 10),
        Err(ParamsError::GridTooSmall { .. })
    ));
}

#[test]
fn params_reject_zero_iteration_bound() {
    assert_eq!(
        EscapeParams::new(100, 100, 0),
        Err(ParamsError::ZeroIterationBound)
    );
}

#[test]
fn params_errors_are_printable() {
    // The demo binaries surface these to the user via Display.
    let e = EscapeParams::new(1, 1, 10).unwrap_err();
    assert!(e.to_string().contains("1×1"));
    let e = EscapeParams::new(2, 2, 0).unwrap_err();
    assert!(e.to_string().contains("at least 1"));
}

// ===== Container =====

#[test]
fn map_round_trips_row_major_data() {
    let data: Vec<u32> = (0..12).collect();
    let map = DivergenceMap::from_vec(4, 3, data.clone());
    assert_eq!(map.as_slice(), data.as_slice());
    assert_eq!(map.get(0, 0), 0);
    assert_eq!(map.get(3, 2), 11);
    assert_eq!(map.max_divergence(), 11);
}

// ===== Normalization =====

#[test]
fn normalize_maps_extremes_to_black_and_white() {
    let params = EscapeParams::new(64, 48, 100).unwrap();
    let map = CpuEvaluator::new().evaluate(&params);
    let pixels = normalize(&map);

    assert_eq!(pixels.len(), map.as_slice().len());

    // The window contains both in-set points (0 → black) and
    // fast-diverging points; the maximum maps to full intensity.
    let max = map.max_divergence();
    assert!(max > 0);
    for (i, (&v, &px)) in map.as_slice().iter().zip(&pixels).enumerate() {
        if v == 0 {
            assert_eq!(px, 0, "in-set entry {i} must stay black");
        }
        if v == max {
            assert_eq!(px, 255, "max entry {i} must be full intensity");
        }
    }
}

#[test]
fn normalize_preserves_ordering() {
    let map = DivergenceMap::from_vec(4, 1, vec![1, 2, 50, 100]);
    let px = normalize(&map);
    assert!(px[0] <= px[1] && px[1] <= px[2] && px[2] <= px[3]);
    assert_eq!(px[3], 255);
}
