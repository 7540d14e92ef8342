/// Upper bound on sampled risk markers drawn along one route.
pub const MAX_RISK_MARKERS: usize = 10;

pub fn sample_stride(len: usize) -> usize {
    (len / MAX_RISK_MARKERS).max(1)
}

/// Evenly spaced point indices that get a risk marker.
pub fn sampled_indices(len: usize) -> Vec<usize> {
    (0..len)
        .step_by(sample_stride(len))
        .take(MAX_RISK_MARKERS)
        .collect()
}

pub fn popup_for_point(role: &str, lat: f64, lng: f64) -> String {
    format!("{}: {:.5}, {:.5}", role, lat, lng)
}

#[test]
fn stride_never_drops_below_one() {
    assert_eq!(sample_stride(0), 1);
    assert_eq!(sample_stride(9), 1);
    assert_eq!(sample_stride(10), 1);
    assert_eq!(sample_stride(37), 3);
    assert_eq!(sample_stride(1000), 100);
}

#[test]
fn sampled_indices_are_capped() {
    assert_eq!(sampled_indices(2), vec![0, 1]);
    assert_eq!(sampled_indices(5), vec![0, 1, 2, 3, 4]);
    assert_eq!(sampled_indices(37), vec![0, 3, 6, 9, 12, 15, 18, 21, 24, 27]);
    assert_eq!(sampled_indices(1000).len(), MAX_RISK_MARKERS);
    assert!(sampled_indices(0).is_empty());
}
