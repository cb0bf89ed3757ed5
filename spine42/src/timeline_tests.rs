use crate::timeline::{curve_percent, search};
use crate::{BEZIER_SIZE, BezierCurve, Curve, CurveFrames, Timeline};

fn assert_approx(actual: f32, expected: f32, eps: f32) {
    let diff = (actual - expected).abs();
    assert!(diff <= eps, "expected {expected}, got {actual} (diff {diff})");
}

#[test]
fn search_finds_last_frame_not_after_time() {
    let times = [0.0, 1.0, 1.0, 2.0];
    assert_eq!(search(&times, 0.0), 0);
    assert_eq!(search(&times, 0.5), 0);
    assert_eq!(search(&times, 1.0), 2);
    assert_eq!(search(&times, 1.5), 2);
    assert_eq!(search(&times, 9.0), 3);
}

#[test]
fn straight_bezier_samples_evenly() {
    let third = 1.0 / 3.0;
    let curve = BezierCurve::new(0.0, 0.0, third, third, 2.0 * third, 2.0 * third, 1.0, 1.0);
    let samples = curve.samples();
    for k in 0..BEZIER_SIZE / 2 {
        let expected = 0.1 * (k + 1) as f32;
        assert_approx(samples[2 * k], expected, 1.0e-5);
        assert_approx(samples[2 * k + 1], expected, 1.0e-5);
    }
    for t in [0.0, 0.05, 0.25, 0.5, 0.93, 1.0] {
        assert_approx(curve.value(t, 0.0, 0.0, 1.0, 1.0), t, 1.0e-5);
    }
}

#[test]
fn ease_in_bezier_is_monotonic_and_hits_endpoints() {
    let curve = BezierCurve::new(0.0, 10.0, 0.5, 10.0, 1.0, 20.0, 1.0, 20.0);
    assert_approx(curve.value(0.0, 0.0, 10.0, 1.0, 20.0), 10.0, 1.0e-5);
    assert_approx(curve.value(1.0, 0.0, 10.0, 1.0, 20.0), 20.0, 1.0e-5);
    assert!(curve.value(0.5, 0.0, 10.0, 1.0, 20.0) < 15.0);

    let mut previous = f32::MIN;
    for i in 0..=20 {
        let value = curve.value(i as f32 / 20.0, 0.0, 10.0, 1.0, 20.0);
        assert!(value >= previous, "not monotonic at step {i}");
        previous = value;
    }
}

#[test]
fn curve_frames_interpolate_hold_and_step() {
    let mut frames = CurveFrames::<2>::with_capacity(3);
    frames.push(1.0, [0.0, 100.0]);
    frames.push(2.0, [10.0, 50.0]);
    frames.push(3.0, [20.0, 0.0]);
    frames.curves[1] = Curve::Stepped;

    assert_eq!(frames.len(), 3);
    assert_eq!(frames.sample(0.5), None);
    let [a, b] = frames.sample(1.25).expect("inside");
    assert_approx(a, 2.5, 1.0e-6);
    assert_approx(b, 87.5, 1.0e-6);
    assert_eq!(frames.sample(2.9), Some([10.0, 50.0]));
    assert_eq!(frames.sample(3.0), Some([20.0, 0.0]));
    assert_eq!(frames.sample(30.0), Some([20.0, 0.0]));
    assert_approx(frames.last_time(), 3.0, 0.0);
}

#[test]
fn curve_percent_follows_segment_curve() {
    let times = [0.0, 2.0, 4.0];
    let curves = [Curve::Linear, Curve::Stepped, Curve::Linear];
    assert_approx(curve_percent(&times, &curves, 0, 0.5), 0.25, 1.0e-6);
    assert_approx(curve_percent(&times, &curves, 1, 3.5), 0.0, 0.0);
    // Past the last frame there is no segment to interpolate.
    assert_approx(curve_percent(&times, &curves, 2, 5.0), 0.0, 0.0);
}

#[test]
fn timeline_duration_is_the_last_frame_time() {
    let mut frames = CurveFrames::with_capacity(2);
    frames.push(0.0, [1.0]);
    frames.push(1.5, [0.0]);
    let alpha = Timeline::Alpha { slot: 0, frames };
    assert_approx(alpha.duration(), 1.5, 0.0);
    assert_eq!(alpha.times(), &[0.0, 1.5]);

    let empty = Timeline::DrawOrder {
        times: Vec::new(),
        orders: Vec::new(),
    };
    assert_approx(empty.duration(), 0.0, 0.0);
}
