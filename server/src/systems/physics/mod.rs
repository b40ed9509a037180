pub mod players;
pub mod projectiles;

use smallvec::SmallVec;

/// Decompose a frame factor into integration sub-steps: a factor of 1 for
/// every whole coalesced frame, plus the fractional remainder as the final
/// sub-step. Multiplying one step by the whole factor instead would be
/// numerically wrong for velocity-clamped and acceleration-based motion.
pub fn sub_steps(frame_factor: f64) -> SmallVec<[f32; 8]> {
    let mut steps = SmallVec::new();
    let full = frame_factor.floor();
    let fractional = frame_factor - full;
    for _ in 0..full as u64 {
        steps.push(1.0f32);
    }
    if fractional > 1e-9 {
        steps.push(fractional as f32);
    }
    if steps.is_empty() {
        // Frame factors below 1 never come out of the clock, but a degenerate
        // input still advances by what it carries.
        steps.push(frame_factor.max(0.0) as f32);
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_factor_is_one_step() {
        let steps = sub_steps(1.0);
        assert_eq!(steps.as_slice(), &[1.0]);
    }

    #[test]
    fn coalesced_factor_splits_into_full_steps_plus_remainder() {
        let steps = sub_steps(3.4);
        assert_eq!(steps.len(), 4);
        assert_eq!(&steps[..3], &[1.0, 1.0, 1.0]);
        assert!((steps[3] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn whole_factor_has_no_fractional_tail() {
        let steps = sub_steps(2.0);
        assert_eq!(steps.as_slice(), &[1.0, 1.0]);
    }

    #[test]
    fn steps_sum_to_the_factor() {
        for factor in [1.0, 1.5, 2.25, 3.4, 7.99] {
            let total: f32 = sub_steps(factor).iter().sum();
            assert!((total as f64 - factor).abs() < 1e-5, "factor {}", factor);
        }
    }
}
