//! Properties of the power-of-two sample factor search.

use panorama_view::{TargetSize, sample_factor};
use proptest::prelude::*;

fn target_strategy() -> impl Strategy<Value = TargetSize> {
    (1u32..4096, 1u32..4096).prop_map(|(width, height)| TargetSize::new(width, height).unwrap())
}

fn exceeds(native_width: u32, native_height: u32, target: TargetSize, factor: u32) -> bool {
    (native_height / 2) / factor > target.height() && (native_width / 2) / factor > target.width()
}

proptest! {
    /// The factor is a power of two, the next doubling would be too much, and
    /// every smaller power of two still leaves both halved sides above the target.
    #[test]
    fn factor_is_the_largest_valid_power_of_two(
        target in target_strategy(),
        scale_w in 1u32..16,
        scale_h in 1u32..16,
        extra_w in 0u32..1000,
        extra_h in 0u32..1000,
    ) {
        let native_width = target.width().saturating_mul(scale_w).saturating_add(extra_w);
        let native_height = target.height().saturating_mul(scale_h).saturating_add(extra_h);
        let factor = sample_factor(native_width, native_height, target);

        prop_assert!(factor.is_power_of_two());
        prop_assert!(!exceeds(native_width, native_height, target, factor));
        if factor > 1 {
            prop_assert!(exceeds(native_width, native_height, target, factor / 2));
        }
    }

    /// Never upsamples.
    #[test]
    fn images_within_target_keep_factor_one(
        target in target_strategy(),
        shrink_w in 0u32..4096,
        shrink_h in 0u32..4096,
    ) {
        let native_width = target.width().saturating_sub(shrink_w);
        let native_height = target.height().saturating_sub(shrink_h);
        prop_assert_eq!(sample_factor(native_width, native_height, target), 1);
    }

    /// Downsampled output never drops below the target on both sides.
    #[test]
    fn output_stays_at_or_above_target(
        target in target_strategy(),
        native_width in 1u32..20_000,
        native_height in 1u32..20_000,
    ) {
        let factor = sample_factor(native_width, native_height, target);
        if factor > 1 {
            prop_assert!(native_width / factor >= target.width());
            prop_assert!(native_height / factor >= target.height());
        }
    }
}

#[test]
fn reference_panorama_lands_in_expected_band() {
    let target = TargetSize::new(1024, 512).unwrap();
    let factor = sample_factor(4000, 2000, target);
    assert_eq!(factor, 2);
    assert!((1024..2048).contains(&(4000 / factor)));
    assert!((512..1024).contains(&(2000 / factor)));
}
