//! Fixed-point, time-quantized entity ages.
//!
//! An [`Age`] is a 16-bit fraction of an entity's lifetime: 0 when created,
//! [`AGE_EXPIRED`] once its life is over. Time is counted in whole iotas
//! (1 ms) and every entity advances by its precomputed age step per iota, so
//! aging is integer-only and identical for any frame-rate split of the same
//! total time (up to per-frame iota rounding).

/// Fixed-point entity age.
pub type Age = u32;
/// Widened type used for age multiplies before clamping or wrapping.
pub type AgeMul = u64;

/// Minimum time granularity in seconds.
pub const AGE_IOTA: f32 = 0.001;
pub const AGE_INV_IOTA: f32 = 1.0 / AGE_IOTA;

pub const AGE_FRACTION_BITS: u32 = 16;
pub const AGE_FRACTION_MAX: Age = 1 << AGE_FRACTION_BITS;
pub const AGE_FRACTION_MASK: Age = AGE_FRACTION_MAX - 1;
pub const AGE_FRACTION_SCALE: f32 = 1.0 / AGE_FRACTION_MASK as f32;

/// Age marking an entity as dead.
pub const AGE_EXPIRED: Age = AGE_FRACTION_MASK;

/// Converts a frame delta to a whole number of iotas.
pub fn delta_seconds_to_iotas(dt: f32) -> Age {
    // Negative deltas saturate to zero.
    (dt * AGE_INV_IOTA).round() as Age
}

/// Converts a lifetime in seconds to the age accrued per iota. Lifetimes
/// shorter than one iota expire on their first update.
pub fn life_to_age_step(life: f32) -> Age {
    if life < AGE_IOTA {
        return AGE_EXPIRED;
    }

    (AGE_FRACTION_MASK as f32 * (AGE_IOTA / life)).round() as Age
}

/// Saturates `age` at [`AGE_EXPIRED`], for non-looping entities.
pub fn clamp_age(age: Age) -> Age {
    age.min(AGE_EXPIRED)
}

/// Wraps `age` back into the fraction range, for looping entities.
pub fn wrap_age(age: Age) -> Age {
    age & AGE_FRACTION_MASK
}

pub fn is_expired(age: Age) -> bool {
    age >= AGE_EXPIRED
}

/// Age after `dt` seconds, saturating at [`AGE_EXPIRED`].
pub fn updated_age(age: Age, age_step: Age, dt: f32) -> Age {
    clamp_wide(advance(age, age_step, delta_seconds_to_iotas(dt)))
}

/// Age after `dt` seconds, wrapping for looping entities.
pub fn updated_age_wrap(age: Age, age_step: Age, dt: f32) -> Age {
    wrap_wide(advance(age, age_step, delta_seconds_to_iotas(dt)))
}

/// Advances every `(age, step)` pair by the shared `dt`, clamping.
///
/// `ages`, `age_steps` and `ages_out` are parallel; `ages_out` may be a copy
/// of `ages` when updating in place.
pub fn update_ages(dt: f32, ages: &[Age], age_steps: &[Age], ages_out: &mut [Age]) {
    let iotas = delta_seconds_to_iotas(dt);
    for ((out, &age), &step) in ages_out.iter_mut().zip(ages).zip(age_steps) {
        *out = clamp_wide(advance(age, step, iotas));
    }
}

/// As [`update_ages`], wrapping instead of clamping.
pub fn update_ages_wrap(dt: f32, ages: &[Age], age_steps: &[Age], ages_out: &mut [Age]) {
    let iotas = delta_seconds_to_iotas(dt);
    for ((out, &age), &step) in ages_out.iter_mut().zip(ages).zip(age_steps) {
        *out = wrap_wide(advance(age, step, iotas));
    }
}

/// Advances ages using a per-entity delta, each scaled by `age_scale`.
///
/// Entities spawned part way through a frame pass the remaining fraction of
/// that frame as their delta, so their first update does not overshoot.
pub fn update_ages_per_entity(
    age_scale: f32,
    dts: &[f32],
    ages: &[Age],
    age_steps: &[Age],
    ages_out: &mut [Age],
) {
    for (((out, &dt), &age), &step) in ages_out.iter_mut().zip(dts).zip(ages).zip(age_steps) {
        debug_assert!(dt >= 0.0);
        let iotas = delta_seconds_to_iotas(dt * age_scale);
        *out = clamp_wide(advance(age, step, iotas));
    }
}

/// As [`update_ages_per_entity`], wrapping instead of clamping.
pub fn update_ages_per_entity_wrap(
    age_scale: f32,
    dts: &[f32],
    ages: &[Age],
    age_steps: &[Age],
    ages_out: &mut [Age],
) {
    for (((out, &dt), &age), &step) in ages_out.iter_mut().zip(dts).zip(ages).zip(age_steps) {
        debug_assert!(dt >= 0.0);
        let iotas = delta_seconds_to_iotas(dt * age_scale);
        *out = wrap_wide(advance(age, step, iotas));
    }
}

fn advance(age: Age, age_step: Age, iotas: Age) -> AgeMul {
    AgeMul::from(age) + AgeMul::from(iotas) * AgeMul::from(age_step)
}

fn clamp_wide(age: AgeMul) -> Age {
    age.min(AgeMul::from(AGE_EXPIRED)) as Age
}

fn wrap_wide(age: AgeMul) -> Age {
    (age & AgeMul::from(AGE_FRACTION_MASK)) as Age
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_step_for_one_second_life() {
        assert_eq!(life_to_age_step(1.0), 66);
        assert_eq!(life_to_age_step(2.0), 33);
    }

    #[test]
    fn sub_iota_life_expires_immediately() {
        let step = life_to_age_step(0.0001);
        assert_eq!(step, AGE_EXPIRED);
        assert!(is_expired(updated_age(0, step, 0.001)));
        assert_eq!(life_to_age_step(0.0), AGE_EXPIRED);
    }

    #[test]
    fn expiry_threshold_is_mask_not_max() {
        assert!(!is_expired(65_534));
        assert!(is_expired(65_535));
        assert!(is_expired(65_536));
        assert!(is_expired(u32::MAX));
    }

    #[test]
    fn clamp_saturates_and_wrap_cycles() {
        assert_eq!(clamp_age(70_000), 65_535);
        assert_eq!(clamp_age(1_000), 1_000);
        assert_eq!(wrap_age(70_000), 4_464);
        assert_eq!(wrap_age(65_535), 65_535);
    }

    #[test]
    fn deltas_round_to_iotas() {
        assert_eq!(delta_seconds_to_iotas(0.0166), 17);
        assert_eq!(delta_seconds_to_iotas(0.0), 0);
        assert_eq!(delta_seconds_to_iotas(-1.0), 0);
    }

    #[test]
    fn updated_age_accumulates_and_saturates() {
        let step = life_to_age_step(1.0);
        let age = updated_age(0, step, 0.5);
        assert_eq!(age, 500 * 66);

        let age = updated_age(age, step, 0.5);
        assert_eq!(age, AGE_EXPIRED);

        // Large step times large dt would overflow u32 without widening.
        assert_eq!(updated_age(0, AGE_EXPIRED, 100_000.0), AGE_EXPIRED);
    }

    #[test]
    fn wrapping_update_never_reports_expired_on_overflow() {
        let step = life_to_age_step(1.0);
        let age = updated_age_wrap(60_000, step, 0.1);
        assert_eq!(age, (60_000 + 100 * 66) & AGE_FRACTION_MASK);
        assert!(!is_expired(age));
    }

    #[test]
    fn batch_updates_match_single_updates() {
        let ages = [0, 1_000, 65_000];
        let steps = [66, 33, 66];
        let mut out = [0; 3];

        update_ages(0.016, &ages, &steps, &mut out);
        for i in 0..3 {
            assert_eq!(out[i], updated_age(ages[i], steps[i], 0.016));
        }

        update_ages_wrap(0.016, &ages, &steps, &mut out);
        assert_eq!(out[2], (65_000 + 16 * 66) & AGE_FRACTION_MASK);
    }

    #[test]
    fn per_entity_deltas_let_late_spawns_catch_up_partially() {
        let ages = [0, 0];
        let steps = [66, 66];
        let dts = [0.016, 0.004];
        let mut out = [0; 2];

        update_ages_per_entity(1.0, &dts, &ages, &steps, &mut out);
        assert_eq!(out, [16 * 66, 4 * 66]);

        update_ages_per_entity(2.0, &dts, &ages, &steps, &mut out);
        assert_eq!(out, [32 * 66, 8 * 66]);

        update_ages_per_entity_wrap(1.0, &[1.0, 0.5], &[0, 0], &steps, &mut out);
        assert_eq!(out, [66_000 & AGE_FRACTION_MASK, 500 * 66]);
    }
}
