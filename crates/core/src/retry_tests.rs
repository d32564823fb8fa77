// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use yare::parameterized;

fn policy(backoff: Backoff) -> OnErrorRetry {
    OnErrorRetry {
        max_attempts: 5,
        backoff,
        initial_delay: 1.0,
        multiplier: 2.0,
        max_delay: 10.0,
        jitter: 0.0,
        when: None,
    }
}

#[parameterized(
    constant_first = { Backoff::Constant, 1, 1.0 },
    constant_fifth = { Backoff::Constant, 5, 1.0 },
    linear_first = { Backoff::Linear, 1, 1.0 },
    linear_third = { Backoff::Linear, 3, 3.0 },
    exponential_first = { Backoff::Exponential, 1, 1.0 },
    exponential_second = { Backoff::Exponential, 2, 2.0 },
    exponential_fourth = { Backoff::Exponential, 4, 8.0 },
)]
fn backoff_shapes(backoff: Backoff, attempt: u32, expected_secs: f64) {
    let delay = backoff_delay(&policy(backoff), attempt, 0.0);
    assert!((delay.as_secs_f64() - expected_secs).abs() < 1e-9);
}

#[test]
fn delay_is_clamped_to_max() {
    // 2^9 = 512s, clamped to 10s
    let delay = backoff_delay(&policy(Backoff::Exponential), 10, 0.0);
    assert_eq!(delay, Duration::from_secs(10));
}

#[test]
fn jitter_scales_the_delay() {
    let mut p = policy(Backoff::Constant);
    p.jitter = 0.5;
    assert_eq!(backoff_delay(&p, 1, 0.5), Duration::from_secs_f64(1.5));
    assert_eq!(backoff_delay(&p, 1, -0.5), Duration::from_secs_f64(0.5));
    // Sampled fraction beyond the configured amplitude is clamped.
    assert_eq!(backoff_delay(&p, 1, 2.0), Duration::from_secs_f64(1.5));
}

#[test]
fn defaults_deserialize() {
    let p: OnErrorRetry = serde_json::from_str("{}").unwrap();
    assert_eq!(p.max_attempts, 3);
    assert_eq!(p.backoff, Backoff::Exponential);
    assert!((p.initial_delay - 1.0).abs() < f64::EPSILON);
    assert!((p.multiplier - 2.0).abs() < f64::EPSILON);
}

#[test]
fn on_success_requires_while() {
    assert!(serde_json::from_str::<OnSuccessRetry>("{}").is_err());
    let p: OnSuccessRetry =
        serde_json::from_value(serde_json::json!({"while": "{{ more }}"})).unwrap();
    assert_eq!(p.collect, CollectStrategy::Append);
    assert_eq!(p.max_attempts, 10);
}

proptest! {
    #[test]
    fn delay_never_exceeds_jittered_ceiling(
        attempt in 1u32..50,
        initial in 0.01f64..5.0,
        multiplier in 1.0f64..4.0,
        max_delay in 0.1f64..60.0,
        jitter in 0.0f64..1.0,
        frac in -1.0f64..1.0,
    ) {
        let p = OnErrorRetry {
            max_attempts: 50,
            backoff: Backoff::Exponential,
            initial_delay: initial,
            multiplier,
            max_delay,
            jitter,
            when: None,
        };
        let delay = backoff_delay(&p, attempt, frac).as_secs_f64();
        prop_assert!(delay <= max_delay * (1.0 + jitter) + 1e-9);
        prop_assert!(delay >= 0.0);
    }
}
