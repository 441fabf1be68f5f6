// Integration tests for recording time accounting
//
// The capture clock takes explicit `now` instants, so arbitrary
// pause/resume interleavings can be exercised without real time passing.

use clinscribe::CaptureClock;
use std::time::{Duration, Instant};

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[test]
fn test_elapsed_without_pauses() {
    let t0 = Instant::now();
    let clock = CaptureClock::start(t0);

    assert_eq!(clock.elapsed(t0), Duration::ZERO);
    assert_eq!(clock.elapsed(t0 + secs(7)), secs(7));
}

#[test]
fn test_elapsed_freezes_while_paused() {
    let t0 = Instant::now();
    let mut clock = CaptureClock::start(t0);

    clock.pause(t0 + secs(10));
    assert!(clock.is_paused());

    // Time keeps passing but the net elapsed stays at the pause point
    assert_eq!(clock.elapsed(t0 + secs(12)), secs(10));
    assert_eq!(clock.elapsed(t0 + secs(60)), secs(10));
}

#[test]
fn test_elapsed_resumes_after_pause() {
    let t0 = Instant::now();
    let mut clock = CaptureClock::start(t0);

    clock.pause(t0 + secs(10));
    clock.resume(t0 + secs(15));
    assert!(!clock.is_paused());

    // 20s wall clock minus the 5s paused interval
    assert_eq!(clock.elapsed(t0 + secs(20)), secs(15));
}

#[test]
fn test_elapsed_across_many_interleavings() {
    let t0 = Instant::now();
    let mut clock = CaptureClock::start(t0);

    // pause/resume pairs: [2,5), [9,10), [20,35)
    clock.pause(t0 + secs(2));
    clock.resume(t0 + secs(5));
    clock.pause(t0 + secs(9));
    clock.resume(t0 + secs(10));
    clock.pause(t0 + secs(20));
    clock.resume(t0 + secs(35));

    let total_paused = 3 + 1 + 15;
    let now = t0 + secs(40);
    assert_eq!(
        clock.elapsed(now),
        secs(40 - total_paused),
        "elapsed must equal wall clock minus the sum of paused intervals"
    );
}

#[test]
fn test_double_pause_is_noop() {
    let t0 = Instant::now();
    let mut clock = CaptureClock::start(t0);

    clock.pause(t0 + secs(5));
    // A second pause must not reset the pause start
    clock.pause(t0 + secs(8));
    clock.resume(t0 + secs(10));

    assert_eq!(clock.elapsed(t0 + secs(10)), secs(5));
}

#[test]
fn test_resume_without_pause_is_noop() {
    let t0 = Instant::now();
    let mut clock = CaptureClock::start(t0);

    clock.resume(t0 + secs(5));

    assert_eq!(clock.elapsed(t0 + secs(8)), secs(8));
}

#[test]
fn test_elapsed_during_inflight_pause_after_prior_pauses() {
    let t0 = Instant::now();
    let mut clock = CaptureClock::start(t0);

    clock.pause(t0 + secs(4));
    clock.resume(t0 + secs(6));
    clock.pause(t0 + secs(10));

    // Accumulated 2s pause plus the in-flight pause since t+10
    assert_eq!(clock.elapsed(t0 + secs(13)), secs(8));
}
