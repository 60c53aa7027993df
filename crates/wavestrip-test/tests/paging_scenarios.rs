use std::thread;
use std::time::Duration;

use approx::assert_relative_eq;
use wavestrip_core::{EngineConfig, Lod, SampleRange, Texel};
use wavestrip_paging::{PagingCoordinator, RequestOutcome, TickOutcome};
use wavestrip_test::{signals, PagingHarness};

const ATTENUATION: f32 = 1.4;

#[test]
fn triangle_pages_in_as_attenuated_copy() {
    let mut coordinator =
        PagingCoordinator::new(signals::triangle(), EngineConfig::default()).unwrap();
    assert_eq!(
        coordinator.request(Lod(0), SampleRange::new(0, 8)),
        RequestOutcome::Committed
    );

    let expected = [0.0, 1.0, 2.0, 1.0, 0.0, -1.0, -2.0, -1.0];
    let slot = coordinator.atlas().slot(Lod(0));
    for (texel, sample) in slot.iter().zip(expected) {
        assert_relative_eq!(texel.lo, sample / ATTENUATION, epsilon = 1e-6);
    }
    assert!(slot[8..].iter().all(|t| *t == Texel::ZERO));
}

#[test]
fn pending_lod_skips_overlapping_request() {
    let (mut harness, handle) =
        PagingHarness::manual(signals::ramp(4096), EngineConfig::default(), 8).unwrap();
    let coordinator = harness.coordinator_mut();

    assert_eq!(
        coordinator.request(Lod(3), SampleRange::new(0, 1000)),
        RequestOutcome::Dispatched
    );
    assert_eq!(
        coordinator.request(Lod(3), SampleRange::new(500, 1500)),
        RequestOutcome::Skipped
    );
    assert_eq!(coordinator.in_flight().count_for(Lod(3)), 1);
    assert_eq!(handle.queued_len(), 1);
    assert_eq!(coordinator.stats().skipped, 1);
}

#[test]
fn committed_window_equals_dispatched_range() {
    let (mut harness, handle) =
        PagingHarness::manual(signals::sine(1 << 20, 300.0, 0.9), EngineConfig::default(), 8)
            .unwrap();

    assert_eq!(harness.tick(300_000, 2048 * 32), TickOutcome::Dispatched);
    let dispatched = handle.pending()[0];
    assert_eq!(dispatched.lod, Lod(5));

    // Nothing changes until the completion arrives.
    assert_eq!(harness.tick(300_000, 2048 * 32), TickOutcome::Skipped);
    assert!(harness.coordinator().resident_windows()[5].is_empty());

    handle.complete_next();
    assert_eq!(harness.tick(300_000, 2048 * 32), TickOutcome::Resident);
    assert_eq!(harness.coordinator().resident_windows()[5], dispatched.range);
    harness.verify_slot(Lod(5)).unwrap();

    let uploads = harness.coordinator_mut().take_uploads();
    assert_eq!(uploads.len(), 1);
    let layout = *harness.coordinator().layout();
    assert_eq!(uploads[0].origin_y, 5 * layout.block_height());
    assert_eq!(
        harness.coordinator().atlas().region_floats(&uploads[0]).len(),
        layout.block_size() * 2
    );
}

#[test]
fn never_more_than_one_request_per_lod() {
    let (mut harness, handle) =
        PagingHarness::manual(signals::chirp(1 << 21, 20.0, 8000.0), EngineConfig::default(), 64)
            .unwrap();

    let mut offset = 0i64;
    for step in 0..400u64 {
        let window = 2048 << (step % 9);
        offset += (step as i64 % 7 - 3) * 5000;
        harness.tick(offset, window);

        let pending = handle.pending();
        for lod in 0..12u8 {
            let count = pending.iter().filter(|key| key.lod == Lod(lod)).count();
            assert!(count <= 1, "step {step}: {count} requests for lod{lod}");
            assert!(harness.coordinator().in_flight().count_for(Lod(lod)) <= 1);
        }
        if step % 20 == 0 {
            handle.complete_all();
        }
    }
    assert!(harness.coordinator().stats().skipped > 0);
}

#[test]
fn clamped_request_pads_with_silence() {
    let mut coordinator =
        PagingCoordinator::new(signals::constant(1000, 1.0), EngineConfig::default()).unwrap();
    coordinator.request(Lod(2), SampleRange::new(-100, 50));

    assert_eq!(coordinator.resident_windows()[2], SampleRange::new(0, 50));
    let slot = coordinator.atlas().slot(Lod(2));
    assert_relative_eq!(slot[0].lo, 0.0);
    assert_relative_eq!(slot[0].hi, 1.0 / ATTENUATION, epsilon = 1e-6);
    assert!(slot[13..].iter().all(|t| *t == Texel::ZERO));
}

#[test]
fn lost_completion_starves_lod_without_timeout() {
    let (mut harness, handle) =
        PagingHarness::manual(signals::ramp(1 << 18), EngineConfig::default(), 8).unwrap();

    assert_eq!(harness.tick(0, 2048), TickOutcome::Dispatched);
    handle.drop_next();
    for _ in 0..10 {
        assert_eq!(harness.tick(0, 2048), TickOutcome::Skipped);
    }
    assert!(harness.coordinator().in_flight().is_pending(Lod(0)));
}

#[test]
fn timeout_abandons_lost_completion() {
    let config = EngineConfig {
        completion_timeout_ms: Some(50),
        ..Default::default()
    };
    let (mut harness, handle) = PagingHarness::manual(signals::ramp(1 << 18), config, 8).unwrap();

    assert_eq!(harness.tick(0, 2048), TickOutcome::Dispatched);
    let lost = handle.pending()[0];
    thread::sleep(Duration::from_millis(80));

    // The stale request is abandoned and a new one goes out for the panned view.
    assert_eq!(harness.tick(20_000, 2048), TickOutcome::Dispatched);
    assert_eq!(harness.coordinator().stats().timed_out, 1);
    let current = handle.pending()[1];
    assert_ne!(lost, current);

    // The late result for the abandoned key is discarded.
    handle.complete_next();
    harness.tick(20_000, 2048);
    assert_eq!(harness.coordinator().stats().discarded, 1);
    assert!(harness.coordinator().resident_windows()[0].is_empty());

    handle.complete_next();
    assert_eq!(harness.tick(20_000, 2048), TickOutcome::Resident);
    assert_eq!(harness.coordinator().resident_windows()[0], current.range);
}

#[test]
fn full_backend_defers_until_capacity_returns() {
    let (mut harness, handle) =
        PagingHarness::manual(signals::ramp(1 << 18), EngineConfig::default(), 0).unwrap();

    assert_eq!(harness.tick(0, 2048), TickOutcome::Deferred);
    assert!(harness.coordinator().in_flight().is_empty());

    handle.set_capacity(1);
    assert_eq!(harness.tick(0, 2048), TickOutcome::Dispatched);
    handle.complete_all();
    assert_eq!(harness.tick(0, 2048), TickOutcome::Resident);
}

#[test]
fn hysteresis_avoids_refetch_at_threshold() {
    let config = EngineConfig {
        lod_hysteresis: 0.2,
        ..Default::default()
    };
    let mut harness = PagingHarness::sync(signals::ramp(1 << 20), config).unwrap();
    let center = 102_000i64;
    harness.run_until_resident(center - 2000, 4000).unwrap();
    let commits = harness.coordinator().stats().inline_commits;

    // Zoom around the lod0/lod1 threshold at 4096 while keeping the centre fixed.
    for window in [4100u64, 4000, 4200, 3990, 4150] {
        let offset = center - (window / 2) as i64;
        assert_eq!(harness.tick(offset, window), TickOutcome::Resident);
    }
    assert_eq!(harness.coordinator().stats().inline_commits, commits);
}

#[test]
fn worker_threads_page_a_zoom_session() {
    let mut harness =
        PagingHarness::threaded(signals::chirp(1 << 22, 30.0, 12_000.0), EngineConfig::default())
            .unwrap();

    for (offset, window) in [
        (0, 2048),
        (1_000_000, 2048 * 8),
        (500_000, 2048 * 64),
        (0, 2048 * 2048),
        (3_000_000, 2048 * 3),
    ] {
        harness.run_until_resident(offset, window).unwrap();
        let lod = harness.viewport(offset, window).lod;
        harness.verify_slot(lod).unwrap();
    }
    let stats = *harness.coordinator().stats();
    assert!(stats.async_commits >= 5);
    assert_eq!(stats.inline_commits, 0);
}

#[test]
fn playback_cursor_does_not_affect_paging() {
    let mut harness =
        PagingHarness::sync(signals::ramp(1 << 18), EngineConfig::default()).unwrap();
    harness.run_until_resident(0, 2048).unwrap();
    let before = harness.coordinator().resident_windows().to_vec();

    harness
        .coordinator_mut()
        .set_playback_cursor(Some(200_000));
    assert_eq!(harness.tick(0, 2048), TickOutcome::Resident);
    assert_eq!(harness.coordinator().resident_windows(), before.as_slice());
    assert_eq!(harness.coordinator().playback_cursor(), Some(200_000));
}
