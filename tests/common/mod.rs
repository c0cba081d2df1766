#![allow(dead_code)]

use bit_vec::BitVec;
use fluxcodec::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Deterministic pseudo-random bytes for payloads.
pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen()).collect()
}

/// Move every flux transition of `timeline` by a uniformly distributed offset of up to
/// `jitter` cells of `clock` seconds. Index pulses keep their position. Offsets are applied to
/// absolute transition times, so they do not accumulate.
pub fn jitter_timeline(timeline: &FluxTimeline, clock: f64, jitter: f64, seed: u64) -> FluxTimeline {
    let mut rng = StdRng::seed_from_u64(seed);
    let tick = timeline.tick_period();
    let mut jittered = FluxTimeline::new(tick);

    let mut ideal_ticks = 0u64;
    let mut written_ticks = 0i64;
    for interval in timeline.iter() {
        ideal_ticks += interval.ticks as u64;
        let mut time = ideal_ticks as f64 * tick;
        if !interval.index {
            time += rng.gen_range(-jitter..=jitter) * clock;
        }
        let delta = ((time / tick).round() as i64 - written_ticks).max(0);
        written_ticks += delta;
        if interval.index {
            jittered.push_index(delta as u32);
        }
        else {
            jittered.push_transition(delta as u32);
        }
    }
    jittered
}

/// Scale every interval of `timeline` by `factor`, as a drive spinning at a different speed
/// would read it.
pub fn scale_timeline(timeline: &FluxTimeline, factor: f64) -> FluxTimeline {
    let mut scaled = FluxTimeline::new(timeline.tick_period());
    for interval in timeline.iter() {
        let ticks = (interval.ticks as f64 * factor).round() as u32;
        if interval.index {
            scaled.push_index(ticks);
        }
        else {
            scaled.push_transition(ticks);
        }
    }
    scaled
}

/// Count positions where `a` and `b` agree over their common length, skipping `skip` bits.
pub fn matching_bits(a: &BitVec, b: &BitVec, skip: usize) -> (usize, usize) {
    let len = a.len().min(b.len());
    let compared = len.saturating_sub(skip);
    let matching = (skip..len).filter(|&i| a[i] == b[i]).count();
    (matching, compared)
}

/// One sector per expected id, each filled with a distinct pattern.
pub fn sectors_for(schema: &TrackSchema, physical: DiskCh, size: usize) -> Vec<Sector> {
    use fluxcodec::track_schema::Schema;
    schema
        .expected_sectors(physical)
        .into_iter()
        .map(|chs| {
            let seed = ((chs.c() as u64) << 16) | ((chs.h() as u64) << 8) | chs.s() as u64;
            Sector::new(physical, chs, random_bytes(size, seed))
        })
        .collect()
}
