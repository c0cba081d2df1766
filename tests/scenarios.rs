mod common;

use bit_vec::BitVec;
use fluxcodec::{prelude::*, track_schema::Schema};

use crate::common::random_bytes;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn all_schemas() -> Vec<TrackSchema> {
    vec![
        TrackSchema::System34(System34Layout::default()),
        TrackSchema::System34(System34Layout::fm()),
        TrackSchema::Amiga(AmigaLayout::default()),
        TrackSchema::C64(C64Layout::default()),
        TrackSchema::Apple2(Apple2Layout::default()),
        TrackSchema::Victor9k(Victor9kLayout::default()),
        TrackSchema::NorthStar(NorthStarLayout::default()),
        TrackSchema::Micropolis(MicropolisLayout::default()),
        TrackSchema::Brother(BrotherLayout::default()),
        TrackSchema::Macintosh(MacintoshLayout::default()),
    ]
}

#[test]
fn c64_single_sector_round_trip() {
    init();
    let schema = TrackSchema::C64(C64Layout::default());
    let physical = DiskCh::new(10, 0);
    let data = random_bytes(256, 10);
    let sector = Sector::new(physical, DiskChs::new(10, 0, 3), data.clone());

    let track = encode_track(&schema, physical, &[sector], &EncodeOptions::default()).unwrap();

    let from_bits = decode_bits(&schema, physical, &track.bits, track.clock_period, &track.index_marks);
    let from_flux = decode_track(&schema, physical, &track.timeline, &DecodeOptions::default());

    for result in [from_bits, from_flux] {
        assert_eq!(result.sectors.len(), 1);
        let decoded = &result.sectors[0];
        assert_eq!(decoded.status, SectorStatus::Ok);
        assert_eq!(decoded.data, data);
        assert_eq!(decoded.logical.get(), (10, 0, 3));
        assert_eq!(decoded.physical, physical);
    }
}

#[test]
fn flipped_mfm_payload_bit_is_bad_checksum() {
    init();
    let schema = TrackSchema::System34(System34Layout::default());
    let physical = DiskCh::new(5, 1);
    let data = random_bytes(512, 5);
    let sector = Sector::new(physical, DiskChs::new(5, 1, 2), data.clone());

    let track = encode_track(&schema, physical, &[sector], &EncodeOptions::default()).unwrap();
    let clean = decode_bits(&schema, physical, &track.bits, track.clock_period, &[]);
    assert_eq!(clean.sectors.len(), 1);
    assert_eq!(clean.sectors[0].status, SectorStatus::Ok);

    // Sync, mark, then the data bit of payload byte 200.
    let data_record = clean.sectors[0].records[1].position;
    let target = data_record + 48 + 16 + 200 * 16 + 1;
    let mut bits = track.bits.clone();
    let flipped = !bits[target];
    bits.set(target, flipped);

    let corrupt = decode_bits(&schema, physical, &bits, track.clock_period, &[]);
    assert_eq!(corrupt.sectors.len(), 1);
    let decoded = &corrupt.sectors[0];
    assert_eq!(decoded.status, SectorStatus::BadChecksum);
    assert_eq!(decoded.data.len(), data.len());
    assert_ne!(decoded.data, data);
    assert_eq!(decoded.logical, DiskChs::new(5, 1, 2));
}

#[test]
fn no_sync_no_sectors() {
    init();
    let physical = DiskCh::new(0, 0);

    // MFM-encoded zeros: a legal bit sequence that contains none of the sync patterns.
    let mut bits = BitVec::with_capacity(100_000);
    for _ in 0..50_000 {
        bits.push(true);
        bits.push(false);
    }

    for schema in all_schemas() {
        let result = decode_bits(&schema, physical, &bits, 2e-6, &[]);
        assert!(result.sectors.is_empty(), "{} found sectors", schema);
        assert!(result.records.is_empty(), "{} found records", schema);

        let result = decode_track(&schema, physical, &FluxTimeline::default(), &DecodeOptions::default());
        assert!(result.sectors.is_empty());
        assert_eq!(result.bit_count, 0);
    }
}

#[test]
fn conflicting_good_reads_become_conflicts() {
    init();
    let schema = TrackSchema::System34(System34Layout::default());
    let physical = DiskCh::new(0, 0);
    let chs = DiskChs::new(0, 0, 0);

    let reads: Vec<Sector> = [1u64, 2]
        .iter()
        .flat_map(|seed| {
            let sector = Sector::new(physical, chs, random_bytes(512, *seed));
            let track = encode_track(&schema, physical, &[sector], &EncodeOptions::default()).unwrap();
            decode_track(&schema, physical, &track.timeline, &DecodeOptions::default()).sectors
        })
        .collect();
    assert_eq!(reads.len(), 2);
    assert!(reads.iter().all(|s| s.status == SectorStatus::Ok));

    let consolidated = consolidate_sectors(reads);
    assert_eq!(consolidated.len(), 2);
    assert!(consolidated.iter().all(|s| s.status == SectorStatus::Conflict));
    assert!(consolidated.iter().all(|s| s.logical == chs));
    assert_ne!(consolidated[0].data, consolidated[1].data);
}

#[test]
fn overrun_is_fatal() {
    init();
    let physical = DiskCh::new(0, 0);

    let schema = TrackSchema::C64(C64Layout::default());
    let sectors: Vec<Sector> = (0..30)
        .map(|s| Sector::new(physical, physical.with_sector(s), vec![0; 256]))
        .collect();
    let result = encode_track(&schema, physical, &sectors, &EncodeOptions::default());
    match result {
        Err(CodecError::TrackDataOverrun { needed, capacity }) => {
            assert!(needed > capacity);
            assert_eq!(capacity, schema.timing(physical).capacity_bits());
        }
        other => panic!("expected an overrun, got {:?}", other.map(|t| t.bits.len())),
    }

    // Eighteen double density sectors do not fit at 300 RPM.
    let schema = TrackSchema::System34(System34Layout::default().with_sectors(18, 512));
    let sectors: Vec<Sector> = schema
        .expected_sectors(physical)
        .into_iter()
        .map(|chs| Sector::new(physical, chs, vec![0xF6; 512]))
        .collect();
    let result = encode_track(&schema, physical, &sectors, &EncodeOptions::default());
    assert!(matches!(result, Err(CodecError::TrackDataOverrun { .. })));
}

#[test]
fn unsupported_sector_size_is_fatal() {
    init();
    let physical = DiskCh::new(0, 0);
    let schema = TrackSchema::C64(C64Layout::default());
    let sector = Sector::new(physical, physical.with_sector(0), vec![0; 512]);
    let result = encode_track(&schema, physical, &[sector], &EncodeOptions::default());
    assert!(matches!(result, Err(CodecError::UnsupportedSectorSize(512))));
}
