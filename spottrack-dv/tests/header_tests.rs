#![allow(clippy::cast_possible_truncation, clippy::float_cmp)]
use spottrack_dv::{
    encode_file, swap_header_bytes, ByteOrder, DvHeader, Error, ExtendedHeader, ImageSequence,
    DV_MAGIC, HEADER_SIZE,
};

// Every sample encodes its own (x, y, z, wave, time) position
fn tagged_stacks(header: &DvHeader) -> Vec<Vec<i16>> {
    let dims = header.stack_dims();
    (0..header.num_times())
        .map(|t| {
            let mut stack = vec![0i16; dims.len()];
            for w in 0..dims.num_waves {
                for z in 0..dims.num_z {
                    for y in 0..dims.rows {
                        for x in 0..dims.cols {
                            stack[dims.offset(x, y, z, w)] =
                                (t * 10_000 + w * 1000 + z * 100 + y * 10 + x) as i16;
                        }
                    }
                }
            }
            stack
        })
        .collect()
}

#[test]
fn test_magic_position() {
    let raw = DvHeader::new(4, 4, 4, 1, 1).to_bytes();
    assert_eq!(i16::from_ne_bytes([raw[96], raw[97]]), DV_MAGIC);
}

#[test]
fn test_swapped_file_decodes_identically() {
    let mut header = DvHeader::new(3, 2, 2, 2, 2);
    header.pixel_size = [0.065, 0.065, 0.2];
    header.wave_ids[..2].copy_from_slice(&[528, 683]);
    let stacks = tagged_stacks(&header);

    let native = encode_file(&header, None, &stacks, ByteOrder::Native).unwrap();
    let swapped = encode_file(&header, None, &stacks, ByteOrder::Swapped).unwrap();
    assert_eq!(native.len(), swapped.len());
    assert_ne!(native[..HEADER_SIZE], swapped[..HEADER_SIZE]);

    let a = DvHeader::parse(&native).unwrap();
    let b = DvHeader::parse(&swapped).unwrap();
    assert_eq!(a.byte_order, ByteOrder::Native);
    assert_eq!(b.byte_order, ByteOrder::Swapped);
    assert_eq!(a.stack_dims(), b.stack_dims());
    assert_eq!(a.voxel_size(), b.voxel_size());
    assert_eq!(a.wave_ids(), b.wave_ids());
}

#[test]
fn test_header_swap_round_trip_is_bit_exact() {
    let mut header = DvHeader::new(512, 512, 30, 3, 10);
    header.set_label(3, "label text stays put");
    header.extra[5] = 0xAB;
    let original = header.to_bytes();
    let mut raw = original;
    swap_header_bytes(&mut raw);
    swap_header_bytes(&mut raw);
    assert_eq!(raw, original);
}

#[test]
fn test_garbage_rejected_before_anything_else() {
    let mut raw = [0u8; HEADER_SIZE];
    raw[96] = 0x12;
    raw[97] = 0x34;
    assert!(matches!(DvHeader::parse(&raw), Err(Error::BadMagic { .. })));
}

#[test]
fn test_layout_follows_sequence() {
    for sequence in [ImageSequence::Ztw, ImageSequence::Wzt, ImageSequence::Zwt] {
        let mut header = DvHeader::new(2, 2, 3, 2, 2);
        header.image_sequence = sequence as i16;
        let stacks = tagged_stacks(&header);
        let bytes = encode_file(&header, None, &stacks, ByteOrder::Native).unwrap();
        let parsed = DvHeader::parse(&bytes).unwrap();
        let layout = parsed.layout();

        for t in 0..2 {
            for (w, z, plane) in layout.timepoint_planes(t) {
                let offset = parsed.plane_offset(plane);
                let first = i16::from_ne_bytes([bytes[offset], bytes[offset + 1]]);
                assert_eq!(first as usize, t * 10_000 + w * 1000 + z * 100);
            }
        }
    }
}

#[test]
fn test_extended_header_shifts_data() {
    let mut header = DvHeader::new(2, 2, 2, 1, 1);
    header.ints_per_section = 1;
    header.floats_per_section = 2;
    let extended = ExtendedHeader::from_sections(
        1,
        2,
        &[(vec![0], vec![0.0, 1.25]), (vec![0], vec![0.0, 1.5])],
    );
    let stacks = tagged_stacks(&header);
    let bytes = encode_file(&header, Some(&extended), &stacks, ByteOrder::Swapped).unwrap();
    let parsed = DvHeader::parse(&bytes).unwrap();
    assert_eq!(parsed.ext_header_size, 24);
    assert_eq!(parsed.data_offset(), HEADER_SIZE + 24);

    let decoded = ExtendedHeader::parse(&parsed, &bytes);
    assert_eq!(decoded.elapsed_seconds(0), Some(1.25));
    assert_eq!(decoded.elapsed_seconds(1), Some(1.5));
}
