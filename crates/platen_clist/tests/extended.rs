//! Round trips for the path, state and extension command families.

use platen_clist::writer::{FixedEdge, LineParams, Trapezoid};
use platen_clist::{
	ClistConfig, ClistWriter, ColorInfo, Command, PathSegment, opcode,
};
use platen_params::{ParamList, ParamValue};

fn writer(height: i32, band_height: i32) -> ClistWriter {
	ClistWriter::open(ClistConfig::new(400, height, band_height, ColorInfo::rgb24())).unwrap()
}

fn fixed(v: i32) -> i32 {
	v << 12
}

#[test_log::test]
fn path_segments_replay_in_order() {
	let mut w = writer(100, 100);
	let segments = vec![
		PathSegment {
			op: opcode::segment::RMOVETO,
			coords: vec![fixed(10), fixed(20)],
		},
		PathSegment {
			op: opcode::segment::HLINETO,
			coords: vec![fixed(50)],
		},
		PathSegment {
			op: opcode::segment::VLINETO,
			coords: vec![fixed(30) | 0x7ff],
		},
		PathSegment {
			op: opcode::segment::RRCURVETO,
			coords: vec![
				fixed(1),
				fixed(2),
				fixed(-3),
				fixed(140_000),
				fixed(5) | 1,
				fixed(6),
			],
		},
		PathSegment {
			op: opcode::segment::CLOSEPATH,
			coords: vec![],
		},
	];
	w.write_path(0, 60, &segments, opcode::path_op::EOFILL, 0x00ab_cdef, 0)
		.unwrap();
	let reader = w.into_reader().unwrap();
	let commands = reader.band_commands(0).unwrap();
	let replayed: Vec<_> = commands
		.iter()
		.filter_map(|c| match c {
			Command::Segment(seg) => Some(seg.clone()),
			_ => None,
		})
		.collect();
	assert_eq!(replayed, segments);
	assert!(matches!(
		commands.last(),
		Some(Command::Paint { op }) if *op == opcode::path_op::EOFILL
	));
}

#[test_log::test]
fn rgapto_is_carried_as_a_gap_move() {
	let mut w = writer(50, 50);
	let segments = vec![PathSegment {
		op: opcode::path_op::RGAPTO,
		coords: vec![fixed(7), fixed(-7)],
	}];
	w.write_path(0, 50, &segments, opcode::path_op::STROKE, 0x1, 0)
		.unwrap();
	let reader = w.into_reader().unwrap();
	let commands = reader.band_commands(0).unwrap();
	assert!(commands.iter().any(|c| matches!(
		c,
		Command::Segment(seg) if seg.op == opcode::path_op::RGAPTO
	)));
}

#[test_log::test]
fn path_with_lop_enables_and_sets_it() {
	let mut w = writer(50, 50);
	let segments = vec![PathSegment {
		op: opcode::segment::RMOVETO,
		coords: vec![0, 0],
	}];
	w.write_path(0, 50, &segments, opcode::path_op::FILL, 0x1, 0xe2)
		.unwrap();
	let reader = w.into_reader().unwrap();
	let commands = reader.band_commands(0).unwrap();
	assert!(commands.contains(&Command::SetLop(0xe2)));
	assert!(commands.contains(&Command::EnableLop));
}

#[test_log::test]
fn trapezoid_round_trip_with_corner_colors() {
	let mut w = writer(200, 100);
	let trap = Trapezoid {
		left: FixedEdge {
			start: (fixed(10), fixed(20)),
			end: (fixed(15), fixed(150)),
		},
		right: FixedEdge {
			start: (fixed(300), fixed(20)),
			end: (fixed(280), fixed(150)),
		},
		ybot: fixed(20),
		ytop: fixed(150),
		options: 2,
		clip: Some((fixed(0), fixed(0), fixed(400), fixed(200))),
		corner_colors: [
			Some(vec![0x1000_0000, 0x2000_0000, 0x3000_0000]),
			None,
			Some(vec![0, 0x7f00_0000, 0x0400_0000]),
			None,
		],
	};
	w.fill_trapezoid(&trap, 0x00b0_b0b0).unwrap();
	let reader = w.into_reader().unwrap();
	for band in 0..2 {
		let commands = reader.band_commands(band).unwrap();
		let decoded = commands
			.iter()
			.find_map(|c| match c {
				Command::FillTrapezoid(t) => Some(t),
				_ => None,
			})
			.expect("trapezoid in every covered band");
		assert_eq!(decoded.left, [(fixed(10), fixed(20)), (fixed(15), fixed(150))]);
		assert_eq!(decoded.options, 2);
		assert_eq!(decoded.bounds, Some((fixed(20), fixed(150))));
		assert_eq!(
			decoded.clip,
			Some((fixed(0), fixed(0), fixed(400), fixed(200)))
		);
		assert_eq!(
			decoded.corner_colors[0],
			Some(vec![0x1000_0000, 0x2000_0000, 0x3000_0000])
		);
		assert_eq!(decoded.corner_colors[1], None);
		assert_eq!(
			decoded.corner_colors[2],
			Some(vec![0, 0x7f00_0000, 0x0400_0000])
		);
	}
}

#[test_log::test]
fn state_broadcasts_round_trip() {
	let mut w = writer(100, 50);
	w.set_line_params(&LineParams {
		cap: 1,
		join: 2,
		flatness: 0.25,
		line_width: 3.5,
		miter_limit: 4.0,
	})
	.unwrap();
	w.set_dash(&[3.0, 1.0], 0.5, 0.0, false).unwrap();
	w.set_fill_adjust(fixed(1) / 2, fixed(1) / 2).unwrap();
	w.set_screen_phase_all(0, 3, 4).unwrap();
	w.set_screen_phase_all(1, -5, 6).unwrap();
	w.set_color_space(0x12, Some(255)).unwrap();
	let reader = w.into_reader().unwrap();
	for band in 0..2 {
		let commands = reader.band_commands(band).unwrap();
		let misc2 = commands
			.iter()
			.find_map(|c| match c {
				Command::SetMisc2(update) => Some(update),
				_ => None,
			})
			.expect("line parameters present");
		assert_eq!(misc2.cap_join, Some((1 << 3) | 2));
		assert_eq!(misc2.flatness, Some(0.25));
		assert_eq!(misc2.line_width, Some(3.5));
		assert_eq!(misc2.miter_limit, Some(4.0));
		assert!(commands.contains(&Command::SetDash {
			adaptive: false,
			dot_length: 0.0,
			offset: 0.5,
			pattern: vec![3.0, 1.0],
		}));
		assert!(commands.contains(&Command::SetFillAdjust(fixed(1) / 2, fixed(1) / 2)));
		assert!(commands.contains(&Command::SetScreenPhase {
			select: 1,
			phase: platen_clist::usage::IntPoint::new(-5, 6),
		}));
		assert!(commands.contains(&Command::SetColorSpace {
			descriptor: 0x12,
			hival: Some(255),
		}));
	}
}

#[test_log::test]
fn params_travel_in_the_stream() {
	let mut w = writer(50, 50);
	let mut list = ParamList::new();
	list.push("BandHeight", ParamValue::Int(50));
	list.push("Device", ParamValue::Name("platen".into()));
	list.push("Gamma", ParamValue::FloatArray(vec![1.0, 1.8, 2.2]));
	w.put_params(&list).unwrap();
	let reader = w.into_reader().unwrap();
	let commands = reader.band_commands(0).unwrap();
	assert_eq!(commands, vec![Command::PutParams(list)]);
}

#[test_log::test]
fn composite_and_halftone_blobs() {
	let mut w = writer(50, 50);
	w.put_composite(0, 0, b"compositor-blob").unwrap();
	let halftone: Vec<u8> = (0..9000u32).map(|i| (i % 251) as u8).collect();
	w.put_halftone(&halftone).unwrap();
	let reader = w.into_reader().unwrap();
	let commands = reader.band_commands(0).unwrap();
	assert!(commands.contains(&Command::Composite(b"compositor-blob".to_vec())));
	assert!(commands.contains(&Command::PutHalftone {
		size: 9000,
	}));
	let mut reassembled = Vec::new();
	for c in &commands {
		if let Command::PutHalftoneSeg(seg) = c {
			reassembled.extend_from_slice(seg);
		}
	}
	assert_eq!(reassembled, halftone);
}

#[test_log::test]
fn devn_fill_round_trip() {
	let mut w = writer(100, 50);
	let components = vec![0x1000_0000, 0, 0x0800_0000];
	w.fill_rectangle_devn(5, 5, 50, 80, &components).unwrap();
	let reader = w.into_reader().unwrap();
	let band0 = reader.band_commands(0).unwrap();
	assert!(band0.contains(&Command::PutFillDevn(components.clone())));
	assert!(band0.iter().any(|c| matches!(
		c,
		Command::FillRectHl { rect } if rect.x == 5 && rect.height == 45
	)));
	let band1 = reader.band_commands(1).unwrap();
	assert!(band1.iter().any(|c| matches!(
		c,
		Command::FillRectHl { rect } if rect.y == 50 && rect.height == 35
	)));
}

#[test_log::test]
fn images_pass_through_opaquely() {
	let mut w = writer(100, 100);
	let header = b"serialized-image-params".to_vec();
	w.begin_image(0, 100, &header).unwrap();
	let rows: Vec<u8> = vec![0x3c; 3 * 25];
	w.image_data(0, 100, 3, 25, &rows).unwrap();
	w.image_data(0, 100, 0, 0, &[]).unwrap();
	let reader = w.into_reader().unwrap();
	let commands = reader.band_commands(0).unwrap();
	assert_eq!(
		commands,
		vec![
			Command::BeginImage {
				header: header.clone(),
			},
			Command::ImageData {
				rows: 3,
				raster: 25,
				data: rows,
			},
			Command::ImageData {
				rows: 0,
				raster: 0,
				data: vec![],
			},
		]
	);
}

#[test_log::test]
fn copy_color_and_alpha_modes() {
	let mut w = writer(100, 100);
	// 24-bit color copy, 10 pixels wide, 4 rows
	let raster = 30;
	let color_rows: Vec<u8> = (0..raster * 4).map(|i| (i & 0xff) as u8).collect();
	w.copy_color(&color_rows, 0, raster, 0, 5, 5, 10, 4).unwrap();
	// 8-bit alpha copy
	let alpha_rows: Vec<u8> = vec![0x80; 10 * 2];
	w.copy_alpha(&alpha_rows, 0, 10, 5, 40, 10, 2, 8).unwrap();
	let reader = w.into_reader().unwrap();
	let commands = reader.band_commands(0).unwrap();
	let copy_color = commands
		.iter()
		.find_map(|c| match c {
			Command::CopyColor {
				rect,
				data,
				raster,
				..
			} => Some((rect, data, raster)),
			_ => None,
		})
		.expect("color copy present");
	assert_eq!((copy_color.0.width, copy_color.0.height), (10, 4));
	for row in 0..4usize {
		assert_eq!(
			&copy_color.1[row * copy_color.2..row * copy_color.2 + 30],
			&color_rows[row * 30..row * 30 + 30]
		);
	}
	assert!(commands.contains(&Command::SetCopyAlpha));
	let copy_alpha = commands
		.iter()
		.find_map(|c| match c {
			Command::CopyAlpha {
				rect,
				depth,
				data,
				..
			} => Some((rect, depth, data)),
			_ => None,
		})
		.expect("alpha copy present");
	assert_eq!(*copy_alpha.1, 8);
	assert_eq!((copy_alpha.0.width, copy_alpha.0.height), (10, 2));
	assert_eq!(&copy_alpha.2[..10], &alpha_rows[..10]);
}

#[test_log::test]
fn cached_bits_copy_uses_the_tile_slot() {
	let mut w = writer(100, 100);
	let glyph = vec![0xf0u8; 2 * 12];
	let tile = platen_clist::TileBitmap::from_data(&glyph, 2, 16, 12, 1);
	w.copy_mono_cached(&tile, 8, 8, platen_clist::NO_COLOR, 0x1).unwrap();
	w.copy_mono_cached(&tile, 40, 8, platen_clist::NO_COLOR, 0x1).unwrap();
	let reader = w.into_reader().unwrap();
	let commands = reader.band_commands(0).unwrap();
	let installs = commands
		.iter()
		.filter(|c| matches!(c, Command::SetBits { .. }))
		.count();
	assert_eq!(installs, 1, "bits install exactly once per band");
	let copies: Vec<_> = commands
		.iter()
		.filter_map(|c| match c {
			Command::CopyTile {
				x,
				y,
				..
			} => Some((*x, *y)),
			_ => None,
		})
		.collect();
	assert_eq!(copies, vec![(8, 8), (40, 8)]);
}

#[test_log::test]
fn clip_toggles_round_trip() {
	let mut w = writer(50, 50);
	w.begin_clip(0, 0).unwrap();
	let segments = vec![PathSegment {
		op: opcode::segment::RMOVETO,
		coords: vec![0, 0],
	}];
	w.write_path(0, 50, &segments, opcode::path_op::FILL, 0x5, 0).unwrap();
	w.end_clip(0, 0).unwrap();
	let reader = w.into_reader().unwrap();
	let commands = reader.band_commands(0).unwrap();
	assert!(matches!(commands.first(), Some(Command::BeginClip { .. })));
	assert!(commands.contains(&Command::EndClip));
}
