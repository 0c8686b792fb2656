//! Write-then-read round trips over the two-file page format.

use platen_clist::{
	ClistConfig, ClistWriter, ColorInfo, CmdRect, Command, ColorSlot, NO_COLOR, TileBitmap,
};

fn config(width: i32, height: i32, band_height: i32) -> ClistConfig {
	ClistConfig::new(width, height, band_height, ColorInfo::rgb24())
}

#[test_log::test]
fn single_fill_rect_on_a_one_band_page() {
	// band_height 100, page height 50: one band
	let mut writer = ClistWriter::open(config(600, 50, 100)).unwrap();
	assert_eq!(writer.band_count(), 1);
	writer.fill_rectangle(10, 5, 30, 20, 0x00ff_0000).unwrap();
	let reader = writer.into_reader().unwrap();

	let commands = reader.band_commands(0).unwrap();
	assert_eq!(
		commands,
		vec![
			Command::SetColor {
				slot: ColorSlot::Color1,
				color: 0x00ff_0000,
			},
			Command::FillRect {
				rect: CmdRect::new(10, 5, 30, 20),
			},
		]
	);

	// One record for band 0's block, one for the color-usage array
	let records = reader.index_records();
	assert_eq!(records.len(), 2);
	assert_eq!((records[0].band_min, records[0].band_max), (0, 0));
	assert_eq!((records[1].band_min, records[1].band_max), (1, 1));
	assert!(records[0].pos < records[1].pos);
}

#[test_log::test]
fn adjacent_fill_rects_reconstruct() {
	let mut writer = ClistWriter::open(config(200, 50, 100)).unwrap();
	writer.fill_rectangle(0, 0, 10, 10, 0x123456).unwrap();
	writer.fill_rectangle(10, 0, 10, 10, 0x123456).unwrap();
	let reader = writer.into_reader().unwrap();
	let commands = reader.band_commands(0).unwrap();
	assert_eq!(
		commands,
		vec![
			Command::SetColor {
				slot: ColorSlot::Color1,
				color: 0x123456,
			},
			Command::FillRect {
				rect: CmdRect::new(0, 0, 10, 10),
			},
			Command::FillRect {
				rect: CmdRect::new(10, 0, 10, 10),
			},
		]
	);
}

#[test_log::test]
fn oversized_copy_splits_into_halves() {
	// One 10000-pixel row (1250 bytes, incompressible) cannot fit a 1 KiB
	// command buffer raw or RLE'd, so the writer must split it
	let mut cfg = config(10_000, 1, 100);
	cfg.buffer_size = 1024;
	let mut writer = ClistWriter::open(cfg).unwrap();
	let raster = 1250;
	let row: Vec<u8> = (0..raster).map(|i| (i * 37 + i / 3) as u8).collect();
	writer
		.copy_mono(&row, 0, raster, 0, 0, 0, 10_000, 1, NO_COLOR, 0x00ff_ffff)
		.unwrap();
	let reader = writer.into_reader().unwrap();
	let commands = reader.band_commands(0).unwrap();
	let copies: Vec<_> = commands
		.iter()
		.filter_map(|c| match c {
			Command::CopyMono {
				rect,
				data,
				..
			} => Some((rect, data)),
			_ => None,
		})
		.collect();
	assert_eq!(copies.len(), 2, "expected a two-way split");
	assert_eq!(copies[0].0.width, 5000);
	assert_eq!(copies[1].0.width, 5000);
	assert_eq!((copies[0].0.x, copies[1].0.x), (0, 5000));
	// The two halves together must reconstruct the original row
	assert_eq!(&copies[0].1[..625], &row[..625]);
	assert_eq!(&copies[1].1[..625], &row[625..1250]);
}

#[test_log::test]
fn band_isolation() {
	// Three bands; draws on bands 0 and 2 must not leak into band 1
	let mut writer = ClistWriter::open(config(300, 300, 100)).unwrap();
	writer.fill_rectangle(0, 10, 50, 20, 0x00ff_0000).unwrap();
	writer.fill_rectangle(0, 250, 50, 20, 0x0000_00ff).unwrap();
	let reader = writer.into_reader().unwrap();
	assert!(reader.band_commands(1).unwrap().is_empty());
	assert_eq!(reader.band_commands(0).unwrap().len(), 2);
	assert_eq!(reader.band_commands(2).unwrap().len(), 2);
}

#[test_log::test]
fn straddling_fill_touches_both_bands() {
	let mut writer = ClistWriter::open(config(300, 200, 100)).unwrap();
	writer.fill_rectangle(10, 90, 50, 20, 0x00ff_0000).unwrap();
	let reader = writer.into_reader().unwrap();
	let band0 = reader.band_commands(0).unwrap();
	let band1 = reader.band_commands(1).unwrap();
	assert!(matches!(
		band0.last(),
		Some(Command::FillRect { rect }) if *rect == CmdRect::new(10, 90, 50, 10)
	));
	assert!(matches!(
		band1.last(),
		Some(Command::FillRect { rect }) if *rect == CmdRect::new(10, 100, 50, 10)
	));
}

#[test_log::test]
fn range_broadcast_reaches_every_band() {
	// A matrix broadcast on a 4-band page, then a draw on band 2 only
	let mut writer = ClistWriter::open(config(100, 100, 25)).unwrap();
	assert_eq!(writer.band_count(), 4);
	let matrix = [2.0, 0.0, 0.0, 2.0, 10.0, 20.0];
	writer.set_ctm(matrix).unwrap();
	writer.fill_rectangle(0, 55, 40, 10, 0x0000_ff00).unwrap();
	let reader = writer.into_reader().unwrap();
	for band in [0usize, 1, 3] {
		assert_eq!(
			reader.band_commands(band).unwrap(),
			vec![Command::SetCtm(matrix)],
			"band {band}"
		);
	}
	let band2 = reader.band_commands(2).unwrap();
	assert_eq!(band2[0], Command::SetCtm(matrix));
	assert!(matches!(band2.last(), Some(Command::FillRect { .. })));
}

#[test_log::test]
fn broadcast_order_is_preserved_relative_to_band_commands() {
	// Draw, broadcast, draw: band 1 must replay them in that order
	let mut writer = ClistWriter::open(config(100, 50, 25)).unwrap();
	writer.fill_rectangle(0, 30, 10, 10, 0x10).unwrap();
	writer.set_ctm([1.0, 0.0, 0.0, 1.0, 5.0, 5.0]).unwrap();
	writer.fill_rectangle(20, 30, 10, 10, 0x10).unwrap();
	let reader = writer.into_reader().unwrap();
	let band1 = reader.band_commands(1).unwrap();
	let positions: Vec<_> = band1
		.iter()
		.map(|c| match c {
			Command::SetColor {
				..
			} => "color",
			Command::FillRect {
				..
			} => "fill",
			Command::SetCtm(_) => "ctm",
			_ => "other",
		})
		.collect();
	assert_eq!(positions, vec!["color", "fill", "ctm", "fill"]);
}

#[test_log::test]
fn end_page_layout_with_icc_and_usage() {
	let mut writer = ClistWriter::open(config(300, 300, 100)).unwrap();
	let profile = vec![0x42u8; 128];
	writer.reference_icc_profile(&profile);
	for band in 0..3 {
		writer
			.fill_rectangle(0, band * 100 + 5, 20, 10, 0x00aa_bb00 + band as u64)
			.unwrap();
	}
	let reader = writer.into_reader().unwrap();
	let records = reader.index_records();
	// Per-band blocks, then the ICC table, then the color-usage array,
	// at strictly increasing payload offsets
	let bands: Vec<_> = records.iter().map(|r| r.band_min).collect();
	assert_eq!(bands, vec![0, 1, 2, 5, 3]);
	for pair in records.windows(2) {
		assert!(pair[0].pos <= pair[1].pos);
	}
	assert_eq!(reader.icc_profiles().len(), 1);
	assert_eq!(reader.icc_profiles()[0].data, profile);
	for band in 0..3 {
		let usage = reader.color_usage(band).unwrap();
		assert_ne!(usage.or_mask, 0, "band {band} should have color usage");
	}
}

#[test_log::test]
fn permanent_error_is_sticky() {
	let mut writer = ClistWriter::open(config(100, 100, 50)).unwrap();
	writer.fill_rectangle(0, 0, 10, 10, 0x7).unwrap();
	// Request cancellation; the next flush observes it and latches
	writer.interrupt_flag().store(true, std::sync::atomic::Ordering::Relaxed);
	assert!(writer.fill_page(0).is_err());
	// Every subsequent call keeps failing
	assert!(writer.fill_rectangle(0, 0, 5, 5, 0x7).is_err());
	assert!(writer.end_page().is_err());
	// A page reset clears the latch
	writer.interrupt_flag().store(false, std::sync::atomic::Ordering::Relaxed);
	writer.finish_page(true).unwrap();
	writer.fill_rectangle(0, 0, 5, 5, 0x7).unwrap();
	writer.end_page().unwrap();
}

#[test_log::test]
fn save_and_load_reproduce_the_same_streams() {
	let draw = |writer: &mut ClistWriter| {
		writer.fill_rectangle(5, 5, 40, 40, 0x0012_3456).unwrap();
		writer.fill_rectangle(45, 5, 40, 40, 0x0012_3456).unwrap();
		writer.set_ctm([1.0, 0.0, 0.0, -1.0, 0.0, 100.0]).unwrap();
		writer.fill_rectangle(0, 120, 90, 20, 0x00fe_dcba).unwrap();
	};
	let mut direct = ClistWriter::open(config(100, 150, 50)).unwrap();
	draw(&mut direct);
	let direct_reader = direct.into_reader().unwrap();

	let mut saved_writer = ClistWriter::open(config(100, 150, 50)).unwrap();
	draw(&mut saved_writer);
	saved_writer.add_separation("Spot1");
	let saved = saved_writer.save_page().unwrap();
	let manifest = saved.to_json().unwrap();
	let restored = platen_clist::SavedPage::from_json(&manifest).unwrap();
	assert_eq!(restored.separations, vec!["Spot1"]);
	let loaded_reader = restored.load().unwrap();

	for band in 0..direct_reader.band_count() {
		assert_eq!(
			direct_reader.band_commands(band).unwrap(),
			loaded_reader.band_commands(band).unwrap(),
			"band {band}"
		);
	}
	drop(loaded_reader);
	restored.remove_files().unwrap();
}

#[test_log::test]
fn tiles_install_once_per_band() {
	let mut writer = ClistWriter::open(config(200, 200, 100)).unwrap();
	let tile_data = vec![0xa5u8; 8 * 4];
	let tile = TileBitmap::from_data(&tile_data, 8, 64, 4, 1);
	writer
		.strip_tile_rectangle(&tile, 0, 0, 100, 50, 0x0, 0x00ff_ffff, (0, 0))
		.unwrap();
	writer
		.strip_tile_rectangle(&tile, 0, 50, 100, 100, 0x0, 0x00ff_ffff, (0, 0))
		.unwrap();
	let reader = writer.into_reader().unwrap();
	for band in 0..2 {
		let commands = reader.band_commands(band).unwrap();
		let installs = commands
			.iter()
			.filter(|c| matches!(c, Command::SetTileBits { .. }))
			.count();
		assert_eq!(installs, 1, "band {band} should install the tile once");
		let tiles = commands
			.iter()
			.filter(|c| matches!(c, Command::TileRect { .. }))
			.count();
		assert!(tiles >= 1, "band {band} should tile at least once");
	}
}

#[test_log::test]
fn fill_page_is_seen_by_every_band() {
	let mut writer = ClistWriter::open(config(64, 64, 16)).unwrap();
	writer.fill_page(0x0055_5555).unwrap();
	let reader = writer.into_reader().unwrap();
	for band in 0..4 {
		let commands = reader.band_commands(band).unwrap();
		assert_eq!(
			commands,
			vec![
				Command::SetColor {
					slot: ColorSlot::Color1,
					color: 0x0055_5555,
				},
				Command::FillPage,
			],
			"band {band}"
		);
	}
}

#[test_log::test]
fn parallel_replay_matches_sequential() {
	let mut writer = ClistWriter::open(config(128, 128, 32)).unwrap();
	for i in 0..16 {
		writer
			.fill_rectangle(i * 7, i * 8, 30, 20, 0x1000 + i as u64)
			.unwrap();
	}
	let reader = writer.into_reader().unwrap();
	let parallel = reader.replay_all_parallel().unwrap();
	for (band, stream) in parallel.iter().enumerate() {
		assert_eq!(*stream, reader.band_commands(band).unwrap(), "band {band}");
	}
}

#[test_log::test]
fn copy_page_appends_without_rewind() {
	let mut writer = ClistWriter::open(config(50, 50, 50)).unwrap();
	writer.fill_rectangle(0, 0, 10, 10, 0x1).unwrap();
	writer.end_page().unwrap();
	// Keep the data (copy-page): the next page appends
	writer.finish_page(false).unwrap();
	writer.fill_rectangle(20, 20, 10, 10, 0x2).unwrap();
	let reader = writer.into_reader().unwrap();
	// The reader parses the FIRST page of the pair; its stream must be
	// exactly the first page's commands
	let commands = reader.band_commands(0).unwrap();
	assert!(matches!(
		commands.last(),
		Some(Command::FillRect { rect }) if *rect == CmdRect::new(0, 0, 10, 10)
	));
}
