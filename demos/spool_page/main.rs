//! Records a small demo page, saves it, reloads it and prints each
//! band's reconstructed command stream.

use platen_clist::{ClistConfig, ClistWriter, ColorInfo, TileBitmap};
use platen_params::{ParamList, ParamValue};

fn main() -> anyhow::Result<()> {
	env_logger::init_from_env(env_logger::Env::default().default_filter_or("debug"));

	let config = ClistConfig::new(600, 400, 100, ColorInfo::rgb24());
	let mut writer = ClistWriter::open(config)?;

	let mut params = ParamList::new();
	params.push("Title", ParamValue::String("demo page".into()));
	writer.put_params(&params)?;

	// A few fills across bands
	writer.fill_page(0x00ff_ffff)?;
	writer.fill_rectangle(40, 40, 200, 120, 0x0020_70c0)?;
	writer.fill_rectangle(40, 180, 200, 120, 0x00c0_3020)?;

	// A checkerboard tile across the lower half
	let tile_rows = vec![0b1010_1010u8, 0b0101_0101].repeat(4);
	let tile = TileBitmap::from_data(&tile_rows, 1, 8, 8, 1);
	writer.strip_tile_rectangle(&tile, 300, 40, 240, 320, 0x0, 0x0000_0000, (0, 0))?;

	let saved = writer.save_page()?;
	println!("saved page manifest:\n{}", saved.to_json()?);

	let reader = saved.load()?;
	for band in 0..reader.band_count() {
		let commands = reader.band_commands(band)?;
		println!("band {band}: {} commands", commands.len());
	}
	saved.remove_files()?;
	Ok(())
}
