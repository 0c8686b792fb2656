//! Dumps a spooled page: index records, pseudo-band tables, and the
//! decoded command stream of any band.
//!
//! ```text
//! cargo run --example clist-dump -- --cfile page.cfile --bfile page.bfile \
//!     --width 600 --height 800 --band-height 100 --band 2
//! ```

use std::path::PathBuf;

use clap::Parser;
use platen_clist::reader::open_page_files;
use platen_clist::{ClistConfig, ColorInfo};

#[derive(Parser)]
#[command(about = "Dump a command-list page's index and band streams")]
struct Args {
	/// Payload file of the page
	#[arg(long)]
	cfile: PathBuf,

	/// Index file of the page
	#[arg(long)]
	bfile: PathBuf,

	/// Page width in pixels
	#[arg(long)]
	width: i32,

	/// Page height in pixels
	#[arg(long)]
	height: i32,

	/// Band height in rows
	#[arg(long, default_value_t = 100)]
	band_height: i32,

	/// Band to decode (all bands when omitted)
	#[arg(long)]
	band: Option<usize>,

	/// Color depth in bits per pixel (1, 8, 24 or 32)
	#[arg(long, default_value_t = 24)]
	depth: u16,
}

fn main() -> anyhow::Result<()> {
	env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
	let args = Args::parse();

	let color_info = match args.depth {
		1 => ColorInfo::mono1(),
		8 => ColorInfo::gray8(),
		32 => ColorInfo::cmyk32(),
		_ => ColorInfo::rgb24(),
	};
	let config = ClistConfig::new(args.width, args.height, args.band_height, color_info);
	let reader = open_page_files(&args.cfile, &args.bfile, config)?;

	println!("{} bands", reader.band_count());
	println!("index records:");
	for record in reader.index_records() {
		println!(
			"  bands ({:3},{:3}) at {}",
			record.band_min, record.band_max, record.pos
		);
	}
	for profile in reader.icc_profiles() {
		println!(
			"icc profile {} ({} bytes at {})",
			hex::encode(profile.hash.to_le_bytes()),
			profile.size,
			profile.offset
		);
	}

	let bands: Vec<usize> = match args.band {
		Some(band) => vec![band],
		None => (0..reader.band_count()).collect(),
	};
	for band in bands {
		println!("band {band}:");
		if let Some(usage) = reader.color_usage(band) {
			println!(
				"  usage or={:#x} slow_rop={} trans_empty={}",
				usage.or_mask,
				usage.slow_rop,
				usage.trans_bbox.is_empty()
			);
		}
		for command in reader.band_commands(band)? {
			println!("  {command:?}");
		}
	}
	Ok(())
}
