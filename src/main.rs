use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dicom_volume::{DicomOpener, LoaderOptions, TracingReporter, VolumeLoader};

/// Assemble a folder of DICOM slices into a volume and print a summary.
#[derive(Parser, Debug)]
#[command(name = "dicom-volume")]
struct CliArgs {
    /// Folder containing the slice files
    folder: PathBuf,

    /// Slice file extension
    #[arg(long, default_value = "dcm")]
    extension: String,

    /// Worker threads (defaults to the available parallelism)
    #[arg(long)]
    workers: Option<usize>,

    /// Fail if any slice file is skipped
    #[arg(long)]
    strict: bool,

    /// Index of a slice to export, in location order
    #[arg(long, requires = "out")]
    export_slice: Option<usize>,

    /// Output path for the exported slice (.exr)
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = CliArgs::parse();

    let mut options = LoaderOptions::new()
        .with_extension(&args.extension)
        .with_strict(args.strict);
    if let Some(workers) = args.workers {
        options = options.with_workers(workers);
    }

    let loaded = VolumeLoader::with_parts(DicomOpener, TracingReporter, options)
        .load(&args.folder)
        .with_context(|| format!("Failed to load volume from {:?}", args.folder))?;
    let volume = &loaded.volume;

    println!("{}", volume.patient());
    println!("{}", volume.scan_metadata());
    let (depth, height, width) = volume.dim();
    println!("Volume: {width}x{height}x{depth} ({} samples)", volume.volume_size());
    println!("Raw value range: {}..={}", volume.min_value(), volume.max_value());
    println!(
        "Loaded {} of {} files in {:?}",
        loaded.report.loaded, loaded.report.total_files, loaded.report.elapsed
    );
    for failure in &loaded.report.failures {
        println!("  skipped {failure}");
    }

    if let (Some(index), Some(out)) = (args.export_slice, &args.out) {
        volume
            .export_slice(out, index)
            .with_context(|| format!("Failed to export slice {index} to {out:?}"))?;
        println!("Saved slice {index} to {out:?}");
    }

    Ok(())
}
