//! Command implementations.

use crate::options::load_config;
use crate::{OutputFormat, RunArgs};
use fetal_seg::core::config::SegmentationConfig;
use fetal_seg::core::errors::SegResult;
use fetal_seg::domain::CaseDescriptor;
use fetal_seg::models::DynUnetTopology;
use fetal_seg::pipeline::{
    RunReport, SegmentationPipelineBuilder, create_case_list, discover_cases,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Segments explicitly listed files. Returns false if any case failed.
pub fn segment_files(files: &[PathBuf], args: &RunArgs) -> SegResult<bool> {
    let cases = create_case_list(files)?;
    run(cases, args, None)
}

/// Segments every pending NIfTI file under `input_dir`.
pub fn segment_directory(input_dir: &Path, args: &RunArgs) -> SegResult<bool> {
    run(Vec::new(), args, Some(input_dir))
}

fn run(cases: Vec<CaseDescriptor>, args: &RunArgs, input_dir: Option<&Path>) -> SegResult<bool> {
    let start = Instant::now();
    let config = load_config(args)?;
    install_thread_pool(&config);

    info!("Initializing segmentation pipeline...");
    let mut pipeline = SegmentationPipelineBuilder::new(config).build()?;
    info!(
        "Pipeline ready in {:.2}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );

    let cases = match input_dir {
        Some(dir) => discover_cases(dir, pipeline.naming())?,
        None => cases,
    };
    if cases.is_empty() {
        info!("Nothing to segment");
    }

    let report = pipeline.run(cases)?;
    print_report(&report, args.output);
    Ok(report.is_success())
}

fn install_thread_pool(config: &SegmentationConfig) {
    match config.parallel_policy().install_global_thread_pool() {
        Ok(true) => info!("Using {} worker threads", config.device.num_workers),
        Ok(false) => {}
        Err(e) => warn!("Could not configure the thread pool: {}", e),
    }
}

fn print_report(report: &RunReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{}", json),
            Err(e) => warn!("Could not serialize run report: {}", e),
        },
        OutputFormat::Pretty => {
            println!("\n=== Segmentation Results ===");
            println!("Elapsed: {:.2}s", report.elapsed_secs);
            println!("Segmented: {}", report.processed.len());
            println!("Failed: {}", report.failed.len());
            if !report.processed.is_empty() {
                println!("\n--- Written ---");
                for (idx, case) in report.processed.iter().enumerate() {
                    println!(
                        "[{}] {} -> {}",
                        idx + 1,
                        case.input.display(),
                        case.output.display()
                    );
                }
            }
            if !report.failed.is_empty() {
                println!("\n--- Failed ---");
                for case in &report.failed {
                    println!("{}: {}", case.input.display(), case.error);
                }
            }
        }
    }
}

/// Prints the kernel and stride schedule the config implies.
pub fn print_topology(config_file: &Path, format: OutputFormat) -> SegResult<()> {
    let config = SegmentationConfig::from_yaml_file(config_file)?;
    config.validate_parameters()?;
    let topology = DynUnetTopology::derive(config.inplane_spacing(), config.inplane_size())?;
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(&topology) {
            Ok(json) => println!("{}", json),
            Err(e) => warn!("Could not serialize topology: {}", e),
        },
        OutputFormat::Pretty => {
            println!(
                "spacing {:?}, patch {:?}, {} levels, total stride {:?}",
                config.inplane_spacing(),
                config.inplane_size(),
                topology.depth(),
                topology.total_stride()
            );
            for (level, (kernel, stride)) in topology
                .kernels
                .iter()
                .zip(&topology.strides)
                .enumerate()
            {
                println!("  level {level}: kernel {:?}, stride {:?}", kernel, stride);
            }
            println!("  upsample kernels {:?}", topology.upsample_kernels);
        }
    }
    Ok(())
}
