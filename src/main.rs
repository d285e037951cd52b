use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Datelike, Duration, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;

use runcheck::{
    classify_indoor, classify_outdoor, extract, EngineConfig, ExtractionResult, SourceRead,
};

#[derive(Parser)]
#[command(name = "runcheck", about = "Recover run fields from OCR text and validate submissions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract duration / distance / shot date from one OCR text file
    Extract {
        file: PathBuf,
        /// Year assumed for dates with no year (default: current local year)
        #[arg(long)]
        year: Option<i32>,
    },
    /// Classify an outdoor submission from its OCR text files
    Outdoor {
        /// OCR text of the tracker/app photo
        #[arg(long)]
        primary: PathBuf,
        /// OCR text of the fallback selfie, if any
        #[arg(long)]
        selfie: Option<PathBuf>,
        #[arg(long)]
        year: Option<i32>,
    },
    /// Classify an indoor submission from its two OCR text files
    Indoor {
        /// OCR text of the wearable/app photo
        #[arg(long)]
        device: PathBuf,
        /// OCR text of the exercise-machine photo
        #[arg(long)]
        machine: PathBuf,
        #[arg(long)]
        year: Option<i32>,
    },
    /// Extract every .txt file under a directory, one JSON line per file
    Batch {
        dir: PathBuf,
        #[arg(long)]
        year: Option<i32>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = EngineConfig::from_env()?;

    match cli.command {
        Commands::Extract { file, year } => {
            let got = extract_file(&file, year.unwrap_or_else(|| local_year(&cfg)), &cfg)?;
            println!("{}", serde_json::to_string_pretty(&got)?);
        }
        Commands::Outdoor { primary, selfie, year } => {
            let year = year.unwrap_or_else(|| local_year(&cfg));
            let primary = SourceRead::parsed(extract_file(&primary, year, &cfg)?);
            let selfie = match selfie {
                Some(p) => Some(SourceRead::parsed(extract_file(&p, year, &cfg)?)),
                None => None,
            };
            let outcome = classify_outdoor(&primary, selfie.as_ref(), &cfg);
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Indoor { device, machine, year } => {
            let year = year.unwrap_or_else(|| local_year(&cfg));
            let device = SourceRead::parsed(extract_file(&device, year, &cfg)?);
            let machine = SourceRead::parsed(extract_file(&machine, year, &cfg)?);
            let outcome = classify_indoor(&device, &machine, &cfg);
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Batch { dir, year } => {
            let year = year.unwrap_or_else(|| local_year(&cfg));
            batch(&dir, year, &cfg)?;
        }
    }

    Ok(())
}

fn local_year(cfg: &EngineConfig) -> i32 {
    (Utc::now() + Duration::hours(cfg.tz_offset_hours as i64)).year()
}

fn extract_file(path: &Path, year: i32, cfg: &EngineConfig) -> Result<ExtractionResult> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading OCR text from {}", path.display()))?;
    Ok(extract(&text, year, cfg))
}

#[derive(Serialize)]
struct BatchRow<'a> {
    file: String,
    #[serde(flatten)]
    fields: &'a ExtractionResult,
}

fn batch(dir: &Path, year: i32, cfg: &EngineConfig) -> Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "txt"))
        .map(|e| e.into_path())
        .collect();

    if files.is_empty() {
        println!("No .txt files under {}", dir.display());
        return Ok(());
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    for chunk in files.chunks(500) {
        let results: Vec<(PathBuf, ExtractionResult)> = chunk
            .par_iter()
            .map(|path| {
                let text = fs::read_to_string(path).unwrap_or_default();
                (path.clone(), extract(&text, year, cfg))
            })
            .collect();

        for (path, fields) in &results {
            let row = BatchRow { file: path.display().to_string(), fields };
            println!("{}", serde_json::to_string(&row)?);
        }
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    eprintln!("Extracted {} files.", files.len());
    Ok(())
}
