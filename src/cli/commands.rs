use std::path::Path;

use crate::analyzers::WeatherAnalyzer;
use crate::cli::args::{Cli, Commands, DatasetArgs};
use crate::cli::logging::init_logging;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::models::{Column, Feature, WeatherTable};
use crate::pipeline::WeatherPipeline;
use crate::processors::TableFilter;
use crate::reports::{narrator_from_settings, summarize, ReportBuilder};
use crate::utils::progress::ProgressReporter;
use crate::writers::CsvTableWriter;

pub fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;
    let config = PipelineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate {
            start,
            end,
            seed,
            output,
        } => {
            let mut config = config;
            if let Some(start) = start {
                config.generator.start_date = start;
            }
            if let Some(end) = end {
                config.generator.end_date = end;
            }
            if let Some(seed) = seed {
                config.generator.seed = seed;
            }
            let pipeline = WeatherPipeline::new(config.validated()?);

            let progress = ProgressReporter::new_spinner("Generating synthetic series...", false);
            let table = pipeline.generate()?;
            progress.finish_with_message(&format!("Generated {} daily records", table.len()));

            if let Some(path) = output {
                CsvTableWriter::new().write(&table, &path)?;
                println!("Wrote {}", path.display());
            }
            println!("\n{}", summarize(&table));
        }

        Commands::Clean { dataset, output } => {
            let pipeline = WeatherPipeline::new(config);
            let progress = ProgressReporter::new_spinner("Cleaning data...", false);
            let prepared = pipeline.load_dataset(dataset.input.as_deref())?;
            progress.finish_and_clear();

            if prepared.used_fallback {
                println!("Input could not be used; showing the generated default dataset.");
            }
            println!("{}", prepared.cleaning.summary());

            let table = apply_filter(&prepared.table, &dataset);
            if let Some(path) = output {
                CsvTableWriter::new().write(&table, &path)?;
                println!("Wrote {} rows to {}", table.len(), path.display());
            }
        }

        Commands::Detect {
            dataset,
            contamination,
            seed,
            json,
            output,
            show,
        } => {
            let mut config = config;
            if let Some(contamination) = contamination {
                config.detector.contamination = contamination;
            }
            if let Some(seed) = seed {
                config.detector.seed = seed;
            }
            let config = config.validated()?;
            let detector = config.detector.detector();

            let mut table = prepare(&WeatherPipeline::new(config), &dataset, !json)?;

            let progress = ProgressReporter::new_spinner("Detecting anomalies...", json);
            let outcome = detector.detect(&mut table);
            progress.finish_and_clear();

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.info)?);
            } else {
                match outcome.message() {
                    Some(message) => println!("{}", message),
                    None => println!(
                        "Analyzed {} records, found {} anomalies.",
                        outcome.rows_analyzed,
                        outcome.anomaly_count()
                    ),
                }
                for record in outcome.anomalies.iter().take(show) {
                    println!(
                        "  {}  temperature={} humidity={} precipitation={} wind_speed={} score={}",
                        record.formatted_date(),
                        record.cell(Column::Temperature),
                        record.cell(Column::Humidity),
                        record.cell(Column::Precipitation),
                        record.cell(Column::WindSpeed),
                        record
                            .anomaly_score
                            .map(|s| format!("{:.4}", s))
                            .unwrap_or_default()
                    );
                }
                if outcome.anomaly_count() > show {
                    println!("  ... and {} more", outcome.anomaly_count() - show);
                }
            }

            if let Some(path) = output {
                CsvTableWriter::new().write(&table, &path)?;
                if !json {
                    println!("Wrote annotated table to {}", path.display());
                }
            }
        }

        Commands::Report {
            dataset,
            seed,
            output,
        } => {
            let seed = seed.unwrap_or(config.detector.seed);
            let narrator = narrator_from_settings(&config.narrative)?;
            let builder = ReportBuilder::new()
                .with_detector(config.detector.detector())
                .with_narrator(narrator);

            let pipeline = WeatherPipeline::new(config);

            let progress = ProgressReporter::new_spinner("Preparing dataset...", false);
            let prepared = pipeline.load_dataset(dataset.input.as_deref())?;
            progress.set_message("Building report...");
            let report = builder.report(&apply_filter(&prepared.table, &dataset), seed);
            progress.finish_and_clear();

            if prepared.used_fallback {
                println!("Input could not be used; continuing with the generated default dataset.");
            }
            println!("{}", report);
            if let Some(path) = output {
                write_text(&path, &report)?;
            }
        }

        Commands::Stats { dataset } => {
            let table = prepare(&WeatherPipeline::new(config), &dataset, true)?;

            let analyzer = WeatherAnalyzer::new();
            let stats = analyzer.analyze(&table)?;
            println!("{}", stats.detailed_summary());

            if table.has_column(Column::Season) {
                for feature in [Feature::Temperature, Feature::Precipitation] {
                    let seasonal = analyzer.seasonal_stats(&table, feature);
                    if seasonal.is_empty() {
                        continue;
                    }
                    println!("\nSeasonal {}:", feature);
                    for (season, s) in seasonal {
                        println!(
                            "  {:<7} n={:<4} mean={:>7.2} std={:>6.2} min={:>7.2} max={:>7.2}",
                            season.as_str(),
                            s.count,
                            s.mean,
                            s.std,
                            s.min,
                            s.max
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

/// Load, clean and filter the dataset named by `args`.
fn prepare(pipeline: &WeatherPipeline, args: &DatasetArgs, announce: bool) -> Result<WeatherTable> {
    let prepared = pipeline.load_dataset(args.input.as_deref())?;
    if prepared.used_fallback && announce {
        println!("Input could not be used; continuing with the generated default dataset.");
    }
    Ok(apply_filter(&prepared.table, args))
}

fn apply_filter(table: &WeatherTable, args: &DatasetArgs) -> WeatherTable {
    let mut filter = TableFilter::new().with_seasons(args.season.iter().copied());
    if let Some(from) = args.from {
        filter = filter.with_start(from);
    }
    if let Some(to) = args.to {
        filter = filter.with_end(to);
    }
    filter.apply(table)
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, text)?;
    println!("Report written to {}", path.display());
    Ok(())
}
