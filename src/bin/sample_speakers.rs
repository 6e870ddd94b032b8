/// Draw speaker-verification batches from a preprocessed dataset and report throughput
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use speaker_batching::data::{
    BatchDataLoader, PrefetchLoader, SpeakerVerificationDataLoader, SpeakerVerificationDataset,
};
use speaker_batching::plot::{plot_spectrogram, PlotOptions};
use speaker_batching::utils::ValueWindow;
use speaker_batching::{SamplingMode, SpeakerDataConfig, TrainingBatch};

#[derive(Parser)]
#[command(name = "sample-speakers")]
#[command(about = "Sample speaker batches from a preprocessed encoder dataset", long_about = None)]
struct Cli {
    /// Directory holding one subdirectory per speaker
    #[arg(long)]
    root: PathBuf,

    /// JSON sampling configuration; defaults are used for missing fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of batches to draw
    #[arg(long, default_value_t = 10)]
    batches: usize,

    /// Override the sampling mode ("random" or "sequential")
    #[arg(long)]
    mode: Option<SamplingMode>,

    /// Override the sampling seed
    #[arg(long)]
    seed: Option<u64>,

    /// Load batches on worker threads (random mode only)
    #[arg(long)]
    prefetch: bool,

    /// Write a spectrogram of each batch's first partial here
    #[arg(long)]
    plot_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SpeakerDataConfig::from_json_file(path)?,
        None => SpeakerDataConfig::default(),
    };
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    config.validate()?;

    log::info!("Sampling configuration: {:#?}", config);

    let dataset = SpeakerVerificationDataset::from_config(&cli.root, &config)?;
    let logs = dataset.logs()?;
    if !logs.is_empty() {
        log::info!("Preprocessing logs:\n{}", logs);
    }

    let mut loader: Box<dyn BatchDataLoader<Batch = TrainingBatch>> = if cli.prefetch {
        Box::new(PrefetchLoader::spawn(&cli.root, config.clone())?)
    } else {
        Box::new(SpeakerVerificationDataLoader::new(dataset, config.clone())?)
    };

    if let Some(plot_dir) = &cli.plot_dir {
        std::fs::create_dir_all(plot_dir)?;
    }

    let mut load_times = ValueWindow::new(50);
    let mut drawn = 0;
    while drawn < cli.batches {
        let start = Instant::now();
        let batch = match loader.next_batch()? {
            Some(batch) => batch,
            None => {
                log::info!("Epoch exhausted after {} batches", drawn);
                break;
            }
        };
        load_times.append(start.elapsed().as_secs_f64());
        drawn += 1;

        log::info!(
            "Batch {}: {} speakers, {} partials, avg load {:.1} ms",
            drawn,
            batch.num_speakers(),
            batch.num_partials(),
            load_times.average() * 1000.0
        );
        log::debug!("Speakers: {:?}", batch.speaker_names());

        if let Some(plot_dir) = &cli.plot_dir {
            let first = batch.speakers.first().and_then(|s| s.partials.first().map(|p| (s, p)));
            if let Some((speaker, partial)) = first {
                let options = PlotOptions {
                    title: Some(format!(
                        "batch {} speaker {} frames {}..{}",
                        drawn, speaker.speaker, partial.range.start, partial.range.end
                    )),
                    split_title: true,
                    ..Default::default()
                };
                let path = plot_dir.join(format!("batch_{:04}.png", drawn));
                plot_spectrogram(partial.frames.view(), &path, &options, None)?;
            }
        }
    }

    log::info!(
        "Drew {} batches, mean load time over last {}: {:.1} ms",
        drawn,
        load_times.count(),
        load_times.average() * 1000.0
    );

    Ok(())
}
