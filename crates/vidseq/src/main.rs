mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use vidseq_core::debug::DebugRenderer;
use vidseq_core::IndexedSequenceProvider;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Inspect { dataset } => {
            let provider = open_provider(&dataset)?;

            for span in provider.sequences() {
                info!(
                    name = %span.name,
                    frames = span.len,
                    start = span.start,
                    lq_dir = ?span.lq_dir,
                    gt_dir = ?span.gt_dir,
                    "sequence"
                );
            }
            if provider.is_empty() {
                warn!("no frames found under the LQ root");
            }

            info!(
                sequences = provider.sequences().len(),
                frames = provider.len(),
                "inspection complete"
            );
            Ok(())
        }
        cli::Command::Sample { dataset, index } => {
            let provider = open_provider(&dataset)?;
            let sample = provider
                .get(index)
                .with_context(|| format!("failed to retrieve item {index}"))?;

            info!(
                index,
                folder = %sample.folder,
                idx = %sample.idx,
                border = sample.border,
                window = ?sample.window,
                lq_path = ?sample.lq_path,
                gt_path = ?sample.gt.as_ref().map(|gt| &gt.path),
                frames = sample.lqs.len(),
                shape = %sample.lqs.shape(),
                "sample retrieved"
            );
            Ok(())
        }
        cli::Command::Dump {
            dataset,
            output,
            index,
            font,
        } => {
            let provider = open_provider(&dataset)?;
            let indices = if index.is_empty() {
                (0..provider.len()).collect()
            } else {
                index
            };

            std::fs::create_dir_all(&output)
                .with_context(|| format!("failed to create {}", output.display()))?;
            let renderer = DebugRenderer::new(font.as_deref());

            for &i in &indices {
                let sample = provider
                    .get(i)
                    .with_context(|| format!("failed to retrieve item {i}"))?;
                renderer.save_sample(&sample, &output)?;
            }

            info!(count = indices.len(), ?output, "contact sheets written");
            Ok(())
        }
    }
}

fn open_provider(dataset: &cli::DatasetArgs) -> Result<IndexedSequenceProvider> {
    let options = dataset.resolve()?;
    let lq_root = options.dataroot_lq.clone();
    IndexedSequenceProvider::open(options)
        .with_context(|| format!("failed to index {}", lq_root.display()))
}
