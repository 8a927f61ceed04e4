use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use vidseq_core::{DatasetOptions, Padding};

#[derive(Parser)]
#[command(name = "vidseq", about = "Indexed temporal windows over frame-sequence corpora")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build the index and summarize every sequence.
    Inspect {
        #[command(flatten)]
        dataset: DatasetArgs,
    },

    /// Retrieve one item and log its metadata.
    Sample {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Flat index of the item.
        #[arg(short, long)]
        index: usize,
    },

    /// Render items as PNG contact sheets.
    Dump {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Directory to write the contact sheets to.
        #[arg(short, long)]
        output: PathBuf,

        /// Flat indices to render (repeatable). Renders every item if omitted.
        #[arg(short, long)]
        index: Vec<usize>,

        /// TrueType font used for the label text.
        #[arg(long)]
        font: Option<PathBuf>,
    },
}

/// Dataset options, read from a TOML file and/or overridden by flags.
#[derive(Args)]
pub struct DatasetArgs {
    /// TOML file with dataroot_LQ, dataroot_GT, N_frames, padding, cache_data, data_type.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Root directory of the low-quality sequences.
    #[arg(long)]
    pub lq: Option<PathBuf>,

    /// Root directory of the ground-truth sequences.
    #[arg(long)]
    pub gt: Option<PathBuf>,

    /// Window size (odd).
    #[arg(short = 'n', long)]
    pub n_frames: Option<usize>,

    /// replicate, reflect, new_info or circular.
    #[arg(long)]
    pub padding: Option<Padding>,

    /// Decode one sequence at a time instead of caching the whole corpus.
    #[arg(long)]
    pub lazy: bool,
}

impl DatasetArgs {
    pub fn resolve(&self) -> Result<DatasetOptions> {
        let mut options = match (&self.config, &self.lq) {
            (Some(path), _) => DatasetOptions::from_toml_file(path)
                .with_context(|| format!("failed to load options from {}", path.display()))?,
            (None, Some(lq)) => DatasetOptions::new(lq),
            (None, None) => bail!("either --config or --lq is required"),
        };

        if let Some(lq) = &self.lq {
            options.dataroot_lq = lq.clone();
        }
        if let Some(gt) = &self.gt {
            options.dataroot_gt = Some(gt.clone());
        }
        if let Some(n) = self.n_frames {
            options.n_frames = n;
        }
        if let Some(padding) = self.padding {
            options.padding = padding;
        }
        if self.lazy {
            options.cache_data = false;
        }
        Ok(options)
    }
}
