use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::DatasetOptions;
use crate::enumerate::{FsEnumerator, SequenceEnumerator};
use crate::error::{DatasetError, Result};
use crate::index::{FlatIndex, SequenceSpan};
use crate::video::frame::{Frame, FrameStack};
use crate::video::loader::{FrameStackLoader, ImageStackLoader, DEFAULT_ALIGNMENT};
use crate::window::neighbor_indices;

/// The ground-truth half of a sample. Present only when a GT root is set.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundTruth {
    pub frame: Frame,
    pub path: PathBuf,
}

/// One retrieved item: a window of LQ frames around a target frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipSample {
    /// `n_frames` LQ frames, ordered like `window`.
    pub lqs: FrameStack,
    pub gt: Option<GroundTruth>,
    /// Name of the owning sequence.
    pub folder: String,
    /// `"position/sequence_length"`.
    pub idx: String,
    pub border: bool,
    pub lq_path: PathBuf,
    /// Positions within the sequence that `lqs` was gathered from.
    pub window: Vec<usize>,
}

/// Decoded stacks of one sequence.
#[derive(Debug, Clone)]
struct SequenceFrames {
    lq: Arc<FrameStack>,
    gt: Option<Arc<FrameStack>>,
}

/// The single sequence currently held in lazy mode.
#[derive(Debug)]
struct LazySequenceWindow {
    sequence: usize,
    frames: SequenceFrames,
}

#[derive(Debug)]
enum Residency {
    /// Every sequence decoded at construction, indexed by sequence ordinal.
    Eager(Vec<SequenceFrames>),
    /// At most one sequence decoded at a time.
    Lazy(Mutex<Option<LazySequenceWindow>>),
}

/// Random access to temporal windows over a corpus of frame sequences.
///
/// Both residency modes return identical samples; they only differ in when
/// frames are decoded and how many are kept in memory.
#[derive(Debug)]
pub struct IndexedSequenceProvider<L = ImageStackLoader> {
    options: DatasetOptions,
    index: FlatIndex,
    loader: L,
    residency: Residency,
}

impl IndexedSequenceProvider<ImageStackLoader> {
    /// Build a provider over image folders on the local file system.
    pub fn open(options: DatasetOptions) -> Result<Self> {
        Self::new(options, &FsEnumerator::new(), ImageStackLoader::new())
    }
}

impl<L: FrameStackLoader> IndexedSequenceProvider<L> {
    pub fn new(
        options: DatasetOptions,
        enumerator: &impl SequenceEnumerator,
        loader: L,
    ) -> Result<Self> {
        options.validate()?;

        info!(
            lq_root = ?options.dataroot_lq,
            gt_root = ?options.dataroot_gt,
            need_gt = options.need_gt(),
            n_frames = options.n_frames,
            padding = %options.padding,
            cache_data = options.cache_data,
            "building indexed sequence provider"
        );

        let index = FlatIndex::build(
            enumerator,
            &options.dataroot_lq,
            options.dataroot_gt.as_deref(),
            options.half_window(),
        )?;

        let residency = if options.cache_data {
            let cache = (0..index.spans().len())
                .map(|sequence| load_sequence(&loader, &index, sequence))
                .collect::<Result<Vec<_>>>()?;
            info!(sequences = cache.len(), "all sequences resident");
            Residency::Eager(cache)
        } else {
            Residency::Lazy(Mutex::new(None))
        };

        Ok(Self {
            options,
            index,
            loader,
            residency,
        })
    }

    /// Total number of frames over all sequences.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn options(&self) -> &DatasetOptions {
        &self.options
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn sequences(&self) -> &[SequenceSpan] {
        self.index.spans()
    }

    /// Name of the sequence held by the lazy window, if any. Always `None`
    /// in eager mode.
    pub fn held_sequence(&self) -> Option<String> {
        match &self.residency {
            Residency::Eager(_) => None,
            Residency::Lazy(slot) => slot
                .lock()
                .as_ref()
                .map(|held| self.index.span(held.sequence).name.clone()),
        }
    }

    /// Retrieve the window of LQ frames around flat index `index`, plus the
    /// GT frame and metadata.
    pub fn get(&self, index: usize) -> Result<ClipSample> {
        let (sequence, position) =
            self.index
                .locate(index)
                .ok_or(DatasetError::IndexOutOfRange {
                    index,
                    len: self.index.len(),
                })?;
        let entry = &self.index.entries()[index];

        let window = neighbor_indices(
            position,
            entry.sequence_length,
            self.options.n_frames,
            self.options.padding,
        );
        let frames = self.sequence_frames(sequence)?;

        let lqs = frames.lq.index_select(&window);
        let gt = match (&frames.gt, &entry.gt_path) {
            (Some(stack), Some(path)) => Some(GroundTruth {
                frame: stack.to_frame(position),
                path: path.clone(),
            }),
            _ => None,
        };

        Ok(ClipSample {
            lqs,
            gt,
            folder: self.index.span(sequence).name.clone(),
            idx: entry.label(),
            border: entry.is_boundary,
            lq_path: entry.lq_path.clone(),
            window,
        })
    }

    /// Iterate over every sample in flat-index order.
    pub fn samples(&self) -> impl Iterator<Item = Result<ClipSample>> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    fn sequence_frames(&self, sequence: usize) -> Result<SequenceFrames> {
        match &self.residency {
            Residency::Eager(cache) => Ok(cache[sequence].clone()),
            Residency::Lazy(slot) => {
                // Check, load and replace under one lock so concurrent callers
                // never observe a half-swapped window.
                let mut slot = slot.lock();
                if let Some(held) = slot.as_ref() {
                    if held.sequence == sequence {
                        return Ok(held.frames.clone());
                    }
                }

                let frames = load_sequence(&self.loader, &self.index, sequence)?;
                debug!(
                    sequence = %self.index.span(sequence).name,
                    previous = ?slot.as_ref().map(|held| &self.index.span(held.sequence).name),
                    "lazy window switched sequence"
                );
                *slot = Some(LazySequenceWindow {
                    sequence,
                    frames: frames.clone(),
                });
                Ok(frames)
            }
        }
    }
}

fn load_sequence(
    loader: &impl FrameStackLoader,
    index: &FlatIndex,
    sequence: usize,
) -> Result<SequenceFrames> {
    let span = index.span(sequence);
    info!(sequence = %span.name, frames = span.len, "loading sequence");

    let load = |paths: Vec<PathBuf>| -> Result<Arc<FrameStack>> {
        let stack = loader.load(&paths, DEFAULT_ALIGNMENT)?;
        if stack.len() != span.len {
            return Err(DatasetError::StackLengthMismatch {
                sequence: span.name.clone(),
                expected: span.len,
                actual: stack.len(),
            });
        }
        Ok(Arc::new(stack))
    };

    let lq = load(index.lq_paths(sequence))?;
    let gt = index.gt_paths(sequence).map(load).transpose()?;
    Ok(SequenceFrames { lq, gt })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tracing_test::traced_test;

    use crate::config::{DataType, Padding};
    use crate::index::tests::FakeCorpus;
    use crate::video::frame::FrameShape;

    /// Synthesizes a 1x1x3 frame per path: `[is_gt, sequence tag, frame number]`.
    #[derive(Debug, Default)]
    struct FakeLoader {
        loads: AtomicUsize,
    }

    impl FakeLoader {
        fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    impl FrameStackLoader for &FakeLoader {
        fn load(&self, paths: &[PathBuf], alignment: usize) -> Result<FrameStack> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            let mut stack = FrameStack::with_capacity(FrameShape::new(3, 1, 1), paths.len(), alignment);
            for path in paths {
                stack.push(&fake_pixels(path));
            }
            Ok(stack)
        }
    }

    fn fake_pixels(path: &Path) -> [f32; 3] {
        let is_gt = path.starts_with("gt") as u8 as f32;
        let sequence = path.parent().unwrap().file_name().unwrap().to_string_lossy();
        let tag = sequence.bytes().map(f32::from).sum::<f32>();
        let frame: f32 = path.file_stem().unwrap().to_string_lossy().parse().unwrap();
        [is_gt, tag, frame]
    }

    fn frame_numbers(stack: &FrameStack) -> Vec<usize> {
        stack.frames().map(|f| f[2] as usize).collect()
    }

    fn corpus() -> FakeCorpus {
        FakeCorpus::default()
            .with("lq", "calendar", 10)
            .with("lq", "city", 4)
            .with("lq", "walk", 7)
            .with("gt", "calendar", 10)
            .with("gt", "city", 4)
            .with("gt", "walk", 7)
    }

    fn options(gt: bool, cache_data: bool, padding: Padding) -> DatasetOptions {
        let mut options = DatasetOptions::new("lq");
        if gt {
            options.dataroot_gt = Some(PathBuf::from("gt"));
        }
        options.cache_data = cache_data;
        options.padding = padding;
        options
    }

    #[test]
    fn replicate_windows_at_edges_and_interior() {
        let loader = FakeLoader::default();
        let provider =
            IndexedSequenceProvider::new(options(false, true, Padding::Replicate), &corpus(), &loader)
                .unwrap();

        let first = provider.get(0).unwrap();
        assert_eq!(first.window, [0, 0, 0, 1, 2]);
        assert_eq!(frame_numbers(&first.lqs), [0, 0, 0, 1, 2]);
        assert_eq!(first.folder, "calendar");
        assert_eq!(first.idx, "0/10");
        assert!(first.border);

        let last = provider.get(9).unwrap();
        assert_eq!(frame_numbers(&last.lqs), [7, 8, 9, 9, 9]);
        assert!(last.border);

        let middle = provider.get(5).unwrap();
        assert_eq!(frame_numbers(&middle.lqs), [3, 4, 5, 6, 7]);
        assert!(!middle.border);
        assert_eq!(middle.lq_path, PathBuf::from("lq/calendar/00000005.png"));
    }

    #[test]
    fn length_covers_every_sequence() {
        let loader = FakeLoader::default();
        let provider =
            IndexedSequenceProvider::new(options(true, false, Padding::Replicate), &corpus(), &loader)
                .unwrap();
        assert_eq!(provider.len(), 21);
        assert_eq!(provider.sequences().len(), 3);
        assert_eq!(provider.samples().count(), 21);
    }

    #[test]
    fn every_window_stays_inside_its_sequence() {
        let loader = FakeLoader::default();
        let provider =
            IndexedSequenceProvider::new(options(false, true, Padding::NewInfo), &corpus(), &loader)
                .unwrap();
        for i in 0..provider.len() {
            let entry = provider.index().entry(i).unwrap().clone();
            let sample = provider.get(i).unwrap();
            assert_eq!(sample.lqs.len(), 5);
            assert!(sample.window.iter().all(|&p| p < entry.sequence_length));
            let tag = sample.lqs.frame(0)[1];
            assert!(sample.lqs.frames().all(|f| f[1] == tag), "index {i} mixes sequences");
        }
    }

    #[test]
    fn gt_frame_and_path_follow_target_position() {
        let loader = FakeLoader::default();
        let provider =
            IndexedSequenceProvider::new(options(true, true, Padding::Reflect), &corpus(), &loader)
                .unwrap();

        // calendar (10) then city (4): index 12 is city position 2.
        let sample = provider.get(12).unwrap();
        assert_eq!(sample.folder, "city");
        assert_eq!(sample.idx, "2/4");
        assert_eq!(sample.window, [0, 1, 2, 3, 2]);

        let gt = sample.gt.expect("GT mode");
        assert_eq!(gt.path, PathBuf::from("gt/city/00000002.png"));
        assert_eq!(gt.frame.data[0], 1.0);
        assert_eq!(gt.frame.data[2], 2.0);
        assert!(sample.lqs.frames().all(|f| f[0] == 0.0));
    }

    #[test]
    fn no_gt_fields_without_gt_root() {
        let loader = FakeLoader::default();
        let provider =
            IndexedSequenceProvider::new(options(false, false, Padding::Replicate), &corpus(), &loader)
                .unwrap();
        assert!(provider.get(3).unwrap().gt.is_none());
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let loader = FakeLoader::default();
        let provider =
            IndexedSequenceProvider::new(options(true, false, Padding::Replicate), &corpus(), &loader)
                .unwrap();
        let err = provider.get(21).unwrap_err();
        assert!(
            matches!(err, DatasetError::IndexOutOfRange { index: 21, len: 21 }),
            "got {err:?}"
        );
    }

    #[test]
    fn eager_and_lazy_samples_are_identical() {
        for padding in [Padding::Replicate, Padding::Reflect, Padding::NewInfo, Padding::Circular] {
            let eager_loader = FakeLoader::default();
            let lazy_loader = FakeLoader::default();
            let eager =
                IndexedSequenceProvider::new(options(true, true, padding), &corpus(), &eager_loader)
                    .unwrap();
            let lazy =
                IndexedSequenceProvider::new(options(true, false, padding), &corpus(), &lazy_loader)
                    .unwrap();

            for i in 0..eager.len() {
                assert_eq!(eager.get(i).unwrap(), lazy.get(i).unwrap(), "{padding} index {i}");
            }
        }
    }

    #[test]
    fn lazy_switching_in_any_order_matches_eager() {
        let eager_loader = FakeLoader::default();
        let lazy_loader = FakeLoader::default();
        let eager =
            IndexedSequenceProvider::new(options(true, true, Padding::NewInfo), &corpus(), &eager_loader)
                .unwrap();
        let lazy =
            IndexedSequenceProvider::new(options(true, false, Padding::NewInfo), &corpus(), &lazy_loader)
                .unwrap();

        // Bounce between the middle of one sequence and the start of another.
        let order = [20, 3, 12, 14, 0, 19, 9, 10, 5, 13];
        for i in order {
            assert_eq!(lazy.get(i).unwrap(), eager.get(i).unwrap(), "index {i}");
        }
        for i in (0..lazy.len()).rev() {
            assert_eq!(lazy.get(i).unwrap(), eager.get(i).unwrap(), "index {i}");
        }
    }

    #[test]
    #[traced_test]
    fn lazy_window_loads_once_per_switch() {
        let loader = FakeLoader::default();
        let provider =
            IndexedSequenceProvider::new(options(true, false, Padding::Replicate), &corpus(), &loader)
                .unwrap();
        assert_eq!(loader.loads(), 0);
        assert_eq!(provider.held_sequence(), None);

        provider.get(1).unwrap();
        provider.get(8).unwrap();
        assert_eq!(loader.loads(), 2, "LQ and GT of calendar");
        assert_eq!(provider.held_sequence().as_deref(), Some("calendar"));

        provider.get(11).unwrap();
        assert_eq!(loader.loads(), 4);
        assert_eq!(provider.held_sequence().as_deref(), Some("city"));

        provider.get(0).unwrap();
        assert_eq!(loader.loads(), 6);
        assert!(logs_contain("lazy window switched sequence"));
    }

    #[test]
    fn eager_loads_everything_up_front() {
        let loader = FakeLoader::default();
        let provider =
            IndexedSequenceProvider::new(options(true, true, Padding::Replicate), &corpus(), &loader)
                .unwrap();
        assert_eq!(loader.loads(), 6);

        for i in 0..provider.len() {
            provider.get(i).unwrap();
        }
        assert_eq!(loader.loads(), 6);
        assert_eq!(provider.held_sequence(), None);
    }

    #[test]
    fn lmdb_is_rejected_before_touching_the_corpus() {
        let loader = FakeLoader::default();
        let mut options = options(true, true, Padding::Replicate);
        options.data_type = DataType::Lmdb;

        let err = IndexedSequenceProvider::new(options, &FakeCorpus::default(), &loader).unwrap_err();
        assert!(matches!(err, DatasetError::UnsupportedDataType(_)), "got {err:?}");
        assert_eq!(loader.loads(), 0);
    }

    #[test]
    fn corpus_mismatch_fails_construction() {
        let corpus = FakeCorpus::default()
            .with("lq", "seq01", 10)
            .with("gt", "seq01", 9);
        let loader = FakeLoader::default();
        let err =
            IndexedSequenceProvider::new(options(true, false, Padding::Replicate), &corpus, &loader)
                .unwrap_err();
        assert!(matches!(err, DatasetError::FrameCountMismatch { .. }), "got {err:?}");
    }

    #[test]
    fn empty_root_gives_empty_provider() {
        let corpus = FakeCorpus::default().with("lq", "empty", 0);
        let loader = FakeLoader::default();
        let provider =
            IndexedSequenceProvider::new(options(false, true, Padding::Replicate), &corpus, &loader)
                .unwrap();
        assert!(provider.is_empty());
        assert!(matches!(provider.get(0), Err(DatasetError::IndexOutOfRange { .. })));
    }

    #[test]
    fn short_loader_output_is_reported() {
        #[derive(Debug)]
        struct Truncating;
        impl FrameStackLoader for Truncating {
            fn load(&self, paths: &[PathBuf], alignment: usize) -> Result<FrameStack> {
                let mut stack = FrameStack::with_capacity(FrameShape::new(1, 1, 1), 1, alignment);
                if paths.len() > 1 {
                    stack.push(&[0.0]);
                }
                Ok(stack)
            }
        }

        let corpus = FakeCorpus::default().with("lq", "walk", 3);
        let err = IndexedSequenceProvider::new(options(false, true, Padding::Replicate), &corpus, Truncating)
            .unwrap_err();
        assert!(
            matches!(err, DatasetError::StackLengthMismatch { expected: 3, actual: 1, .. }),
            "got {err:?}"
        );
    }

    #[test]
    fn opens_image_folders_on_disk() {
        use image::{Rgb, RgbImage};
        use tempfile::TempDir;

        let root = TempDir::new().unwrap();
        for (kind, scale) in [("lq", 10u8), ("gt", 20u8)] {
            for (name, frames) in [("foliage", 3u8), ("walk", 2u8)] {
                let dir = root.path().join(kind).join(name);
                std::fs::create_dir_all(&dir).unwrap();
                for f in 0..frames {
                    RgbImage::from_pixel(2, 2, Rgb([f * scale, 0, 0]))
                        .save(dir.join(format!("{f:08}.png")))
                        .unwrap();
                }
            }
        }

        let mut options = DatasetOptions::new(root.path().join("lq"));
        options.dataroot_gt = Some(root.path().join("gt"));
        options.n_frames = 3;
        options.cache_data = false;
        let provider = IndexedSequenceProvider::open(options).unwrap();

        assert_eq!(provider.len(), 5);
        let sample = provider.get(3).unwrap();
        assert_eq!(sample.folder, "walk");
        assert_eq!(sample.idx, "0/2");
        assert_eq!(sample.window, [0, 0, 1]);
        assert_eq!(sample.lqs.to_rgb_image(2).get_pixel(0, 0), &Rgb([10, 0, 0]));
        let gt = sample.gt.unwrap();
        assert_eq!(gt.path, root.path().join("gt/walk/00000000.png"));
        assert_eq!(gt.frame.to_rgb_image().get_pixel(1, 1), &Rgb([0, 0, 0]));
    }

    #[test]
    fn concurrent_lazy_requests_match_eager() {
        let eager_loader = FakeLoader::default();
        let lazy_loader = FakeLoader::default();
        let eager =
            IndexedSequenceProvider::new(options(true, true, Padding::NewInfo), &corpus(), &eager_loader)
                .unwrap();
        let lazy =
            IndexedSequenceProvider::new(options(true, false, Padding::NewInfo), &corpus(), &lazy_loader)
                .unwrap();
        let expected: Vec<ClipSample> = eager.samples().map(Result::unwrap).collect();
        let len = lazy.len();

        std::thread::scope(|s| {
            for t in 0..8 {
                let (lazy, expected) = (&lazy, &expected);
                s.spawn(move || {
                    // Each thread strides through the corpus from its own offset,
                    // so threads keep asking for different sequences.
                    for step in 0..500 {
                        let i = (t * 7 + step * 11) % len;
                        assert_eq!(lazy.get(i).unwrap(), expected[i], "thread {t} index {i}");
                    }
                });
            }
        });

        assert!(lazy_loader.loads() >= 2);
        assert!(lazy.held_sequence().is_some());
    }

    #[test]
    fn oversized_window_fails_construction() {
        let loader = FakeLoader::default();
        let mut options = options(false, false, Padding::Replicate);
        options.n_frames = usize::MAX;

        let err = IndexedSequenceProvider::new(options, &corpus(), &loader).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidWindow(usize::MAX)), "got {err:?}");
    }

    #[test]
    fn provider_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<IndexedSequenceProvider<ImageStackLoader>>();
    }
}
