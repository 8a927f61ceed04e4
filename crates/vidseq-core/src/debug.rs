use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::{debug, info, warn};

use crate::provider::ClipSample;

const TEXT_SCALE: f32 = 16.0;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const TEXT_LINE_HEIGHT: u32 = 20;

const GAP: u32 = 4;
const BACKGROUND: Rgb<u8> = Rgb([32, 32, 32]);
const TARGET_COLOR: Rgb<u8> = Rgb([255, 64, 64]);
const BORDER_COLOR: Rgb<u8> = Rgb([255, 200, 0]);
const GT_COLOR: Rgb<u8> = Rgb([64, 255, 64]);

/// Renders a clip as a contact sheet: the LQ window left to right, the target
/// tile outlined, and the GT frame appended at the end when present.
pub struct DebugRenderer {
    font: Option<FontVec>,
}

impl DebugRenderer {
    /// Create a renderer. Label text is drawn only if `font_path` loads.
    pub fn new(font_path: Option<&Path>) -> Self {
        let font = font_path.and_then(Self::load_font);
        Self { font }
    }

    pub fn render(&self, sample: &ClipSample) -> RgbImage {
        let tiles: Vec<RgbImage> = (0..sample.lqs.len())
            .map(|i| sample.lqs.to_rgb_image(i))
            .collect();
        let gt_tile = sample.gt.as_ref().map(|gt| gt.frame.to_rgb_image());

        let tile_w = tiles
            .iter()
            .chain(gt_tile.as_ref())
            .map(|t| t.width())
            .max()
            .unwrap_or(0);
        let tile_h = tiles
            .iter()
            .chain(gt_tile.as_ref())
            .map(|t| t.height())
            .max()
            .unwrap_or(0);
        let count = tiles.len() as u32 + gt_tile.is_some() as u32;
        let header = if self.font.is_some() { TEXT_LINE_HEIGHT } else { 0 };

        let width = GAP + count * (tile_w + GAP);
        let height = header + tile_h + 2 * GAP;
        let mut sheet = RgbImage::from_pixel(width.max(1), height.max(1), BACKGROUND);

        let target = tiles.len() / 2;
        for (i, tile) in tiles.iter().enumerate() {
            let x = GAP + i as u32 * (tile_w + GAP);
            imageops::replace(&mut sheet, tile, x as i64, (header + GAP) as i64);
            if i == target {
                let color = if sample.border { BORDER_COLOR } else { TARGET_COLOR };
                outline(&mut sheet, x, header + GAP, tile.width(), tile.height(), color);
            }
        }

        if let Some(gt) = &gt_tile {
            let x = GAP + tiles.len() as u32 * (tile_w + GAP);
            imageops::replace(&mut sheet, gt, x as i64, (header + GAP) as i64);
            outline(&mut sheet, x, header + GAP, gt.width(), gt.height(), GT_COLOR);
        }

        self.draw_label(&mut sheet, sample);
        sheet
    }

    /// Render `sample` and save it as a PNG under `dir`. Returns the file path.
    pub fn save_sample(&self, sample: &ClipSample, dir: &Path) -> Result<PathBuf> {
        let sheet = self.render(sample);
        let position = sample.idx.split('/').next().unwrap_or("0");
        let path = dir.join(format!("{}_{:0>8}.png", sample.folder, position));
        sheet
            .save(&path)
            .with_context(|| format!("failed to save contact sheet to {}", path.display()))?;

        debug!(?path, folder = %sample.folder, idx = %sample.idx, "saved contact sheet");
        Ok(path)
    }

    fn draw_label(&self, img: &mut RgbImage, sample: &ClipSample) {
        let Some(font) = &self.font else { return };
        let scale = PxScale::from(TEXT_SCALE);
        let mut text = format!("{} {} {:?}", sample.folder, sample.idx, sample.window);
        if sample.border {
            text.push_str(" border");
        }
        draw_text_mut(img, TEXT_COLOR, GAP as i32, 2, scale, font, &text);
    }

    fn load_font(path: &Path) -> Option<FontVec> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                warn!(?path, error = %e, "failed to read font file");
                return None;
            }
        };
        match FontVec::try_from_vec(data) {
            Ok(font) => {
                info!(?path, "loaded debug font");
                Some(font)
            }
            Err(e) => {
                warn!(?path, error = %e, "failed to parse font file");
                None
            }
        }
    }
}

fn outline(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    if w == 0 || h == 0 {
        return;
    }
    let rect = Rect::at(x as i32 - 1, y as i32 - 1).of_size(w + 2, h + 2);
    draw_hollow_rect_mut(img, rect, color);
}
