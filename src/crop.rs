//! Figure cropping: cut bounding-box regions out of page images and publish
//! them as stable web assets.
//!
//! Page-vision extraction reports where each figure sits on the rendered page
//! as absolute pixel coordinates. This module turns those coordinates into
//! PNG files on disk plus the web paths a front end serves them under.
//!
//! ## Why content-addressed filenames?
//! The same page is often re-extracted (reruns, prompt tweaks, forced
//! refreshes). Naming each asset by a hash of its pixels means an identical
//! crop maps to an identical file, so reruns never pile up duplicates and an
//! existing file never needs rewriting.

use crate::error::{ExtractError, Result};
use crate::record::{BoundingBox, ExtractedQuestion};
use image::DynamicImage;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Hex characters of the content hash kept in the filename.
const HASH_LEN: usize = 12;

/// A crop written (or found already present) under the asset directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CroppedAsset {
    /// Filesystem location of the PNG.
    pub file_path: PathBuf,
    /// Web path the asset is served under, e.g.
    /// `/static/images/questions/q_3f2a9c81d04e.png`.
    pub public_path: String,
    /// Truncated SHA-256 of the cropped pixels.
    pub content_hash: String,
}

/// Crops figure regions from page images into an asset directory.
pub struct ImageCropper {
    asset_dir: PathBuf,
}

impl ImageCropper {
    /// Create a cropper writing into `asset_dir`, creating it if needed.
    pub fn new(asset_dir: impl Into<PathBuf>) -> Result<Self> {
        let asset_dir = asset_dir.into();
        std::fs::create_dir_all(&asset_dir).map_err(|source| ExtractError::AssetIo {
            path: asset_dir.clone(),
            source,
        })?;
        Ok(Self { asset_dir })
    }

    /// Cut one region out of `source_image`.
    ///
    /// The box is inflated by `padding` pixels on every side, then clamped to
    /// the image bounds. The crop is saved as
    /// `{prefix}_{hash}.png`; if a file with that name already exists it is
    /// reused as-is.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::EmptyCropWindow`] when the clamped box has no
    /// area (the model placed it outside the image or inverted its corners),
    /// and [`ExtractError::Image`] when the source cannot be decoded or the
    /// crop cannot be written.
    pub fn crop_region(
        &self,
        source_image: &Path,
        bbox: &BoundingBox,
        padding: u32,
        prefix: &str,
    ) -> Result<CroppedAsset> {
        let img = self.open(source_image)?;
        self.crop_loaded(&img, bbox, padding, prefix)
    }

    /// Crop every flagged figure of `question` (stem and options) out of
    /// `source_image` and record the resulting web paths on the record.
    ///
    /// A region that fails to crop is logged and skipped; the remaining
    /// figures are still processed. Only failure to open the page image
    /// itself aborts the call.
    pub fn process_question_figures(
        &self,
        source_image: &Path,
        question: &mut ExtractedQuestion,
        padding: u32,
    ) -> Result<()> {
        let img = self.open(source_image)?;

        if let Some(bbox) = question.figure_region() {
            match self.crop_loaded(&img, &bbox, padding, "q") {
                Ok(asset) => question.image_path = Some(asset.public_path),
                Err(err) => warn!(
                    "Skipping question figure on {}: {}",
                    source_image.display(),
                    err
                ),
            }
        }

        for option in &mut question.options {
            let Some(bbox) = option.figure_region() else {
                continue;
            };
            let prefix = if option.key.is_empty() {
                "opt_x".to_string()
            } else {
                format!("opt_{}", option.key)
            };
            match self.crop_loaded(&img, &bbox, padding, &prefix) {
                Ok(asset) => option.image_path = Some(asset.public_path),
                Err(err) => warn!(
                    "Skipping option {} figure on {}: {}",
                    option.key,
                    source_image.display(),
                    err
                ),
            }
        }
        Ok(())
    }

    /// Translate a filesystem path under the asset directory into the path a
    /// web server exposes it under.
    ///
    /// Everything from the last-configured `static` component onward is kept;
    /// paths without one fall back to `/static/images/questions/{filename}`.
    pub fn web_path(&self, file_path: &Path) -> String {
        let parts: Vec<String> = file_path
            .components()
            .filter_map(|c| match c {
                Component::Normal(os) => Some(os.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        if let Some(idx) = parts.iter().position(|p| p == "static") {
            format!("/{}", parts[idx..].join("/"))
        } else {
            let name = file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            format!("/static/images/questions/{}", name)
        }
    }

    fn open(&self, source_image: &Path) -> Result<DynamicImage> {
        image::open(source_image).map_err(|source| ExtractError::Image {
            path: source_image.to_path_buf(),
            source,
        })
    }

    fn crop_loaded(
        &self,
        img: &DynamicImage,
        bbox: &BoundingBox,
        padding: u32,
        prefix: &str,
    ) -> Result<CroppedAsset> {
        let width = i64::from(img.width());
        let height = i64::from(img.height());
        let pad = i64::from(padding);

        let x1 = (bbox.x1 - pad).max(0);
        let y1 = (bbox.y1 - pad).max(0);
        let x2 = (bbox.x2 + pad).min(width);
        let y2 = (bbox.y2 + pad).min(height);

        if x2 <= x1 || y2 <= y1 {
            return Err(ExtractError::EmptyCropWindow {
                detail: format!(
                    "box {} with padding {} has no area within a {}x{} image",
                    bbox, padding, width, height
                ),
            });
        }

        let cropped = img.crop_imm(x1 as u32, y1 as u32, (x2 - x1) as u32, (y2 - y1) as u32);

        let pixels = cropped.to_rgba8();
        let mut content_hash = hex::encode(Sha256::digest(pixels.as_raw()));
        content_hash.truncate(HASH_LEN);

        let filename = format!("{}_{}.png", prefix, content_hash);
        let file_path = self.asset_dir.join(&filename);

        if file_path.exists() {
            debug!("Asset {} already present, reusing", filename);
        } else {
            cropped.save(&file_path).map_err(|source| ExtractError::Image {
                path: file_path.clone(),
                source,
            })?;
            debug!(
                "Cropped {}x{} region to {}",
                x2 - x1,
                y2 - y1,
                file_path.display()
            );
        }

        let public_path = self.web_path(&file_path);
        Ok(CroppedAsset {
            file_path,
            public_path,
            content_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ExtractedOption;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    /// A page image whose pixels vary with position, so distinct regions
    /// produce distinct hashes.
    fn make_page(dir: &Path, w: u32, h: u32) -> PathBuf {
        let path = dir.join("page_1.png");
        let img = RgbaImage::from_fn(w, h, |x, y| {
            Rgba([(x % 251) as u8, (y % 241) as u8, ((x + y) % 253) as u8, 255])
        });
        img.save(&path).expect("write test page");
        path
    }

    fn asset_dir(root: &Path) -> PathBuf {
        root.join("static").join("images").join("questions")
    }

    #[test]
    fn crop_applies_padding_and_clamps() {
        let tmp = TempDir::new().expect("tempdir");
        let page = make_page(tmp.path(), 1600, 1200);
        let cropper = ImageCropper::new(asset_dir(tmp.path())).expect("cropper");

        let bbox = BoundingBox::new(400, 300, 800, 600);
        let asset = cropper
            .crop_region(&page, &bbox, 10, "q")
            .expect("crop should succeed");

        // [400,300,800,600] padded by 10 → [390,290,810,610].
        let saved = image::open(&asset.file_path).expect("reopen crop");
        assert_eq!(saved.width(), 420);
        assert_eq!(saved.height(), 320);
        assert_eq!(asset.content_hash.len(), HASH_LEN);
        assert!(asset
            .file_path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("q_"));
    }

    #[test]
    fn crop_clamps_at_image_origin_and_edges() {
        let tmp = TempDir::new().expect("tempdir");
        let page = make_page(tmp.path(), 200, 200);
        let cropper = ImageCropper::new(asset_dir(tmp.path())).expect("cropper");

        let bbox = BoundingBox::new(0, 0, 195, 195);
        let asset = cropper
            .crop_region(&page, &bbox, 10, "q")
            .expect("crop should succeed");

        let saved = image::open(&asset.file_path).expect("reopen crop");
        assert_eq!(saved.width(), 200);
        assert_eq!(saved.height(), 200);
    }

    #[test]
    fn identical_region_reuses_existing_asset() {
        let tmp = TempDir::new().expect("tempdir");
        let page = make_page(tmp.path(), 640, 480);
        let dir = asset_dir(tmp.path());
        let cropper = ImageCropper::new(&dir).expect("cropper");

        let bbox = BoundingBox::new(100, 100, 300, 250);
        let first = cropper.crop_region(&page, &bbox, 10, "q").expect("first");
        let second = cropper.crop_region(&page, &bbox, 10, "q").expect("second");

        assert_eq!(first, second);
        let files: Vec<_> = std::fs::read_dir(&dir).expect("read dir").collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn out_of_image_box_is_rejected() {
        let tmp = TempDir::new().expect("tempdir");
        let page = make_page(tmp.path(), 1600, 1200);
        let cropper = ImageCropper::new(asset_dir(tmp.path())).expect("cropper");

        let bbox = BoundingBox::new(1700, 100, 1800, 200);
        let err = cropper
            .crop_region(&page, &bbox, 10, "q")
            .expect_err("box beyond the right edge");
        assert!(matches!(err, ExtractError::EmptyCropWindow { .. }));
    }

    #[test]
    fn web_path_starts_at_static_component() {
        let tmp = TempDir::new().expect("tempdir");
        let cropper = ImageCropper::new(asset_dir(tmp.path())).expect("cropper");

        let inside = asset_dir(tmp.path()).join("q_abc123def456.png");
        assert_eq!(
            cropper.web_path(&inside),
            "/static/images/questions/q_abc123def456.png"
        );

        let outside = Path::new("assets/images/q_abc123def456.png");
        assert_eq!(
            cropper.web_path(outside),
            "/static/images/questions/q_abc123def456.png"
        );
    }

    #[test]
    fn process_question_figures_enriches_stem_and_options() {
        let tmp = TempDir::new().expect("tempdir");
        let page = make_page(tmp.path(), 1600, 1200);
        let cropper = ImageCropper::new(asset_dir(tmp.path())).expect("cropper");

        let mut question = ExtractedQuestion {
            question_text: "Which circuit matches the diagram?".into(),
            has_figure: true,
            figure_bbox: Some(BoundingBox::new(400, 300, 800, 600)),
            options: vec![
                ExtractedOption {
                    key: "A".into(),
                    text: "The series circuit".into(),
                    ..Default::default()
                },
                ExtractedOption {
                    key: "B".into(),
                    has_figure: true,
                    figure_bbox: Some(BoundingBox::new(900, 700, 1100, 850)),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        cropper
            .process_question_figures(&page, &mut question, 10)
            .expect("process");

        let stem = question.image_path.as_deref().expect("stem path");
        assert!(stem.starts_with("/static/images/questions/q_"));
        assert!(question.options[0].image_path.is_none());
        let opt = question.options[1].image_path.as_deref().expect("option path");
        assert!(opt.starts_with("/static/images/questions/opt_B_"));
    }

    #[test]
    fn bad_figure_region_is_skipped_not_fatal() {
        let tmp = TempDir::new().expect("tempdir");
        let page = make_page(tmp.path(), 1600, 1200);
        let cropper = ImageCropper::new(asset_dir(tmp.path())).expect("cropper");

        let mut question = ExtractedQuestion {
            question_text: "Read the chart.".into(),
            has_figure: true,
            // Entirely off the page; the crop fails but processing continues.
            figure_bbox: Some(BoundingBox::new(2000, 100, 2400, 300)),
            options: vec![ExtractedOption {
                key: "A".into(),
                has_figure: true,
                figure_bbox: Some(BoundingBox::new(100, 100, 400, 300)),
                ..Default::default()
            }],
            ..Default::default()
        };

        cropper
            .process_question_figures(&page, &mut question, 10)
            .expect("process");

        assert!(question.image_path.is_none());
        assert!(question.options[0].image_path.is_some());
    }
}
