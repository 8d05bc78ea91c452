// 入力パス単位: 文書/単体画像 -> 画像抽出 -> サブ画像分割 -> 保存

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::config::merged::ExtractionConfig;
use crate::error::Pdf2ImgError;
use crate::pdf::image_xobject::SourceImage;
use crate::pdf::reader::PdfReader;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::naming;
use crate::pipeline::output::{save_raster, write_atomic};
use crate::pipeline::sink::LogSink;
use crate::segment::find_sub_images;
use crate::segment::raster::RasterImage;

/// Standalone raster extensions accepted for decomposition (lower case).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Document,
    Image,
    Other,
}

/// Classify an input path by its extension (case-insensitive).
pub fn classify(path: &Path) -> InputKind {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if ext == "pdf" {
        InputKind::Document
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        InputKind::Image
    } else {
        InputKind::Other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// The input was opened and walked; per-image or per-region errors may
    /// still be listed in `errors`.
    Processed,
    /// Nothing to do for this input.
    Skipped,
    /// The input itself could not be opened or decoded.
    Failed,
    /// Cancellation was requested before the input finished.
    Cancelled,
}

/// A recoverable error together with what was being processed.
#[derive(Debug, Serialize)]
pub struct ItemError {
    pub context: String,
    #[serde(serialize_with = "serialize_error")]
    pub error: Pdf2ImgError,
}

fn serialize_error<S>(error: &Pdf2ImgError, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&error.to_string())
}

/// Result of processing one input path.
#[derive(Debug, Serialize)]
pub struct ItemOutcome {
    pub path: PathBuf,
    pub status: ItemStatus,
    pub files_written: Vec<PathBuf>,
    pub errors: Vec<ItemError>,
}

impl ItemOutcome {
    fn new(path: &Path, status: ItemStatus) -> Self {
        ItemOutcome {
            path: path.to_path_buf(),
            status,
            files_written: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub(crate) fn cancelled(path: &Path) -> Self {
        Self::new(path, ItemStatus::Cancelled)
    }

    /// No failure and no recoverable error.
    pub fn is_clean(&self) -> bool {
        self.status != ItemStatus::Failed && self.errors.is_empty()
    }
}

/// Per-item state threaded through the document and image paths.
struct ItemContext<'a> {
    config: &'a ExtractionConfig,
    sink: &'a mut dyn LogSink,
    cancel: &'a CancelToken,
    outcome: ItemOutcome,
}

impl ItemContext<'_> {
    fn saved(&mut self, path: PathBuf) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.sink.record(&format!("... Save: {name}"));
        self.outcome.files_written.push(path);
    }

    fn error(&mut self, context: impl Into<String>, error: Pdf2ImgError) {
        let context = context.into();
        self.sink.record(&format!("... Error({context}): {error}"));
        self.outcome.errors.push(ItemError { context, error });
    }

    /// Poll the cancel token; marks the item cancelled when set.
    fn cancelled(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            self.outcome.status = ItemStatus::Cancelled;
            true
        } else {
            false
        }
    }
}

/// Process a single input path.
///
/// Never fails: opening/decoding problems are recorded in the returned
/// outcome and reported through `sink`.
pub fn process_path(
    path: &Path,
    config: &ExtractionConfig,
    sink: &mut dyn LogSink,
    cancel: &CancelToken,
) -> ItemOutcome {
    let mut ctx = ItemContext {
        config,
        sink,
        cancel,
        outcome: ItemOutcome::new(path, ItemStatus::Processed),
    };

    let result = match classify(path) {
        InputKind::Document => process_document(path, &mut ctx),
        InputKind::Image if config.decompose => process_standalone_image(path, &mut ctx),
        kind => {
            debug!(path = %path.display(), ?kind, "nothing to do for input");
            ctx.outcome.status = ItemStatus::Skipped;
            Ok(())
        }
    };

    if let Err(e) = result {
        ctx.outcome.status = ItemStatus::Failed;
        ctx.error(path.display().to_string(), e);
    }

    ctx.outcome
}

/// 文書内の全画像を保存し、設定に応じてサブ画像に分割する。
///
/// 文書を開けない場合のみ `Err` を返す。画像単位・領域単位のエラーは
/// 記録して次へ進む。
fn process_document(path: &Path, ctx: &mut ItemContext<'_>) -> crate::error::Result<()> {
    let reader = PdfReader::open(path)?;
    let stem = naming::file_stem(path);
    let config = ctx.config;

    // ページ走査・画像の取り出しは next() のたびに1件ずつ進む
    let mut images = reader.source_images_for(move |page_num| config.includes_page(page_num));
    while !ctx.cancelled() {
        let Some(item) = images.next() else { break };
        match item {
            Ok(source) => process_source_image(ctx, &stem, &source),
            Err(failure) => ctx.error(format!("{stem} {}", failure.location()), failure.error),
        }
    }

    if ctx.outcome.status == ItemStatus::Processed
        && ctx.outcome.files_written.is_empty()
        && ctx.outcome.errors.is_empty()
    {
        ctx.outcome.status = ItemStatus::Skipped;
    }
    Ok(())
}

/// 取り出した画像を保存し、設定に応じてサブ画像に分割する。
fn process_source_image(ctx: &mut ItemContext<'_>, stem: &str, source: &SourceImage) {
    let config = ctx.config;
    let (page_num, image_index) = (source.page_number, source.image_index);
    let context = format!("{stem} P{page_num} image {image_index}");

    let name = naming::document_image_name(
        stem,
        page_num,
        &config.prefix,
        image_index,
        &source.encoding,
    );
    let out = config.output_dir.join(&name);
    if let Err(e) = write_atomic(&out, &source.encoded_bytes) {
        ctx.error(context, e);
        return;
    }
    ctx.saved(out);

    if !config.decompose {
        return;
    }

    let raster = match RasterImage::decode(&source.encoded_bytes, source.encoding.as_str()) {
        Ok(raster) => raster,
        Err(e) => {
            ctx.error(context, e);
            return;
        }
    };
    let sub_name = |j: usize| {
        naming::document_sub_image_name(
            stem,
            page_num,
            &config.prefix,
            image_index,
            j,
            &source.encoding,
        )
    };
    if let Err(e) = decompose(ctx, &raster, &context, sub_name) {
        ctx.error(context, e);
    }
}

/// 単体画像を直接サブ画像に分割する（画像全体は保存しない）。
fn process_standalone_image(path: &Path, ctx: &mut ItemContext<'_>) -> crate::error::Result<()> {
    let stem = naming::file_stem(path);
    let extension = naming::dotted_extension(path);

    let raster = RasterImage::open(path, extension.trim_start_matches('.'))?;
    let found = decompose(ctx, &raster, &stem, |j| {
        naming::standalone_sub_image_name(&stem, j, &extension)
    })?;

    if found == 0 && ctx.outcome.status == ItemStatus::Processed {
        ctx.outcome.status = ItemStatus::Skipped;
    }
    Ok(())
}

/// Segment `raster`, then crop and save every region.
///
/// Returns the number of regions found. Segmentation errors are returned;
/// crop/save errors are recorded per region and do not stop the loop.
fn decompose(
    ctx: &mut ItemContext<'_>,
    raster: &RasterImage,
    context: &str,
    sub_name: impl Fn(usize) -> String,
) -> crate::error::Result<usize> {
    let regions = find_sub_images(raster, &ctx.config.segment_params())?;
    ctx.sink
        .record(&format!("... {} sub image(s) found", regions.len()));

    for (j, region) in regions.iter().enumerate() {
        if ctx.cancelled() {
            break;
        }
        let out = ctx.config.output_dir.join(sub_name(j));
        match raster.crop(region).and_then(|sub| save_raster(&sub, &out)) {
            Ok(()) => ctx.saved(out),
            Err(e) => ctx.error(format!("{context} sub {j} [{region}]"), e),
        }
    }

    Ok(regions.len())
}
