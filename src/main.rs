use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use comic_page::{
    ComicPage, DirectoryArchive, PaneRect, ReaderConfig, ReadingDirection, SegmentationOutcome,
};

/// Inspect the pane segmentation of every page in a folder
#[derive(Parser, Debug, Clone)]
#[command(about = "Print detected comic panes for each image in a folder")]
#[command(version)]
struct Args {
    /// Folder containing page images (searched recursively)
    dir: PathBuf,

    /// Read panes right to left (manga)
    #[arg(long)]
    rtl: bool,

    /// JSON reader configuration file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Also report the size of a thumbnail with this longest edge
    #[arg(long, short = 't')]
    thumbnail: Option<u32>,

    /// Enable debug logging.
    #[arg(long, short = 'd')]
    debug: bool,
}

/// One output line
#[derive(Serialize, Debug)]
struct PageReport {
    name: String,
    width: Option<u32>,
    height: Option<u32>,
    outcome: String,
    panes: Vec<PaneRect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail: Option<(u32, u32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl PageReport {
    fn failed(name: &str, error: String) -> Self {
        Self {
            name: name.to_string(),
            width: None,
            height: None,
            outcome: "failed".to_string(),
            panes: Vec::new(),
            thumbnail: None,
            error: Some(error),
        }
    }
}

fn outcome_label(outcome: SegmentationOutcome) -> String {
    match outcome {
        SegmentationOutcome::Gutters { .. } => "gutters".to_string(),
        SegmentationOutcome::Layout => "layout".to_string(),
        SegmentationOutcome::Fallback => "fallback".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays valid JSON lines
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &args.config {
        Some(path) => ReaderConfig::load(path)?,
        None => ReaderConfig::default(),
    };
    if args.rtl {
        config.segmenter.reading_direction = ReadingDirection::Rtl;
    }
    if let Some(size) = args.thumbnail {
        config.thumbnail_max_dimension = size;
    }
    config.validate()?;

    let archive = Arc::new(DirectoryArchive::open(&args.dir)?);
    info!(
        root = %archive.root().display(),
        pages = archive.entries().len(),
        "scanning pages"
    );

    let mut failed = 0usize;
    for entry in archive.entries() {
        let page = ComicPage::with_config(entry.clone(), archive.clone(), &config);
        let report = inspect(&page, args.thumbnail.map(|_| config.thumbnail_max_dimension)).await;
        if report.error.is_some() {
            failed += 1;
        }
        println!("{}", serde_json::to_string(&report)?);

        // Only the panes are needed from here on
        page.purge_image();
    }

    if failed > 0 {
        warn!(failed, "some pages could not be segmented");
    }
    info!(pages = archive.entries().len(), failed, "done");
    Ok(())
}

async fn inspect(page: &ComicPage, thumbnail: Option<u32>) -> PageReport {
    let name = page.entry().name.as_str();

    let segmentation = match page.segmentation().await {
        Ok(segmentation) => segmentation,
        Err(e) => {
            warn!(entry = %name, error = %e, "page failed");
            return PageReport::failed(name, e.to_string());
        }
    };
    let image = match page.image().await {
        Ok(image) => image,
        Err(e) => return PageReport::failed(name, e.to_string()),
    };

    let thumbnail = match thumbnail {
        Some(max) => match page.thumbnail(max).await {
            Ok(thumb) => Some(thumb.dimensions()),
            Err(e) => return PageReport::failed(name, e.to_string()),
        },
        None => None,
    };

    PageReport {
        name: name.to_string(),
        width: Some(image.width()),
        height: Some(image.height()),
        outcome: outcome_label(segmentation.outcome()),
        panes: segmentation.panes().to_vec(),
        thumbnail,
        error: None,
    }
}
