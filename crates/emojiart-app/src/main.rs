//! Command-line shell for EmojiArt documents.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use emojiart_core::background::{self, FetchState};
use emojiart_core::{
    ConfigError, DocumentLibrary, EditorConfig, EmojiArtDocument, FileStorage, Gesture,
    GestureComposer, LibraryError, PaletteStore, Storage, StorageError, UrlFetcher, codec,
};
use kurbo::{Point, Size, Vec2};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("no document selected, pass --file or --doc")]
    NoDocument,
    #[error("no storage directory configured")]
    NoStorageDir,
    #[error("not an image locator: {0}")]
    InvalidLocator(String),
    #[error("no glyph {0}")]
    UnknownGlyph(u64),
}

#[derive(Parser, Debug)]
#[command(name = "emojiart", version, about = "Edit EmojiArt documents")]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Edit a standalone document file
    #[arg(long, global = true, conflicts_with = "doc")]
    file: Option<PathBuf>,
    /// Edit a document from the library
    #[arg(long, global = true)]
    doc: Option<Uuid>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the document
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Place a glyph at a document location
    Add {
        text: String,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        x: f64,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        y: f64,
        #[arg(long)]
        size: Option<f64>,
    },
    /// Move glyphs by an offset
    Move {
        #[arg(required = true)]
        ids: Vec<u64>,
        #[arg(long, allow_negative_numbers = true)]
        dx: f64,
        #[arg(long, allow_negative_numbers = true)]
        dy: f64,
    },
    /// Scale glyph sizes by a factor
    Scale {
        #[arg(required = true)]
        ids: Vec<u64>,
        #[arg(long)]
        by: f64,
    },
    /// Remove every glyph
    Clear,
    /// Drop text or an image locator onto a view of the canvas
    Drop {
        #[arg(required = true)]
        items: Vec<String>,
        #[arg(long, default_value_t = 0.0)]
        x: f64,
        #[arg(long, default_value_t = 0.0)]
        y: f64,
        #[arg(long, default_value_t = 800.0)]
        width: f64,
        #[arg(long, default_value_t = 600.0)]
        height: f64,
    },
    /// Set the background image, or "none" to clear it
    Background {
        locator: String,
        /// Seconds to wait for the image to load
        #[arg(long, default_value_t = 10)]
        wait: u64,
    },
    /// List emoji palettes
    Palettes,
    /// Add a document to the library
    New { name: Option<String> },
    /// List library documents
    List {
        #[arg(long)]
        json: bool,
    },
    /// Rename a library document
    Rename { id: Uuid, name: String },
    /// Delete a library document
    Remove { id: Uuid },
}

struct Session {
    config: EditorConfig,
    file: Option<PathBuf>,
    doc: Option<Uuid>,
}

impl Session {
    fn storage(&self) -> Result<Arc<dyn Storage>, AppError> {
        let dir = self.config.storage_dir().ok_or(AppError::NoStorageDir)?;
        Ok(Arc::new(FileStorage::new(dir)?))
    }

    fn library(&self) -> Result<DocumentLibrary, AppError> {
        Ok(DocumentLibrary::load(self.storage()?)?)
    }

    fn document(&self) -> Result<EmojiArtDocument, AppError> {
        let fetcher = Arc::new(UrlFetcher::with_timeout(self.config.fetch_timeout()));
        let mut document = match (&self.file, self.doc) {
            (Some(path), _) => EmojiArtDocument::open_file(path, fetcher),
            (None, Some(id)) => self.library()?.open(id, fetcher)?,
            (None, None) => return Err(AppError::NoDocument),
        };
        document.set_autosave_interval(self.config.autosave_interval());
        Ok(document)
    }
}

fn load_config(path: Option<PathBuf>) -> Result<EditorConfig, AppError> {
    match path.or_else(EditorConfig::default_path) {
        Some(path) => Ok(EditorConfig::load(&path)?),
        None => Ok(EditorConfig::default()),
    }
}

fn run(cli: Cli, out: &mut dyn Write) -> Result<(), AppError> {
    let session = Session {
        config: load_config(cli.config)?,
        file: cli.file,
        doc: cli.doc,
    };

    match cli.command {
        Command::Show { json } => {
            let document = session.document()?;
            show(&document, json, out)?;
        }
        Command::Add { text, x, y, size } => {
            let mut document = session.document()?;
            let size = size.unwrap_or(session.config.default_emoji_size);
            match document.add_glyph(&text, Point::new(x, y), size) {
                Some(id) => writeln!(out, "added glyph {}", id)?,
                None => log::warn!("Ignoring empty glyph text"),
            }
        }
        Command::Move { ids, dx, dy } => {
            let mut document = session.document()?;
            select(&mut document, &ids)?;
            document.move_selected(Vec2::new(dx, dy));
        }
        Command::Scale { ids, by } => {
            let mut document = session.document()?;
            select(&mut document, &ids)?;
            document.scale_selected(by);
        }
        Command::Clear => session.document()?.remove_all_glyphs(),
        Command::Drop {
            items,
            x,
            y,
            width,
            height,
        } => {
            let mut document = session.document()?;
            let mut gestures =
                GestureComposer::from_config(&session.config, Size::new(width, height));
            let location = Point::new(x, y);
            if !gestures.handle(Gesture::Drop { items, location }, &mut document) {
                log::warn!("Nothing to drop");
            }
            if document.fetch_state().is_fetching() {
                wait_for_background(&mut document, Duration::from_secs(10));
            }
            show(&document, false, out)?;
        }
        Command::Background { locator, wait } => {
            let mut document = session.document()?;
            let locator = if locator.eq_ignore_ascii_case("none") {
                None
            } else {
                let url = background::parse_locator(&locator)
                    .ok_or(AppError::InvalidLocator(locator))?;
                Some(url)
            };
            document.set_background(locator);
            wait_for_background(&mut document, Duration::from_secs(wait));
            match (document.fetch_state(), document.background_image()) {
                (_, Some(image)) => {
                    writeln!(out, "background {}x{}", image.width(), image.height())?
                }
                (FetchState::Failed(url), _) => writeln!(out, "could not load {}", url)?,
                (FetchState::Fetching(url), _) => writeln!(out, "still loading {}", url)?,
                _ => writeln!(out, "background cleared")?,
            }
        }
        Command::Palettes => {
            let palettes = PaletteStore::load(session.storage()?.as_ref());
            for (index, palette) in palettes.palettes().iter().enumerate() {
                writeln!(out, "{}\t{}\t{}", index, palette.name, palette.emojis.concat())?;
            }
        }
        Command::New { name } => {
            let mut library = session.library()?;
            let id = match name {
                Some(name) => library.add_named(&name)?,
                None => library.add_document()?,
            };
            writeln!(out, "{}", id)?;
        }
        Command::List { json } => {
            let library = session.library()?;
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(library.documents())?)?;
            } else {
                for entry in library.documents() {
                    writeln!(out, "{}\t{}", entry.id, entry.name)?;
                }
            }
        }
        Command::Rename { id, name } => session.library()?.set_name(id, &name)?,
        Command::Remove { id } => {
            if !session.library()?.remove_document(id)? {
                return Err(LibraryError::UnknownDocument(id).into());
            }
        }
    }
    Ok(())
}

fn select(document: &mut EmojiArtDocument, ids: &[u64]) -> Result<(), AppError> {
    for &id in ids {
        if !document.emoji_art().contains(id) {
            return Err(AppError::UnknownGlyph(id));
        }
        if !document.is_selected(id) {
            document.toggle_selection(id);
        }
    }
    Ok(())
}

fn wait_for_background(document: &mut EmojiArtDocument, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while document.fetch_state().is_fetching() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        document.wait_for_background(remaining);
    }
}

fn show(document: &EmojiArtDocument, json: bool, out: &mut dyn Write) -> Result<(), AppError> {
    if json {
        let bytes = codec::encode(document.emoji_art())?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
        return Ok(());
    }

    match document.background_url() {
        Some(url) => writeln!(out, "background: {}", url)?,
        None => writeln!(out, "background: none")?,
    }
    for glyph in document.glyphs() {
        writeln!(
            out,
            "{}\t{}\t({}, {})\t{}",
            glyph.id(),
            glyph.text(),
            glyph.x(),
            glyph.y(),
            glyph.size()
        )?;
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let stdout = io::stdout();
    match run(cli, &mut stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("Command failed: {:?}", e);
            eprintln!("emojiart: {}", e);
            ExitCode::FAILURE
        }
    }
}
