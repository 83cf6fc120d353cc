use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use geotalk::config::Config;
use geotalk::content::{NearbyQuery, Summary, WikiClient};
use geotalk::settings::{Language, Settings, SettingsStore};
use geotalk::storage::{Database, DatabaseError, PlaceCollection, PlaceRepository};

/// Get the config directory path (~/.config/geotalk/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("geotalk"))
}

#[derive(Parser, Debug)]
#[command(
    name = "geotalk",
    about = "Points of interest near you, from Wikipedia, in your language"
)]
struct Args {
    /// Reset database (delete and recreate)
    #[arg(long)]
    reset_db: bool,

    /// Config file (defaults to ~/.config/geotalk/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List places near a coordinate
    Nearby {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        /// Search radius in meters (defaults to the saved setting)
        #[arg(long)]
        radius: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
        /// en, fr or fi (defaults to the saved setting)
        #[arg(long)]
        language: Option<Language>,
    },
    /// Show a place's summary and record the visit
    Show {
        title: String,
        /// Read the downloaded copy instead of the network
        #[arg(long)]
        offline: bool,
        #[arg(long)]
        language: Option<Language>,
    },
    /// Print the text to read aloud for a place (pipe into a speech engine)
    Speak {
        title: String,
        #[arg(long)]
        language: Option<Language>,
    },
    /// Manage favorites
    Favorite {
        #[command(subcommand)]
        action: FavoriteAction,
    },
    /// Manage places saved for offline reading
    Download {
        #[command(subcommand)]
        action: DownloadAction,
    },
    /// Visited places
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Search radius and language
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug)]
enum FavoriteAction {
    /// Fetch TITLE and mark it as favorite
    Add { title: String },
    /// Favorite TITLE if it is not one, unfavorite it otherwise
    Toggle { title: String },
    Remove {
        title: String,
        #[arg(long)]
        page_id: Option<i64>,
    },
    List,
}

#[derive(Subcommand, Debug)]
enum DownloadAction {
    /// Fetch TITLE and keep its summary for offline reading
    Add { title: String },
    Remove {
        title: String,
        #[arg(long)]
        page_id: Option<i64>,
    },
    List,
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    List,
    Clear,
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    Show,
    /// Forget the saved radius and language
    Reset,
    Set {
        /// Search radius in meters (1000 to 10000)
        #[arg(long)]
        radius: Option<u32>,
        #[arg(long)]
        language: Option<Language>,
    },
}

/// Shared handles passed to every command
struct App {
    db: Database,
    client: WikiClient,
    settings: SettingsStore,
    config: Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        println!("Created config directory: {}", config_dir.display());
    }

    // The directory holds browsing history; user-only access
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let db_path = config.database_path(&config_dir);
    if args.reset_db && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete database")?;
        println!("Database reset.");
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of geotalk appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let client = WikiClient::from_config(&config).context("Failed to create HTTP client")?;
    let ctx = App {
        settings: SettingsStore::new(db.clone()),
        db,
        client,
        config,
    };

    match args.command {
        Command::Nearby {
            lat,
            lon,
            radius,
            limit,
            language,
        } => nearby(&ctx, lat, lon, radius, limit, language).await,
        Command::Show {
            title,
            offline,
            language,
        } => show(&ctx, &title, offline, language).await,
        Command::Speak { title, language } => {
            let summary = resolve_summary(&ctx, &title, false, language).await?;
            println!("{}", summary.speech_text());
            Ok(())
        }
        Command::Favorite { action } => favorite(&ctx, action).await,
        Command::Download { action } => download(&ctx, action).await,
        Command::History { action } => history(&ctx, action).await,
        Command::Settings { action } => settings(&ctx, action).await,
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn nearby(
    ctx: &App,
    lat: f64,
    lon: f64,
    radius: Option<u32>,
    limit: Option<u32>,
    language: Option<Language>,
) -> Result<()> {
    let settings = ctx.settings.load().await;
    let mut query =
        NearbyQuery::from_settings(&settings).with_limit(limit.unwrap_or(ctx.config.nearby_limit));
    if let Some(radius) = radius {
        query.radius = radius;
    }
    if let Some(language) = language {
        query.language = language;
    }

    let places = ctx
        .client
        .find_nearby(Some(lat), Some(lon), &query)
        .await
        .context("Failed to fetch nearby places")?;

    if places.is_empty() {
        println!("No places found within {} m", query.radius);
        return Ok(());
    }

    println!("Nearby places ({})", places.len());
    for place in &places {
        println!(
            "{:>6.0} m  {}  ({:.5}, {:.5})  [{}]",
            place.distance, place.title, place.lat, place.lon, place.id
        );
    }
    Ok(())
}

/// Summary from the network, or from downloads when offline or when the
/// network fails and a copy was downloaded earlier.
async fn resolve_summary(
    ctx: &App,
    title: &str,
    offline: bool,
    language: Option<Language>,
) -> Result<Summary> {
    let downloaded = || async move {
        ctx.db.downloads().find(None, title).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read downloads");
            None
        })
    };

    if offline {
        return downloaded()
            .await
            .map(Summary::from)
            .with_context(|| format!("'{title}' has not been downloaded"));
    }

    let language = match language {
        Some(language) => language,
        None => ctx.settings.load().await.language,
    };
    match ctx.client.fetch_summary(title, language).await {
        Ok(summary) => Ok(summary),
        Err(e) => match downloaded().await {
            Some(place) => {
                tracing::warn!(error = %e, title = %title, "Fetch failed, using downloaded copy");
                Ok(Summary::from(place))
            }
            None => Err(e).with_context(|| format!("Failed to load '{title}'")),
        },
    }
}

async fn show(ctx: &App, title: &str, offline: bool, language: Option<Language>) -> Result<()> {
    let summary = resolve_summary(ctx, title, offline, language).await?;

    if let Err(e) = ctx.db.history().append(summary.id, &summary.title).await {
        tracing::warn!(error = %e, "Failed to record visit");
    }
    let favorite = ctx
        .db
        .favorites()
        .exists(summary.id, &summary.title)
        .await
        .unwrap_or(false);
    let downloaded = ctx
        .db
        .downloads()
        .exists(summary.id, &summary.title)
        .await
        .unwrap_or(false);

    println!("{}", summary.title);
    if let Some(description) = &summary.description {
        println!("{description}");
    }
    if !summary.extract.is_empty() {
        println!();
        println!("{}", summary.extract);
    }
    println!();
    if let Some(image) = &summary.image {
        match (summary.image_width, summary.image_height) {
            (Some(w), Some(h)) => println!("Image:      {image} ({w}x{h})"),
            _ => println!("Image:      {image}"),
        }
    }
    if let Some(url) = &summary.url {
        println!("Article:    {url}");
    }
    println!("Favorite:   {}", if favorite { "yes" } else { "no" });
    println!("Downloaded: {}", if downloaded { "yes" } else { "no" });
    Ok(())
}

async fn favorite(ctx: &App, action: FavoriteAction) -> Result<()> {
    let favorites = ctx.db.favorites();
    match action {
        FavoriteAction::Add { title } => {
            let summary = resolve_summary(ctx, &title, false, None).await?;
            favorites
                .add(&summary.to_place())
                .await
                .context("Failed to add favorite")?;
            println!("Added to favorites: {}", summary.title);
        }
        FavoriteAction::Toggle { title } => {
            let summary = resolve_summary(ctx, &title, false, None).await?;
            let now_favorite = favorites
                .toggle(&summary.to_place())
                .await
                .context("Favorite toggle failed")?;
            if now_favorite {
                println!("Added to favorites: {}", summary.title);
            } else {
                println!("Removed from favorites: {}", summary.title);
            }
        }
        FavoriteAction::Remove { title, page_id } => {
            favorites
                .remove(page_id, &title)
                .await
                .context("Failed to remove favorite")?;
            println!("Removed from favorites: {title}");
        }
        FavoriteAction::List => print_places(&favorites, "Favorites").await,
    }
    Ok(())
}

async fn download(ctx: &App, action: DownloadAction) -> Result<()> {
    let downloads = ctx.db.downloads();
    match action {
        DownloadAction::Add { title } => {
            let summary = resolve_summary(ctx, &title, false, None).await?;
            downloads
                .add(&summary.to_place())
                .await
                .context("Download failed")?;
            println!("Downloaded: {}", summary.title);
        }
        DownloadAction::Remove { title, page_id } => {
            downloads
                .remove(page_id, &title)
                .await
                .context("Failed to remove download")?;
            println!("Removed download: {title}");
        }
        DownloadAction::List => print_places(&downloads, "Downloads").await,
    }
    Ok(())
}

async fn print_places<C: PlaceCollection>(repo: &PlaceRepository<C>, heading: &str) {
    let places = repo.list_or_empty().await;
    if places.is_empty() {
        println!("{heading}: none");
        return;
    }

    println!("{heading} ({})", places.len());
    for place in places {
        let page_id = place
            .page_id
            .map(|id| format!("[{id}]"))
            .unwrap_or_default();
        match &place.saved_at {
            Some(saved_at) => println!("{saved_at}  {} {page_id}", place.title),
            None => println!("{} {page_id}", place.title),
        }
    }
}

async fn history(ctx: &App, action: HistoryAction) -> Result<()> {
    let history = ctx.db.history();
    match action {
        HistoryAction::List => {
            let entries = history.list_or_empty().await;
            if entries.is_empty() {
                println!("No visits yet");
            }
            for entry in entries {
                println!("{}  {}", entry.visited_at, entry.title);
            }
        }
        HistoryAction::Clear => {
            let removed = history.clear().await.context("Failed to clear history")?;
            println!("Cleared {removed} visits");
        }
    }
    Ok(())
}

async fn settings(ctx: &App, action: SettingsAction) -> Result<()> {
    let current = ctx.settings.load().await;
    match action {
        SettingsAction::Show => {
            println!("Search radius: {:.1} km", f64::from(current.radius) / 1000.0);
            println!(
                "Language:      {} ({})",
                current.language.native_name(),
                current.language
            );
        }
        SettingsAction::Reset => {
            ctx.settings
                .reset()
                .await
                .context("Could not reset settings")?;
            let defaults = Settings::default();
            println!(
                "Settings reset: {} m, {}",
                defaults.radius, defaults.language
            );
        }
        SettingsAction::Set { radius, language } => {
            let updated = Settings::new(
                radius.unwrap_or(current.radius),
                language.unwrap_or(current.language),
            )?;
            ctx.settings
                .save(&updated)
                .await
                .context("Could not save settings")?;
            println!("Settings saved");
        }
    }
    Ok(())
}
