//! Seeds and inspects the rotation catalog without going through the server.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use radio_rotation_server::catalog_store::{
    CatalogStore, NewSong, Song, SongStatus, SqliteCatalogStore,
};
use std::path::PathBuf;
use chrono::{DateTime, Utc};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(name = "cli-catalog")]
#[command(about = "Manage songs and artist credits of the radio catalog")]
struct CliArgs {
    /// Path to the SQLite catalog database file, created if missing.
    #[clap(value_parser = parse_path)]
    pub catalog_db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submits a new song, pending moderation.
    AddSong {
        id: String,
        artist_id: String,
        title: String,
        audio_location: String,
        /// Length of the song in seconds.
        #[arg(long)]
        duration: u32,
        #[arg(long)]
        artwork: Option<String>,
        /// Approve right away.
        #[arg(long)]
        approve: bool,
    },

    /// Changes the moderation status of a song (pending, approved, rejected).
    SetStatus { id: String, status: SongStatus },

    /// Keeps a song out of rotation for the given number of hours.
    Suspend { id: String, hours: u64 },

    /// Puts a suspended song back in rotation.
    Unsuspend { id: String },

    /// Adds promotional credits to an artist.
    GrantCredits { artist_id: String, amount: i64 },

    /// Shows the credit balance of an artist.
    Credits { artist_id: String },

    /// Lists every song in the catalog.
    List,
}

fn now() -> i64 {
    Utc::now().timestamp()
}

fn format_timestamp(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| secs.to_string())
}

fn print_song(song: &Song, now: i64) {
    let availability = match song.suspended_until {
        Some(until) if until > now => format!("suspended until {}", format_timestamp(until)),
        _ if song.is_eligible(now) => "in rotation".to_string(),
        _ => "out of rotation".to_string(),
    };
    println!(
        "{:<24} {:<20} {:>5}s {:<9} {:<20} {}",
        song.id, song.artist_id, song.duration_secs, song.status, availability, song.title
    );
}

fn execute(store: &dyn CatalogStore, command: Command) -> Result<()> {
    match command {
        Command::AddSong {
            id,
            artist_id,
            title,
            audio_location,
            duration,
            artwork,
            approve,
        } => {
            if duration == 0 {
                bail!("Duration must be positive");
            }
            let song = store.add_song(NewSong {
                id,
                artist_id,
                title,
                audio_location,
                artwork_location: artwork,
                duration_secs: duration,
            })?;
            if approve {
                store.set_song_status(&song.id, SongStatus::Approved, now())?;
            }
            println!("Added song {}", song.id);
        }
        Command::SetStatus { id, status } => {
            store.set_song_status(&id, status, now())?;
            println!("Song {} is now {}", id, status);
        }
        Command::Suspend { id, hours } => {
            let until = now() + (hours as i64) * 3600;
            store.suspend_song(&id, Some(until))?;
            println!("Song {} suspended for {} hours", id, hours);
        }
        Command::Unsuspend { id } => {
            store.suspend_song(&id, None)?;
            println!("Song {} back in rotation", id);
        }
        Command::GrantCredits { artist_id, amount } => {
            let balance = store.grant_credits(&artist_id, amount)?;
            println!("Artist {} now has {} credits", artist_id, balance.credits);
        }
        Command::Credits { artist_id } => {
            let balance = store.get_credit_balance(&artist_id)?;
            println!("{}", balance.credits);
        }
        Command::List => {
            let now = now();
            for song in store.list_songs()? {
                print_song(&song, now);
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();
    let store = SqliteCatalogStore::new(&cli_args.catalog_db, 1)
        .with_context(|| format!("Could not open catalog at {:?}", cli_args.catalog_db))?;
    execute(&store, cli_args.command)
}
