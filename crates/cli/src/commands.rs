//! CLI commands

use anyhow::{Result, bail};
use chrono::Utc;
use cinema_core::{FileSessionStore, Session};
use cinema_http::types::Seat;
use cinema_http::{CinemaClient, CinemaClientBuilder, ClientConfig};
use clap::Subcommand;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config;
use crate::cookies::CookieFile;

const SESSION_FILE: &str = "session.json";
const COOKIE_FILE: &str = "cookies.txt";

/// Resolved settings shared by every command
pub struct Context {
    pub data_dir: PathBuf,
    pub client_config: ClientConfig,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(flatten)]
    Api(ApiCommands),

    /// Configuration file operations
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Commands that talk to the booking API
#[derive(Subcommand)]
pub enum ApiCommands {
    /// Sign in and keep the session in the data directory
    Login {
        email: String,

        /// Password (prefer the environment variable over the flag)
        #[arg(long, env = "CINEMA_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account
    Register {
        /// Full name
        #[arg(long)]
        name: String,

        email: String,

        #[arg(long, env = "CINEMA_PASSWORD", hide_env_values = true)]
        password: String,

        /// Repeat the password; must match when given
        #[arg(long)]
        confirm_password: Option<String>,
    },

    /// Forget the stored session and refresh cookie
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Exchange the refresh cookie for a new access token
    Refresh,

    /// List movies
    Movies,

    /// List the shows of a movie
    Shows { movie_id: i64 },

    /// List the seats of a show
    Seats {
        show_id: i64,

        /// Only list seats that can still be booked
        #[arg(long)]
        available: bool,
    },

    /// Book seats for a show, by seat name (e.g. C7) or seat id
    Book {
        #[arg(long = "show")]
        show_id: i64,

        #[arg(required = true)]
        seats: Vec<String>,
    },

    /// List booked tickets
    Tickets {
        /// Only list tickets for screenings that have not started
        #[arg(long)]
        upcoming: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate a default configuration file
    Init {
        /// Output file path (defaults to config.toml in the data directory)
        output: Option<PathBuf>,
    },
}

impl Commands {
    /// Execute the command
    pub async fn execute(self, ctx: &Context) -> Result<()> {
        match self {
            Self::Api(command) => command.execute(ctx).await,
            Self::Config { command } => command.execute(ctx),
        }
    }
}

impl ApiCommands {
    async fn execute(self, ctx: &Context) -> Result<()> {
        let cookies = CookieFile::load(ctx.data_dir.join(COOKIE_FILE), base_url(&ctx.client_config))?;
        let client = build_client(ctx, &cookies)?;

        let result = self.run(&client, &cookies).await;

        // The server may rotate the refresh cookie on any call
        if !matches!(result, Ok(Outcome::SignedOut))
            && let Err(e) = cookies.save()
        {
            warn!("Failed to save cookies: {e:#}");
        }

        result.map(|_| ())
    }

    async fn run(self, client: &CinemaClient, cookies: &CookieFile) -> Result<Outcome> {
        match self {
            Self::Login { email, password } => {
                let session = client.login(&email, &password).await?;
                info!(user_id = ?session.user_id, "signed in");
                print_identity(&session);
            }
            Self::Register {
                name,
                email,
                password,
                confirm_password,
            } => {
                let message = client
                    .register(&name, &email, &password, confirm_password.as_deref())
                    .await?;
                println!("{message}");
            }
            Self::Logout => {
                client.logout()?;
                cookies.remove()?;
                println!("Signed out");
                return Ok(Outcome::SignedOut);
            }
            Self::Whoami => match client.current_session() {
                Some(session) => print_identity(&session),
                None => bail!("not signed in"),
            },
            Self::Refresh => {
                client.refresh_session().await?;
                println!("Access token refreshed");
            }
            Self::Movies => print_json(&client.list_movies().await?)?,
            Self::Shows { movie_id } => print_json(&client.list_shows(movie_id).await?)?,
            Self::Seats { show_id, available } => {
                let mut seats = client.list_seats(show_id).await?;
                if available {
                    seats.retain(Seat::is_available);
                }
                print_json(&seats)?;
            }
            Self::Book { show_id, seats } => {
                let available = client.list_seats(show_id).await?;
                let seat_ids = resolve_seats(&available, &seats)?;
                client.book_seats(&seat_ids).await?;
                println!("Booked {} seat(s) for show {show_id}", seat_ids.len());
            }
            Self::Tickets { upcoming } => {
                let mut tickets = client.my_tickets().await?;
                if upcoming {
                    let now = Utc::now();
                    tickets.retain(|ticket| ticket.is_upcoming(now));
                }
                print_json(&tickets)?;
            }
        }

        Ok(Outcome::Done)
    }
}

impl ConfigCommands {
    fn execute(self, ctx: &Context) -> Result<()> {
        match self {
            Self::Init { output } => {
                let path = output.unwrap_or_else(|| ctx.data_dir.join(config::CONFIG_FILE));
                config::generate_default_config(&path)?;
                println!("Configuration written to {}", path.display());
            }
        }
        Ok(())
    }
}

enum Outcome {
    Done,
    SignedOut,
}

fn base_url(config: &ClientConfig) -> &str {
    config.base_url.trim_end_matches('/')
}

fn build_client(ctx: &Context, cookies: &CookieFile) -> Result<CinemaClient> {
    let store = FileSessionStore::open(ctx.data_dir.join(SESSION_FILE))?;

    let client = CinemaClientBuilder::from_config(&ctx.client_config)
        .session_store(Arc::new(store))
        .cookie_jar(cookies.jar())
        .on_session_expired(|| {
            eprintln!("Session expired. Please log in again with `cinema login`.");
        })
        .build()?;

    Ok(client)
}

fn print_identity(session: &Session) {
    match (&session.name, &session.email) {
        (Some(name), Some(email)) => println!("Signed in as {name} <{email}>"),
        (_, Some(email)) => println!("Signed in as {email}"),
        _ => println!("Signed in"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Map seat names or ids to seat ids, refusing seats that are not available
fn resolve_seats(seats: &[Seat], wanted: &[String]) -> Result<Vec<i64>> {
    let mut ids = Vec::with_capacity(wanted.len());

    for token in wanted {
        let token = token.trim();
        let seat = seats
            .iter()
            .find(|seat| seat.seat_name.eq_ignore_ascii_case(token))
            .or_else(|| {
                token
                    .parse::<i64>()
                    .ok()
                    .and_then(|id| seats.iter().find(|seat| seat.seat_id == id))
            });

        let Some(seat) = seat else {
            bail!("unknown seat: {token}");
        };
        if !seat.is_available() {
            bail!("seat {} is already booked", seat.seat_name);
        }
        if !ids.contains(&seat.seat_id) {
            ids.push(seat.seat_id);
        }
    }

    Ok(ids)
}
