//! Command handlers. Each one calls into the API client and prints what
//! comes back.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use blixx_core::api::{Upload, UploadForm};
use blixx_core::models::{MoviePage, MovieUpdate, ProfileUpdate};
use blixx_core::playback::{Player, WallClock};
use blixx_core::{ApiClient, Config};
use tracing::{info, warn};

use crate::cli::Command;
use crate::format;

pub async fn run(command: Command, client: Arc<ApiClient>, config: &mut Config) -> Result<()> {
    match command {
        Command::Login { username } => login(username, &client, config).await,
        Command::Register { username, email } => register(&username, &email, &client).await,
        Command::Logout => {
            client.logout();
            println!("Logged out.");
            Ok(())
        }
        Command::Whoami => whoami(&client),
        Command::Refresh => {
            if client.refresh_access_token().await {
                println!("Access token refreshed.");
                Ok(())
            } else {
                bail!("Could not refresh the access token; please log in again")
            }
        }
        Command::Profile { user_id } => {
            let user = match user_id {
                Some(id) => client.user_profile(id).await?,
                None => client.current_user().await?,
            };
            println!("{}", format::user_summary(&user));
            Ok(())
        }
        Command::EditProfile {
            first_name,
            last_name,
            picture,
        } => {
            let update = ProfileUpdate {
                first_name,
                last_name,
                profile_picture_url: picture,
            };
            let user = client.update_profile(&update).await?;
            println!("Updated: {}", format::user_summary(&user));
            Ok(())
        }
        Command::Movies { paging } => {
            print_movies(&client.movies(paging.page, paging.per_page).await?);
            Ok(())
        }
        Command::Featured { paging } => {
            print_movies(&client.featured_movies(paging.page, paging.per_page).await?);
            Ok(())
        }
        Command::Mine { paging } => {
            print_movies(&client.user_movies(paging.page, paging.per_page).await?);
            Ok(())
        }
        Command::Search { query, paging } => {
            let query = query.join(" ");
            print_movies(&client.search_movies(&query, paging.page, paging.per_page).await?);
            Ok(())
        }
        Command::Show { movie_id } => {
            let movie = client.movie(movie_id).await?;
            println!("{}", format::movie_detail(&movie));
            Ok(())
        }
        Command::Upload {
            file,
            title,
            description,
            genre,
            public,
            tmdb,
        } => {
            let mut form = UploadForm::from_path(&file).await?.title(title).public(public);
            if let Some(description) = description {
                form = form.description(description);
            }
            if let Some(genre) = genre {
                form = form.genre(genre);
            }
            if let Some(tmdb_id) = tmdb {
                form = form.tmdb_id(tmdb_id);
            }
            upload(form, &client).await
        }
        Command::Edit {
            movie_id,
            title,
            description,
            genre,
            rating,
            public,
            private,
        } => {
            let update = MovieUpdate {
                title,
                description,
                genre,
                rating,
                is_public: visibility(public, private),
                is_featured: None,
            };
            let movie = client.update_movie(movie_id, &update).await?;
            println!("{}", format::movie_detail(&movie));
            Ok(())
        }
        Command::Delete { movie_id } => {
            client.delete_movie(movie_id).await?;
            println!("Movie {} deleted.", movie_id);
            Ok(())
        }
        Command::Watch { movie_id } => watch(movie_id, client, config).await,
        Command::History { paging } => {
            let history = client.watch_history(paging.page, paging.per_page).await?;
            if history.watch_history.is_empty() {
                println!("No watch history yet.");
                return Ok(());
            }
            for entry in &history.watch_history {
                println!("{}", format::watch_row(entry));
            }
            Ok(())
        }
        Command::Tmdb { query, page } => {
            print_json(&client.search_tmdb(&query.join(" "), page).await?)
        }
        Command::Trending { window, page } => {
            print_json(&client.trending_movies(&window, page).await?)
        }
    }
}

/// `--public`/`--private` as the `is_public` change they request
fn visibility(public: bool, private: bool) -> Option<bool> {
    match (public, private) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}

fn prompt_username(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut username = String::new();
    io::stdin().read_line(&mut username)?;
    Ok(username.trim().to_string())
}

fn print_movies(page: &MoviePage) {
    if page.movies.is_empty() {
        println!("No movies found.");
        return;
    }
    for movie in &page.movies {
        println!("{}", format::movie_row(movie));
    }
    println!(
        "\nPage {} of {} ({} total)",
        page.current_page, page.pages, page.total
    );
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn login(username: Option<String>, client: &ApiClient, config: &mut Config) -> Result<()> {
    let username = match username {
        Some(name) => name,
        None => match config.last_username.clone() {
            Some(last) => {
                let entered = prompt_username(&format!("Username [{}]: ", last))?;
                if entered.is_empty() {
                    last
                } else {
                    entered
                }
            }
            None => prompt_username("Username: ")?,
        },
    };
    if username.is_empty() {
        bail!("Username is required");
    }

    let password = rpassword::prompt_password("Password: ")?;
    let data = client.login(&username, &password).await?;

    config.last_username = Some(username);
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }

    println!("Welcome, {}!", data.user.display_name());
    Ok(())
}

async fn register(username: &str, email: &str, client: &ApiClient) -> Result<()> {
    let password = rpassword::prompt_password("Password: ")?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }

    client.register(username, email, &password).await?;
    println!("Registered {}. Run `blixx login {}` to sign in.", username, username);
    Ok(())
}

fn whoami(client: &ApiClient) -> Result<()> {
    if !client.is_authenticated() {
        println!("Not logged in.");
        return Ok(());
    }
    if let Some(user) = client.stored_user() {
        println!("{}", format::user_summary(&user));
    }
    Ok(())
}

async fn upload(form: UploadForm, client: &ApiClient) -> Result<()> {
    let upload = Upload::new(form).on_progress(|percent| {
        eprint!("\rUploading... {:>3.0}%", percent);
    });
    let result = client.upload_movie(upload).await;
    eprintln!();

    let body = result?;
    match body.get("movie").and_then(|m| m.get("id")) {
        Some(id) => println!("Movie uploaded successfully (#{}).", id),
        None => println!("Movie uploaded successfully."),
    }
    Ok(())
}

/// Stream a movie: print where to play it from and report progress with a
/// wall clock until the running time elapses or Ctrl+C.
async fn watch(id: i64, client: Arc<ApiClient>, config: &Config) -> Result<()> {
    let clock = Arc::new(WallClock::playing_from(Duration::ZERO));
    let mut player = Player::with_interval(client, config.watch_report_interval());

    let playing = player.play(id, clock).await?;
    let total = playing.total_duration();
    println!("Now playing: {}", playing.movie.title);
    println!("Stream URL:  {}", playing.stream.stream_url);
    if let Some(expires) = playing.stream.expires_in {
        println!("(URL valid for {})", format::format_duration(expires));
    }
    println!("Press Ctrl+C to stop.");

    let ended = if total > 0 {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(total)) => true,
            _ = tokio::signal::ctrl_c() => false,
        }
    } else {
        tokio::signal::ctrl_c().await?;
        false
    };

    if ended {
        player.finish().await;
        println!("Finished.");
    } else {
        player.stop();
        println!("\nStopped.");
    }
    info!(movie_id = id, ended, "Watch session over");
    Ok(())
}
