//! Command line definition.

use std::path::PathBuf;

use blixx_core::api::{DEFAULT_PAGE, DEFAULT_PER_PAGE, DEFAULT_TIME_WINDOW};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "blixx", author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct Paging {
    #[arg(long, default_value_t = DEFAULT_PAGE)]
    pub page: u32,

    #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
    pub per_page: u32,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in (prompts for the password)
    Login { username: Option<String> },

    /// Create an account
    Register { username: String, email: String },

    /// Forget the saved session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Refresh the access token now
    Refresh,

    /// Show a profile (yours by default)
    Profile { user_id: Option<i64> },

    /// Update your profile
    EditProfile {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        /// Profile picture URL
        #[arg(long)]
        picture: Option<String>,
    },

    /// List public movies
    Movies {
        #[command(flatten)]
        paging: Paging,
    },

    /// List featured movies
    Featured {
        #[command(flatten)]
        paging: Paging,
    },

    /// List your uploads
    Mine {
        #[command(flatten)]
        paging: Paging,
    },

    /// Search the catalog
    Search {
        #[arg(required = true)]
        query: Vec<String>,
        #[command(flatten)]
        paging: Paging,
    },

    /// Movie details
    Show { movie_id: i64 },

    /// Upload a video file
    Upload {
        file: PathBuf,
        #[arg(long, default_value = "Untitled")]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        genre: Option<String>,
        #[arg(long)]
        public: bool,
        /// TMDB id to link the upload to
        #[arg(long)]
        tmdb: Option<i64>,
    },

    /// Edit a movie you uploaded
    Edit {
        movie_id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        genre: Option<String>,
        #[arg(long)]
        rating: Option<f64>,
        #[arg(long, conflicts_with = "private")]
        public: bool,
        #[arg(long)]
        private: bool,
    },

    /// Delete a movie you uploaded
    Delete { movie_id: i64 },

    /// Play a movie: print the stream URL and report progress
    Watch { movie_id: i64 },

    /// Watch history
    History {
        #[command(flatten)]
        paging: Paging,
    },

    /// Search TMDB
    Tmdb {
        #[arg(required = true)]
        query: Vec<String>,
        #[arg(long, default_value_t = DEFAULT_PAGE)]
        page: u32,
    },

    /// Trending movies on TMDB
    Trending {
        #[arg(default_value = DEFAULT_TIME_WINDOW, value_parser = ["day", "week"])]
        window: String,
        #[arg(long, default_value_t = DEFAULT_PAGE)]
        page: u32,
    },
}
