use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::directory::DevoteeField;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// YAML config file (endpoints, http, cache, reader).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Local cache directory (catalog, staged books, cart, registrations).
    #[arg(long, global = true, default_value = ".kripadham")]
    pub cache_dir: PathBuf,

    /// Print views as JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the book catalog.
    Books(BooksArgs),
    /// Open a book index, or one of its pages.
    Read(ReadArgs),
    /// Re-fetch a book and open its index.
    Switch(SwitchArgs),
    /// Resolve a site path and print the view behind it.
    Open(OpenArgs),
    Devotees(DevoteesArgs),
    Kirtans(KirtansArgs),
    Bhajans(BhajansArgs),
    Kathas(KathasArgs),
    Register {
        #[command(subcommand)]
        command: RegisterCommand,
    },
    /// Ask the help chat a question.
    Chat(ChatArgs),
    /// Convert a YouTube watch link to its embed form.
    Youtube(YoutubeArgs),
}

#[derive(Debug, Default, Args)]
pub struct BooksArgs {
    /// Case-insensitive match on title or category.
    #[arg(long, default_value = "")]
    pub search: String,

    /// Exact category.
    #[arg(long, default_value = "")]
    pub category: String,
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    #[arg(long)]
    pub book: String,

    #[arg(long)]
    pub page: Option<String>,
}

#[derive(Debug, Args)]
pub struct SwitchArgs {
    #[arg(long)]
    pub book: String,
}

#[derive(Debug, Args)]
pub struct OpenArgs {
    /// Site path such as `/book/B1/page/P2`.
    pub path: String,
}

#[derive(Debug, Default, Args)]
pub struct DevoteesArgs {
    #[arg(long, default_value = "")]
    pub initiated_name: String,

    #[arg(long, default_value = "")]
    pub city: String,

    #[arg(long, default_value = "")]
    pub state: String,

    #[arg(long, value_enum)]
    pub sort: Option<DevoteeField>,

    /// Sort descending.
    #[arg(long, requires = "sort")]
    pub desc: bool,
}

#[derive(Debug, Default, Args)]
pub struct KirtansArgs {
    /// Case-insensitive match on name, city or state.
    #[arg(long, default_value = "")]
    pub search: String,

    /// Write the matching rows as CSV to this file.
    #[arg(long)]
    pub csv: Option<PathBuf>,
}

#[derive(Debug, Default, Args)]
pub struct BhajansArgs {
    /// Case-insensitive match on title or YouTube text.
    #[arg(long, default_value = "")]
    pub search: String,

    #[arg(long, default_value = "")]
    pub category: String,
}

#[derive(Debug, Default, Args)]
pub struct KathasArgs {
    /// Katha to open; lists all kathas when omitted.
    #[arg(long)]
    pub katha: Option<String>,

    /// Case-insensitive match on video title.
    #[arg(long, default_value = "")]
    pub search: String,
}

#[derive(Debug, Subcommand)]
pub enum RegisterCommand {
    /// Initiation form (posted to the devotee sheet).
    Initiation(FromArgs),
    /// Guru Purnima registration (kept locally with a token).
    GuruPurnima(GuruPurnimaArgs),
    /// Guru Purnima kids event registration.
    Event(FromArgs),
    /// Place a book store order.
    Checkout(CheckoutArgs),
}

#[derive(Debug, Args)]
pub struct FromArgs {
    /// JSON file holding the form fields.
    #[arg(long)]
    pub from: PathBuf,
}

#[derive(Debug, Args)]
pub struct GuruPurnimaArgs {
    /// JSON file holding the form fields. Omit to show the saved token.
    #[arg(long, conflicts_with = "reset")]
    pub from: Option<PathBuf>,

    /// Forget the saved registration.
    #[arg(long)]
    pub reset: bool,
}

#[derive(Debug, Args)]
pub struct CheckoutArgs {
    /// JSON file holding delivery details (name, mobile, city, address, landmark).
    #[arg(long)]
    pub from: PathBuf,

    /// Replace the cart with this store book before ordering.
    #[arg(long)]
    pub book: Option<String>,

    #[arg(long, default_value_t = 1)]
    pub quantity: u32,
}

#[derive(Debug, Args)]
pub struct ChatArgs {
    pub message: String,
}

#[derive(Debug, Args)]
pub struct YoutubeArgs {
    pub link: String,
}
