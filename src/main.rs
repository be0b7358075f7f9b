use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};

use syftplayer::{cli, config, error};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the web player
    Serve(ServeOptions),

    /// Log in with Spotify through the browser
    Login,

    /// List available Spotify Connect devices
    Devices(UserOption),

    /// Search tracks
    Search(SearchOptions),

    /// Play a track or playlist URI on a device
    Play(PlayOptions),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct ServeOptions {
    /// Open the player in the default browser
    #[clap(long)]
    pub open: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct UserOption {
    /// Spotify user id (defaults to the last login)
    #[clap(long)]
    pub user: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// Search terms
    pub query: String,

    /// Spotify user id (defaults to the last login)
    #[clap(long)]
    pub user: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct PlayOptions {
    /// spotify:track:..., spotify:playlist:... or spotify:album:...
    pub uri: String,

    /// Name of the Spotify Connect device
    #[clap(long)]
    pub device: String,

    /// Spotify user id (defaults to the last login)
    #[clap(long)]
    pub user: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let cli = Cli::parse();

    if let Command::Completions(opt) = &cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(opt.shell, &mut cmd, name, &mut std::io::stdout());
        return;
    }

    let settings = match config::Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => error!("Invalid configuration. Err: {}", e),
    };

    match cli.command {
        Command::Serve(opt) => cli::serve(settings, opt.open).await,
        Command::Login => cli::login(settings).await,
        Command::Devices(opt) => cli::devices(settings, opt.user).await,
        Command::Search(opt) => cli::search(settings, &opt.query, opt.user).await,
        Command::Play(opt) => cli::play(settings, &opt.uri, &opt.device, opt.user).await,
        Command::Completions(_) => {}
    }
}
