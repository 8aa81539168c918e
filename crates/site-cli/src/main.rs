//! The 411 site tool - account, profile and roster operations against the
//! label's backend.

mod app;
mod commands;
mod terminal;

use std::path::PathBuf;
use std::process::ExitCode;

use app::App;
use clap::{Args, Parser, Subcommand};
use commands::ProfileChanges;
use label_catalog::{NewArtist, NewTeamMember};
use site_config::{init_logging, Config, Paths};

/// The 411 command-line interface.
#[derive(Parser, Debug)]
#[command(name = "the411")]
#[command(about = "Account and roster management for The 411")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for runtime files (session, logs, config). Defaults to ~/.the411
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct Credentials {
    /// Account email
    email: String,

    #[arg(long, env = "THE411_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an account
    Signup {
        #[command(flatten)]
        credentials: Credentials,

        #[arg(long)]
        full_name: String,
    },
    /// Sign in with email and password
    Signin {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Sign out and forget the stored session
    Signout,
    /// Show the signed-in user
    Whoami,
    /// Delete the signed-in account and its profile
    DeleteAccount {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Check whether the signed-in user holds a role (admin, user, moderator)
    HasRole { role: String },
    /// Profile settings
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Artist roster
    #[command(subcommand)]
    Artists(ArtistsCommand),
    /// Label team
    #[command(subcommand)]
    Team(TeamCommand),
    /// Show how a protected page treats the stored session
    Guard,
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    Show,
    Update {
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        website: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },
    /// Upload a new avatar image and save it on the profile
    Avatar { file: PathBuf },
}

#[derive(Subcommand, Debug)]
enum ArtistsCommand {
    List,
    /// Create your artist profile
    Create {
        name: String,
        #[arg(long, default_value = "")]
        genre: String,
        #[arg(long, default_value = "")]
        style: String,
        #[arg(long, default_value = "")]
        bio: String,
    },
}

#[derive(Subcommand, Debug)]
enum TeamCommand {
    /// List members grouped by role
    List,
    /// Create your team member profile
    Create {
        name: String,
        #[arg(long)]
        role: String,
        #[arg(long, default_value = "")]
        bio: String,
    },
    /// Replace a member's picture (owner only)
    Avatar { member_id: String, file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;
    init_logging(cli.log_level.as_deref().unwrap_or(&config.log_level));

    let app = App::assemble(config, &paths)?;
    let result = run(&app, cli.command).await;
    app.shutdown();
    result
}

async fn run(app: &App, command: Commands) -> anyhow::Result<ExitCode> {
    // The guard has to see the store before it resolves.
    if !matches!(command, Commands::Guard) {
        app.initialize().await;
    }

    let code = match command {
        Commands::Signup {
            credentials,
            full_name,
        } => commands::sign_up(app, &credentials.email, &credentials.password, &full_name).await,
        Commands::Signin { credentials } => {
            commands::sign_in(app, &credentials.email, &credentials.password).await
        }
        Commands::Signout => commands::sign_out(app).await,
        Commands::Whoami => commands::who_am_i(app),
        Commands::DeleteAccount { yes } => commands::delete_account(app, yes).await,
        Commands::HasRole { role } => commands::has_role(app, &role).await,
        Commands::Profile(ProfileCommand::Show) => commands::profile_show(app).await,
        Commands::Profile(ProfileCommand::Update {
            full_name,
            username,
            website,
            bio,
            location,
        }) => {
            let changes = ProfileChanges {
                full_name,
                username,
                website,
                bio,
                location,
            };
            commands::profile_update(app, changes).await
        }
        Commands::Profile(ProfileCommand::Avatar { file }) => {
            commands::profile_avatar(app, &file).await?
        }
        Commands::Artists(ArtistsCommand::List) => commands::artists_list(app).await,
        Commands::Artists(ArtistsCommand::Create {
            name,
            genre,
            style,
            bio,
        }) => {
            let artist = NewArtist {
                name,
                genre,
                style,
                bio,
            };
            commands::artists_create(app, artist).await
        }
        Commands::Team(TeamCommand::List) => commands::team_list(app).await,
        Commands::Team(TeamCommand::Create { name, role, bio }) => {
            commands::team_create(app, NewTeamMember { name, role, bio }).await
        }
        Commands::Team(TeamCommand::Avatar { member_id, file }) => {
            commands::team_avatar(app, &member_id, &file).await?
        }
        Commands::Guard => commands::guard(app).await,
    };
    Ok(code)
}
