use clap::{Args as ClapArgs, Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use roster::admin::{User, UserCreateRequest, UserUpdateRequest};
use roster::config::Config;
use roster::store::SqliteStore;
use roster::App;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "roster")]
#[command(about = "User administration that keeps working offline")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/roster/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Treat the network as unavailable; edits are queued for a later `sync`
  #[arg(long)]
  offline: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Log in and remember the session token
  Login {
    username: String,
    /// Password (default: $ROSTER_PASSWORD)
    #[arg(long)]
    password: Option<String>,
  },
  /// End the current session
  Logout,
  /// Show the logged-in user
  Whoami,
  /// Manage users
  #[command(subcommand)]
  Users(UsersCommand),
  /// List requests waiting to be replayed
  Queue,
  /// Replay queued requests once
  Sync,
  /// Keep replaying queued requests until interrupted
  Watch,
}

#[derive(Subcommand, Debug)]
enum UsersCommand {
  /// List users
  List,
  /// Create a user
  Create(CreateArgs),
  /// Update fields of a user
  Update(UpdateArgs),
  /// Delete a user
  Delete { id: String },
}

#[derive(ClapArgs, Debug)]
struct CreateArgs {
  #[arg(long)]
  username: String,
  #[arg(long, default_value = "member")]
  role: String,
  #[arg(long)]
  name: Option<String>,
  #[arg(long)]
  email: Option<String>,
  #[arg(long)]
  password: Option<String>,
  /// Create the account disabled
  #[arg(long)]
  inactive: bool,
}

#[derive(ClapArgs, Debug)]
struct UpdateArgs {
  id: String,
  #[arg(long)]
  username: Option<String>,
  #[arg(long)]
  name: Option<String>,
  #[arg(long)]
  email: Option<String>,
  #[arg(long)]
  role: Option<String>,
  #[arg(long)]
  password: Option<String>,
  #[arg(long)]
  active: Option<bool>,
}

/// Log to a daily file next to the database so stdout stays clean.
fn init_tracing(config: &Config) -> Result<WorkerGuard> {
  let db_path = match &config.storage.path {
    Some(path) => path.clone(),
    None => SqliteStore::default_path()?,
  };
  let log_dir = db_path
    .parent()
    .map(Path::to_path_buf)
    .unwrap_or_else(|| PathBuf::from("."));
  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(log_dir, "roster.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("roster=info")),
    )
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

fn print_users(users: &[User]) {
  if users.is_empty() {
    println!("No users.");
    return;
  }
  println!(
    "{:<38} {:<16} {:<20} {:<28} {:<10} ACTIVE",
    "ID", "USERNAME", "NAME", "EMAIL", "ROLE"
  );
  for user in users {
    println!(
      "{:<38} {:<16} {:<20} {:<28} {:<10} {}",
      user.id,
      user.username,
      user.name,
      user.email,
      user.role,
      if user.active { "yes" } else { "no" }
    );
  }
}

async fn run_users(app: &App, command: UsersCommand) -> Result<()> {
  let offline = !app.network.is_online();

  match command {
    UsersCommand::List => {
      let users = app.users.list_users().await?;
      if offline {
        println!("(offline: showing cached users)");
      }
      print_users(&users);
    }
    UsersCommand::Create(args) => {
      let input = UserCreateRequest {
        username: args.username,
        role: args.role,
        name: args.name,
        email: args.email,
        password: args.password,
        active: args.inactive.then_some(false),
      };
      let user = app.users.create_user(&input).await?;
      print_users(std::slice::from_ref(&user));
    }
    UsersCommand::Update(args) => {
      let patch = UserUpdateRequest {
        username: args.username,
        name: args.name,
        email: args.email,
        role: args.role,
        password: args.password,
        active: args.active,
      };
      let user = app.users.update_user(&args.id, &patch).await?;
      print_users(std::slice::from_ref(&user));
    }
    UsersCommand::Delete { id } => {
      app.users.delete_user(&id).await?;
      println!("Deleted {}", id);
    }
  }

  if offline {
    println!("{} request(s) queued for sync.", app.queue.len().await?);
  }
  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;
  if args.offline {
    config.offline = true;
  }

  let _log_guard = init_tracing(&config)?;
  let app = App::new(&config)?;

  match args.command {
    Command::Login { username, password } => {
      let password = match password {
        Some(p) => p,
        None => Config::get_password()?,
      };
      let user = app.session.login(&username, &password).await?;
      println!("Logged in as {} ({})", user.username, user.role);
    }
    Command::Logout => {
      app.session.logout().await?;
      println!("Logged out.");
    }
    Command::Whoami => match app.session.current_user().await? {
      Some(user) => println!("{} ({})", user.username, user.role),
      None => println!("Not logged in."),
    },
    Command::Users(command) => run_users(&app, command).await?,
    Command::Queue => {
      let pending = app.queue.pending().await?;
      if pending.is_empty() {
        println!("Queue is empty.");
      }
      for item in pending {
        let queued_at = chrono::DateTime::from_timestamp_millis(item.timestamp)
          .map(|t| t.to_rfc3339())
          .unwrap_or_default();
        println!(
          "{}  {:<6} {}  {}",
          item.id, item.request.method, item.request.url, queued_at
        );
      }
    }
    Command::Sync => {
      if !app.network.is_online() {
        println!("Offline: {} request(s) waiting.", app.queue.len().await?);
        return Ok(());
      }
      match app.sync.sync_now().await? {
        Some(report) => println!(
          "Delivered {} of {} queued request(s), {} remaining.",
          report.delivered, report.attempted, report.remaining
        ),
        None => println!("A sync is already running."),
      }
    }
    Command::Watch => {
      let handle = app.sync.start();
      println!("Syncing in the background. Press Ctrl-C to stop.");
      tokio::signal::ctrl_c()
        .await
        .map_err(|e| eyre!("Failed to listen for Ctrl-C: {}", e))?;
      handle.shutdown().await;
    }
  }

  Ok(())
}
