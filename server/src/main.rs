use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use collections_server::{
    config::AppConfig,
    http::{self, AppState, ServeConfig},
    seed,
};
use migration::{Migrator, MigratorTrait};
use platform_db::{DatabaseSettings, DbPool, connect};
use platform_obs::{ObsConfig, init_tracing};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "collections-server", version, about = "Loan collections backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the REST API server.
    Serve(ServeCommand),
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Load demo staff, customers and loans.
    Seed,
    /// Create a super manager account.
    #[command(name = "create-superuser")]
    CreateSuperuser(SuperuserCommand),
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Rollback the most recent migration.
    Down,
    /// Roll back every migration, then apply them all again.
    Reset,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, default_value_t = 8000)]
    port: u16,
    #[arg(long, help = "Allow starting even when migrations are pending")]
    allow_dirty: bool,
}

impl From<&ServeCommand> for ServeConfig {
    fn from(value: &ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[derive(Args, Debug)]
struct SuperuserCommand {
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
    #[arg(long, env = "SUPERUSER_PASSWORD", hide_env_values = true)]
    password: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(ObsConfig::from_env())?;
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(cmd) => run_server(cmd).await,
        Command::Migrate(action) => {
            let pool = setup_pool().await?;
            match action {
                MigrateCommand::Up => {
                    Migrator::up(&pool, None).await?;
                    info!("database migrations applied");
                }
                MigrateCommand::Down => {
                    Migrator::down(&pool, Some(1)).await?;
                    info!("most recent migration rolled back");
                }
                MigrateCommand::Reset => {
                    Migrator::reset(&pool).await?;
                    Migrator::up(&pool, None).await?;
                    info!("database reset and migrated");
                }
            }
            Ok(())
        }
        Command::Seed => {
            let pool = setup_pool().await?;
            ensure_migrations(&pool, false).await?;
            seed::run(&pool).await?;
            Ok(())
        }
        Command::CreateSuperuser(cmd) => {
            let pool = setup_pool().await?;
            ensure_migrations(&pool, false).await?;
            seed::create_superuser(&pool, &cmd.username, &cmd.email, &cmd.password).await?;
            Ok(())
        }
    }
}

async fn setup_pool() -> Result<DbPool> {
    let settings = DatabaseSettings::from_env()?;
    Ok(connect(&settings).await?)
}

async fn run_server(cmd: ServeCommand) -> Result<()> {
    let config = AppConfig::load()?;
    let pool = setup_pool().await?;
    ensure_migrations(&pool, cmd.allow_dirty).await?;
    let state = AppState::new(pool, config);
    http::serve((&cmd).into(), state).await
}

async fn ensure_migrations(pool: &DbPool, allow_dirty: bool) -> Result<()> {
    let pending = Migrator::get_pending_migrations(pool).await?;
    if !pending.is_empty() && !allow_dirty {
        bail!(
            "{} pending migrations; run `collections-server migrate up` or pass --allow-dirty",
            pending.len()
        );
    }
    Ok(())
}
