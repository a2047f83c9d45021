use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dirauth::config::Configuration;
use dirauth::error::Result;
use dirauth::ldap::{
    Ldap3Driver, LdapManager, escape_values, unescape_values,
};
use dirauth::telemetry::setup_logging;
use dirauth::user::{DefaultUserRepository, User};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path of the configuration file.
    #[arg(long, short, env = "DIRAUTH_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Authenticate a user against the configured domains.
    Bind {
        username: String,
        #[arg(long, short, env = "DIRAUTH_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Find a user and print it.
    Lookup { username: String },
    /// Escape values for use in a search filter.
    Escape { values: Vec<String> },
    /// Reverse `escape`.
    Unescape { values: Vec<String> },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Escaping needs no directory.
    match &args.cmd {
        Commands::Escape { values } => {
            escape_values(values).iter().for_each(|v| println!("{v}"));
            return ExitCode::SUCCESS;
        },
        Commands::Unescape { values } => {
            return match unescape_values(values) {
                Ok(values) => {
                    values.iter().for_each(|v| println!("{v}"));
                    ExitCode::SUCCESS
                },
                Err(err) => {
                    eprintln!("{err}");
                    ExitCode::FAILURE
                },
            };
        },
        _ => {},
    }

    let config = match Configuration::default().path(args.config).read() {
        Ok(config) => config,
        Err(err) => {
            setup_logging("info");
            tracing::error!(error = %err, "cannot load configuration");
            return ExitCode::FAILURE;
        },
    };
    setup_logging(&config.log_level);

    match run(config, args.cmd).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "LDAP operation failed");
            ExitCode::FAILURE
        },
    }
}

async fn run(config: Configuration, cmd: Commands) -> Result<ExitCode> {
    let mut manager =
        LdapManager::new(Ldap3Driver::new(), DefaultUserRepository, config.domains)?;

    match cmd {
        Commands::Bind { username, password } => {
            // Bind with the entry DN when the user is known somewhere.
            let user = match manager.find_user_by_username(&username).await? {
                Some(user) => user,
                None => User::new(username),
            };

            if manager.bind(&user, &password).await? {
                let domain = manager
                    .session()
                    .map(|session| session.domain_id().to_owned())
                    .unwrap_or_default();
                println!("authenticated on domain {domain}");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("invalid credentials");
                Ok(ExitCode::FAILURE)
            }
        },
        Commands::Lookup { username } => {
            match manager.find_user_by_username(&username).await? {
                Some(user) => {
                    print!("{}", serde_yaml::to_string(&user)?);
                    Ok(ExitCode::SUCCESS)
                },
                None => {
                    println!("user {username} not found");
                    Ok(ExitCode::FAILURE)
                },
            }
        },
        Commands::Escape { .. } | Commands::Unescape { .. } => {
            Ok(ExitCode::SUCCESS)
        },
    }
}
