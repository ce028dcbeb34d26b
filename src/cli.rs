//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::auth::{ClientIpHeader, CookiePolicy, SameSite};
use crate::db::{Database, UserUpdate};
use crate::jwt::{
    DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_REFRESH_TOKEN_TTL_SECS, JwtConfig, TokenLifetimes,
};
use crate::password;
use crate::rate_limit::{DEFAULT_LOGIN_PER_MINUTE, DEFAULT_SIGNUP_PER_MINUTE, RateLimits};
use clap::Parser;
use tracing::{error, info, warn};

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ADMIN_PASSWORD_LENGTH: usize = 6;

pub const ACCESS_SECRET_ENV: &str = "ACCESS_TOKEN_SECRET";
pub const REFRESH_SECRET_ENV: &str = "REFRESH_TOKEN_SECRET";
pub const ADMIN_PASSWORD_ENV: &str = "ADMIN_PASSWORD";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "Invoicer",
    about = "Customers, products, orders and numbered invoices behind JWT authentication"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "4000")]
    pub port: u16,

    /// Path to SQLite database file (":memory:" for a throwaway database)
    #[arg(short, long, env = "DATABASE_PATH", default_value = "invoicer.db")]
    pub database: String,

    /// Path to file containing the access token secret. Prefer the ACCESS_TOKEN_SECRET env var
    #[arg(long)]
    pub access_token_secret_file: Option<String>,

    /// Path to file containing the refresh token secret. Prefer the REFRESH_TOKEN_SECRET env var
    #[arg(long)]
    pub refresh_token_secret_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, env = "ACCESS_TOKEN_TTL", default_value_t = DEFAULT_ACCESS_TOKEN_TTL_SECS,
        value_parser = clap::value_parser!(u64).range(1..))]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds (also the refresh cookie Max-Age)
    #[arg(long, env = "REFRESH_TOKEN_TTL", default_value_t = DEFAULT_REFRESH_TOKEN_TTL_SECS,
        value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_token_ttl: u64,

    /// Omit the Secure cookie attribute (plain-HTTP local development only)
    #[arg(long)]
    pub insecure_cookies: bool,

    /// SameSite attribute of the refresh cookie
    #[arg(long, value_enum, default_value = "none")]
    pub same_site: SameSite,

    /// Login attempts allowed per minute per client IP
    #[arg(long, default_value_t = DEFAULT_LOGIN_PER_MINUTE,
        value_parser = clap::value_parser!(u32).range(1..))]
    pub login_rate: u32,

    /// Registrations allowed per minute per client IP
    #[arg(long, default_value_t = DEFAULT_SIGNUP_PER_MINUTE,
        value_parser = clap::value_parser!(u32).range(1..))]
    pub signup_rate: u32,

    /// Read the client IP from this proxy header instead of the socket address
    #[arg(long, value_enum)]
    pub ip_header: Option<ClientIpHeader>,

    /// Create (or promote) an admin user with this name on startup.
    /// The password is read from the ADMIN_PASSWORD env var
    #[arg(long, value_name = "USERNAME")]
    pub create_admin: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Read an env var once and remove it so child processes and later code
/// cannot see it.
fn take_env(name: &str) -> Option<String> {
    let value = std::env::var(name).ok()?;
    // SAFETY: Called during single-threaded startup before the runtime spawns
    // workers that could read the environment.
    unsafe { std::env::remove_var(name) };
    Some(value)
}

/// Load a signing secret from its environment variable or a file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(env_var: &str, secret_file: Option<&str>) -> Option<String> {
    let secret = if let Some(secret) = take_env(env_var) {
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            "{} is required. Set the environment variable or pass the matching --*-secret-file flag",
            env_var
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "{} is shorter than {} characters. Use a longer secret",
            env_var, MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Load both signing secrets. They must be present, long enough, and differ.
pub fn load_secrets(args: &Args) -> Option<(String, String)> {
    let access = load_secret(ACCESS_SECRET_ENV, args.access_token_secret_file.as_deref());
    let refresh = load_secret(REFRESH_SECRET_ENV, args.refresh_token_secret_file.as_deref());
    let (access, refresh) = (access?, refresh?);

    if access == refresh {
        error!(
            "{} and {} must be different secrets",
            ACCESS_SECRET_ENV, REFRESH_SECRET_ENV
        );
        return None;
    }

    Some((access, refresh))
}

/// Handle the --create-admin flag: create the admin, or promote and reset
/// the password of an existing user with that name.
pub async fn handle_create_admin(db: &Database, username: &str) -> Option<()> {
    let Some(admin_password) = take_env(ADMIN_PASSWORD_ENV) else {
        error!("--create-admin requires the {} env var", ADMIN_PASSWORD_ENV);
        return None;
    };
    if username.chars().count() < 3 {
        error!("Admin username must be at least 3 characters long");
        return None;
    }
    if admin_password.chars().count() < MIN_ADMIN_PASSWORD_LENGTH {
        error!(
            "Admin password must be at least {} characters long",
            MIN_ADMIN_PASSWORD_LENGTH
        );
        return None;
    }

    let hash = match password::hash(&admin_password).await {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = %e, "Failed to hash admin password");
            return None;
        }
    };

    let existing = match db.users().get_by_username(username).await {
        Ok(existing) => existing,
        Err(e) => {
            error!(error = %e, "Failed to check for existing admin");
            return None;
        }
    };

    let result = match existing {
        Some(user) => {
            warn!(username = %username, "User already exists, promoting to admin and resetting password");
            let update = UserUpdate {
                password_hash: Some(&hash),
                is_admin: Some(true),
                ..Default::default()
            };
            db.users().update(user.id, &update).await.map(|_| user.id)
        }
        None => db.users().create(username, &hash, true).await,
    };

    match result {
        Ok(id) => {
            info!(username = %username, id, "Admin user ready");
            Some(())
        }
        Err(e) => {
            error!(error = %e, "Failed to create admin user");
            None
        }
    }
}

/// Build ServerConfig from validated arguments.
/// Returns None and logs an error if the token configuration is rejected.
pub fn build_config(
    args: &Args,
    db: Database,
    access_secret: String,
    refresh_secret: String,
) -> Option<ServerConfig> {
    let lifetimes = TokenLifetimes {
        access_secs: args.access_token_ttl,
        refresh_secs: args.refresh_token_ttl,
    };
    let jwt = match JwtConfig::new(
        access_secret.as_bytes(),
        refresh_secret.as_bytes(),
        lifetimes,
    ) {
        Ok(jwt) => jwt,
        Err(e) => {
            error!(error = %e, "Invalid token configuration");
            return None;
        }
    };

    if args.insecure_cookies {
        warn!("Refresh cookie will be sent without the Secure attribute");
    }
    if args.insecure_cookies && args.same_site == SameSite::None {
        warn!("Browsers reject SameSite=None cookies without Secure; use --same-site strict");
    }

    Some(ServerConfig {
        db,
        jwt,
        cookies: CookiePolicy {
            secure: !args.insecure_cookies,
            same_site: args.same_site,
        },
        rate_limits: RateLimits {
            login_per_minute: args.login_rate,
            signup_per_minute: args.signup_rate,
        },
        ip_header: args.ip_header,
    })
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["invoicer"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.access_token_ttl, 600);
        assert_eq!(args.refresh_token_ttl, 86400);
        assert_eq!(args.same_site, SameSite::None);
        assert!(!args.insecure_cookies);
        assert_eq!(args.login_rate, 10);
        assert!(args.create_admin.is_none());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        assert!(Args::try_parse_from(["invoicer", "--access-token-ttl", "0"]).is_err());
    }

    #[test]
    fn test_cookie_flags() {
        let args = parse(&["--insecure-cookies", "--same-site", "strict"]);
        assert!(args.insecure_cookies);
        assert_eq!(args.same_site, SameSite::Strict);
    }

    #[test]
    fn test_secret_file_and_length() {
        let dir = std::env::temp_dir();
        let good = dir.join(format!("invoicer-secret-good-{}", std::process::id()));
        let short = dir.join(format!("invoicer-secret-short-{}", std::process::id()));
        std::fs::write(&good, "0123456789abcdef0123456789abcdef\n").unwrap();
        std::fs::write(&short, "too-short").unwrap();

        let env_var = "INVOICER_TEST_UNSET_SECRET";
        assert_eq!(
            load_secret(env_var, good.to_str()).as_deref(),
            Some("0123456789abcdef0123456789abcdef")
        );
        assert_eq!(load_secret(env_var, short.to_str()), None);
        assert_eq!(load_secret(env_var, None), None);

        std::fs::remove_file(good).ok();
        std::fs::remove_file(short).ok();
    }

    #[tokio::test]
    async fn test_build_config_maps_flags() {
        let db = Database::open(":memory:").await.unwrap();
        let args = parse(&["--insecure-cookies", "--refresh-token-ttl", "120"]);

        let config = build_config(
            &args,
            db,
            "a".repeat(MIN_JWT_SECRET_LENGTH),
            "b".repeat(MIN_JWT_SECRET_LENGTH),
        )
        .unwrap();

        assert!(!config.cookies.secure);
        assert_eq!(config.jwt.lifetimes().refresh_secs, 120);
        assert_eq!(config.rate_limits.login_per_minute, 10);
    }
}
