use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub google: GoogleConfig,
    pub operator: OperatorConfig,
    pub jobs: JobConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

/// Google OAuth client and API endpoints
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// Installed-app client secrets downloaded from the Cloud console
    pub client_secrets_path: String,
    /// Where the authorized user token is cached between runs
    pub token_path: String,
    /// Loopback port for the interactive authorization redirect
    pub redirect_port: u16,
    pub drive_api_base_url: String,
    pub forms_api_base_url: String,
    pub gmail_api_base_url: String,
}

/// Identity on whose behalf surveys are sent and collected
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Operator email; resolved from the mail profile when unset
    pub email: Option<String>,
    /// From header for outgoing mail; defaults to the operator email
    pub mail_from: Option<String>,
    /// Users that receive surveys. Empty means every known user.
    pub survey_recipients: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct JobConfig {
    pub max_concurrency: usize,
    pub drive_page_size: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            database: DatabaseConfig::from_env()?,
            google: GoogleConfig::from_env()?,
            operator: OperatorConfig::from_env()?,
            jobs: JobConfig::from_env()?,
        })
    }
}

fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(8)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl DatabaseConfig {
    const DEFAULT_MIN_CONNECTIONS: u32 = 1;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600; // 10 minutes
    const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800; // 30 minutes

    /// One connection per worker plus a little headroom for the job driver itself
    fn default_max_connections() -> u32 {
        (available_parallelism() + 2) as u32
    }

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| Self::default_max_connections().to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MAX_CONNECTIONS must be a valid number".to_string())?;

        let min_connections = env::var("DB_MIN_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MIN_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MIN_CONNECTIONS must be a valid number".to_string())?;

        let acquire_timeout_secs = env::var("DB_ACQUIRE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_ACQUIRE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_ACQUIRE_TIMEOUT_SECS must be a valid number".to_string())?;

        let idle_timeout_secs = env::var("DB_IDLE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_IDLE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_IDLE_TIMEOUT_SECS must be a valid number".to_string())?;

        let max_lifetime_secs = env::var("DB_MAX_LIFETIME_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_LIFETIME_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_MAX_LIFETIME_SECS must be a valid number".to_string())?;

        Ok(Self {
            url,
            max_connections,
            min_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
        })
    }
}

impl GoogleConfig {
    const DEFAULT_REDIRECT_PORT: u16 = 8081;

    pub fn from_env() -> Result<Self, String> {
        let client_secrets_path = env::var("GOOGLE_CLIENT_SECRETS_PATH")
            .unwrap_or_else(|_| "credentials.json".to_string());

        let token_path = env::var("GOOGLE_TOKEN_PATH").unwrap_or_else(|_| "token.json".to_string());

        let redirect_port = env::var("GOOGLE_REDIRECT_PORT")
            .unwrap_or_else(|_| Self::DEFAULT_REDIRECT_PORT.to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid GOOGLE_REDIRECT_PORT: {}", e))?;

        let drive_api_base_url = env::var("DRIVE_API_BASE_URL")
            .unwrap_or_else(|_| "https://www.googleapis.com/drive/v3".to_string());

        let forms_api_base_url = env::var("FORMS_API_BASE_URL")
            .unwrap_or_else(|_| "https://forms.googleapis.com/v1".to_string());

        let gmail_api_base_url = env::var("GMAIL_API_BASE_URL")
            .unwrap_or_else(|_| "https://gmail.googleapis.com/gmail/v1".to_string());

        Ok(Self {
            client_secrets_path,
            token_path,
            redirect_port,
            drive_api_base_url: drive_api_base_url.trim_end_matches('/').to_string(),
            forms_api_base_url: forms_api_base_url.trim_end_matches('/').to_string(),
            gmail_api_base_url: gmail_api_base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl OperatorConfig {
    pub fn from_env() -> Result<Self, String> {
        // Only use values if they are non-empty
        let email = env::var("OPERATOR_EMAIL").ok().filter(|s| !s.is_empty());
        let mail_from = env::var("MAIL_FROM").ok().filter(|s| !s.is_empty());
        let survey_recipients = env::var("SURVEY_RECIPIENTS")
            .map(|raw| parse_list(&raw))
            .unwrap_or_default();

        Ok(Self {
            email,
            mail_from,
            survey_recipients,
        })
    }
}

impl JobConfig {
    const DEFAULT_DRIVE_PAGE_SIZE: u32 = 100;

    pub fn from_env() -> Result<Self, String> {
        let max_concurrency = env::var("JOB_MAX_CONCURRENCY")
            .unwrap_or_else(|_| available_parallelism().to_string())
            .parse::<usize>()
            .map_err(|_| "JOB_MAX_CONCURRENCY must be a valid number".to_string())?;

        if max_concurrency == 0 {
            return Err("JOB_MAX_CONCURRENCY must be greater than zero".to_string());
        }

        let drive_page_size = env::var("DRIVE_PAGE_SIZE")
            .unwrap_or_else(|_| Self::DEFAULT_DRIVE_PAGE_SIZE.to_string())
            .parse::<u32>()
            .map_err(|_| "DRIVE_PAGE_SIZE must be a valid number".to_string())?;

        Ok(Self {
            max_concurrency,
            drive_page_size,
        })
    }
}
