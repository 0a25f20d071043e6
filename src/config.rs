use crate::gateways::GatewayKind;
use serde::Deserialize;

/// Blackcat credentials. The postback URL is sent in every charge payload.
#[derive(Debug, Clone, Deserialize)]
pub struct BlackcatConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub postback_url: Option<String>,
}

/// FreePay authenticates with HTTP Basic (public key as user, secret key as password).
#[derive(Debug, Clone, Deserialize)]
pub struct FreePayConfig {
    pub public_key: Option<String>,
    pub secret_key: Option<String>,
    pub base_url: String,
    pub postback_url: Option<String>,
}

/// SealPay takes its API key inside the JSON body; postbacks are configured
/// on the SealPay dashboard, not per request.
#[derive(Debug, Clone, Deserialize)]
pub struct SealPayConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlobConfig {
    pub token: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UtmifyConfig {
    pub api_token: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Postgres connection string. Without it leads are not recorded and the
    /// admin/funnel/upload endpoints answer 500.
    pub database_url: Option<String>,
    pub port: u16,
    /// Gateway used by `POST /payment` and `GET /payment/status`.
    pub payment_gateway: GatewayKind,
    /// Decimal reais amount charged when the client sends none.
    pub fixed_amount: String,
    pub default_title: String,
    pub admin_token: Option<String>,
    pub http_timeout_secs: u64,
    pub blackcat: BlackcatConfig,
    pub freepay: FreePayConfig,
    pub sealpay: SealPayConfig,
    pub blob: BlobConfig,
    pub utmify: UtmifyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            port: 3000,
            payment_gateway: GatewayKind::Blackcat,
            fixed_amount: "64.73".to_string(),
            default_title: "Taxa de Adesão".to_string(),
            admin_token: None,
            http_timeout_secs: 30,
            blackcat: BlackcatConfig {
                api_key: None,
                base_url: "https://api.blackcatpagamentos.online/api".to_string(),
                postback_url: None,
            },
            freepay: FreePayConfig {
                public_key: None,
                secret_key: None,
                base_url: "https://api.freepaybrasil.com".to_string(),
                postback_url: None,
            },
            sealpay: SealPayConfig {
                api_key: None,
                base_url: "https://api.sealpay.com.br".to_string(),
            },
            blob: BlobConfig {
                token: None,
                base_url: "https://blob.vercel-storage.com".to_string(),
            },
            utmify: UtmifyConfig {
                api_token: None,
                base_url: "https://api.utmify.com.br/api-credentials/orders".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let config = Self {
            database_url: first_var(&[
                "DATABASE_URL",
                "POSTGRES_URL",
                "POSTGRES_URL_NON_POOLING",
                "DATABASE_URL_UNPOOLED",
            ])
            .map(|url| {
                if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                    anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                }
                Ok(url)
            })
            .transpose()?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| defaults.port.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            payment_gateway: optional_var("PAYMENT_GATEWAY")
                .map(|name| name.parse())
                .transpose()?
                .unwrap_or(defaults.payment_gateway),
            fixed_amount: optional_var("FIXED_AMOUNT").unwrap_or(defaults.fixed_amount),
            default_title: optional_var("DEFAULT_TITLE").unwrap_or(defaults.default_title),
            admin_token: optional_var("ADMIN_TOKEN"),
            http_timeout_secs: optional_var("HTTP_TIMEOUT_SECS")
                .map(|secs| {
                    secs.parse::<u64>().map_err(|_| {
                        anyhow::anyhow!("HTTP_TIMEOUT_SECS must be a positive number of seconds")
                    })
                })
                .transpose()?
                .unwrap_or(defaults.http_timeout_secs),
            blackcat: BlackcatConfig {
                api_key: optional_var("BLACKCAT_API_KEY"),
                base_url: url_var("BLACKCAT_BASE_URL", defaults.blackcat.base_url)?,
                postback_url: optional_var("BLACKCAT_POSTBACK_URL"),
            },
            freepay: FreePayConfig {
                public_key: optional_var("FREEPAY_PUBLIC_KEY"),
                secret_key: optional_var("FREEPAY_SECRET_KEY"),
                base_url: url_var("FREEPAY_BASE_URL", defaults.freepay.base_url)?,
                postback_url: optional_var("FREEPAY_POSTBACK_URL"),
            },
            sealpay: SealPayConfig {
                api_key: optional_var("SEALPAY_API_KEY"),
                base_url: url_var("SEALPAY_BASE_URL", defaults.sealpay.base_url)?,
            },
            blob: BlobConfig {
                token: optional_var("BLOB_READ_WRITE_TOKEN"),
                base_url: url_var("BLOB_BASE_URL", defaults.blob.base_url)?,
            },
            utmify: UtmifyConfig {
                api_token: optional_var("UTMIFY_API_TOKEN"),
                base_url: url_var("UTMIFY_BASE_URL", defaults.utmify.base_url)?,
            },
        };

        // Log what is configured, never the secrets themselves
        tracing::info!("Configuration loaded successfully");
        match config.database_url {
            Some(ref url) => tracing::debug!("Database URL: {}...", &url[..20.min(url.len())]),
            None => tracing::warn!("No database configured; leads will not be persisted"),
        }
        tracing::info!("Active payment gateway: {}", config.payment_gateway);
        if config.admin_token.is_none() {
            tracing::warn!("ADMIN_TOKEN not set; admin endpoints are open");
        }
        if config.blob.token.is_none() {
            tracing::warn!("BLOB_READ_WRITE_TOKEN not set; receipt uploads are disabled");
        }
        if config.utmify.api_token.is_none() {
            tracing::info!("UTMIFY_API_TOKEN not set; conversion reports are disabled");
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

/// Reads a variable, treating blank values as unset.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn first_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| optional_var(name))
}

fn url_var(name: &str, default: String) -> anyhow::Result<String> {
    let url = optional_var(name).unwrap_or(default);
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(url)
}
