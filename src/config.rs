use anyhow::Result;
use serde::Deserialize;

/// Default number of emails fetched per sync.
pub const DEFAULT_SYNC_COUNT: usize = 10;
/// Bounds accepted by the fetcher service.
pub const MIN_SYNC_COUNT: usize = 1;
pub const MAX_SYNC_COUNT: usize = 100;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub fetcher: FetcherConfig,
    pub store: StoreConfig,
    pub sync: SyncSettings,
    pub fields: FieldNames,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetcherConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub base_url: String,
    pub api_token: String,
    pub table_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncSettings {
    pub username: String,
    pub password: String,
    pub provider: String,
    pub count: usize,
}

/// Display names of the table fields the pipeline writes.
#[derive(Debug, Deserialize, Clone)]
pub struct FieldNames {
    pub subject: String,
    pub sender: String,
    pub date: String,
    pub content: String,
    pub attachments: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        FieldNames {
            subject: "Subject".to_string(),
            sender: "Sender".to_string(),
            date: "Date".to_string(),
            content: "Content".to_string(),
            attachments: "Attachments".to_string(),
        }
    }
}

/// Clamp a requested email count to the bounds the fetcher accepts.
pub fn clamp_sync_count(count: usize) -> usize {
    count.clamp(MIN_SYNC_COUNT, MAX_SYNC_COUNT)
}

impl Config {
    pub fn new() -> Result<Self> {
        // Vérifier que les variables essentielles sont définies
        Self::check_required_env_vars()?;

        // Configuration chargée depuis les variables d'environnement
        Ok(Config {
            fetcher: FetcherConfig {
                base_url: std::env::var("FETCHER_BASE_URL")
                    .expect("FETCHER_BASE_URL doit être défini"),
            },
            store: StoreConfig {
                base_url: std::env::var("STORE_BASE_URL")
                    .expect("STORE_BASE_URL doit être défini"),
                api_token: std::env::var("STORE_API_TOKEN")
                    .expect("STORE_API_TOKEN doit être défini"),
                table_id: std::env::var("STORE_TABLE_ID")
                    .unwrap_or_else(|_| "default".to_string()),
            },
            sync: SyncSettings {
                username: std::env::var("EMAIL_USERNAME")
                    .expect("EMAIL_USERNAME doit être défini"),
                password: std::env::var("EMAIL_PASSWORD")
                    .expect("EMAIL_PASSWORD doit être défini"),
                provider: std::env::var("EMAIL_PROVIDER")
                    .unwrap_or_else(|_| "gmail".to_string()),
                count: clamp_sync_count(
                    std::env::var("EMAIL_COUNT")
                        .unwrap_or_else(|_| DEFAULT_SYNC_COUNT.to_string())
                        .parse()
                        .unwrap_or(DEFAULT_SYNC_COUNT),
                ),
            },
            fields: FieldNames::default(),
        })
    }

    fn check_required_env_vars() -> Result<()> {
        let required_vars = [
            "FETCHER_BASE_URL",
            "STORE_BASE_URL",
            "STORE_API_TOKEN",
            "EMAIL_USERNAME",
            "EMAIL_PASSWORD",
        ];

        let mut missing_vars = Vec::new();

        for var in &required_vars {
            if std::env::var(var).is_err() {
                missing_vars.push(*var);
            }
        }

        if !missing_vars.is_empty() {
            anyhow::bail!(
                "Variables d'environnement manquantes: {}\n\
                 \n\
                 💡 Solutions :\n\
                 1. Créer un fichier .env avec vos credentials :\n\
                    cp .env.example .env\n\
                    # Puis éditer .env avec vos valeurs\n\
                 \n\
                 2. Ou définir les variables manuellement :\n\
                    export FETCHER_BASE_URL=https://sync.example.com\n\
                    export STORE_BASE_URL=https://base.example.com\n\
                    export STORE_API_TOKEN=xxxx\n\
                    export EMAIL_USERNAME=me@example.com\n\
                    export EMAIL_PASSWORD=app-password\n\
                    cargo run -- --dry-run",
                missing_vars.join(", ")
            );
        }

        Ok(())
    }
}
