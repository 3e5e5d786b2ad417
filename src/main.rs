use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};

use mailbase::config::{self, Config};
use mailbase::fetch_client::{EmailMessage, FetchClient};
use mailbase::record_writer::{RecordWriter, WriteMode};
use mailbase::table_client::HttpTableStore;

#[derive(Parser)]
#[command(name = "mailbase")]
#[command(about = "Sync emails from a mailbox provider into a table")]
#[command(version = "0.1.0")]
struct Args {
    /// Mode dry-run : fetch and analyze the emails without writing to the table
    #[arg(short, long)]
    dry_run: bool,

    /// Limit of emails to fetch for this run (1-100)
    #[arg(short = 'l', long)]
    limit: Option<usize>,

    /// Override the mailbox provider (gmail, outlook, qq, 163, lark)
    #[arg(short, long)]
    provider: Option<String>,

    /// List the providers supported by the fetcher service
    #[arg(long)]
    list_providers: bool,

    /// Vérifier la configuration sans se connecter
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger le fichier .env s'il existe
    dotenv::dotenv().ok();

    // Parser les arguments CLI
    let args = Args::parse();

    // Initialiser le logging
    env_logger::init();

    if args.dry_run {
        info!("🧪 Starting mailbase in DRY-RUN mode");
    } else {
        info!("🚀 Starting mailbase email sync");
    }

    // Charger la configuration
    let mut config = Config::new()?;

    // Si demandé, vérifier seulement la configuration
    if args.check_config {
        println!("✅ Configuration valide !");
        println!("📬 Fetcher: {}", config.fetcher.base_url);
        println!(
            "🗄️  Store: {} (table {})",
            config.store.base_url, config.store.table_id
        );
        println!(
            "📧 Mailbox: {} via {}",
            config.sync.username, config.sync.provider
        );
        println!("🔢 Emails per sync: {}", config.sync.count);
        return Ok(());
    }

    if let Some(provider) = args.provider {
        config.sync.provider = provider;
    }
    if let Some(limit) = args.limit {
        config.sync.count = config::clamp_sync_count(limit);
    }

    let fetcher = FetchClient::new(&config.fetcher)?;

    if args.list_providers {
        let providers = fetcher.providers().await?;
        println!("Supported providers ({}):", providers.len());
        for provider in &providers {
            println!("  - {}", provider);
        }
        return Ok(());
    }

    // 1. Check the fetcher service before asking it for anything
    if !fetcher.check_status().await {
        error!(
            "❌ Fetcher service is unreachable at {}",
            config.fetcher.base_url
        );
        anyhow::bail!("fetcher service unavailable");
    }

    // 2. Fetch the emails
    let emails = fetcher
        .fetch_emails(
            &config.sync.username,
            &config.sync.password,
            &config.sync.provider,
            config.sync.count,
        )
        .await?;

    if emails.is_empty() {
        info!("No emails returned by the fetcher, nothing to sync");
        return Ok(());
    }

    if args.dry_run {
        print_dry_run_report(&emails);
        info!("✅ Dry-run completed. {} email(s) analyzed.", emails.len());
        return Ok(());
    }

    // 3. Prepare the table and write the records
    let store = HttpTableStore::new(&config.store)?;
    let writer = RecordWriter::new(store, config.fields.clone());

    let table_name = writer.table_name().await;
    if !writer.has_email_fields().await {
        info!(
            "Table '{}' is missing the email fields, they will be created",
            table_name
        );
    }

    writer.ensure_schema().await?;
    info!("✅ Table '{}' ready", table_name);

    let outcome = writer.write_records(&emails).await?;

    match outcome.mode {
        WriteMode::Bulk => info!("Records written in one bulk call"),
        WriteMode::Fallback => {
            warn!("Bulk write failed, records were written one by one")
        }
    }

    println!(
        "📊 Sync completed: {}/{} record(s) written to '{}'",
        outcome.succeeded, outcome.total_requested, table_name
    );

    if outcome.failed > 0 {
        warn!("⚠️  {} record(s) could not be written:", outcome.failed);
        for failure in &outcome.errors {
            warn!("   - {}", failure.reason);
        }
    }

    Ok(())
}

fn print_dry_run_report(emails: &[EmailMessage]) {
    println!("\n{}", "=".repeat(80));
    println!("🧪 MODE DRY-RUN - EMAIL ANALYSIS");
    println!("{}", "=".repeat(80));

    for (index, email) in emails.iter().enumerate() {
        println!("📧 Email {}/{} (ID: {})", index + 1, emails.len(), email.id);
        println!("{}", "-".repeat(60));
        println!("   Subject: {}", email.subject);
        println!("   Sender:  {}", email.sender);
        println!("   Date:    {}", email.date);
        println!("   Body:    {} character(s)", email.body.chars().count());

        match &email.attachments {
            Some(list) if !list.is_empty() => {
                println!("   📎 {} attachment(s):", list.len());
                for attachment in list {
                    let content_type = if attachment.content_type.is_empty() {
                        "unknown"
                    } else {
                        attachment.content_type.as_str()
                    };
                    println!(
                        "      - {} ({} bytes, type: {}{})",
                        attachment.filename,
                        attachment.size,
                        content_type,
                        if attachment.content.is_some() {
                            ""
                        } else {
                            ", no inline content"
                        }
                    );
                }
            }
            _ => {
                if email.has_attachments.unwrap_or(false) {
                    println!("   📎 Attachments flagged but no detail provided");
                } else {
                    println!("   📎 No attachments");
                }
            }
        }
        println!();
    }

    println!("{}", "=".repeat(80));
    println!(
        "🏁 Analysis completed: {} email(s), no table write performed",
        emails.len()
    );
    println!("{}", "=".repeat(80));
}
