use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use supportdesk::api::{ApiState, CapabilityFlags, router};
use supportdesk::capability;
use supportdesk::catalog::ProductCatalog;
use supportdesk::config::Settings;
use supportdesk::kb::KnowledgeBase;
use supportdesk::ledger::IdLedger;
use supportdesk::mail::{ImapSource, SmtpSender};
use supportdesk::notify::{TicketNotifier, spawn_notifier};
use supportdesk::pipeline::classify::Classifier;
use supportdesk::pipeline::extract::Extractor;
use supportdesk::pipeline::processor::TicketProcessor;
use supportdesk::pipeline::sentiment::SentimentScorer;
use supportdesk::pipeline::summarize::Summarizer;
use supportdesk::reply::ReplyGenerator;
use supportdesk::store::{LibSqlStore, TicketStore};
use supportdesk::worker::{PollWorker, spawn_worker};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let settings = Settings::from_env();

    // Console sink plus a daily-rolling file; the guard must outlive main.
    let file_appender = tracing_appender::rolling::daily(&settings.log_dir, "supportdesk.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    eprintln!("📬 SupportDesk v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://{}:{}", settings.api_host, settings.api_port);
    eprintln!("   Database: {}", settings.db_path);
    eprintln!("   Ledger: {}", settings.processed_ids_path.display());
    match &settings.llm {
        Some(llm) => eprintln!("   LLM: {:?} ({})", llm.backend, llm.model),
        None => eprintln!("   LLM: disabled (keyword and template fallbacks only)"),
    }
    match &settings.mail {
        Some(mail) => eprintln!(
            "   Mail: enabled (IMAP: {}, SMTP: {}, every {}s)",
            mail.imap_host, mail.smtp_host, mail.poll_interval_secs
        ),
        None => eprintln!("   Mail: disabled (set EMAIL_IMAP_HOST to enable)"),
    }
    match &settings.telegram {
        Some(tg) => eprintln!("   Telegram: enabled (chat {})", tg.chat_id),
        None => eprintln!("   Telegram: disabled"),
    }
    eprintln!();

    // ── Store and knowledge base ─────────────────────────────────────

    let store: Arc<dyn TicketStore> = Arc::new(
        LibSqlStore::new_local(Path::new(&settings.db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: failed to open database at {}: {e}", settings.db_path);
                std::process::exit(1);
            }),
    );

    let kb = Arc::new(
        KnowledgeBase::load_or_default(settings.kb_path.as_deref()).unwrap_or_else(|e| {
            eprintln!("Error: failed to load knowledge base: {e}");
            std::process::exit(1);
        }),
    );

    // ── Capabilities ─────────────────────────────────────────────────

    // Sentiment is mandatory for mail processing; the optional capabilities
    // degrade to keyword and template fallbacks.
    let sentiment_model = match capability::create_sentiment(settings.llm.as_ref()) {
        Ok(model) => Some(model),
        Err(e) if settings.mail.is_some() => {
            eprintln!("Error: sentiment capability is required for mail processing: {e}");
            std::process::exit(1);
        }
        Err(e) => {
            warn!(error = %e, "Sentiment capability unavailable; mail worker is off");
            None
        }
    };

    let zero_shot = settings
        .llm
        .as_ref()
        .and_then(|cfg| match capability::create_zero_shot(cfg) {
            Ok(model) => Some(model),
            Err(e) => {
                warn!(error = %e, "Zero-shot capability unavailable, keyword classifier only");
                None
            }
        });

    let generative = settings
        .llm
        .as_ref()
        .and_then(|cfg| match capability::create_generative(cfg) {
            Ok(model) => Some(model),
            Err(e) => {
                warn!(error = %e, "Generative capability unavailable, template replies only");
                None
            }
        });

    let capabilities = CapabilityFlags {
        sentiment: sentiment_model.is_some(),
        classifier_model: zero_shot.is_some(),
        generator_model: generative.is_some(),
    };

    // ── Background workers ───────────────────────────────────────────

    let mut handles: Vec<JoinHandle<()>> = Vec::new();
    let mut stop_flags: Vec<Arc<AtomicBool>> = Vec::new();

    if let Some(mail) = settings.mail.clone()
        && let Some(sentiment) = sentiment_model
    {
        let ledger = IdLedger::load(&settings.processed_ids_path)?;
        let processor = TicketProcessor::new(
            Extractor::new(ProductCatalog::new()),
            Summarizer::new(),
            Classifier::new(zero_shot),
            SentimentScorer::new(sentiment, settings.max_input_chars),
            ReplyGenerator::new(generative, kb),
            ledger,
        );

        let poll_interval_secs = mail.poll_interval_secs;
        let batch_limit = mail.batch_limit;
        let source = Arc::new(ImapSource::new(mail.clone()));
        let sender = Arc::new(SmtpSender::new(mail));
        let worker = PollWorker::new(source, sender, store.clone(), processor, batch_limit);

        let (handle, stop) = spawn_worker(worker, poll_interval_secs);
        handles.push(handle);
        stop_flags.push(stop);
    }

    if let Some(tg) = settings.telegram.clone() {
        let sent_ledger = IdLedger::load(&tg.sent_ids_path)?;
        let notifier = TicketNotifier::new(tg, sent_ledger);

        let (handle, stop) = spawn_notifier(notifier, store.clone());
        handles.push(handle);
        stop_flags.push(stop);
    }

    // ── Query API ────────────────────────────────────────────────────

    let app = router(ApiState {
        store: store.clone(),
        capabilities,
    });
    let bind_addr = format!("{}:{}", settings.api_host, settings.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "Query API listening");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    // ── Shutdown ─────────────────────────────────────────────────────

    tokio::signal::ctrl_c().await?;
    eprintln!();
    info!("Shutdown requested, stopping workers");
    for flag in &stop_flags {
        flag.store(true, Ordering::Relaxed);
    }
    for handle in handles {
        handle.await.ok();
    }
    info!("Shutdown complete");

    Ok(())
}
