//! End-to-end flow: a scripted mailbox feeds the poll worker, the full
//! pipeline runs over real stages with stubbed model capabilities, and the
//! HTTP API serves what landed in the (in-memory) store.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};

use supportdesk::api::{ApiState, CapabilityFlags, router};
use supportdesk::capability::{PolarityPrediction, SentimentModel};
use supportdesk::catalog::ProductCatalog;
use supportdesk::error::{CapabilityError, ChannelError};
use supportdesk::kb::KnowledgeBase;
use supportdesk::ledger::IdLedger;
use supportdesk::mail::{MailSender, MailSource};
use supportdesk::pipeline::classify::Classifier;
use supportdesk::pipeline::extract::Extractor;
use supportdesk::pipeline::processor::TicketProcessor;
use supportdesk::pipeline::sentiment::SentimentScorer;
use supportdesk::pipeline::summarize::Summarizer;
use supportdesk::pipeline::types::{RawMessage, ReplyMethod, SentimentLabel};
use supportdesk::reply::ReplyGenerator;
use supportdesk::store::{LibSqlStore, TicketStore};
use supportdesk::worker::PollWorker;

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

// ── Mocks ───────────────────────────────────────────────────────────

/// Sentiment capability that reads everything as negative.
struct GloomySentiment;

#[async_trait]
impl SentimentModel for GloomySentiment {
    async fn polarity(&self, _text: &str) -> Result<PolarityPrediction, CapabilityError> {
        Ok(PolarityPrediction {
            ordinal: 0,
            confidence: 0.93,
        })
    }
}

struct FixedMailbox {
    messages: Vec<RawMessage>,
    seen: Mutex<Vec<String>>,
}

impl FixedMailbox {
    fn new(messages: Vec<RawMessage>) -> Self {
        Self {
            messages,
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MailSource for FixedMailbox {
    async fn fetch_unseen(&self, limit: usize) -> Result<Vec<RawMessage>, ChannelError> {
        Ok(self.messages.iter().take(limit).cloned().collect())
    }

    async fn mark_seen(&self, id: &str) -> Result<(), ChannelError> {
        self.seen.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

struct Outbox {
    sent: Mutex<Vec<(String, String, String)>>,
}

impl Outbox {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MailSender for Outbox {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), ChannelError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn breakdown_message() -> RawMessage {
    RawMessage {
        id: "msg-301".to_string(),
        date: Utc::now(),
        sender_name: "Сидоров Пётр Алексеевич".to_string(),
        sender_email: "sidorov@severgaz.ru".to_string(),
        subject: "Неисправность датчика".to_string(),
        body: "Здравствуйте!\n\
               На объекте ООО «Северный газ» сломался датчик ДГС ЭРИС-230: уходит в ошибку.\n\
               Заводской номер: 7C4D91.\n\
               Телефон для связи 8 (342) 123-45-67, почта inzhener@severgaz.ru.\n\
               Прошу организовать ремонт."
            .to_string(),
    }
}

fn docs_message() -> RawMessage {
    RawMessage {
        id: "msg-302".to_string(),
        date: Utc::now(),
        sender_name: "Кузнецова Анна Павловна".to_string(),
        sender_email: "a.kuznetsova@zavod.ru".to_string(),
        subject: "Документация".to_string(),
        body: "Добрый день! Пришлите, пожалуйста, руководство по эксплуатации \
               и сертификат соответствия на ДГС ЭРИС-210."
            .to_string(),
    }
}

fn build_worker(
    messages: Vec<RawMessage>,
    ledger: IdLedger,
    store: Arc<LibSqlStore>,
) -> (Arc<FixedMailbox>, Arc<Outbox>, PollWorker) {
    let mailbox = Arc::new(FixedMailbox::new(messages));
    let outbox = Arc::new(Outbox::new());
    let processor = TicketProcessor::new(
        Extractor::new(ProductCatalog::new()),
        Summarizer::new(),
        Classifier::new(None),
        SentimentScorer::new(Arc::new(GloomySentiment), 512),
        ReplyGenerator::new(None, Arc::new(KnowledgeBase::default())),
        ledger,
    );
    let worker = PollWorker::new(mailbox.clone(), outbox.clone(), store, processor, 10);
    (mailbox, outbox, worker)
}

async fn start_api(store: Arc<dyn TicketStore>) -> u16 {
    let app = router(ApiState {
        store,
        capabilities: CapabilityFlags {
            sentiment: true,
            classifier_model: false,
            generator_model: false,
        },
    });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    sleep(Duration::from_millis(50)).await;
    port
}

async fn get_json(port: u16, path: &str) -> serde_json::Value {
    reqwest::get(format!("http://127.0.0.1:{port}{path}"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

// ── Flow ────────────────────────────────────────────────────────────

#[tokio::test]
async fn breakdown_email_flows_to_store_reply_and_api() {
    timeout(TEST_TIMEOUT, async {
        let dir = tempfile::tempdir().unwrap();
        let ledger = IdLedger::load(dir.path().join("processed.json")).unwrap();
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let (mailbox, outbox, mut worker) =
            build_worker(vec![breakdown_message()], ledger, store.clone());

        worker.run_cycle(&AtomicBool::new(false)).await.unwrap();

        assert_eq!(
            mailbox.seen.lock().unwrap().clone(),
            vec!["msg-301".to_string()]
        );

        // Extracted contacts win over the header address.
        let sent = outbox.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "inzhener@severgaz.ru");
        assert_eq!(sent[0].1, "RE: msg-301 | неисправность");
        assert!(sent[0].2.contains("Уважаемый(ая) Сидоров!"));
        assert!(sent[0].2.contains("8-800-55-00-715"));

        let record = store.get("msg-301").await.unwrap().unwrap();
        assert_eq!(record.fio.as_deref(), Some("Сидоров Пётр Алексеевич"));
        assert_eq!(record.organization.as_deref(), Some("Северный газ"));
        assert_eq!(record.phone.as_deref(), Some("8 (342) 123-45-67"));
        assert_eq!(record.email.as_deref(), Some("inzhener@severgaz.ru"));
        assert_eq!(record.device_type.as_deref(), Some("ДГС ЭРИС-230"));
        assert_eq!(record.serial_numbers, vec!["7C4D91".to_string()]);
        assert_eq!(record.sentiment.label, SentimentLabel::Negative);
        assert_eq!(record.classification.category, "неисправность");
        assert!(!record.description.is_empty());
        assert!(!record.answered);

        let port = start_api(store.clone()).await;

        let health = get_json(port, "/health").await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["capabilities"]["sentiment"], true);

        let tickets = get_json(port, "/tickets").await;
        let items = tickets.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["message_id"], "msg-301");
        assert_eq!(items[0]["sentiment"]["label"], "negative");
        assert_eq!(items[0]["classification"]["category"], "неисправность");

        let matching = get_json(port, "/tickets?sentiment=negative").await;
        assert_eq!(matching.as_array().unwrap().len(), 1);
        let empty = get_json(port, "/tickets?sentiment=positive").await;
        assert!(empty.as_array().unwrap().is_empty());

        let reply = get_json(port, "/tickets/msg-301/reply").await;
        assert_eq!(reply["subject"], "RE: msg-301 | неисправность");
        assert_eq!(reply["method"], "fallback");

        let stats = get_json(port, "/stats").await;
        assert_eq!(stats["total"], 1);
        assert_eq!(stats["by_sentiment"]["negative"], 1);
        assert_eq!(stats["by_category"]["неисправность"], 1);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn restart_with_same_ledger_does_not_reprocess() {
    timeout(TEST_TIMEOUT, async {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("processed.json");
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());

        let (_, outbox, mut worker) = build_worker(
            vec![breakdown_message()],
            IdLedger::load(&ledger_path).unwrap(),
            store.clone(),
        );
        worker.run_cycle(&AtomicBool::new(false)).await.unwrap();
        assert_eq!(outbox.sent.lock().unwrap().len(), 1);
        drop(worker);

        // Fresh worker over the same ledger file sees the id as processed.
        let (mailbox, outbox, mut worker) = build_worker(
            vec![breakdown_message()],
            IdLedger::load(&ledger_path).unwrap(),
            store.clone(),
        );
        worker.run_cycle(&AtomicBool::new(false)).await.unwrap();

        assert_eq!(
            mailbox.seen.lock().unwrap().clone(),
            vec!["msg-301".to_string()]
        );
        assert!(outbox.sent.lock().unwrap().is_empty());
        assert_eq!(store.stats().await.unwrap().total, 1);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn documentation_request_is_answered_from_the_file_library() {
    timeout(TEST_TIMEOUT, async {
        let dir = tempfile::tempdir().unwrap();
        let ledger = IdLedger::load(dir.path().join("processed.json")).unwrap();
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let (_, outbox, mut worker) = build_worker(vec![docs_message()], ledger, store.clone());

        worker.run_cycle(&AtomicBool::new(false)).await.unwrap();

        let record = store.get("msg-302").await.unwrap().unwrap();
        assert_eq!(record.classification.category, "документация");
        assert_eq!(record.reply.method, ReplyMethod::FallbackDocs);

        // No address in the body, so the reply goes to the header sender.
        let sent = outbox.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "a.kuznetsova@zavod.ru");
        assert!(sent[0].2.contains("files-library"));
        assert!(sent[0].2.contains("Уважаемый(ая) Кузнецова!"));
    })
    .await
    .expect("test timed out");
}
