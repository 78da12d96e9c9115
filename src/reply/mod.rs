//! Reply generation.
//!
//! Per-ticket state machine: the `документация` category is answered from
//! the knowledge base without any model call; every other category tries a
//! generative draft behind sanitation and validation, and falls back to a
//! deterministic template. Generation never fails — the template path always
//! produces a reply with the support contact block.

mod sanitize;
mod validate;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::capability::GenerativeModel;
use crate::kb::KnowledgeBase;
use crate::pipeline::types::{GeneratedReply, ReplyMethod, TicketDraft};

use sanitize::Sanitizer;
use validate::Validator;

const MIN_DRAFT_CHARS: usize = 50;
const MAX_SUGGESTIONS: usize = 3;

pub struct ReplyGenerator {
    model: Option<Arc<dyn GenerativeModel>>,
    kb: Arc<KnowledgeBase>,
    sanitizer: Sanitizer,
    validator: Validator,
}

impl ReplyGenerator {
    pub fn new(model: Option<Arc<dyn GenerativeModel>>, kb: Arc<KnowledgeBase>) -> Self {
        Self {
            model,
            kb,
            sanitizer: Sanitizer::new(),
            validator: Validator::new(),
        }
    }

    pub async fn generate(&self, draft: &TicketDraft) -> GeneratedReply {
        let category = draft.classification.category.as_str();
        let subject = format!("RE: {} | {}", draft.message_id, category);

        // Documentation requests skip the model entirely.
        if category == "документация" {
            debug!(message_id = %draft.message_id, "documentation request, using docs reply");
            return GeneratedReply {
                subject,
                body: self.docs_reply(draft),
                method: ReplyMethod::FallbackDocs,
            };
        }

        let prompt = self.build_prompt(draft);

        if let Some(model) = &self.model {
            match model.draft(&prompt).await {
                Ok(raw) if raw.chars().count() >= MIN_DRAFT_CHARS => {
                    if let Some(clean) = self.sanitizer.clean(&raw, &prompt) {
                        match self.validator.validate(&clean, category, &self.kb) {
                            Ok(()) => {
                                return GeneratedReply {
                                    subject,
                                    body: self.with_contact_block(clean),
                                    method: ReplyMethod::Llm,
                                };
                            }
                            Err(reason) => {
                                warn!(?reason, "draft rejected, using template reply");
                            }
                        }
                    } else {
                        warn!("draft unusable after sanitation, using template reply");
                    }
                }
                Ok(_) => debug!("draft too short, using template reply"),
                Err(err) => warn!(error = %err, "draft generation failed, using template reply"),
            }
        }

        GeneratedReply {
            subject,
            body: self.template_reply(draft),
            method: ReplyMethod::Fallback,
        }
    }

    // ── Docs path ────────────────────────────────────────────────────────

    fn docs_reply(&self, draft: &TicketDraft) -> String {
        let mut body = format!("{}\n\n", greeting(draft.fio.as_deref()));

        match draft.device_type.as_deref() {
            Some(device) if !self.kb.is_known_device(device) => {
                body.push_str(&format!(
                    "По запросу документации для \"{device}\":\n\n\
                     К сожалению, в нашей базе знаний не найдено оборудование с названием \"{device}\".\n\
                     Возможно, имеется в виду одна из следующих моделей ЭРИС:\n"
                ));
                for name in self.kb.suggestions(MAX_SUGGESTIONS) {
                    body.push_str(&format!("• {name}\n"));
                }
                body.push_str(
                    "\nДля точного подбора документации укажите, пожалуйста, заводской номер \
                     прибора или пришлите фото шильдика.\n",
                );
            }
            _ => {
                body.push_str(&format!(
                    "Актуальные руководства по эксплуатации, паспорта изделий и перечни \
                     запасных частей (ЗИП)\nдоступны в открытом доступе в библиотеке файлов:\n\n\
                     🔗 {}\n\nВ разделе доступны:\n",
                    self.kb.company.files_library
                ));
                for item in &self.kb.documentation.includes {
                    body.push_str(&format!("• {item}\n"));
                }
            }
        }

        body.push('\n');
        body.push_str(&self.contact_block());
        body
    }

    // ── Generative path ──────────────────────────────────────────────────

    fn build_prompt(&self, draft: &TicketDraft) -> String {
        let mut prompt = String::new();
        prompt.push_str(&format!(
            "Ты — специалист технической поддержки {}.\n\n",
            self.kb.company.name
        ));

        prompt.push_str("КРИТИЧЕСКИЕ ПРАВИЛА:\n");
        prompt.push_str("1. Отвечай только на русском языке, вежливо и по делу.\n");
        prompt.push_str("2. Используй только факты из контекста ниже, ничего не выдумывай.\n");
        prompt.push_str(&format!(
            "3. Из контактов указывай только {} и {}.\n",
            self.kb.company.support_phone, self.kb.company.support_email
        ));
        prompt.push_str("4. Не повторяй текст вопроса и не задавай встречных вопросов.\n\n");

        prompt.push_str("Контекст из базы знаний:\n");
        prompt.push_str(&self.build_context(
            &draft.classification.category,
            draft.device_type.as_deref(),
        ));
        prompt.push_str("\n\n");

        prompt.push_str("Данные клиента:\n");
        prompt.push_str(&format!("ФИО: {}\n", draft.fio.as_deref().unwrap_or("Клиент")));
        prompt.push_str(&format!(
            "Организация: {}\n",
            draft.organization.as_deref().unwrap_or("не указана")
        ));
        prompt.push_str(&format!(
            "Телефон: {}\n",
            draft.phone.as_deref().unwrap_or("не указан")
        ));
        prompt.push_str(&format!(
            "Email: {}\n",
            draft.email.as_deref().unwrap_or("не указан")
        ));
        prompt.push_str(&format!(
            "Прибор: {}\n",
            draft.device_type.as_deref().unwrap_or("прибор ЭРИС")
        ));
        prompt.push_str(&format!("Категория: {}\n", draft.classification.category));
        prompt.push_str(&format!("Тональность: {}\n", draft.sentiment.label.as_str()));
        let description = if draft.description.is_empty() {
            "вопрос"
        } else {
            draft.description.as_str()
        };
        prompt.push_str(&format!("Суть обращения: {description}\n"));

        prompt.push_str("\nСоставь ответ на русском языке:");
        prompt
    }

    fn build_context(&self, category: &str, device: Option<&str>) -> String {
        let mut parts: Vec<String> = Vec::new();
        parts.push(format!("Компания: {}", self.kb.company.name));
        parts.push(format!("Сайт: {}", self.kb.company.website));

        if let Some(product) = device.and_then(|d| self.kb.find_product(d)) {
            parts.push(format!(
                "Прибор: {} (газы: {})",
                product.name,
                product.detectable_gases.join(", ")
            ));
        }

        match category {
            "калибровка" => {
                parts.push(format!("Поверка: интервал {}", self.kb.calibration.interval));
                parts.push(format!(
                    "Партнёры: {}",
                    self.kb.calibration.partners.join(", ")
                ));
            }
            "подключение" => {
                parts.push(format!(
                    "Интерфейсы: {}",
                    self.kb.connection.interfaces.join(", ")
                ));
                parts.push(format!(
                    "Настройки Modbus: {}",
                    self.kb.connection.modbus_settings
                ));
            }
            "гарантия" => {
                parts.push(format!("Гарантия: {}", self.kb.warranty.period));
                parts.push(format!("Рекламация: {}", self.kb.warranty.claim_procedure));
            }
            _ => {}
        }

        for sol in self.kb.solutions_for(category).take(3) {
            parts.push(format!("Похожая проблема: {}", sol.problem));
            parts.push(format!("Решение: {}", sol.solution));
        }

        parts.join("\n")
    }

    // ── Template path ────────────────────────────────────────────────────

    fn template_reply(&self, draft: &TicketDraft) -> String {
        let mut body = format!(
            "{}\n\nБлагодарим за обращение в службу технической поддержки {}.\n\n",
            greeting(draft.fio.as_deref()),
            self.kb.company.name
        );

        if !draft.description.is_empty() {
            body.push_str(&format!("По вашему обращению: «{}»\n\n", draft.description));
        }

        match draft.classification.category.as_str() {
            "калибровка" => {
                body.push_str(&format!(
                    "Межповерочный интервал: {}.\nПоверку выполняют: {}.\n",
                    self.kb.calibration.interval,
                    self.kb.calibration.partners.join(", ")
                ));
            }
            "подключение" => {
                body.push_str(&format!(
                    "Доступные интерфейсы: {}.\nНастройки Modbus: {}.\n",
                    self.kb.connection.interfaces.join(", "),
                    self.kb.connection.modbus_settings
                ));
            }
            "гарантия" => {
                body.push_str(&format!(
                    "Гарантийный срок: {}.\nДля оформления рекламации: {}.\n",
                    self.kb.warranty.period, self.kb.warranty.claim_procedure
                ));
            }
            category => {
                for sol in self.kb.solutions_for(category).take(2) {
                    body.push_str(&format!(
                        "Похожая проблема: {}\nРешение: {}\n\n",
                        sol.problem, sol.solution
                    ));
                }
            }
        }

        body.push_str(
            "\nВаше обращение зарегистрировано, специалист свяжется с вами в ближайшее время.\n\n",
        );
        body.push_str(&self.contact_block());
        body
    }

    // ── Shared pieces ────────────────────────────────────────────────────

    fn contact_block(&self) -> String {
        format!(
            "─────────────────────────────\n\
             📞 Техподдержка: {}\n\
             📧 Email: {}\n\
             🌐 Каталог: {}\n\n\
             С уважением,\nСлужба технической поддержки {}",
            self.kb.company.support_phone,
            self.kb.company.support_email,
            self.kb.company.products_url,
            self.kb.company.name
        )
    }

    fn with_contact_block(&self, body: String) -> String {
        if self.kb.has_allowed_contact(&body) {
            body
        } else {
            format!("{body}\n\n{}", self.contact_block())
        }
    }
}

fn greeting(fio: Option<&str>) -> String {
    match fio.and_then(|f| f.split_whitespace().next()) {
        Some(name) => format!("Уважаемый(ая) {name}!"),
        None => "Уважаемый клиент!".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CapabilityError;
    use crate::pipeline::types::{
        ClassificationResult, ClassifyMethod, SentimentLabel, SentimentResult, SummaryMethod,
    };
    use async_trait::async_trait;
    use chrono::Utc;

    struct StaticGenerative {
        draft: &'static str,
    }

    #[async_trait]
    impl GenerativeModel for StaticGenerative {
        async fn draft(&self, _prompt: &str) -> Result<String, CapabilityError> {
            Ok(self.draft.to_string())
        }
    }

    struct PanickingGenerative;

    #[async_trait]
    impl GenerativeModel for PanickingGenerative {
        async fn draft(&self, _prompt: &str) -> Result<String, CapabilityError> {
            unreachable!("generative model must not be invoked for docs requests")
        }
    }

    struct FailingGenerative;

    #[async_trait]
    impl GenerativeModel for FailingGenerative {
        async fn draft(&self, _prompt: &str) -> Result<String, CapabilityError> {
            Err(CapabilityError::prediction("generative", "таймаут"))
        }
    }

    fn make_draft(category: &str) -> TicketDraft {
        TicketDraft {
            message_id: "msg-42".into(),
            date: Utc::now(),
            fio: Some("Петров Иван Сергеевич".into()),
            organization: Some("Ромашка".into()),
            phone: Some("+7 (912) 345-67-89".into()),
            email: Some("ivan@example.ru".into()),
            serial_numbers: vec!["12AB34".into()],
            device_type: Some("ДГС ЭРИС-210".into()),
            description: "Прибор уходит в ошибку после прогрева".into(),
            summary_method: SummaryMethod::Sentences,
            sentiment: SentimentResult {
                label: SentimentLabel::Neutral,
                confidence: 0.5,
            },
            classification: ClassificationResult {
                category: category.into(),
                confidence: 0.8,
                method: ClassifyMethod::Keywords,
            },
        }
    }

    fn make_generator(model: Option<Arc<dyn GenerativeModel>>) -> ReplyGenerator {
        ReplyGenerator::new(model, Arc::new(KnowledgeBase::default()))
    }

    #[tokio::test]
    async fn docs_category_never_calls_the_model() {
        let generator = make_generator(Some(Arc::new(PanickingGenerative)));
        let reply = generator.generate(&make_draft("документация")).await;
        assert_eq!(reply.method, ReplyMethod::FallbackDocs);
        assert!(reply.body.contains("files-library"));
        assert!(reply.body.contains("8-800-55-00-715"));
        assert_eq!(reply.subject, "RE: msg-42 | документация");
    }

    #[tokio::test]
    async fn docs_reply_suggests_models_for_unknown_device() {
        let generator = make_generator(None);
        let mut draft = make_draft("документация");
        draft.device_type = Some("Газконтроль-01".into());
        let reply = generator.generate(&draft).await;
        assert_eq!(reply.method, ReplyMethod::FallbackDocs);
        assert!(reply.body.contains("Газконтроль-01"));
        assert!(reply.body.contains("не найдено"));
        let bullets = reply.body.matches('•').count();
        assert!(bullets >= 1 && bullets <= 3);
    }

    #[tokio::test]
    async fn missing_model_always_yields_template_reply() {
        let generator = make_generator(None);
        let reply = generator.generate(&make_draft("неисправность")).await;
        assert_eq!(reply.method, ReplyMethod::Fallback);
        assert!(!reply.body.is_empty());
        assert!(reply.body.contains("8-800-55-00-715"));
        assert!(reply.body.contains("Уважаемый(ая) Петров!"));
    }

    #[tokio::test]
    async fn failing_model_yields_template_reply() {
        let generator = make_generator(Some(Arc::new(FailingGenerative)));
        let reply = generator.generate(&make_draft("подключение")).await;
        assert_eq!(reply.method, ReplyMethod::Fallback);
        assert!(reply.body.contains("RS-485"));
    }

    #[tokio::test]
    async fn short_draft_yields_template_reply() {
        let generator = make_generator(Some(Arc::new(StaticGenerative { draft: "Ок." })));
        let reply = generator.generate(&make_draft("другое")).await;
        assert_eq!(reply.method, ReplyMethod::Fallback);
    }

    #[tokio::test]
    async fn clean_valid_draft_is_accepted_with_contacts_appended() {
        let generator = make_generator(Some(Arc::new(StaticGenerative {
            draft: "Для подключения по RS-485 установите скорость 9600 бод и проверьте адрес \
                    прибора в меню. Схема подключения приведена в руководстве по эксплуатации.",
        })));
        let reply = generator.generate(&make_draft("подключение")).await;
        assert_eq!(reply.method, ReplyMethod::Llm);
        assert!(reply.body.starts_with("Для подключения"));
        assert!(reply.body.contains("8-800-55-00-715"));
    }

    #[tokio::test]
    async fn garbage_draft_is_rejected_to_template() {
        let generator = make_generator(Some(Arc::new(StaticGenerative {
            draft: "Я понимаю вашу проблему, буду рад помочь всем чем смогу, обращайтесь всегда.",
        })));
        let reply = generator.generate(&make_draft("неисправность")).await;
        assert_eq!(reply.method, ReplyMethod::Fallback);
    }

    #[tokio::test]
    async fn required_contact_category_rejects_contactless_draft() {
        let generator = make_generator(Some(Arc::new(StaticGenerative {
            draft: "Поверка выполняется в аккредитованной лаборатории один раз в двенадцать \
                    месяцев согласно методике из комплекта поставки прибора.",
        })));
        let reply = generator.generate(&make_draft("калибровка")).await;
        assert_eq!(reply.method, ReplyMethod::Fallback);
        assert!(reply.body.contains("8-800-55-00-715"));
    }

    #[test]
    fn greeting_uses_first_name_token() {
        assert_eq!(greeting(Some("Петров Иван")), "Уважаемый(ая) Петров!");
        assert_eq!(greeting(None), "Уважаемый клиент!");
        assert_eq!(greeting(Some("   ")), "Уважаемый клиент!");
    }
}
