//! Workflow orchestrator: one operation per user-facing workflow.
//!
//! Sequences calls across the cache layer, AI gateway, persistence store,
//! and notification gateway. Every external-service failure is caught here
//! and converted into a returned error (interactive paths) or a [`Notice`]
//! (background paths) — nothing crashes orchestrator state, and nothing is
//! retried automatically; retries are always user-initiated.
//!
//! Pipelines are best-effort with no compensation: a step failure aborts the
//! remaining steps but already-completed side effects (a persisted document,
//! an appended chat message) stay in place.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::ai::{self, AiGateway, CompletionApi, GeminiClient};
use crate::cache::TtlCache;
use crate::config::Config;
use crate::error::WorkflowError;
use crate::extract::{self, NativeExtractor, TextExtractor};
use crate::resend::{EmailApi, ResendMailer};
use crate::scheduler::ReminderScheduler;
use crate::store::{MemoryStore, Repository};
use crate::types::{
    AddZoneOutcome, AmbiguityState, ChatMessage, ChatRole, Contact, Conversion, Document,
    FileAttachment, LookupOutcome, Notice, Reminder, TimezoneCard,
};

/// Chat transcript file under the data directory.
const TRANSCRIPT_FILE: &str = "chat_history.json";

/// Cache entries live under their own subdirectory.
const CACHE_SUBDIR: &str = "cache";

/// Minimum lead time for a reminder.
const MIN_REMINDER_LEAD_SECS: i64 = 60;

pub struct Orchestrator {
    store: Arc<dyn Repository>,
    ai: AiGateway,
    mailer: Arc<dyn EmailApi>,
    extractor: Arc<dyn TextExtractor>,
    cache: TtlCache,
    scheduler: ReminderScheduler,

    // Canonical in-memory state. Locks are never held across an await.
    timezones: Mutex<Vec<TimezoneCard>>,
    contacts: Mutex<Vec<Contact>>,
    documents: Mutex<Vec<Document>>,
    transcript: Mutex<Vec<ChatMessage>>,
    ambiguity: Mutex<Option<AmbiguityState>>,

    notice_tx: mpsc::UnboundedSender<Notice>,
    transcript_path: PathBuf,
}

impl Orchestrator {
    /// Wire up an orchestrator from its collaborators.
    ///
    /// Must be called within a tokio runtime: the reminder-fired pipeline
    /// runs on a spawned background task, which reports through the returned
    /// notice channel.
    pub fn new(
        store: Arc<dyn Repository>,
        api: Arc<dyn CompletionApi>,
        mailer: Arc<dyn EmailApi>,
        extractor: Arc<dyn TextExtractor>,
        data_dir: &Path,
    ) -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (scheduler, mut fired_rx) = ReminderScheduler::new();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        let ai = AiGateway::new(api);

        // Background handler for fired reminders. Holds only what the
        // pipeline needs, so dropping the orchestrator ends the task.
        {
            let ai = ai.clone();
            let mailer = mailer.clone();
            let notice_tx = notice_tx.clone();
            tokio::spawn(async move {
                while let Some(reminder) = fired_rx.recv().await {
                    run_reminder_pipeline(&ai, mailer.as_ref(), &notice_tx, reminder).await;
                }
            });
        }

        let orchestrator = Self {
            store,
            ai,
            mailer,
            extractor,
            cache: TtlCache::new(data_dir.join(CACHE_SUBDIR)),
            scheduler,
            timezones: Mutex::new(Vec::new()),
            contacts: Mutex::new(Vec::new()),
            documents: Mutex::new(Vec::new()),
            transcript: Mutex::new(Vec::new()),
            ambiguity: Mutex::new(None),
            notice_tx,
            transcript_path: data_dir.join(TRANSCRIPT_FILE),
        };

        (orchestrator, notice_rx)
    }

    /// Production wiring from configuration: Gemini completion client,
    /// Resend mailer (dry-run without a key), built-in extractor, in-memory
    /// store.
    pub fn from_config(config: &Config) -> Result<(Self, mpsc::UnboundedReceiver<Notice>), String> {
        let api_key = config
            .gemini_api_key
            .clone()
            .ok_or("GEMINI_API_KEY is not configured")?;
        let data_dir = config.resolved_data_dir()?;

        Ok(Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(GeminiClient::new(api_key, config.model.clone())),
            Arc::new(ResendMailer::new(
                config.resend_api_key.clone(),
                config.sender(),
            )),
            Arc::new(NativeExtractor),
            &data_dir,
        ))
    }

    /// Load persisted state: entity lists from the store, the chat
    /// transcript from disk.
    pub async fn bootstrap(&self) -> Result<(), WorkflowError> {
        let cards = self.store.list_timezone_cards().await?;
        let contacts = self.store.list_contacts().await?;
        let documents = self.store.list_documents().await?;

        *self.timezones.lock() = cards;
        *self.contacts.lock() = contacts;
        *self.documents.lock() = documents;
        *self.transcript.lock() = load_transcript(&self.transcript_path);

        Ok(())
    }

    // ------------------------------------------------------------------
    // Timezone cards
    // ------------------------------------------------------------------

    pub fn timezone_cards(&self) -> Vec<TimezoneCard> {
        self.timezones.lock().clone()
    }

    /// Add a timezone card for a location.
    ///
    /// Consults the cache first; on a miss the AI gateway performs the
    /// lookup. An ambiguous location halts the pipeline and parks an
    /// [`AmbiguityState`] until [`resolve_ambiguity`](Self::resolve_ambiguity)
    /// or [`cancel_ambiguity`](Self::cancel_ambiguity).
    pub async fn add_timezone(&self, location: &str) -> Result<AddZoneOutcome, WorkflowError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(WorkflowError::Validation(
                "a location is required".to_string(),
            ));
        }

        if self
            .timezones
            .lock()
            .iter()
            .any(|card| card.location.eq_ignore_ascii_case(location))
        {
            return Err(WorkflowError::Duplicate(format!(
                "a card for '{}' already exists",
                location
            )));
        }

        // A fresh lookup supersedes any parked ambiguity.
        *self.ambiguity.lock() = None;

        let cache_key = location.to_lowercase();
        let facts = match self.cache.get(&cache_key) {
            Some(facts) => facts,
            None => match self.ai.timezone_lookup(location).await? {
                LookupOutcome::Ambiguous(candidates) => {
                    let state = AmbiguityState {
                        original_query: location.to_string(),
                        candidates,
                    };
                    *self.ambiguity.lock() = Some(state.clone());
                    return Ok(AddZoneOutcome::NeedsResolution(state));
                }
                LookupOutcome::Found(facts) => {
                    self.cache.set(&cache_key, &facts);
                    facts
                }
            },
        };

        let card = TimezoneCard::from_facts(facts);
        let card = self.store.add_timezone_card(card).await?;
        self.timezones.lock().push(card.clone());

        Ok(AddZoneOutcome::Added(card))
    }

    /// Re-enter the add-timezone pipeline with the candidate the user chose.
    ///
    /// A stale call — after the user cancelled, or when nothing was
    /// ambiguous to begin with — is rejected without side effects.
    pub async fn resolve_ambiguity(
        &self,
        selection: &str,
    ) -> Result<AddZoneOutcome, WorkflowError> {
        if self.ambiguity.lock().take().is_none() {
            return Err(WorkflowError::Validation(
                "no ambiguous lookup is pending".to_string(),
            ));
        }
        self.add_timezone(selection).await
    }

    /// Abandon a pending ambiguous lookup.
    pub fn cancel_ambiguity(&self) {
        *self.ambiguity.lock() = None;
    }

    pub fn pending_ambiguity(&self) -> Option<AmbiguityState> {
        self.ambiguity.lock().clone()
    }

    pub async fn delete_timezone(&self, id: &str) -> Result<(), WorkflowError> {
        self.store.delete_timezone_card(id).await?;
        self.timezones.lock().retain(|card| card.id != id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Time conversion
    // ------------------------------------------------------------------

    pub async fn convert_time(
        &self,
        date_time: &str,
        from_zone: &str,
        to_zone: &str,
    ) -> Result<Conversion, WorkflowError> {
        self.ai.convert_time(date_time, from_zone, to_zone).await
    }

    // ------------------------------------------------------------------
    // Reminders
    // ------------------------------------------------------------------

    /// Schedule an email reminder for `date_time` (`YYYY-MM-DDTHH:mm`,
    /// local to `zone`).
    ///
    /// Validation happens before any external call; the delay itself comes
    /// from the AI gateway's reminder-delay operation.
    pub async fn schedule_reminder(
        &self,
        message: &str,
        recipient_email: &str,
        date_time: &str,
        zone: &str,
    ) -> Result<Reminder, WorkflowError> {
        let message = message.trim();
        let recipient_email = recipient_email.trim();
        if message.is_empty() {
            return Err(WorkflowError::Validation(
                "a reminder message is required".to_string(),
            ));
        }
        if recipient_email.is_empty() {
            return Err(WorkflowError::Validation(
                "a recipient email is required".to_string(),
            ));
        }

        let tz: Tz = zone
            .parse()
            .map_err(|_| WorkflowError::Validation(format!("unknown timezone '{}'", zone)))?;
        let naive = parse_form_datetime(date_time).ok_or_else(|| {
            WorkflowError::Validation(format!("'{}' is not a valid date and time", date_time))
        })?;
        let target = tz.from_local_datetime(&naive).earliest().ok_or_else(|| {
            WorkflowError::Validation(format!(
                "that local time does not exist in '{}' (DST gap)",
                zone
            ))
        })?;

        let now = Utc::now();
        if target.with_timezone(&Utc) - now < chrono::Duration::seconds(MIN_REMINDER_LEAD_SECS) {
            return Err(WorkflowError::Validation(
                "please select a date and time at least 1 minute in the future".to_string(),
            ));
        }

        let delay_ms = self.ai.reminder_delay(date_time, zone).await?;

        let reminder = Reminder {
            id: uuid::Uuid::new_v4().to_string(),
            message: message.to_string(),
            recipient_email: recipient_email.to_string(),
            fire_date: now + chrono::Duration::milliseconds(delay_ms as i64),
            location: zone.to_string(),
        };
        self.scheduler
            .schedule(reminder.clone(), Duration::from_millis(delay_ms));
        log::info!(
            "Reminder '{}' scheduled to fire at {}",
            reminder.message,
            reminder.fire_date
        );

        Ok(reminder)
    }

    /// Remove a reminder from the pending set; its timer's eventual expiry
    /// is suppressed by the scheduler's check-before-fire gate.
    pub fn cancel_reminder(&self, id: &str) -> bool {
        self.scheduler.cancel(id)
    }

    pub fn pending_reminders(&self) -> Vec<Reminder> {
        self.scheduler.pending()
    }

    // ------------------------------------------------------------------
    // Contacts
    // ------------------------------------------------------------------

    pub fn contacts(&self) -> Vec<Contact> {
        self.contacts.lock().clone()
    }

    pub async fn add_contact(&self, name: &str, email: &str) -> Result<Contact, WorkflowError> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() || email.is_empty() {
            return Err(WorkflowError::Validation(
                "a name and email are required".to_string(),
            ));
        }

        let contact = self.store.add_contact(name, email).await?;
        self.contacts.lock().push(contact.clone());
        Ok(contact)
    }

    pub async fn delete_contact(&self, id: &str) -> Result<(), WorkflowError> {
        self.store.delete_contact(id).await?;
        self.contacts.lock().retain(|contact| contact.id != id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Document workflow
    // ------------------------------------------------------------------

    pub fn documents(&self) -> Vec<Document> {
        self.documents.lock().clone()
    }

    /// Analyze an uploaded document and email the findings to a contact:
    /// extract → analyze → persist → compose → send. Any failure aborts the
    /// remaining steps; completed steps are not rolled back.
    pub async fn run_document_workflow(
        &self,
        filename: &str,
        mime: &str,
        data: &[u8],
        contact_id: &str,
    ) -> Result<Document, WorkflowError> {
        let contact = self
            .contacts
            .lock()
            .iter()
            .find(|contact| contact.id == contact_id)
            .cloned()
            .ok_or_else(|| {
                WorkflowError::Validation("a valid contact must be selected".to_string())
            })?;

        // Step 1: extract
        let text = extract::extract_text(self.extractor.as_ref(), filename, mime, data)?;

        // Step 2: analyze
        let analysis = self.ai.analyze_document(&text).await?;

        // Step 3: persist
        let document = Document {
            id: uuid::Uuid::new_v4().to_string(),
            filename: filename.to_string(),
            original_text: text,
            summary: analysis.summary.clone(),
            sentiment: analysis.sentiment.clone(),
        };
        let document = self.store.add_document(document).await?;
        self.documents.lock().push(document.clone());

        // Step 4: compose + notify
        let draft = self
            .ai
            .compose_analysis_email(&analysis.summary, &analysis.sentiment, filename)
            .await?;
        self.mailer
            .send_email(&contact.email, &draft.subject, &draft.html_body)
            .await?;

        log::info!(
            "Document workflow complete: '{}' analyzed and sent to {}",
            filename,
            contact.email
        );
        let _ = self.notice_tx.send(Notice::success(format!(
            "Workflow complete! Analysis of '{}' sent to {}.",
            filename, contact.name
        )));
        Ok(document)
    }

    // ------------------------------------------------------------------
    // Chat
    // ------------------------------------------------------------------

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript.lock().clone()
    }

    /// Send one chat turn.
    ///
    /// The new message's attachment is validated before anything is
    /// appended, so an unreadable image leaves the transcript untouched.
    /// After the optimistic append, a gateway failure keeps the user's
    /// message in place for retry; on success the model reply is appended.
    pub async fn chat_turn(
        &self,
        text: &str,
        attachment: Option<FileAttachment>,
    ) -> Result<ChatMessage, WorkflowError> {
        let text = text.trim();
        if text.is_empty() && attachment.is_none() {
            return Err(WorkflowError::Validation(
                "type a message or attach a file".to_string(),
            ));
        }
        if let Some(attachment) = &attachment {
            ai::validate_attachment(attachment)?;
        }

        let user_message = ChatMessage {
            role: ChatRole::User,
            text: text.to_string(),
            attachment,
        };

        let history = self.transcript.lock().clone();
        self.transcript.lock().push(user_message.clone());
        self.save_transcript();

        let reply = self.ai.chat(&history, &user_message).await?;

        let model_message = ChatMessage {
            role: ChatRole::Model,
            text: reply,
            attachment: None,
        };
        self.transcript.lock().push(model_message.clone());
        self.save_transcript();

        Ok(model_message)
    }

    pub fn clear_chat(&self) {
        self.transcript.lock().clear();
        self.save_transcript();
    }

    // ------------------------------------------------------------------
    // Content generation
    // ------------------------------------------------------------------

    pub async fn generate_content(
        &self,
        topic: &str,
        content_type: &str,
        pages: u8,
    ) -> Result<String, WorkflowError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(WorkflowError::Validation(
                "please enter a prompt or topic".to_string(),
            ));
        }
        self.ai
            .generate(&ai::prompts::content(topic, content_type, pages))
            .await
    }

    pub async fn refine_prompt(&self, prompt: &str) -> Result<String, WorkflowError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(WorkflowError::Validation(
                "please enter a prompt to refine".to_string(),
            ));
        }
        self.ai.generate(&ai::prompts::refine(prompt)).await
    }

    // ------------------------------------------------------------------

    fn save_transcript(&self) {
        let transcript = self.transcript.lock().clone();
        match serde_json::to_string_pretty(&transcript) {
            Ok(json) => {
                if let Err(e) = fs::write(&self.transcript_path, json) {
                    log::warn!("Failed to save chat history: {}", e);
                }
            }
            Err(e) => log::warn!("Failed to serialize chat history: {}", e),
        }
    }
}

/// Compose and send the email for a fired reminder, surfacing progress as
/// notices. The reminder is already out of the pending set — firing is
/// one-shot and never retried.
async fn run_reminder_pipeline(
    ai: &AiGateway,
    mailer: &dyn EmailApi,
    notice_tx: &mpsc::UnboundedSender<Notice>,
    reminder: Reminder,
) {
    let _ = notice_tx.send(Notice::success(format!(
        "Reminder triggered for \"{}\". Composing email...",
        reminder.message
    )));

    let result = async {
        let draft = ai
            .compose_reminder_email(&reminder.message, &reminder.location)
            .await?;
        mailer
            .send_email(&reminder.recipient_email, &draft.subject, &draft.html_body)
            .await
    }
    .await;

    let notice = match result {
        Ok(receipt) => {
            log::info!(
                "Reminder email for '{}' delivered ({})",
                reminder.message,
                receipt.id
            );
            Notice::success("Reminder email sent successfully!")
        }
        Err(e) => {
            log::warn!("Reminder email for '{}' failed: {}", reminder.message, e);
            Notice::error(format!("Failed to send reminder email: {}", e))
        }
    };
    let _ = notice_tx.send(notice);
}

/// Accept `YYYY-MM-DDTHH:mm` from a datetime form field, tolerating seconds.
fn parse_form_datetime(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

/// Read the persisted transcript; any failure degrades to an empty history.
fn load_transcript(path: &Path) -> Vec<ChatMessage> {
    if !path.exists() {
        return Vec::new();
    }
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(transcript) => transcript,
            Err(e) => {
                log::warn!("Failed to parse chat history, starting fresh: {}", e);
                Vec::new()
            }
        },
        Err(e) => {
            log::warn!("Failed to load chat history: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::ScriptedApi;
    use crate::ai::Completion;
    use crate::types::{AttachmentKind, DeliveryReceipt};
    use async_trait::async_trait;

    const LOOKUP_OK: &str = "Time: 2026-08-07T09:30:00\nTimezone: Asia/Tokyo\nOffset: +09:00\nDST: false\nLocation: Tokyo, Japan\nDST Info: Japan does not observe DST";
    const ANALYSIS_OK: &str = "SUMMARY: The project launched successfully.\nSENTIMENT: Positive";
    const EMAIL_OK: &str = "Analysis of report.txt\n---\n<p>All good.</p>";

    /// Records sends; optionally fails every send.
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String, String)>>,
        fail: bool,
    }

    impl RecordingMailer {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn sent_count(&self) -> usize {
            self.sent.lock().len()
        }
    }

    #[async_trait]
    impl EmailApi for RecordingMailer {
        async fn send_email(
            &self,
            to: &str,
            subject: &str,
            html_body: &str,
        ) -> Result<DeliveryReceipt, WorkflowError> {
            if self.fail {
                return Err(WorkflowError::Delivery("provider said no".to_string()));
            }
            self.sent
                .lock()
                .push((to.to_string(), subject.to_string(), html_body.to_string()));
            Ok(DeliveryReceipt {
                id: "rcpt_1".to_string(),
            })
        }
    }

    struct Harness {
        orchestrator: Orchestrator,
        notices: mpsc::UnboundedReceiver<Notice>,
        api: Arc<ScriptedApi>,
        mailer: Arc<RecordingMailer>,
        _dir: tempfile::TempDir,
    }

    fn harness(responses: Vec<Result<Completion, WorkflowError>>) -> Harness {
        harness_with_mailer(responses, RecordingMailer::new(false))
    }

    fn harness_with_mailer(
        responses: Vec<Result<Completion, WorkflowError>>,
        mailer: Arc<RecordingMailer>,
    ) -> Harness {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let api = ScriptedApi::new(responses);
        let (orchestrator, notices) = Orchestrator::new(
            Arc::new(MemoryStore::new()),
            api.clone(),
            mailer.clone(),
            Arc::new(NativeExtractor),
            dir.path(),
        );
        Harness {
            orchestrator,
            notices,
            api,
            mailer,
            _dir: dir,
        }
    }

    async fn next_notice(rx: &mut mpsc::UnboundedReceiver<Notice>) -> Notice {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("notice within deadline")
            .expect("notice channel open")
    }

    /// A form datetime `minutes` from now, in UTC.
    fn future_form_time(minutes: i64) -> String {
        (Utc::now() + chrono::Duration::minutes(minutes))
            .format("%Y-%m-%dT%H:%M")
            .to_string()
    }

    // --- add-timezone ---

    #[tokio::test]
    async fn test_add_timezone_success_and_duplicate() {
        let h = harness(vec![ScriptedApi::text(LOOKUP_OK)]);

        let outcome = h.orchestrator.add_timezone("tokyo").await.unwrap();
        let AddZoneOutcome::Added(card) = outcome else {
            panic!("expected Added");
        };
        assert_eq!(card.location, "Tokyo, Japan");
        assert_eq!(h.orchestrator.timezone_cards().len(), 1);

        // Case-insensitive duplicate, no second lookup.
        let err = h
            .orchestrator
            .add_timezone("TOKYO, JAPAN")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Duplicate(_)));
        assert_eq!(h.orchestrator.timezone_cards().len(), 1);
        assert_eq!(h.api.call_count(), 1);
    }

    #[tokio::test]
    async fn test_add_timezone_ambiguity_roundtrip() {
        let h = harness(vec![
            ScriptedApi::text("AMBIGUOUS: Springfield, Illinois, USA | Springfield, Massachusetts, USA"),
            ScriptedApi::text(LOOKUP_OK),
        ]);

        let outcome = h.orchestrator.add_timezone("Springfield").await.unwrap();
        let AddZoneOutcome::NeedsResolution(state) = outcome else {
            panic!("expected NeedsResolution");
        };
        assert_eq!(state.original_query, "Springfield");
        assert_eq!(state.candidates.len(), 2);
        assert!(h.orchestrator.timezone_cards().is_empty());
        assert!(h.orchestrator.pending_ambiguity().is_some());

        let resolved = h
            .orchestrator
            .resolve_ambiguity("Springfield, Illinois, USA")
            .await
            .unwrap();
        assert!(matches!(resolved, AddZoneOutcome::Added(_)));
        assert!(h.orchestrator.pending_ambiguity().is_none());

        // A second resolution attempt is stale and rejected.
        let err = h
            .orchestrator
            .resolve_ambiguity("Springfield, Massachusetts, USA")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn test_cancelled_ambiguity_ignores_resolution() {
        let h = harness(vec![ScriptedApi::text("AMBIGUOUS: A | B")]);
        h.orchestrator.add_timezone("somewhere").await.unwrap();
        h.orchestrator.cancel_ambiguity();

        let err = h.orchestrator.resolve_ambiguity("A").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(h.api.call_count(), 1);
    }

    #[tokio::test]
    async fn test_add_timezone_serves_repeat_lookup_from_cache() {
        let h = harness(vec![ScriptedApi::text(LOOKUP_OK)]);

        let AddZoneOutcome::Added(card) = h.orchestrator.add_timezone("tokyo").await.unwrap()
        else {
            panic!("expected Added");
        };
        h.orchestrator.delete_timezone(&card.id).await.unwrap();
        assert!(h.orchestrator.timezone_cards().is_empty());

        // Same query again: served from cache, no second completion call.
        let outcome = h.orchestrator.add_timezone("tokyo").await.unwrap();
        assert!(matches!(outcome, AddZoneOutcome::Added(_)));
        assert_eq!(h.api.call_count(), 1);
    }

    // --- reminders ---

    #[tokio::test]
    async fn test_reminder_in_the_past_rejected_before_any_call() {
        let h = harness(vec![]);
        let err = h
            .orchestrator
            .schedule_reminder("standup", "jane@example.com", &future_form_time(0), "UTC")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(h.api.call_count(), 0);
        assert!(h.orchestrator.pending_reminders().is_empty());
    }

    #[tokio::test]
    async fn test_reminder_unknown_zone_rejected() {
        let h = harness(vec![]);
        let err = h
            .orchestrator
            .schedule_reminder(
                "standup",
                "jane@example.com",
                &future_form_time(5),
                "Mars/Olympus",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(h.api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_reminder_fires_and_emails() {
        let mut h = harness(vec![
            ScriptedApi::text("20"),
            ScriptedApi::text("Reminder: standup\n---\n<p>standup</p>"),
        ]);

        let reminder = h
            .orchestrator
            .schedule_reminder("standup", "jane@example.com", &future_form_time(5), "UTC")
            .await
            .unwrap();
        assert_eq!(h.orchestrator.pending_reminders().len(), 1);
        assert_eq!(reminder.location, "UTC");

        let first = next_notice(&mut h.notices).await;
        assert!(first.message.contains("Reminder triggered"));
        let second = next_notice(&mut h.notices).await;
        assert!(second.message.contains("sent successfully"));

        assert_eq!(h.mailer.sent_count(), 1);
        let sent = h.mailer.sent.lock();
        assert_eq!(sent[0].0, "jane@example.com");
        assert_eq!(sent[0].1, "Reminder: standup");
        drop(sent);

        // Fired reminders leave the pending set.
        assert!(h.orchestrator.pending_reminders().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_reminder_sends_nothing() {
        let h = harness(vec![ScriptedApi::text("50")]);

        let reminder = h
            .orchestrator
            .schedule_reminder("standup", "jane@example.com", &future_form_time(5), "UTC")
            .await
            .unwrap();
        assert!(h.orchestrator.cancel_reminder(&reminder.id));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(h.mailer.sent_count(), 0);
        // Only the delay call went out; no email was composed.
        assert_eq!(h.api.call_count(), 1);
    }

    #[tokio::test]
    async fn test_reminder_send_failure_surfaces_notice() {
        let mailer = RecordingMailer::new(true);
        let mut h = harness_with_mailer(
            vec![
                ScriptedApi::text("20"),
                ScriptedApi::text("Reminder: standup\n---\n<p>standup</p>"),
            ],
            mailer,
        );

        h.orchestrator
            .schedule_reminder("standup", "jane@example.com", &future_form_time(5), "UTC")
            .await
            .unwrap();

        let _triggered = next_notice(&mut h.notices).await;
        let outcome = next_notice(&mut h.notices).await;
        assert!(outcome.message.contains("Failed to send reminder email"));
        // One-shot: the reminder is gone even though the send failed.
        assert!(h.orchestrator.pending_reminders().is_empty());
    }

    // --- document workflow ---

    #[tokio::test]
    async fn test_document_workflow_happy_path() {
        let h = harness(vec![ScriptedApi::text(ANALYSIS_OK), ScriptedApi::text(EMAIL_OK)]);
        let contact = h
            .orchestrator
            .add_contact("Jane", "jane@example.com")
            .await
            .unwrap();

        let document = h
            .orchestrator
            .run_document_workflow(
                "report.txt",
                "text/plain",
                b"The project launched successfully and exceeded all targets.",
                &contact.id,
            )
            .await
            .unwrap();

        assert_eq!(document.summary, "The project launched successfully.");
        assert_eq!(document.sentiment, "Positive");
        assert_eq!(h.orchestrator.documents().len(), 1);
        assert_eq!(h.mailer.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_document_workflow_send_failure_keeps_document() {
        let mailer = RecordingMailer::new(true);
        let h = harness_with_mailer(
            vec![ScriptedApi::text(ANALYSIS_OK), ScriptedApi::text(EMAIL_OK)],
            mailer,
        );
        let contact = h
            .orchestrator
            .add_contact("Jane", "jane@example.com")
            .await
            .unwrap();

        let err = h
            .orchestrator
            .run_document_workflow("report.txt", "text/plain", b"fine text", &contact.id)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Delivery(_)));

        // Best-effort, no compensation: the document record stays.
        assert_eq!(h.orchestrator.documents().len(), 1);
    }

    #[tokio::test]
    async fn test_document_workflow_analysis_failure_stops_pipeline() {
        let h = harness(vec![Err(WorkflowError::Api("down".to_string()))]);
        let contact = h
            .orchestrator
            .add_contact("Jane", "jane@example.com")
            .await
            .unwrap();

        let err = h
            .orchestrator
            .run_document_workflow("report.txt", "text/plain", b"text", &contact.id)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Api(_)));
        assert!(h.orchestrator.documents().is_empty());
        assert_eq!(h.mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_document_workflow_requires_known_contact() {
        let h = harness(vec![]);
        let err = h
            .orchestrator
            .run_document_workflow("report.txt", "text/plain", b"text", "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(h.api.call_count(), 0);
    }

    // --- chat ---

    #[tokio::test]
    async fn test_chat_turn_appends_user_and_model() {
        let h = harness(vec![ScriptedApi::text("hello back")]);

        let reply = h.orchestrator.chat_turn("hello", None).await.unwrap();
        assert_eq!(reply.text, "hello back");

        let transcript = h.orchestrator.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, ChatRole::User);
        assert_eq!(transcript[1].role, ChatRole::Model);

        // Transcript is persisted as a whole list.
        let reloaded = load_transcript(&h.orchestrator.transcript_path);
        assert_eq!(reloaded.len(), 2);
    }

    #[tokio::test]
    async fn test_chat_bad_image_leaves_transcript_untouched() {
        let h = harness(vec![ScriptedApi::text("unreached")]);
        let err = h
            .orchestrator
            .chat_turn(
                "look",
                Some(FileAttachment {
                    kind: AttachmentKind::Image,
                    content: "not-a-data-url".to_string(),
                    name: "x.png".to_string(),
                }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert!(h.orchestrator.transcript().is_empty());
        assert_eq!(h.api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_chat_failure_keeps_user_message_for_retry() {
        let h = harness(vec![Err(WorkflowError::Api("down".to_string()))]);
        let err = h.orchestrator.chat_turn("hello", None).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Api(_)));

        let transcript = h.orchestrator.transcript();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].role, ChatRole::User);
        assert_eq!(transcript[0].text, "hello");
    }

    #[tokio::test]
    async fn test_clear_chat() {
        let h = harness(vec![ScriptedApi::text("hi")]);
        h.orchestrator.chat_turn("hello", None).await.unwrap();
        h.orchestrator.clear_chat();
        assert!(h.orchestrator.transcript().is_empty());
        assert!(load_transcript(&h.orchestrator.transcript_path).is_empty());
    }

    // --- contacts / content / bootstrap ---

    #[tokio::test]
    async fn test_add_contact_duplicate_email_differs_only_in_case() {
        let h = harness(vec![]);
        h.orchestrator
            .add_contact("Jane", "jane@example.com")
            .await
            .unwrap();
        let err = h
            .orchestrator
            .add_contact("Janet", "JANE@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Duplicate(_)));
        assert_eq!(h.orchestrator.contacts().len(), 1);
    }

    #[tokio::test]
    async fn test_generate_content_builds_exact_prompt() {
        let h = harness(vec![ScriptedApi::text("the post")]);
        h.orchestrator
            .generate_content("rust async", "Blog Post", 2)
            .await
            .unwrap();

        let requests = h.api.requests.lock();
        let crate::ai::Part::Text(prompt) = &requests[0].turns[0].parts[0] else {
            panic!("expected text part");
        };
        assert_eq!(
            prompt,
            "Generate a 2-page blog post about the following topic: \"rust async\""
        );
    }

    #[tokio::test]
    async fn test_generate_content_requires_topic() {
        let h = harness(vec![]);
        let err = h
            .orchestrator
            .generate_content("   ", "Blog Post", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn test_bootstrap_loads_store_and_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.add_contact("Jane", "jane@example.com").await.unwrap();

        let transcript = vec![ChatMessage {
            role: ChatRole::User,
            text: "earlier".to_string(),
            attachment: None,
        }];
        fs::write(
            dir.path().join(TRANSCRIPT_FILE),
            serde_json::to_string(&transcript).unwrap(),
        )
        .unwrap();

        let (orchestrator, _notices) = Orchestrator::new(
            store,
            ScriptedApi::new(vec![]),
            RecordingMailer::new(false),
            Arc::new(NativeExtractor),
            dir.path(),
        );
        orchestrator.bootstrap().await.unwrap();

        assert_eq!(orchestrator.contacts().len(), 1);
        assert_eq!(orchestrator.transcript().len(), 1);
        assert_eq!(orchestrator.transcript()[0].text, "earlier");
    }
}
