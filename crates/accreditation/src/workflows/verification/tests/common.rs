use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::audit::AuditEntry;
use crate::clock::{Clock, ManualClock};
use crate::identity::{StaticDirectory, UserId, UserRecord, UserRole};
use crate::notify::{Notification, NotificationSink, NotifyError, RecordingNotifier};
use crate::storage::{MemoryStore, RepositoryError};
use crate::workflows::router::{accreditation_router, AccreditationApi};
use crate::workflows::vault::{
    DocumentId, DocumentKey, DocumentType, DocumentVault, ScanMode, SignatureScanner,
    UploadRequest,
};
use crate::workflows::verification::{
    FinancialAttestation, StatusUpdate, VerificationId, VerificationRecord,
    VerificationRepository, VerificationService, VerificationStatus, VerificationSubmission,
    VerificationType,
};

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn investor() -> UserRecord {
    UserRecord {
        id: UserId("user-investor".to_string()),
        external_id: "ext-investor".to_string(),
        email: "investor@example.com".to_string(),
        role: UserRole::Investor,
    }
}

pub(super) fn other_investor() -> UserRecord {
    UserRecord {
        id: UserId("user-other".to_string()),
        external_id: "ext-other".to_string(),
        email: "other@example.com".to_string(),
        role: UserRole::Investor,
    }
}

pub(super) fn reviewer() -> UserRecord {
    UserRecord {
        id: UserId("user-reviewer".to_string()),
        external_id: "ext-reviewer".to_string(),
        email: "reviewer@example.com".to_string(),
        role: UserRole::Reviewer,
    }
}

pub(super) fn admin() -> UserRecord {
    UserRecord {
        id: UserId("user-admin".to_string()),
        external_id: "ext-admin".to_string(),
        email: "admin@example.com".to_string(),
        role: UserRole::Admin,
    }
}

pub(super) fn income_submission(annual_income: u64) -> VerificationSubmission {
    VerificationSubmission {
        kind: VerificationType::Income,
        financials: FinancialAttestation {
            annual_income: Some(annual_income),
            income_source: Some("W-2 employment".to_string()),
            net_worth: None,
            liquid_net_worth: None,
        },
        professional_credential: None,
        attestation: true,
        consent_to_verify: true,
    }
}

pub(super) fn net_worth_submission(net_worth: u64) -> VerificationSubmission {
    VerificationSubmission {
        kind: VerificationType::NetWorth,
        financials: FinancialAttestation {
            annual_income: None,
            income_source: None,
            net_worth: Some(net_worth),
            liquid_net_worth: Some(net_worth / 2),
        },
        professional_credential: None,
        attestation: true,
        consent_to_verify: true,
    }
}

pub(super) fn professional_submission() -> VerificationSubmission {
    VerificationSubmission {
        kind: VerificationType::Professional,
        financials: FinancialAttestation::default(),
        professional_credential: Some("Series 65".to_string()),
        attestation: true,
        consent_to_verify: true,
    }
}

pub(super) fn decision(status: VerificationStatus) -> StatusUpdate {
    StatusUpdate {
        status,
        reviewer_notes: Some("checked statements".to_string()),
        rejection_reason: None,
    }
}

pub(super) fn rejection(reason: &str) -> StatusUpdate {
    StatusUpdate {
        status: VerificationStatus::Rejected,
        reviewer_notes: None,
        rejection_reason: Some(reason.to_string()),
    }
}

pub(super) fn pdf_upload(verification_id: VerificationId, owner: &UserId) -> UploadRequest {
    let bytes = b"%PDF-1.7 brokerage statement".to_vec();
    UploadRequest {
        verification_id,
        uploaded_by: owner.clone(),
        document_type: DocumentType::BrokerageStatement,
        file_name: "statement.pdf".to_string(),
        mime_type: "application/pdf".to_string(),
        declared_size: bytes.len() as u64,
        bytes,
    }
}

pub(super) struct Harness<N = RecordingNotifier> {
    pub(super) service: Arc<VerificationService<MemoryStore, N>>,
    pub(super) vault: Arc<DocumentVault<MemoryStore, SignatureScanner>>,
    pub(super) store: Arc<MemoryStore>,
    pub(super) notifier: Arc<N>,
    pub(super) clock: Arc<ManualClock>,
    pub(super) directory: Arc<StaticDirectory>,
}

pub(super) fn harness() -> Harness {
    harness_with_notifier(Arc::new(RecordingNotifier::default()))
}

pub(super) fn harness_with_notifier<N>(notifier: Arc<N>) -> Harness<N>
where
    N: NotificationSink + 'static,
{
    let store = Arc::new(MemoryStore::open());
    let clock = Arc::new(ManualClock::new(start()));
    let directory = Arc::new(StaticDirectory::with_users([
        investor(),
        other_investor(),
        reviewer(),
        admin(),
    ]));
    let vault = Arc::new(DocumentVault::new(
        store.clone(),
        Arc::new(SignatureScanner),
        &DocumentKey::from_bytes([42u8; 32]),
        clock.clone(),
        ScanMode::Inline,
    ));
    let service = Arc::new(VerificationService::new(
        store.clone(),
        notifier.clone(),
        directory.clone(),
        clock.clone(),
    ));

    Harness {
        service,
        vault,
        store,
        notifier,
        clock,
        directory,
    }
}

impl<N> Harness<N>
where
    N: NotificationSink + 'static,
{
    pub(super) fn router(&self) -> axum::Router {
        accreditation_router(Arc::new(AccreditationApi {
            verifications: self.service.clone(),
            vault: self.vault.clone(),
            directory: self.directory.clone(),
        }))
    }

    pub(super) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(super) fn stored(&self, id: &VerificationId) -> VerificationRecord {
        self.store
            .fetch(id)
            .expect("fetch succeeds")
            .expect("record present")
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Notification sink whose transport is always down.
#[derive(Default)]
pub(super) struct FailingNotifier {
    pub(super) attempts: AtomicUsize,
}

impl NotificationSink for FailingNotifier {
    fn notify(&self, _notification: Notification) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(NotifyError::Transport("smtp relay offline".to_string()))
    }
}

/// Repository whose reads fail a fixed number of times before reaching the inner store.
pub(super) struct FlakyRepository {
    pub(super) inner: MemoryStore,
    pub(super) failures_left: AtomicUsize,
    pub(super) reads: AtomicUsize,
}

impl FlakyRepository {
    pub(super) fn failing(times: usize) -> Self {
        Self {
            inner: MemoryStore::open(),
            failures_left: AtomicUsize::new(times),
            reads: AtomicUsize::new(0),
        }
    }

    fn maybe_fail(&self) -> Result<(), RepositoryError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(RepositoryError::Unavailable("connection reset".to_string()));
        }
        Ok(())
    }
}

impl VerificationRepository for FlakyRepository {
    fn insert(
        &self,
        record: VerificationRecord,
        audit: AuditEntry,
    ) -> Result<VerificationRecord, RepositoryError> {
        self.inner.insert(record, audit)
    }

    fn update(
        &self,
        record: VerificationRecord,
        expected: VerificationStatus,
        audit: AuditEntry,
    ) -> Result<(), RepositoryError> {
        self.inner.update(record, expected, audit)
    }

    fn fetch(&self, id: &VerificationId) -> Result<Option<VerificationRecord>, RepositoryError> {
        self.maybe_fail()?;
        self.inner.fetch(id)
    }

    fn for_owner(&self, owner: &UserId) -> Result<Vec<VerificationRecord>, RepositoryError> {
        self.maybe_fail()?;
        self.inner.for_owner(owner)
    }

    fn purge(
        &self,
        id: &VerificationId,
        deleted_at: DateTime<Utc>,
        document_audit: &dyn Fn(&DocumentId) -> AuditEntry,
        audit: &dyn Fn(usize) -> AuditEntry,
    ) -> Result<usize, RepositoryError> {
        self.inner.purge(id, deleted_at, document_audit, audit)
    }
}

/// Shares the harness store but loses its connection whenever a purge is attempted.
pub(super) struct PurgeOutage {
    pub(super) inner: Arc<MemoryStore>,
}

impl VerificationRepository for PurgeOutage {
    fn insert(
        &self,
        record: VerificationRecord,
        audit: AuditEntry,
    ) -> Result<VerificationRecord, RepositoryError> {
        self.inner.insert(record, audit)
    }

    fn update(
        &self,
        record: VerificationRecord,
        expected: VerificationStatus,
        audit: AuditEntry,
    ) -> Result<(), RepositoryError> {
        self.inner.update(record, expected, audit)
    }

    fn fetch(&self, id: &VerificationId) -> Result<Option<VerificationRecord>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn for_owner(&self, owner: &UserId) -> Result<Vec<VerificationRecord>, RepositoryError> {
        self.inner.for_owner(owner)
    }

    fn purge(
        &self,
        _id: &VerificationId,
        _deleted_at: DateTime<Utc>,
        _document_audit: &dyn Fn(&DocumentId) -> AuditEntry,
        _audit: &dyn Fn(usize) -> AuditEntry,
    ) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("connection reset".to_string()))
    }
}
