use accreditation::clock::Clock;
use accreditation::config::{AppEnvironment, DirectoryConfig, VaultConfig};
use accreditation::identity::{StaticDirectory, UserId, UserRecord, UserRole};
use accreditation::notify::{Notification, NotificationSink, NotifyError};
use accreditation::storage::MemoryStore;
use accreditation::workflows::vault::{DocumentVault, SignatureScanner};
use accreditation::workflows::verification::VerificationService;
use accreditation::workflows::AccreditationApi;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type Vault = DocumentVault<MemoryStore, SignatureScanner>;

/// Notification sink for local runs. Mail delivery happens out of process, so this only
/// records that a message would have been sent.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(
            template = ?notification.template,
            params = notification.params.len(),
            "notification queued for delivery"
        );
        Ok(())
    }
}

/// Both workflow services wired onto one store.
pub(crate) struct Workflows<N> {
    pub(crate) directory: Arc<StaticDirectory>,
    pub(crate) verifications: Arc<VerificationService<MemoryStore, N>>,
    pub(crate) vault: Arc<Vault>,
}

impl<N> Workflows<N>
where
    N: NotificationSink + 'static,
{
    pub(crate) fn build(
        store: Arc<MemoryStore>,
        vault_config: &VaultConfig,
        notifier: Arc<N>,
        directory: Arc<StaticDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let vault = Arc::new(DocumentVault::new(
            store.clone(),
            Arc::new(SignatureScanner),
            &vault_config.encryption_key,
            clock.clone(),
            vault_config.scan_mode,
        ));
        let verifications = Arc::new(VerificationService::new(
            store,
            notifier,
            directory.clone(),
            clock,
        ));

        Self {
            directory,
            verifications,
            vault,
        }
    }

    pub(crate) fn api(&self) -> Arc<AccreditationApi<MemoryStore, N, MemoryStore, SignatureScanner>> {
        Arc::new(AccreditationApi {
            verifications: self.verifications.clone(),
            vault: self.vault.clone(),
            directory: self.directory.clone(),
        })
    }
}

/// Directory for the HTTP service. Configured accounts win; the fixed local accounts are only
/// seeded in development, so other environments never expose a well-known admin id.
pub(crate) fn service_directory(
    environment: AppEnvironment,
    config: &DirectoryConfig,
) -> StaticDirectory {
    if !config.users.is_empty() {
        return StaticDirectory::with_users(config.users.iter().cloned());
    }
    if environment == AppEnvironment::Development {
        warn!("APP_USERS is empty; seeding local development accounts");
        return local_directory();
    }
    warn!(?environment, "APP_USERS is empty; every request will be rejected as unknown");
    StaticDirectory::default()
}

/// Local accounts keyed by the identity provider ids the auth proxy forwards.
pub(crate) fn local_directory() -> StaticDirectory {
    StaticDirectory::with_users([
        local_user("investor", UserRole::Investor),
        local_user("reviewer", UserRole::Reviewer),
        local_user("admin", UserRole::Admin),
    ])
}

pub(crate) fn local_user(name: &str, role: UserRole) -> UserRecord {
    UserRecord {
        id: UserId(format!("user-{name}")),
        external_id: format!("local-{name}"),
        email: format!("{name}@accreditation.local"),
        role,
    }
}
