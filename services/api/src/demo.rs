use crate::infra::{local_directory, local_user, Workflows};
use accreditation::clock::{Clock, ManualClock};
use accreditation::config::VaultConfig;
use accreditation::error::AppError;
use accreditation::identity::UserRole;
use accreditation::notify::RecordingNotifier;
use accreditation::storage::MemoryStore;
use accreditation::workflows::vault::{
    DocumentKey, DocumentType, ScanMode, UploadRequest, RETENTION_DAYS,
};
use accreditation::workflows::verification::{
    FinancialAttestation, StatusUpdate, VerificationStatus, VerificationSubmission,
    VerificationType, APPROVAL_VALIDITY_DAYS,
};
use chrono::{Duration, Utc};
use clap::Args;
use std::sync::Arc;

// Demo runs never persist anything, so a fixed key is sufficient.
const DEMO_KEY: [u8; 32] = [0x5a; 32];

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Annual income (USD) claimed by the demo investor
    #[arg(long, default_value_t = 250_000)]
    pub(crate) annual_income: u64,
    /// Reject the request instead of approving it
    #[arg(long)]
    pub(crate) reject: bool,
    /// Leave uploads pending and scan them in the sweep step
    #[arg(long)]
    pub(crate) deferred_scan: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let notifier = Arc::new(RecordingNotifier::default());
    let store = Arc::new(MemoryStore::open());
    let vault_config = VaultConfig {
        encryption_key: DocumentKey::from_bytes(DEMO_KEY),
        scan_mode: if args.deferred_scan {
            ScanMode::Deferred
        } else {
            ScanMode::Inline
        },
    };
    let workflows = Workflows::build(
        store.clone(),
        &vault_config,
        notifier.clone(),
        Arc::new(local_directory()),
        clock.clone(),
    );

    let investor = local_user("investor", UserRole::Investor);
    let reviewer = local_user("reviewer", UserRole::Reviewer);

    println!("Accreditation workflow demo");
    println!("  Simulated start: {}", clock.now().to_rfc3339());

    let submission = VerificationSubmission {
        kind: VerificationType::Income,
        financials: FinancialAttestation {
            annual_income: Some(args.annual_income),
            income_source: Some("Salary and bonus".to_string()),
            ..FinancialAttestation::default()
        },
        professional_credential: None,
        attestation: true,
        consent_to_verify: true,
    };
    let request = match workflows.verifications.create(&investor.id, submission) {
        Ok(request) => request,
        Err(err) => {
            println!("  Submission rejected: {err}");
            store.close();
            return Ok(());
        }
    };
    println!(
        "\n1. {} submitted an income verification ({})",
        investor.email, request.id
    );
    println!("   Status: {}", request.status);

    let statement = b"%PDF-1.7\n% W-2 wage and tax statement (demo)\n%%EOF".to_vec();
    let document = workflows.vault.upload(UploadRequest {
        verification_id: request.id,
        uploaded_by: investor.id.clone(),
        document_type: DocumentType::W2,
        file_name: "w2-demo.pdf".to_string(),
        mime_type: "application/pdf".to_string(),
        declared_size: statement.len() as u64,
        bytes: statement,
    })?;
    println!(
        "\n2. Uploaded {} ({} bytes, encrypted at rest)",
        document.file_name, document.file_size
    );
    println!("   Scan status: {}", document.scan_status.label());
    println!(
        "   Payload purge scheduled for {}",
        document.scheduled_deletion.to_rfc3339()
    );

    clock.advance(Duration::hours(2));
    let swept = workflows.vault.sweep(10)?;
    if swept.scanned > 0 {
        println!("   Deferred scan pass scanned {} document(s)", swept.scanned);
    }

    let downloaded = workflows.vault.retrieve(&document.id)?;
    println!(
        "\n3. {} downloaded the document; integrity verified ({} bytes)",
        reviewer.email,
        downloaded.len()
    );

    clock.advance(Duration::days(1));
    let update = if args.reject {
        StatusUpdate {
            status: VerificationStatus::Rejected,
            reviewer_notes: Some("Income could not be confirmed".to_string()),
            rejection_reason: Some("W-2 does not cover two consecutive years".to_string()),
        }
    } else {
        StatusUpdate {
            status: VerificationStatus::Approved,
            reviewer_notes: Some("W-2 confirms stated income".to_string()),
            rejection_reason: None,
        }
    };
    let reviewed = workflows
        .verifications
        .update_status(&request.id, update, &reviewer.id)?;
    println!("\n4. Reviewer decision: {}", reviewed.status);
    if let Some(reason) = &reviewed.rejection_reason {
        println!("   Reason: {reason}");
    }
    if let Some(expires_at) = reviewed.expires_at {
        println!(
            "   Valid for {APPROVAL_VALIDITY_DAYS} days, until {}",
            expires_at.to_rfc3339()
        );
    }
    for notification in notifier.sent() {
        println!("   Notification queued: {:?}", notification.template);
    }

    let status = workflows.verifications.status(&investor.id)?;
    println!("   Accredited now: {}", status.is_accredited);

    clock.advance(Duration::days(RETENTION_DAYS));
    let swept = workflows.vault.sweep(10)?;
    println!(
        "\n5. {RETENTION_DAYS}-day retention sweep purged {} payload(s)",
        swept.purged
    );
    let metadata = workflows.vault.metadata(&document.id)?;
    println!(
        "   Metadata retained; deleted at {}",
        metadata
            .deleted_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "n/a".to_string())
    );

    if let Some(expires_at) = reviewed.expires_at {
        clock.set(expires_at);
        let status = workflows.verifications.status(&investor.id)?;
        println!(
            "\n6. At {} the approval lapses; accredited: {}",
            expires_at.to_rfc3339(),
            status.is_accredited
        );
    }

    let audit = store.audit_log()?;
    println!("\nAudit trail ({} entries):", audit.len());
    for entry in &audit {
        println!("  {}  {}", entry.recorded_at.to_rfc3339(), entry.action);
    }

    if let Ok(json) = serde_json::to_string_pretty(&workflows.verifications.status(&investor.id)?)
    {
        println!("\nFinal status payload:\n{json}");
    }

    store.close();
    Ok(())
}
