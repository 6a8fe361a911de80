//! Deidentify command implementation
//!
//! This module implements the `deidentify` command: load a field profile,
//! replace its rare values with the configured strategy and write the
//! rewritten profile.

use crate::config::{load_config, KanonConfig, Strategy};
use crate::deident::{
    digit_remap, AuditObserver, DeidentSummary, EditDistance, KAnonDeidentifier, LineCandidates,
    NoopObserver, Observer, RemapDeidentifier, VocabDeidentifier,
};
use crate::domain::VocabProfile;
use crate::log_deident_start;
use anyhow::Context;
use clap::Args;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Arguments for the deidentify command
#[derive(Args, Debug)]
pub struct DeidentifyArgs {
    /// Field profile to de-identify (JSON)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Public candidate pool, one value per line (required for k_anon)
    #[arg(long)]
    pub candidates: Option<PathBuf>,

    /// Where to write the rewritten profile
    #[arg(short, long)]
    pub output: PathBuf,

    /// Override the minimum count (k)
    #[arg(long)]
    pub min_count: Option<f64>,

    /// Override the strategy (k_anon or digit_remap)
    #[arg(long)]
    pub strategy: Option<Strategy>,

    /// Run the engine but don't write the output profile or audit trail
    #[arg(long)]
    pub dry_run: bool,
}

impl DeidentifyArgs {
    /// Execute the deidentify command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Starting deidentify command");

        let mut config = match load_config(config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        self.apply_overrides(&mut config);
        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        let deidentifier: Box<dyn VocabDeidentifier<String>> =
            match config.deidentification.strategy {
                Strategy::KAnon => {
                    let Some(path) = &self.candidates else {
                        eprintln!("--candidates is required for the k_anon strategy");
                        return Ok(2);
                    };
                    let candidates = LineCandidates::open(path)?;
                    let distance = EditDistance::new(
                        config.deidentification.blocking_prefix_len,
                        config.deidentification.min_value_len,
                    );
                    let engine: KAnonDeidentifier<String, Vec<char>> = KAnonDeidentifier::new(
                        distance,
                        candidates,
                        config.deidentification.kanon_settings(),
                    )?;
                    Box::new(engine)
                }
                Strategy::DigitRemap => Box::new(RemapDeidentifier::new(
                    digit_remap(config.deidentification.min_count),
                    config.deidentification.threads,
                )?),
            };

        let profile = VocabProfile::load(&self.input)
            .with_context(|| format!("Failed to load profile {}", self.input.display()))?;
        let field = profile.field.clone();

        let audit = if config.audit.enabled && !self.dry_run {
            Some(Arc::new(AuditObserver::new(
                field.clone(),
                &config.audit.log_path,
                config.audit.json_format,
            )?))
        } else {
            None
        };

        log_deident_start!(field, config.deidentification.strategy, profile.entries.len());
        if self.dry_run {
            println!("🔍 DRY RUN MODE - the output profile will not be written");
        }

        let run_audit = audit.clone();
        let (summary, rewritten) = tokio::task::spawn_blocking(move || {
            run(profile, deidentifier.as_ref(), run_audit)
        })
        .await
        .context("De-identification task panicked")??;

        summary.log_summary(&field);
        print_summary(&field, &summary);
        if let Some(audit) = &audit {
            report_audit(audit);
        }

        if !self.dry_run {
            rewritten
                .save(&self.output)
                .with_context(|| format!("Failed to write profile {}", self.output.display()))?;
            println!("✅ Profile written: {}", self.output.display());
        }

        Ok(0)
    }

    fn apply_overrides(&self, config: &mut KanonConfig) {
        if let Some(min_count) = self.min_count {
            tracing::info!(min_count, "Overriding min_count from CLI");
            config.deidentification.min_count = min_count;
        }
        if let Some(strategy) = self.strategy {
            tracing::info!(strategy = %strategy, "Overriding strategy from CLI");
            config.deidentification.strategy = strategy;
        }
        if self.dry_run {
            config.application.dry_run = true;
        }
    }
}

/// Rewrite the profile's vocabulary and fold its counts onto the result
fn run(
    profile: VocabProfile,
    deidentifier: &dyn VocabDeidentifier<String>,
    audit: Option<Arc<AuditObserver>>,
) -> crate::domain::Result<(DeidentSummary, VocabProfile)> {
    let field = profile.field.clone();
    let (vocab, counts) = profile.into_vocabulary();

    // counts by value, captured before any slot is relabelled
    let by_value: HashMap<String, f64> = vocab
        .entries()
        .into_iter()
        .map(|(index, value)| (value, counts.get(&index).copied().unwrap_or(0.0)))
        .collect();
    let count = |value: &String| by_value.get(value).copied().unwrap_or(0.0);

    let observer: &dyn Observer<String> = match &audit {
        Some(audit) => audit.as_ref(),
        None => &NoopObserver,
    };

    let summary = deidentifier.deidentify(&vocab, &count, observer)?;
    let rewritten = VocabProfile::from_vocabulary(field, &vocab, &counts)?;
    Ok((summary, rewritten))
}

/// Print the audit totals; warn when entries were lost
fn report_audit(audit: &AuditObserver) {
    println!("{}", audit_line(audit));
    if audit.failures() > 0 {
        tracing::warn!(
            failed = audit.failures(),
            written = audit.written(),
            log_path = %audit.log_path().display(),
            "Audit trail is incomplete"
        );
        eprintln!("⚠️  {} audit entries could not be written", audit.failures());
    }
}

fn audit_line(audit: &AuditObserver) -> String {
    format!(
        "  Audit entries: {} written, {} failed ({})",
        audit.written(),
        audit.failures(),
        audit.log_path().display()
    )
}

fn print_summary(field: &str, summary: &DeidentSummary) {
    println!();
    println!("De-identification Summary ({field}):");
    println!("  Values: {}", summary.vocabulary_size);
    println!("  Victims: {}", summary.victims);
    println!("  Candidates scanned: {}", summary.candidates_scanned);
    println!("  Blocking replacements: {}", summary.blocking_replacements);
    println!("  Sample replacements: {}", summary.sample_replacements);
    println!("  Remapped: {} ({} merged)", summary.remapped, summary.merged);
    println!("  Residual victims: {}", summary.residual_victims);
    println!("  Duration: {} ms", summary.duration.as_millis());
    println!();
}
