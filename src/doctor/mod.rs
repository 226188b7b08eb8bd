//! Doctor command for system diagnostics
//!
//! Checks configuration, the language model endpoint and the data files
//! careline reads and writes.

use colored::*;
use std::fs;
use std::path::Path;

use crate::cli::config::Config;
use crate::llm::GroqClient;
use crate::records::RecordStore;

/// Health check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Pass,
    Warn(String),
    Fail(String),
}

/// Individual health check
#[derive(Debug)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
}

impl HealthCheck {
    fn new(name: &str, status: HealthStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
        }
    }
}

/// Doctor diagnostics
pub struct Doctor<'a> {
    config: &'a Config,
}

impl<'a> Doctor<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Run all health checks
    pub async fn run_diagnostics(&self) -> Vec<HealthCheck> {
        vec![
            self.check_configuration(),
            self.check_llm_api().await,
            self.check_records(),
            check_writable_dir("Session storage", &self.config.session_dir()),
            self.check_alert_history(),
        ]
    }

    fn check_configuration(&self) -> HealthCheck {
        match self.config.validate() {
            Ok(()) => HealthCheck::new("Configuration", HealthStatus::Pass),
            Err(e) => HealthCheck::new("Configuration", HealthStatus::Fail(e.to_string())),
        }
    }

    async fn check_llm_api(&self) -> HealthCheck {
        let Some(api_key) = &self.config.api_key else {
            return HealthCheck::new(
                "Language model",
                HealthStatus::Warn("GROQ_API_KEY not set, running offline".to_string()),
            );
        };

        let client = match GroqClient::from_config(&self.config.llm, api_key) {
            Ok(client) => client,
            Err(e) => return HealthCheck::new("Language model", HealthStatus::Fail(e.to_string())),
        };

        match client.health_check().await {
            Ok(true) => HealthCheck::new("Language model", HealthStatus::Pass),
            Ok(false) => HealthCheck::new(
                "Language model",
                HealthStatus::Fail(format!("{} rejected the request", client.base_url())),
            ),
            Err(e) => HealthCheck::new("Language model", HealthStatus::Fail(e.to_string())),
        }
    }

    fn check_records(&self) -> HealthCheck {
        let path = self.config.records_file();
        if !path.exists() {
            return HealthCheck::new(
                "Records file",
                HealthStatus::Warn(format!("{} missing, sample data will be seeded", path.display())),
            );
        }

        let store = RecordStore::load(&path);
        if store.is_empty() {
            HealthCheck::new(
                "Records file",
                HealthStatus::Fail(format!("{} has no patients or doctors", path.display())),
            )
        } else {
            HealthCheck::new("Records file", HealthStatus::Pass)
        }
    }

    fn check_alert_history(&self) -> HealthCheck {
        let path = self.config.alert_history_file();
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => check_writable_dir("Alert history", parent),
            _ => HealthCheck::new("Alert history", HealthStatus::Pass),
        }
    }

    /// Display diagnostics results
    pub fn display_results(checks: &[HealthCheck]) {
        println!("\n{}\n", "careline diagnostics".bold().cyan());
        println!("{:<20} Status", "Check");
        println!("{}", "=".repeat(50));

        for check in checks {
            let status = match &check.status {
                HealthStatus::Pass => "PASS".green(),
                HealthStatus::Warn(msg) => format!("WARN: {}", msg).yellow(),
                HealthStatus::Fail(msg) => format!("FAIL: {}", msg).red(),
            };
            println!("{:<20} {}", check.name, status);
        }

        println!();
    }

    /// False when any check failed
    pub fn overall_status(checks: &[HealthCheck]) -> bool {
        !checks.iter().any(|c| matches!(c.status, HealthStatus::Fail(_)))
    }
}

/// Create `dir` if needed and confirm a file can be written there
fn check_writable_dir(name: &str, dir: &Path) -> HealthCheck {
    if let Err(e) = fs::create_dir_all(dir) {
        return HealthCheck::new(name, HealthStatus::Fail(format!("cannot create {}: {}", dir.display(), e)));
    }

    let marker = dir.join(".careline_write_test");
    match fs::write(&marker, "ok") {
        Ok(()) => {
            let _ = fs::remove_file(&marker);
            HealthCheck::new(name, HealthStatus::Pass)
        }
        Err(_) => HealthCheck::new(
            name,
            HealthStatus::Fail(format!("no write permission in {}", dir.display())),
        ),
    }
}
