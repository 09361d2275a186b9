use std::fs;
use std::path::Path;

use folio_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

const WRITE_CHECK_FILE: &str = ".folio-doctor-write-check";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: format!(
                    "configuration loaded and validated ({} model `{}`)",
                    config.llm.provider.as_str(),
                    config.llm.model
                ),
            });
            checks.push(check_profile_documents(&config));
            checks.push(check_data_directories(&config));
            checks.push(check_mail_delivery(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["profile_documents", "data_directories", "mail_delivery"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_profile_documents(config: &AppConfig) -> DoctorCheck {
    let missing: Vec<String> = [&config.data.summary_file, &config.data.linkedin_file]
        .into_iter()
        .filter(|path| !path.is_file())
        .map(|path| path.display().to_string())
        .collect();

    if missing.is_empty() {
        DoctorCheck {
            name: "profile_documents",
            status: CheckStatus::Pass,
            details: "summary and linkedin documents found".to_string(),
        }
    } else {
        DoctorCheck {
            name: "profile_documents",
            status: CheckStatus::Fail,
            details: format!(
                "missing {}; the assistant will answer with placeholder context",
                missing.join(", ")
            ),
        }
    }
}

fn check_data_directories(config: &AppConfig) -> DoctorCheck {
    let targets = [&config.data.leads_file, &config.data.unknown_questions_file];
    let failures: Vec<String> =
        targets.into_iter().filter_map(|path| check_parent_writable(path).err()).collect();

    if failures.is_empty() {
        DoctorCheck {
            name: "data_directories",
            status: CheckStatus::Pass,
            details: "lead and question record directories are writable".to_string(),
        }
    } else {
        DoctorCheck { name: "data_directories", status: CheckStatus::Fail, details: failures.join("; ") }
    }
}

fn check_mail_delivery(config: &AppConfig) -> DoctorCheck {
    if let Some(smtp) = config.mail.smtp() {
        return DoctorCheck {
            name: "mail_delivery",
            status: CheckStatus::Pass,
            details: format!("smtp relay {}:{} as {} (not contacted)", smtp.host, smtp.port, smtp.email),
        };
    }

    let Some(outbox_file) = &config.mail.outbox_file else {
        return DoctorCheck {
            name: "mail_delivery",
            status: CheckStatus::Skipped,
            details: "neither smtp nor mail.outbox_file is set; confirmed messages will be reported as undeliverable"
                .to_string(),
        };
    };

    match check_parent_writable(outbox_file) {
        Ok(()) => DoctorCheck {
            name: "mail_delivery",
            status: CheckStatus::Pass,
            details: format!("outbox `{}` is writable", outbox_file.display()),
        },
        Err(error) => DoctorCheck { name: "mail_delivery", status: CheckStatus::Fail, details: error },
    }
}

fn check_parent_writable(path: &Path) -> Result<(), String> {
    let parent = path.parent().filter(|parent| !parent.as_os_str().is_empty()).unwrap_or(Path::new("."));
    fs::create_dir_all(parent)
        .map_err(|error| format!("cannot create `{}`: {error}", parent.display()))?;

    let marker = parent.join(WRITE_CHECK_FILE);
    fs::write(&marker, b"ok").map_err(|error| format!("cannot write to `{}`: {error}", parent.display()))?;
    fs::remove_file(&marker)
        .map_err(|error| format!("cannot clean up `{}`: {error}", marker.display()))
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
