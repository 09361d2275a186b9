use std::io::ErrorKind;
use std::path::Path;

use folio_core::config::DataConfig;
use tracing::{info, warn};

pub const SUMMARY_MISSING: &str = "Resumen personal no disponible";
pub const SUMMARY_UNREADABLE: &str = "Error cargando resumen personal";
pub const LINKEDIN_MISSING: &str = "Perfil de LinkedIn no disponible";
pub const LINKEDIN_UNREADABLE: &str = "Error cargando perfil de LinkedIn";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentStatus {
    Loaded,
    Missing,
    Unreadable,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Missing => "missing",
            Self::Unreadable => "unreadable",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileDocument {
    pub text: String,
    pub status: DocumentStatus,
}

impl ProfileDocument {
    async fn load(kind: &'static str, path: &Path, missing: &str, unreadable: &str) -> Self {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => {
                info!(
                    event_name = "profile.document.loaded",
                    document = kind,
                    path = %path.display(),
                    chars = text.chars().count(),
                    "profile document loaded"
                );
                Self { text, status: DocumentStatus::Loaded }
            }
            Err(error) if error.kind() == ErrorKind::NotFound => {
                warn!(
                    event_name = "profile.document.missing",
                    document = kind,
                    path = %path.display(),
                    "profile document not found"
                );
                Self { text: missing.to_string(), status: DocumentStatus::Missing }
            }
            Err(error) => {
                warn!(
                    event_name = "profile.document.unreadable",
                    document = kind,
                    path = %path.display(),
                    error = %error,
                    "profile document could not be read"
                );
                Self { text: unreadable.to_string(), status: DocumentStatus::Unreadable }
            }
        }
    }
}

/// Static background about the profile owner that is injected into every system prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileContext {
    pub owner_name: String,
    pub summary: ProfileDocument,
    pub linkedin: ProfileDocument,
}

impl ProfileContext {
    /// Never fails: absent or unreadable documents are replaced by placeholder text.
    pub async fn load(owner_name: impl Into<String>, data: &DataConfig) -> Self {
        let summary =
            ProfileDocument::load("summary", &data.summary_file, SUMMARY_MISSING, SUMMARY_UNREADABLE)
                .await;
        let linkedin = ProfileDocument::load(
            "linkedin",
            &data.linkedin_file,
            LINKEDIN_MISSING,
            LINKEDIN_UNREADABLE,
        )
        .await;

        Self { owner_name: owner_name.into(), summary, linkedin }
    }

    pub async fn reload(&mut self, data: &DataConfig) {
        info!(event_name = "profile.reload", "reloading profile documents");
        *self = Self::load(self.owner_name.clone(), data).await;
    }

    pub fn system_prompt(&self, max_response_length: usize) -> String {
        let name = &self.owner_name;
        format!(
            "Eres {name}, y estás respondiendo en su página web. \
             Tu función es contestar preguntas sobre su carrera, formación, habilidades y \
             experiencia. Debes sonar profesional y auténtico, como si hablaras con un posible \
             cliente o empleador. Si no sabes responder, usa la herramienta \
             'record_unknown_question'. Si el usuario parece interesado, pide su email y usa \
             'record_user_details'. Cuando el usuario quiera enviarte un email, usa \
             'send_email_to_me' con un asunto apropiado basado en el contexto. Responde siempre \
             con menos de {max_response_length} caracteres.\n\n\
             ## Resumen:\n{summary}\n\n\
             ## Perfil de LinkedIn:\n{linkedin}\n\n\
             Con este contexto, chatea representando a {name} de forma fiel.",
            summary = self.summary.text,
            linkedin = self.linkedin.text,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use folio_core::config::DataConfig;
    use tempfile::TempDir;

    use super::{DocumentStatus, ProfileContext, LINKEDIN_MISSING, SUMMARY_MISSING};

    fn data_config(root: &std::path::Path) -> DataConfig {
        DataConfig {
            leads_file: root.join("leads.txt"),
            unknown_questions_file: root.join("unknown_questions.txt"),
            summary_file: root.join("me/summary.txt"),
            linkedin_file: root.join("me/linkedin.txt"),
        }
    }

    #[tokio::test]
    async fn missing_documents_use_placeholders() {
        let dir = TempDir::new().expect("temp dir");
        let profile = ProfileContext::load("Diego", &data_config(dir.path())).await;

        assert_eq!(profile.summary.status, DocumentStatus::Missing);
        assert_eq!(profile.summary.text, SUMMARY_MISSING);
        assert_eq!(profile.linkedin.text, LINKEDIN_MISSING);
    }

    #[tokio::test]
    async fn reload_picks_up_new_files() {
        let dir = TempDir::new().expect("temp dir");
        let data = data_config(dir.path());
        let mut profile = ProfileContext::load("Diego", &data).await;

        std::fs::create_dir_all(dir.path().join("me")).expect("me dir");
        std::fs::write(&data.summary_file, "Ingeniero backend en Madrid.").expect("summary");
        profile.reload(&data).await;

        assert_eq!(profile.summary.status, DocumentStatus::Loaded);
        assert_eq!(profile.summary.text, "Ingeniero backend en Madrid.");
        assert_eq!(profile.linkedin.status, DocumentStatus::Missing);
    }

    #[tokio::test]
    async fn system_prompt_embeds_documents_and_limit() {
        let dir = TempDir::new().expect("temp dir");
        let data = DataConfig { summary_file: PathBuf::from("/nonexistent/summary.txt"), ..data_config(dir.path()) };
        let prompt = ProfileContext::load("Diego", &data).await.system_prompt(150);

        assert!(prompt.starts_with("Eres Diego,"));
        assert!(prompt.contains("menos de 150 caracteres"));
        assert!(prompt.contains(&format!("## Resumen:\n{SUMMARY_MISSING}")));
        assert!(prompt.contains("representando a Diego"));
    }
}
