use folio_agent::{bootstrap_controller, DialogueController};
use folio_core::config::AppConfig;
use folio_core::errors::ApplicationError;
use tracing::{error, info};

pub struct Application {
    pub config: AppConfig,
    pub controller: DialogueController,
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, ApplicationError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        provider = config.llm.provider.as_str(),
        model = %config.llm.model,
        "starting application bootstrap"
    );

    let controller = bootstrap_controller(&config).await.map_err(|runtime_error| {
        let failure = ApplicationError::from(runtime_error);
        error!(
            event_name = "system.bootstrap.failed",
            correlation_id = "bootstrap",
            error_class = failure.error_class(),
            error = %failure,
            "agent runtime could not be assembled"
        );
        failure
    })?;

    let profile = controller.profile();
    info!(
        event_name = "system.bootstrap.profile_loaded",
        correlation_id = "bootstrap",
        summary = profile.summary.status.as_str(),
        linkedin = profile.linkedin.status.as_str(),
        "profile context loaded"
    );

    Ok(Application { config, controller })
}
