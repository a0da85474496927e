use convertino_core::{Config, ConversionContext, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    context: ConversionContext,
}

impl AppState {
    pub fn new(config: Config, context: ConversionContext) -> Self {
        Self { config, context }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn context(&self) -> &ConversionContext {
        &self.context
    }
}
