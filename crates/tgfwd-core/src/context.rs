use std::sync::Arc;

use crate::{
    audit::AuditLogger, config::Config, jobs::JobStore, messaging::port::ChatPlatform,
    supervisor::Supervisor,
};

/// Everything the shell and the headless driver operate on.
///
/// Built once after authorization and owned by whoever drives the process;
/// there is no global state.
pub struct AppContext {
    pub config: Arc<Config>,
    pub platform: Arc<dyn ChatPlatform>,
    pub jobs: JobStore,
    pub supervisor: Supervisor,
}

impl AppContext {
    pub fn new(config: Arc<Config>, platform: Arc<dyn ChatPlatform>, jobs: JobStore) -> Self {
        let audit = AuditLogger::new(config.audit_log_path.clone(), config.audit_log_json);
        let supervisor = Supervisor::new(platform.clone(), audit, config.stop_grace);
        Self {
            config,
            platform,
            jobs,
            supervisor,
        }
    }

    pub fn account(&self) -> String {
        self.platform.account_name()
    }
}
