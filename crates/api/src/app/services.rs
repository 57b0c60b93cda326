use std::sync::Arc;

use mailspool_infra::{JobStore, MailService};

/// Services shared by all request handlers.
#[derive(Clone)]
pub struct AppServices {
    mail: MailService,
}

impl AppServices {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            mail: MailService::new(store),
        }
    }

    pub fn mail(&self) -> &MailService {
        &self.mail
    }
}
