// Thin namespace wrapper for API-layer components
pub mod handlers {
    pub use crate::handlers::*;
}

pub mod webhook_handler {
    pub use crate::webhook_handler::*;
}

pub mod admin_handler {
    pub use crate::admin_handler::*;
}

pub mod upload_handler {
    pub use crate::upload_handler::*;
}
