//! External service integrations.

pub mod gateways {
    pub use crate::gateways::*;
}

pub mod gateway_client {
    pub use crate::gateway_client::*;
}

pub mod services {
    pub use crate::services::*;
}

pub mod blob_storage {
    pub use crate::blob_storage::*;
}

pub mod webhook_models {
    pub use crate::webhook_models::*;
}
