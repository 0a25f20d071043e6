// Checkout domain logic and shared errors/models
pub mod amount {
    pub use crate::amount::*;
}

pub mod tracking {
    pub use crate::tracking::*;
}

pub mod qr {
    pub use crate::qr::*;
}

pub mod lead_recorder {
    pub use crate::lead_recorder::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
