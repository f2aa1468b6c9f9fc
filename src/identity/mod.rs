//! Central identity and access gating for tonearm.
//! Keep the public surface thin and split implementation across sub-modules.

mod gate;
mod principal;
mod token;

pub use gate::{access_gate, DOWNLOAD_PATH, INVITE_EXCHANGE_PATH, MEDIA_PREFIX};
pub use principal::{Principal, ANONYMOUS_USERNAME};
pub use token::{TokenCodec, TokenError, TokenPayload};
