//! The messages exchanged on the session stream, plus the identifiers
//! carried out-of-band for group streams.

mod control;
mod group;
mod parameters;
mod setup;
mod stream_type;
mod version;

pub use control::*;
pub use group::*;
pub use parameters::*;
pub use setup::*;
pub use stream_type::*;
pub use version::*;
