//! FIX 4.4 connectivity: codec, session settings, outbound message
//! builders, the tokio session layer, the venue application, and the
//! sandbox executor.

pub mod application;
pub mod codec;
pub mod messages;
pub mod sandbox;
pub mod session;
pub mod settings;

pub use application::FixApplication;
pub use sandbox::SandboxExecutor;
pub use session::{Credentials, Initiator};
pub use settings::SessionSettings;
