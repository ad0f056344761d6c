pub mod batch;
pub mod config_manager;
pub mod contact;
pub mod eligibility;
pub mod error;
pub mod findings;
pub mod session;

pub use batch::*;
pub use config_manager::*;
pub use contact::*;
pub use eligibility::*;
pub use error::*;
pub use findings::*;
pub use session::*;
