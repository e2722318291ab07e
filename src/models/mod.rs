mod participant;
mod payment;
mod ride;
mod user;

pub use participant::*;
pub use payment::*;
pub use ride::*;
pub use user::*;
