mod session;

pub use session::SessionKeys;
