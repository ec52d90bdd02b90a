mod manual_clock;
mod session_store_memory;

pub use manual_clock::*;
pub use session_store_memory::*;
