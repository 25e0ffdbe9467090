pub mod thread_uri;
pub mod timestamp;
pub mod voters;

pub use thread_uri::ThreadUri;
pub use voters::VoterSet;
