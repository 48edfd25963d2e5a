pub mod config;
pub mod cookie;
pub mod state;
pub mod transport;
pub mod view;
pub mod widget;

// Re-export main types for convenience
pub use config::Config;
pub use cookie::{get_cookie, CookieTokenProvider, StaticToken, TokenProvider};
pub use state::{Message, Sender};
pub use transport::{ChatTransport, ExchangeError, HttpTransport, IncomingReply, OutgoingRequest};
pub use view::{InputBuffer, Transcript};
pub use widget::{ChatWidget, InputField, TranscriptView};
