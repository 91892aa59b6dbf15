mod sender;

pub use sender::TelegramAdapter;
