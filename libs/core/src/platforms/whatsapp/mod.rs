mod sender;

pub use sender::WhatsAppAdapter;
