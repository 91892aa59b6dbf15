mod sender;

pub use sender::MetaAdapter;
