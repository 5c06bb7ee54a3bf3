pub mod channel;

pub use channel::ChannelService;
