pub mod binance;
pub mod channel;
pub mod coingecko;
pub mod rss;
