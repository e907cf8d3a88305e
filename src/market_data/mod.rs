pub mod candle_window;
pub mod ingestion;
pub mod kline;

pub use candle_window::{Candle, CandleWindow};
pub use ingestion::{IngestionSession, SessionConfig, WebSocketConnector};
