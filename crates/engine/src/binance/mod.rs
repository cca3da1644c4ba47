mod rest;

pub use rest::{parse_klines, position_is_open, sign, BinanceFutures};
