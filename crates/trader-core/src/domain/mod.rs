//! 백필 엔진의 도메인 모델.

mod instrument;
mod market_data;
mod window;

pub use instrument::*;
pub use market_data::*;
pub use window::*;
