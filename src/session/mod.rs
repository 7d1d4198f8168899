//! Dashboard session: explicit state, a pure reducer and an effect driver.

pub mod driver;
pub mod state;

pub use driver::Driver;
pub use state::{
    Action, ActivityTab, CategoryTab, DepositPanel, Effect, Session, ViewTarget, DEPOSIT_ZOOM, FOCUS_ZOOM,
    HIGHLIGHT_DELAY, VOICE_ZOOM, region_not_found,
};
