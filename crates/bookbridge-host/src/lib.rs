//! Host runtime: reacts to navigation, runs one lookup pipeline per page state,
//! and publishes results into presentation slots.

pub mod navigation;
pub mod pipeline;
pub mod presenter;
pub mod session;

pub use navigation::DetailPages;
pub use pipeline::{Miss, Pipeline, Rendered, RunOutcome, Stage};
pub use presenter::{Presenter, SlotPresenter, Slots, Status};
pub use session::{Navigation, SessionController};
