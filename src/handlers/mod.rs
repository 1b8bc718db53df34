pub mod presenter;
pub mod request_handler;

pub use presenter::{CollectingPresenter, Presenter};
pub use request_handler::RequestHandler;
