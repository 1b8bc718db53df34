use crate::error::AdvisorError;
use crate::models::InferenceResult;

/// Where the outcome of a submission ends up (the web page, a test recorder, ...)
pub trait Presenter: Send {
    fn present(&mut self, result: InferenceResult);
    fn report_error(&mut self, error: AdvisorError);
}

/// Keeps whatever the orchestrator hands over, for rendering once the request is finished.
#[derive(Debug, Default)]
pub struct CollectingPresenter {
    pub result: Option<InferenceResult>,
    pub error: Option<AdvisorError>,
}

impl Presenter for CollectingPresenter {
    fn present(&mut self, result: InferenceResult) {
        self.result = Some(result);
    }

    fn report_error(&mut self, error: AdvisorError) {
        self.error = Some(error);
    }
}
