//! Request handling shared by the CLI and the HTTP server.

use crate::budget::TimeBudget;
use crate::models::{Answer, FileSet, Question};
use crate::runners::Dispatcher;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Routes one question to a runner and turns any failure into an error
/// answer. Never fails itself.
pub struct RequestHandler {
    dispatcher: Dispatcher,
    ceiling: Duration,
}

impl RequestHandler {
    pub fn new(dispatcher: Dispatcher, ceiling: Duration) -> Self {
        Self {
            dispatcher,
            ceiling,
        }
    }

    /// Answer `question`. `start` is when the request arrived; the budget
    /// counts from there, not from when this call begins.
    pub fn handle(&self, question: &Question, files: &FileSet, start: Instant) -> Answer {
        let budget = TimeBudget::starting_at(start, self.ceiling);
        let runner = self.dispatcher.select(question);
        info!(
            "Runner {} selected ({} files attached)",
            runner.name(),
            files.len()
        );

        let outcome = catch_unwind(AssertUnwindSafe(|| runner.run(question, files, &budget)));

        match outcome {
            Ok(Ok(answer)) => {
                info!(
                    "Runner {} finished in {:.2}s",
                    runner.name(),
                    budget.elapsed().as_secs_f64()
                );
                answer
            }
            Ok(Err(e)) => {
                error!("Runner {} failed: {}", runner.name(), e);
                Answer::error(e.kind(), &e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Runner {} panicked: {}", runner.name(), message);
                Answer::error("Panic", &message)
            }
        }
    }
}

/// Text of a panic payload raised with `panic!` or an index/unwrap failure.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "runner panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactEncoder;
    use crate::budget::DEFAULT_CEILING;
    use crate::error::AnalysisError;
    use crate::runners::{GenericTabularRunner, Runner, WikiTableRunner};
    use crate::sources::HtmlSource;
    use crate::table::FileTableLoader;
    use serde_json::{json, Value};

    struct Unreachable;

    impl HtmlSource for Unreachable {
        fn fetch(&self, url: &str) -> Result<String, AnalysisError> {
            Err(AnalysisError::Fetch(format!("Request to {} timed out", url)))
        }
    }

    fn handler() -> RequestHandler {
        let encoder = ArtifactEncoder::default();
        let runners: Vec<Box<dyn Runner>> = vec![Box::new(WikiTableRunner::new(
            Box::new(Unreachable),
            "https://example.org/films".into(),
            encoder,
        ))];
        let fallback = Box::new(GenericTabularRunner::new(Box::new(FileTableLoader), encoder));
        RequestHandler::new(Dispatcher::new(runners, fallback), DEFAULT_CEILING)
    }

    fn handle(question: &str, files: FileSet) -> Value {
        handler()
            .handle(&Question::new(question), &files, Instant::now())
            .to_json()
    }

    #[test]
    fn test_generic_correlation() {
        let files = FileSet::new().with("data.csv", "x,y\n1,2\n2,4\n3,6\n");
        let out = handle("What is the correlation between x and y?", files);
        assert_eq!(out["correlation"], json!(1.0));
        assert_eq!(out["columns"], json!(["x", "y"]));
        assert_eq!(out["shape"], json!([3, 2]));
    }

    #[test]
    fn test_generic_scatter() {
        let files = FileSet::new().with("data.csv", "x,y\n1,2\n2,4\n3,6\n");
        let out = handle("Make a scatterplot of x and y", files);
        assert!(out["plot"].as_str().unwrap().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_no_files() {
        let out = handle("Summarize this", FileSet::new());
        assert_eq!(
            out,
            json!({ "summary": "No tabular data attached. Provide a CSV or Parquet for generic analysis." })
        );
    }

    #[test]
    fn test_runner_failure_becomes_error_answer() {
        let out = handle(
            "List the highest grossing films from Wikipedia",
            FileSet::new(),
        );
        let message = out["error"].as_str().unwrap();
        assert!(message.starts_with("FetchError: "));
        assert!(message.len() <= "FetchError: ".len() + 200);
    }

    struct Crashing;

    impl Runner for Crashing {
        fn name(&self) -> &'static str {
            "crashing"
        }
        fn can_handle(&self, _: &Question) -> bool {
            true
        }
        fn run(&self, _: &Question, _: &FileSet, _: &TimeBudget) -> Result<Answer, AnalysisError> {
            let rows: Vec<u32> = Vec::new();
            let third = rows[3];
            Ok(Answer::Positional(vec![Value::from(third)]))
        }
    }

    #[test]
    fn test_panicking_runner_becomes_error_answer() {
        let handler =
            RequestHandler::new(Dispatcher::new(Vec::new(), Box::new(Crashing)), DEFAULT_CEILING);
        let answer = handler.handle(&Question::new("anything"), &FileSet::new(), Instant::now());

        assert!(answer.is_error());
        let out = answer.to_json();
        let message = out["error"].as_str().unwrap();
        assert!(message.starts_with("Panic: "));
        assert!(message.contains("index out of bounds"));
    }

    #[test]
    fn test_budget_counts_from_request_start() {
        let files = FileSet::new().with("data.csv", "x,y\n1,2\n2,4\n3,6\n");
        let stale = Instant::now() - Duration::from_secs(1);
        let out = RequestHandler::new(
            Dispatcher::new(
                Vec::new(),
                Box::new(GenericTabularRunner::new(
                    Box::new(FileTableLoader),
                    ArtifactEncoder::default(),
                )),
            ),
            Duration::from_millis(500),
        )
        .handle(&Question::new("correlation between x and y"), &files, stale)
        .to_json();

        assert!(out.get("correlation").is_none());
        assert_eq!(out["shape"], json!([3, 2]));
    }
}
