//! Pipeline assembly.
//!
//! The innermost continuation runs pre-processors, the handler, and
//! post-processors in sequence. Behaviors are folded onto it from last
//! registered to first registered, so the first registered behavior becomes
//! the outermost wrapper:
//!
//! ```text
//! fold([b₁, b₂, b₃], core) = b₁(b₂(b₃(core)))
//! ```
//!
//! With no behaviors the fold returns `core` itself: no wrapper is allocated.

use dispatcher_core::{
    BoxFuture, CancellationToken, DispatchError, Next, PipelineBehavior, Request, RequestHandler,
    RequestPostProcessor, RequestPreProcessor,
};
use std::sync::Arc;

/// The stages that run inside every behavior, in order.
pub struct CoreStages<R: Request> {
    /// Run sequentially before the handler
    pub pre_processors: Vec<Arc<dyn RequestPreProcessor<R>>>,
    /// The request's single handler
    pub handler: Arc<dyn RequestHandler<R>>,
    /// Run sequentially after the handler, observing its response
    pub post_processors: Vec<Arc<dyn RequestPostProcessor<R>>>,
}

impl<R: Request> CoreStages<R> {
    /// Build the innermost continuation.
    ///
    /// Any stage's failure aborts the remaining stages and propagates outward,
    /// where surrounding behaviors observe it exactly like a handler failure.
    pub fn into_next<'a>(self, request: &'a R) -> Next<'a, R::Response> {
        Next::new(
            move |cancel: CancellationToken| -> BoxFuture<'a, Result<R::Response, DispatchError>> {
                Box::pin(async move {
                    for processor in &self.pre_processors {
                        processor.process(request, cancel.clone()).await?;
                    }

                    let response = self.handler.handle(request, cancel.clone()).await?;

                    for processor in &self.post_processors {
                        processor.process(request, &response, cancel.clone()).await?;
                    }

                    Ok::<_, DispatchError>(response)
                })
            },
        )
    }
}

/// Wrap `core` in `behaviors`, first element outermost.
pub fn assemble<'a, R: Request>(
    request: &'a R,
    behaviors: &'a [Arc<dyn PipelineBehavior<R>>],
    core: Next<'a, R::Response>,
) -> Next<'a, R::Response> {
    behaviors.iter().rev().fold(core, |next, behavior| {
        Next::new(move |cancel| behavior.handle(request, next, cancel))
    })
}

/// Assemble and run the whole pipeline exactly once.
///
/// # Errors
///
/// Returns the first failure raised by any stage or behavior, unchanged.
pub async fn execute<R: Request>(
    request: &R,
    behaviors: &[Arc<dyn PipelineBehavior<R>>],
    stages: CoreStages<R>,
    cancel: CancellationToken,
) -> Result<R::Response, DispatchError> {
    let core = stages.into_next(request);
    assemble(request, behaviors, core).run(cancel).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::sync::Mutex;

    struct Echo;

    impl Request for Echo {
        type Response = Vec<String>;
    }

    type Log = Arc<Mutex<Vec<String>>>;

    struct Tag(&'static str, Log);

    impl PipelineBehavior<Echo> for Tag {
        fn handle<'a>(
            &'a self,
            _request: &'a Echo,
            next: Next<'a, Vec<String>>,
            cancel: CancellationToken,
        ) -> BoxFuture<'a, Result<Vec<String>, DispatchError>> {
            Box::pin(async move {
                self.1.lock().unwrap().push(format!("{}:in", self.0));
                let result = next.run(cancel).await;
                self.1.lock().unwrap().push(format!("{}:out", self.0));
                result
            })
        }
    }

    struct Collect(Log);

    impl RequestHandler<Echo> for Collect {
        fn handle<'a>(
            &'a self,
            _request: &'a Echo,
            _cancel: CancellationToken,
        ) -> BoxFuture<'a, Result<Vec<String>, DispatchError>> {
            Box::pin(async move {
                self.0.lock().unwrap().push("handler".to_string());
                Ok(self.0.lock().unwrap().clone())
            })
        }
    }

    fn stages(log: &Log) -> CoreStages<Echo> {
        CoreStages {
            pre_processors: Vec::new(),
            handler: Arc::new(Collect(Arc::clone(log))),
            post_processors: Vec::new(),
        }
    }

    #[tokio::test]
    async fn first_behavior_is_outermost() {
        let log: Log = Arc::default();
        let behaviors: Vec<Arc<dyn PipelineBehavior<Echo>>> = vec![
            Arc::new(Tag("a", Arc::clone(&log))),
            Arc::new(Tag("b", Arc::clone(&log))),
        ];

        execute(&Echo, &behaviors, stages(&log), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:in", "b:in", "handler", "b:out", "a:out"]
        );
    }

    #[tokio::test]
    async fn no_behaviors_runs_core_directly() {
        let log: Log = Arc::default();
        let seen = execute(&Echo, &[], stages(&log), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(seen, vec!["handler"]);
    }
}
