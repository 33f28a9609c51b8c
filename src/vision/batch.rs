//! Bounded-concurrency batch recognition
//!
//! One scheduler loop owns the result map and the completion counter. Each
//! dispatched image runs on the blocking pool holding an owned semaphore
//! permit. The permit is dropped with the worker closure, so a slot is
//! returned whether recognition succeeds, fails or panics.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::RecognitionConfig;
use super::engine::TextRecognitionEngine;
use super::error::RecognitionError;
use super::recognizer::{RecognitionResult, Recognizer};
use super::task::{ImageTask, TaskId};

/// Reported once for every image that finished, successfully or not
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Number of images in the batch
    pub total: usize,
    /// Images finished so far, including this one
    pub completed: usize,
    /// The image that just finished
    pub id: TaskId,
    /// Whether it produced a result
    pub succeeded: bool,
}

impl ProgressEvent {
    /// Share of the batch finished, in [0, 1]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Results of a batch. Failed images are absent.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    results: HashMap<TaskId, RecognitionResult>,
    cancelled: bool,
    not_dispatched: Vec<TaskId>,
}

impl BatchOutcome {
    pub fn get(&self, id: &TaskId) -> Option<&RecognitionResult> {
        self.results.get(id)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TaskId, &RecognitionResult)> {
        self.results.iter()
    }

    pub fn into_results(self) -> HashMap<TaskId, RecognitionResult> {
        self.results
    }

    /// Whether the batch stopped early because it was cancelled
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    /// Images never started because the batch was cancelled, in input order
    pub fn not_dispatched(&self) -> &[TaskId] {
        &self.not_dispatched
    }
}

type WorkerOutput = Result<RecognitionResult, RecognitionError>;

/// Runs many images through one shared engine
#[derive(Clone)]
pub struct BatchRecognizer {
    recognizer: Recognizer,
}

impl BatchRecognizer {
    pub fn new(engine: Arc<dyn TextRecognitionEngine>) -> Self {
        Self {
            recognizer: Recognizer::new(engine),
        }
    }

    pub fn recognizer(&self) -> &Recognizer {
        &self.recognizer
    }

    /// Recognize every task, at most `config.concurrent_tasks()` at a time.
    ///
    /// Never fails as a whole: images that fail are logged and left out of
    /// the outcome. `on_progress` is called from this future only, once per
    /// finished image.
    pub async fn recognize_batch<F>(
        &self,
        tasks: Vec<ImageTask>,
        config: &RecognitionConfig,
        on_progress: F,
    ) -> BatchOutcome
    where
        F: FnMut(ProgressEvent),
    {
        self.recognize_batch_with_cancel(tasks, config, on_progress, CancellationToken::new())
            .await
    }

    /// Like [`recognize_batch`](Self::recognize_batch), stopping early when
    /// `cancel` fires.
    ///
    /// After cancellation nothing new is started. Images already running
    /// finish and are recorded; the rest are listed in
    /// [`BatchOutcome::not_dispatched`].
    pub async fn recognize_batch_with_cancel<F>(
        &self,
        tasks: Vec<ImageTask>,
        config: &RecognitionConfig,
        mut on_progress: F,
        cancel: CancellationToken,
    ) -> BatchOutcome
    where
        F: FnMut(ProgressEvent),
    {
        let total = tasks.len();
        // Semaphore::new panics above MAX_PERMITS
        let slots = config
            .concurrent_tasks()
            .min(total.max(1))
            .min(Semaphore::MAX_PERMITS)
            .max(1);
        info!(
            "Starting batch of {} images with {} (concurrency {})",
            total,
            self.recognizer.engine().name(),
            slots
        );

        let config = Arc::new(config.clone());
        let semaphore = Arc::new(Semaphore::new(slots));
        let mut workers: JoinSet<WorkerOutput> = JoinSet::new();
        let mut in_flight: HashMap<Id, TaskId> = HashMap::new();
        let mut pending = tasks.into_iter();
        let mut next = pending.next();

        let mut results = HashMap::with_capacity(total);
        let mut completed = 0usize;
        let mut cancelled = false;
        let mut dispatch_closed = false;

        loop {
            if !cancelled && cancel.is_cancelled() {
                cancelled = true;
                info!("Batch cancelled after {} of {} images", completed, total);
            }

            let can_dispatch = !cancelled && !dispatch_closed && next.is_some();
            if !can_dispatch && workers.is_empty() {
                break;
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled(), if !cancelled => {}

                Some(joined) = workers.join_next_with_id(), if !workers.is_empty() => {
                    let (worker, result) = match joined {
                        Ok((worker, result)) => (worker, result),
                        Err(err) => (err.id(), Err(RecognitionError::Worker(err.to_string()))),
                    };
                    let Some(id) = in_flight.remove(&worker) else {
                        warn!("Recognition worker {:?} has no image assigned", worker);
                        continue;
                    };

                    completed += 1;
                    let succeeded = match result {
                        Ok(recognition) => {
                            debug!("Image {} done ({}/{})", id, completed, total);
                            results.insert(id.clone(), recognition);
                            true
                        }
                        Err(err) => {
                            warn!("Recognition failed for {}: {}", id, err);
                            false
                        }
                    };

                    on_progress(ProgressEvent {
                        total,
                        completed,
                        id,
                        succeeded,
                    });
                }

                permit = semaphore.clone().acquire_owned(), if can_dispatch => {
                    let permit = match permit {
                        Ok(permit) => permit,
                        Err(err) => {
                            warn!("Recognition slots unavailable: {}", err);
                            dispatch_closed = true;
                            continue;
                        }
                    };
                    let Some(task) = next.take() else {
                        continue;
                    };
                    next = pending.next();

                    let id = task.id.clone();
                    let recognizer = self.recognizer.clone();
                    let config = Arc::clone(&config);
                    let handle = workers.spawn_blocking(move || {
                        let _permit = permit;
                        recognizer.recognize(task, &config)
                    });
                    in_flight.insert(handle.id(), id);
                }
            }
        }

        let not_dispatched: Vec<TaskId> = next
            .into_iter()
            .chain(pending)
            .map(|task| task.id)
            .collect();

        info!(
            "Batch finished: {} of {} images recognized, {} not started",
            results.len(),
            total,
            not_dispatched.len()
        );

        BatchOutcome {
            results,
            cancelled,
            not_dispatched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::engine::RecognitionOptions;
    use crate::vision::error::EngineError;
    use crate::vision::region::{NormalizedRect, TextRegion};
    use crate::vision::task::Orientation;
    use image::{DynamicImage, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // Image width selects the behavior of the scripted engine
    const EMPTY: u32 = 1;
    const HELLO_WORLD: u32 = 2;
    const FAILS: u32 = 3;
    const PANICS: u32 = 4;
    const SINGLE_WORD: u32 = 5;

    /// Engine whose output depends on image width; tracks concurrency
    struct ScriptedEngine {
        delay: Duration,
        active: AtomicUsize,
        max_active: AtomicUsize,
        calls: AtomicUsize,
    }

    impl ScriptedEngine {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TextRecognitionEngine for ScriptedEngine {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn detect_text(
            &self,
            image: &DynamicImage,
            _orientation: Orientation,
            _options: &RecognitionOptions,
        ) -> Result<Vec<TextRegion>, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.active.fetch_sub(1, Ordering::SeqCst);

            match image.width() {
                EMPTY => Ok(Vec::new()),
                HELLO_WORLD => Ok(vec![
                    TextRegion::single(NormalizedRect::new(0.1, 0.1, 0.6, 0.2), "World", 0.9),
                    TextRegion::single(NormalizedRect::new(0.1, 0.8, 0.6, 0.9), "Hello", 0.9),
                ]),
                FAILS => Err(EngineError::backend("scripted failure")),
                PANICS => panic!("scripted panic"),
                _ => Ok(vec![TextRegion::single(
                    NormalizedRect::new(0.0, 0.4, 1.0, 0.6),
                    "word",
                    0.5,
                )]),
            }
        }
    }

    fn task(id: &str, kind: u32) -> ImageTask {
        ImageTask::new(
            id,
            DynamicImage::ImageRgb8(RgbImage::new(kind, 8)),
            Orientation::Up,
        )
    }

    fn config(concurrency: usize) -> RecognitionConfig {
        RecognitionConfig::default().with_concurrent_tasks(concurrency)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_end_to_end_three_images() {
        let engine = Arc::new(ScriptedEngine::new(Duration::from_millis(5)));
        let batch = BatchRecognizer::new(engine);
        let mut events = Vec::new();

        let outcome = batch
            .recognize_batch(
                vec![task("A", EMPTY), task("B", HELLO_WORLD), task("C", FAILS)],
                &config(2),
                |event| events.push(event),
            )
            .await;

        assert_eq!(outcome.len(), 2);
        assert_eq!(outcome.get(&TaskId::from("A")).unwrap().text, "");
        assert_eq!(outcome.get(&TaskId::from("B")).unwrap().text, "Hello\nWorld");
        assert!(outcome.get(&TaskId::from("C")).is_none());
        assert!(!outcome.cancelled());
        assert!(outcome.not_dispatched().is_empty());

        assert_eq!(events.len(), 3);
        let completed: Vec<usize> = events.iter().map(|e| e.completed).collect();
        assert_eq!(completed, vec![1, 2, 3]);
        assert!(events.iter().all(|e| e.total == 3));
        let failed: Vec<&TaskId> = events.iter().filter(|e| !e.succeeded).map(|e| &e.id).collect();
        assert_eq!(failed, vec![&TaskId::from("C")]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_never_exceeds_limit() {
        let engine = Arc::new(ScriptedEngine::new(Duration::from_millis(20)));
        let batch = BatchRecognizer::new(engine.clone());
        let tasks = (0..12).map(|i| task(&format!("img-{i}"), SINGLE_WORD)).collect();

        let outcome = batch.recognize_batch(tasks, &config(3), |_| {}).await;

        assert_eq!(outcome.len(), 12);
        let max = engine.max_active.load(Ordering::SeqCst);
        assert_eq!(max, 3, "max concurrent recognitions was {max}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unbounded_concurrency_setting_runs_batch() {
        let batch = BatchRecognizer::new(Arc::new(ScriptedEngine::new(Duration::ZERO)));
        let tasks = (0..4).map(|i| task(&format!("img-{i}"), SINGLE_WORD)).collect();
        let mut events = 0;

        let outcome = batch
            .recognize_batch(tasks, &config(usize::MAX), |_| events += 1)
            .await;

        assert_eq!(outcome.len(), 4);
        assert_eq!(events, 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_every_task_attempted_once() {
        let engine = Arc::new(ScriptedEngine::new(Duration::from_millis(1)));
        let batch = BatchRecognizer::new(engine.clone());
        let tasks = (0..25).map(|i| task(&format!("img-{i}"), SINGLE_WORD)).collect();
        let mut seen = Vec::new();

        let outcome = batch
            .recognize_batch(tasks, &config(4), |event| seen.push(event.id))
            .await;

        assert_eq!(engine.calls.load(Ordering::SeqCst), 25);
        assert_eq!(outcome.len(), 25);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 25);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_one_failure_does_not_affect_others() {
        let engine = Arc::new(ScriptedEngine::new(Duration::from_millis(2)));
        let batch = BatchRecognizer::new(engine);
        let mut tasks: Vec<ImageTask> =
            (0..9).map(|i| task(&format!("ok-{i}"), SINGLE_WORD)).collect();
        tasks.insert(4, task("broken", FAILS));
        let mut events = 0;

        let outcome = batch
            .recognize_batch(tasks, &config(3), |_| events += 1)
            .await;

        assert_eq!(outcome.len(), 9);
        assert_eq!(events, 10);
        assert!(outcome.get(&TaskId::from("broken")).is_none());
        assert!(outcome.iter().all(|(_, result)| result.text == "word"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_undecodable_image_counts_as_failure() {
        let batch = BatchRecognizer::new(Arc::new(ScriptedEngine::new(Duration::ZERO)));
        let tasks = vec![
            ImageTask::from_encoded("garbage", b"not an image".to_vec()),
            task("fine", SINGLE_WORD),
        ];
        let mut events = Vec::new();

        let outcome = batch
            .recognize_batch(tasks, &config(2), |event| events.push(event))
            .await;

        assert_eq!(outcome.len(), 1);
        assert_eq!(events.len(), 2);
        assert!(outcome.get(&TaskId::from("fine")).is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_engine_releases_its_slot() {
        let batch = BatchRecognizer::new(Arc::new(ScriptedEngine::new(Duration::ZERO)));
        let tasks = vec![
            task("boom", PANICS),
            task("after-1", SINGLE_WORD),
            task("after-2", SINGLE_WORD),
        ];
        let mut events = Vec::new();

        // A leaked slot would deadlock with a single permit
        let outcome = tokio::time::timeout(
            Duration::from_secs(10),
            batch.recognize_batch(tasks, &config(1), |event| events.push(event)),
        )
        .await
        .expect("batch stalled after a worker panic");

        assert_eq!(outcome.len(), 2);
        assert_eq!(events.len(), 3);
        assert_eq!(events.last().map(|e| e.completed), Some(3));
        let boom = events
            .iter()
            .find(|e| e.id == TaskId::from("boom"))
            .expect("panicked image missing from progress");
        assert!(!boom.succeeded);
        assert!(outcome.get(&TaskId::from("boom")).is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_stops_dispatch_and_keeps_finished_results() {
        let batch = BatchRecognizer::new(Arc::new(ScriptedEngine::new(Duration::from_millis(30))));
        let tasks: Vec<ImageTask> = (0..6).map(|i| task(&format!("img-{i}"), SINGLE_WORD)).collect();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let mut events = Vec::new();

        let outcome = batch
            .recognize_batch_with_cancel(
                tasks,
                &config(1),
                |event| {
                    trigger.cancel();
                    events.push(event);
                },
                cancel,
            )
            .await;

        assert!(outcome.cancelled());
        assert!(!outcome.is_empty());
        assert!(!outcome.not_dispatched().is_empty());
        assert_eq!(outcome.len() + outcome.not_dispatched().len(), 6);
        assert_eq!(events.len(), outcome.len());
        // Never-started images keep input order
        let last = outcome.not_dispatched().last().unwrap();
        assert_eq!(last, &TaskId::from("img-5"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_dispatches_nothing() {
        let engine = Arc::new(ScriptedEngine::new(Duration::ZERO));
        let batch = BatchRecognizer::new(engine.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = batch
            .recognize_batch_with_cancel(
                vec![task("a", SINGLE_WORD), task("b", SINGLE_WORD)],
                &config(2),
                |_| panic!("no progress expected"),
                cancel,
            )
            .await;

        assert!(outcome.cancelled());
        assert!(outcome.is_empty());
        assert_eq!(
            outcome.not_dispatched(),
            &[TaskId::from("a"), TaskId::from("b")]
        );
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_progress_fraction() {
        let event = ProgressEvent {
            total: 4,
            completed: 1,
            id: TaskId::from("a"),
            succeeded: true,
        };
        assert!((event.fraction() - 0.25).abs() < f64::EPSILON);

        let empty = ProgressEvent {
            total: 0,
            completed: 0,
            ..event
        };
        assert_eq!(empty.fraction(), 1.0);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let batch = BatchRecognizer::new(Arc::new(ScriptedEngine::new(Duration::ZERO)));
        let outcome = batch.recognize_batch(Vec::new(), &config(2), |_| {}).await;
        assert!(outcome.is_empty());
        assert!(!outcome.cancelled());
    }
}
