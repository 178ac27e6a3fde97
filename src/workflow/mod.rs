pub mod handle;
pub mod state;

use crate::classifier::Classifier;
use crate::error::{MatchError, Result};
use crate::media;
use crate::progress::{ProgressGauge, ProgressSimulator};
use crate::scoring;
use crate::types::classification::Classification;
use crate::types::config::{ScoringPolicy, WorkflowSettings};
use crate::types::photo::{PhotoSlot, SlotId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;

pub use handle::WorkflowHandle;
pub use state::{RunStatus, WorkflowSnapshot, WorkflowStage, WorkflowState};

const COMMAND_BUFFER: usize = 16;

#[derive(Debug)]
pub(crate) enum Command {
    Submit {
        slot: SlotId,
        bytes: Vec<u8>,
        file_name: Option<String>,
        reply: oneshot::Sender<Result<()>>,
    },
    Clear {
        slot: SlotId,
        reply: oneshot::Sender<Result<()>>,
    },
    Run {
        reply: oneshot::Sender<Result<RunStatus>>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
}

enum Applied {
    Continue,
    StartRun,
    Reset,
}

enum AnalysisEvent {
    Finished(Result<Vec<Classification>>),
    Command(Option<Command>),
}

/// Single writer of the workflow state. Runs as one task and serialises every
/// command, classifier completion and timer expiry.
pub struct Orchestrator<C> {
    classifier: Arc<C>,
    settings: WorkflowSettings,
    policy: ScoringPolicy,
    rng: StdRng,
    state: WorkflowState,
    gauge: ProgressGauge,
    published: watch::Sender<WorkflowSnapshot>,
    commands: mpsc::Receiver<Command>,
}

/// Starts an orchestrator on the current runtime and returns its handle.
pub fn spawn<C>(
    classifier: C,
    settings: WorkflowSettings,
    policy: ScoringPolicy,
    seed: Option<u64>,
) -> WorkflowHandle
where
    C: Classifier + 'static,
{
    let (orchestrator, handle) = Orchestrator::new(classifier, settings, policy, seed);
    tokio::spawn(orchestrator.run());
    handle
}

impl<C> Orchestrator<C>
where
    C: Classifier + 'static,
{
    pub fn new(
        classifier: C,
        settings: WorkflowSettings,
        policy: ScoringPolicy,
        seed: Option<u64>,
    ) -> (Self, WorkflowHandle) {
        let state = WorkflowState::new(settings.candidates);
        let gauge = ProgressGauge::new();
        let (published, snapshots) = watch::channel(state.snapshot());
        let (sender, commands) = mpsc::channel(COMMAND_BUFFER);
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let handle = WorkflowHandle::new(sender, snapshots, gauge.subscribe());
        let orchestrator = Self {
            classifier: Arc::new(classifier),
            settings,
            policy,
            rng,
            state,
            gauge,
            published,
            commands,
        };
        (orchestrator, handle)
    }

    pub async fn run(mut self) {
        tracing::debug!(candidates = self.settings.candidates, "workflow started");
        while let Some(command) = self.commands.recv().await {
            if let Applied::StartRun = self.apply(command) {
                self.analyze().await;
            }
        }
        tracing::debug!("workflow stopped");
    }

    fn apply(&mut self, command: Command) -> Applied {
        match command {
            Command::Submit {
                slot,
                bytes,
                file_name,
                reply,
            } => {
                let result = media::image_slot(bytes, file_name.as_deref())
                    .and_then(|photo| self.state.fill(slot, photo));
                self.finish_input(slot, &result);
                let _ = reply.send(result);
                Applied::Continue
            }
            Command::Clear { slot, reply } => {
                let result = self.state.clear(slot);
                self.finish_input(slot, &result);
                let _ = reply.send(result);
                Applied::Continue
            }
            Command::Run { reply } => {
                let result = self.state.begin_run();
                self.publish();
                let applied = match &result {
                    Ok(RunStatus::Started) => {
                        tracing::info!(stage = %self.state.stage(), "analysis started");
                        Applied::StartRun
                    }
                    Ok(RunStatus::AlreadyRunning) => {
                        tracing::debug!("run requested while busy, ignoring");
                        Applied::Continue
                    }
                    Err(err) => {
                        tracing::info!(error = %err, "run rejected");
                        Applied::Continue
                    }
                };
                let _ = reply.send(result);
                applied
            }
            Command::Reset { reply } => {
                self.gauge.reset();
                self.state.reset();
                self.publish();
                tracing::info!("workflow reset");
                let _ = reply.send(());
                Applied::Reset
            }
        }
    }

    fn finish_input(&mut self, slot: SlotId, result: &Result<()>) {
        match result {
            Ok(()) => tracing::debug!(%slot, stage = %self.state.stage(), "slot updated"),
            Err(err) => {
                tracing::info!(%slot, error = %err, "slot update rejected");
                self.state.note(err);
            }
        }
        self.publish();
    }

    async fn analyze(&mut self) {
        let simulator = ProgressSimulator::start(
            self.settings.progress,
            self.gauge.clone(),
            StdRng::seed_from_u64(self.rng.random()),
        );
        let fan_in = classify_all(
            Arc::clone(&self.classifier),
            self.state.candidates().to_vec(),
            self.settings.analysis_timeout,
        );
        tokio::pin!(fan_in);

        let outcome = loop {
            let event = tokio::select! {
                result = &mut fan_in => AnalysisEvent::Finished(result),
                command = self.commands.recv() => AnalysisEvent::Command(command),
            };
            match event {
                AnalysisEvent::Finished(result) => break Some(result),
                AnalysisEvent::Command(Some(command)) => {
                    if let Applied::Reset = self.apply(command) {
                        break None;
                    }
                }
                AnalysisEvent::Command(None) => break None,
            }
        };
        simulator.stop();

        let classifications = match outcome {
            None => return,
            Some(Err(err)) => {
                tracing::error!(error = %err, "analysis failed");
                self.gauge.reset();
                self.state.fail(&err);
                self.publish();
                return;
            }
            Some(Ok(classifications)) => classifications,
        };

        self.gauge.complete();
        let ranking = scoring::score(&classifications, &self.policy, &mut self.rng);
        tracing::info!(?ranking, "scoring complete");
        self.state.reveal(classifications, ranking);
        self.publish();

        if !self.hold(self.settings.reveal_delay).await {
            return;
        }
        self.state.celebrate();
        self.publish();

        if !self.hold(self.settings.celebration).await {
            return;
        }
        self.gauge.reset();
        self.state.settle();
        self.publish();
        tracing::info!(stage = %self.state.stage(), "results visible");
    }

    /// Sleeps while still serving commands. Returns false if a reset (or
    /// shutdown) interrupted the hold.
    async fn hold(&mut self, duration: Duration) -> bool {
        if duration.is_zero() {
            return true;
        }
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);
        loop {
            let command = tokio::select! {
                _ = &mut sleep => return true,
                command = self.commands.recv() => command,
            };
            match command {
                Some(command) => {
                    if let Applied::Reset = self.apply(command) {
                        return false;
                    }
                }
                None => return false,
            }
        }
    }

    fn publish(&self) {
        self.published.send_replace(self.state.snapshot());
    }
}

/// Classifies every candidate concurrently and returns the results in slot
/// order once all of them are in. Any task failure fails the whole batch.
async fn classify_all<C>(
    classifier: Arc<C>,
    candidates: Vec<PhotoSlot>,
    deadline: Duration,
) -> Result<Vec<Classification>>
where
    C: Classifier + 'static,
{
    let count = candidates.len();
    let mut tasks = JoinSet::new();
    for (index, slot) in candidates.into_iter().enumerate() {
        let classifier = Arc::clone(&classifier);
        tasks.spawn(async move { (index, classifier.classify(&slot).await) });
    }

    let barrier = async {
        let mut results: Vec<Option<Classification>> = vec![None; count];
        while let Some(joined) = tasks.join_next().await {
            let (index, classification) = joined.map_err(|err| {
                MatchError::AnalysisFailure(format!("classifier task failed: {err}"))
            })?;
            results[index] = Some(classification);
        }
        results
            .into_iter()
            .enumerate()
            .map(|(index, classification)| {
                classification.ok_or_else(|| {
                    MatchError::AnalysisFailure(format!(
                        "no classification for candidate {}",
                        index + 1
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()
    };

    tokio::time::timeout(deadline, barrier)
        .await
        .map_err(|_| {
            MatchError::AnalysisFailure(format!(
                "no answer within {}s",
                deadline.as_secs_f64()
            ))
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::HttpClassifier;
    use crate::media::fixtures::PNG;
    use crate::types::classification::Category;
    use crate::types::config::ClassifierSettings;
    use crate::types::scoring::total;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde_json::json;
    use std::collections::HashMap;
    use std::future::Future;
    use std::sync::atomic::{AtomicBool, Ordering};
    use wiremock::matchers::{body_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Clone, Copy)]
    enum Behavior {
        Answer(Category),
        Slow(Duration, Category),
        PanicOnce,
    }

    /// Answers per file name, so tests can script each candidate.
    struct ScriptedClassifier {
        script: HashMap<String, Behavior>,
        panicked: AtomicBool,
    }

    impl ScriptedClassifier {
        fn new(script: &[(&str, Behavior)]) -> Self {
            Self {
                script: script
                    .iter()
                    .map(|(name, behavior)| (name.to_string(), *behavior))
                    .collect(),
                panicked: AtomicBool::new(false),
            }
        }
    }

    impl Classifier for ScriptedClassifier {
        fn classify(&self, slot: &PhotoSlot) -> impl Future<Output = Classification> + Send {
            let behavior = slot
                .file_name
                .as_ref()
                .and_then(|name| self.script.get(name))
                .copied()
                .unwrap_or(Behavior::Answer(Category::Portrait));
            let first_panic = matches!(behavior, Behavior::PanicOnce)
                && !self.panicked.swap(true, Ordering::SeqCst);
            async move {
                match behavior {
                    Behavior::Answer(category) => Classification::new(category, 0.9),
                    Behavior::Slow(delay, category) => {
                        tokio::time::sleep(delay).await;
                        Classification::new(category, 0.9)
                    }
                    Behavior::PanicOnce => {
                        if first_panic {
                            panic!("classifier crashed");
                        }
                        Classification::new(Category::Unknown, 0.4)
                    }
                }
            }
        }
    }

    fn image(tag: u8) -> Vec<u8> {
        let mut bytes = PNG.to_vec();
        bytes.push(tag);
        bytes
    }

    async fn fill_all(handle: &WorkflowHandle) {
        handle
            .submit(SlotId::Reference, image(0), Some("ref.png".to_string()))
            .await
            .expect("reference accepted");
        for index in 0..3 {
            handle
                .submit(
                    SlotId::Candidate(index),
                    image(index as u8 + 1),
                    Some(format!("c{index}.png")),
                )
                .await
                .expect("candidate accepted");
        }
    }

    fn start(classifier: ScriptedClassifier) -> WorkflowHandle {
        spawn(
            classifier,
            WorkflowSettings::default(),
            ScoringPolicy::default(),
            Some(42),
        )
    }

    fn percentage_of(snapshot: &WorkflowSnapshot, index: usize) -> u32 {
        snapshot
            .ranking
            .iter()
            .find(|entry| entry.candidate_index == index)
            .map(|entry| entry.percentage)
            .expect("candidate should be ranked")
    }

    #[tokio::test(start_paused = true)]
    async fn run_without_reference_reports_incomplete_input() {
        let handle = start(ScriptedClassifier::new(&[]));
        for index in 0..3 {
            handle
                .submit(SlotId::Candidate(index), image(1), Some("c.png".to_string()))
                .await
                .expect("candidate accepted");
        }

        let err = handle.request_run().await.expect_err("reference missing");
        assert!(matches!(err, MatchError::IncompleteInput(_)));
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.stage, WorkflowStage::CollectingInput);
        assert!(snapshot
            .message
            .as_deref()
            .is_some_and(|message| message.contains("please upload all photos")));
    }

    #[tokio::test(start_paused = true)]
    async fn non_image_submission_leaves_slots_untouched() {
        let handle = start(ScriptedClassifier::new(&[]));

        let err = handle
            .submit(
                SlotId::Candidate(0),
                b"%PDF-1.4".to_vec(),
                Some("doc.pdf".to_string()),
            )
            .await
            .expect_err("pdf rejected");
        assert!(matches!(err, MatchError::InvalidImage(_)));

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.stage, WorkflowStage::Idle);
        assert_eq!(snapshot.candidates_filled, vec![false; 3]);
        assert!(snapshot.message.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn full_run_reveals_then_settles_with_ranked_results() {
        let handle = start(ScriptedClassifier::new(&[(
            "c0.png",
            Behavior::Answer(Category::Car),
        )]));
        fill_all(&handle).await;
        assert_eq!(handle.snapshot().stage, WorkflowStage::CollectingInput);

        let mut snapshots = handle.subscribe();
        assert_eq!(
            handle.request_run().await.expect("run starts"),
            RunStatus::Started
        );

        snapshots
            .wait_for(|snapshot| snapshot.stage == WorkflowStage::Revealing)
            .await
            .expect("reveal");
        assert_eq!(handle.progress(), 100.0);
        assert!(handle.snapshot().ranking.is_empty());

        snapshots
            .wait_for(|snapshot| snapshot.celebrating)
            .await
            .expect("celebration");

        let settled = handle.wait_until_finished().await.expect("settles");
        assert_eq!(settled.stage, WorkflowStage::Settled);
        assert_eq!(settled.ranking.len(), 3);
        assert_eq!(total(&settled.ranking), 100);
        assert_eq!(settled.ranking[0].candidate_index, 0);
        assert_eq!(settled.classifications[0].category, Category::Car);
        assert!(!settled.celebrating);
        assert_eq!(handle.progress(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_stays_below_cap_while_classifiers_are_slow() {
        let slow = Behavior::Slow(Duration::from_secs(5), Category::Apartment);
        let handle = start(ScriptedClassifier::new(&[
            ("c0.png", slow),
            ("c1.png", slow),
            ("c2.png", slow),
        ]));
        fill_all(&handle).await;
        handle.request_run().await.expect("run starts");

        let mut previous = 0.0;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let current = handle.progress();
            assert_eq!(handle.snapshot().stage, WorkflowStage::Analyzing);
            assert!(current >= previous);
            assert!(current <= 85.0);
            previous = current;
        }

        let settled = handle.wait_until_finished().await.expect("settles");
        assert_eq!(settled.stage, WorkflowStage::Settled);
        assert_eq!(total(&settled.ranking), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn inputs_and_reruns_are_refused_while_analyzing() {
        let slow = Behavior::Slow(Duration::from_secs(5), Category::Car);
        let handle = start(ScriptedClassifier::new(&[("c1.png", slow)]));
        fill_all(&handle).await;
        handle.request_run().await.expect("run starts");

        assert_eq!(
            handle.request_run().await.expect("no-op"),
            RunStatus::AlreadyRunning
        );
        let err = handle
            .submit(SlotId::Candidate(0), image(9), Some("new.png".to_string()))
            .await
            .expect_err("busy");
        assert!(matches!(err, MatchError::Busy(_)));

        let settled = handle.wait_until_finished().await.expect("settles");
        assert_eq!(settled.ranking[0].candidate_index, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_during_analysis_discards_late_results() {
        let slow = Behavior::Slow(Duration::from_secs(5), Category::Car);
        let handle = start(ScriptedClassifier::new(&[
            ("c0.png", slow),
            ("c1.png", slow),
            ("c2.png", slow),
        ]));
        fill_all(&handle).await;
        handle.request_run().await.expect("run starts");
        tokio::time::sleep(Duration::from_secs(1)).await;

        handle.request_reset().await.expect("reset");
        tokio::time::sleep(Duration::from_secs(10)).await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.stage, WorkflowStage::Idle);
        assert!(!snapshot.reference_filled);
        assert_eq!(snapshot.candidates_filled, vec![false; 3]);
        assert!(snapshot.ranking.is_empty());
        assert_eq!(handle.progress(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_during_reveal_hold_returns_to_idle() {
        let handle = start(ScriptedClassifier::new(&[]));
        fill_all(&handle).await;
        let mut snapshots = handle.subscribe();
        handle.request_run().await.expect("run starts");
        snapshots
            .wait_for(|snapshot| snapshot.stage == WorkflowStage::Revealing)
            .await
            .expect("reveal");

        handle.request_reset().await.expect("reset");
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.snapshot().stage, WorkflowStage::Idle);
        assert_eq!(handle.progress(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn crashed_classifier_fails_the_run_and_retry_succeeds() {
        let handle = start(ScriptedClassifier::new(&[("c2.png", Behavior::PanicOnce)]));
        fill_all(&handle).await;
        handle.request_run().await.expect("run starts");

        let failed = handle.wait_until_finished().await.expect("finishes");
        assert_eq!(failed.stage, WorkflowStage::Failed);
        assert!(failed.ranking.is_empty());
        assert!(failed
            .message
            .as_deref()
            .is_some_and(|message| message.contains("analysis failed")));
        assert_eq!(handle.progress(), 0.0);

        assert_eq!(
            handle.request_run().await.expect("retry"),
            RunStatus::Started
        );
        let mut snapshots = handle.subscribe();
        let settled = snapshots
            .wait_for(|snapshot| snapshot.stage == WorkflowStage::Settled)
            .await
            .expect("settles")
            .clone();
        assert_eq!(total(&settled.ranking), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn analysis_past_the_deadline_fails() {
        let hung = Behavior::Slow(Duration::from_secs(600), Category::Car);
        let settings = WorkflowSettings {
            analysis_timeout: Duration::from_secs(2),
            ..WorkflowSettings::default()
        };
        let handle = spawn(
            ScriptedClassifier::new(&[("c0.png", hung)]),
            settings,
            ScoringPolicy::default(),
            Some(7),
        );
        fill_all(&handle).await;
        handle.request_run().await.expect("run starts");

        let failed = handle.wait_until_finished().await.expect("finishes");
        assert_eq!(failed.stage, WorkflowStage::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_after_settling_clears_results() {
        let handle = start(ScriptedClassifier::new(&[]));
        fill_all(&handle).await;
        handle.request_run().await.expect("run starts");
        handle.wait_until_finished().await.expect("settles");

        handle.request_reset().await.expect("reset");
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.stage, WorkflowStage::Idle);
        assert!(snapshot.ranking.is_empty());
        assert!(snapshot.classifications.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn candidate_index_past_configured_count_is_rejected() {
        let handle = start(ScriptedClassifier::new(&[]));
        let err = handle
            .submit(SlotId::Candidate(3), image(4), Some("extra.png".to_string()))
            .await
            .expect_err("only three candidates");
        assert!(matches!(err, MatchError::SlotOutOfRange(3)));
    }

    #[tokio::test]
    async fn transport_failure_for_one_candidate_degrades_without_failing() {
        let server = MockServer::start().await;
        let payload = |tag: u8| STANDARD.encode(image(tag));
        Mock::given(method("POST"))
            .and(body_json(json!({ "image_base64": payload(1) })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "category": "car", "confidence": 0.93 })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_json(json!({ "image_base64": payload(2) })))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_json(json!({ "image_base64": payload(3) })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "category": "portrait", "confidence": 0.8 })),
            )
            .mount(&server)
            .await;

        let classifier = HttpClassifier::new(server.uri(), &ClassifierSettings::default());
        let handle = spawn(
            classifier,
            WorkflowSettings::default().without_pauses(),
            ScoringPolicy::default(),
            Some(3),
        );
        fill_all(&handle).await;
        handle.request_run().await.expect("run starts");

        let settled = handle.wait_until_finished().await.expect("settles");
        assert_eq!(settled.stage, WorkflowStage::Settled);
        assert_eq!(settled.classifications[1], Classification::fallback());
        assert_eq!(settled.classifications[0].category, Category::Car);
        assert_eq!(settled.ranking[0].candidate_index, 0);
        assert!(percentage_of(&settled, 0) >= 60);
        assert_eq!(total(&settled.ranking), 100);
    }
}
