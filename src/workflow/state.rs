use crate::error::{MatchError, Result};
use crate::types::classification::Classification;
use crate::types::photo::{PhotoSlot, SlotId};
use crate::types::scoring::ScoreEntry;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    Idle,
    CollectingInput,
    Analyzing,
    Revealing,
    Settled,
    Failed,
}

impl WorkflowStage {
    /// Stages during which a run is in flight and inputs are locked.
    pub fn is_busy(self) -> bool {
        matches!(self, WorkflowStage::Analyzing | WorkflowStage::Revealing)
    }

    pub fn is_finished(self) -> bool {
        matches!(self, WorkflowStage::Settled | WorkflowStage::Failed)
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowStage::Idle => "idle",
            WorkflowStage::CollectingInput => "collecting input",
            WorkflowStage::Analyzing => "analyzing",
            WorkflowStage::Revealing => "revealing",
            WorkflowStage::Settled => "settled",
            WorkflowStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Started,
    AlreadyRunning,
}

/// Read-only view handed to the presentation side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowSnapshot {
    pub stage: WorkflowStage,
    pub reference_filled: bool,
    pub candidates_filled: Vec<bool>,
    /// Empty until the run settles.
    pub classifications: Vec<Classification>,
    /// Empty until the run settles.
    pub ranking: Vec<ScoreEntry>,
    pub celebrating: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WorkflowState {
    stage: WorkflowStage,
    reference: PhotoSlot,
    candidates: Vec<PhotoSlot>,
    classifications: Vec<Classification>,
    ranking: Vec<ScoreEntry>,
    celebrating: bool,
    message: Option<String>,
}

impl WorkflowState {
    pub fn new(candidates: usize) -> Self {
        Self {
            stage: WorkflowStage::Idle,
            reference: PhotoSlot::empty(),
            candidates: vec![PhotoSlot::empty(); candidates],
            classifications: Vec::new(),
            ranking: Vec::new(),
            celebrating: false,
            message: None,
        }
    }

    pub fn stage(&self) -> WorkflowStage {
        self.stage
    }

    pub fn reference(&self) -> &PhotoSlot {
        &self.reference
    }

    pub fn candidates(&self) -> &[PhotoSlot] {
        &self.candidates
    }

    pub fn classifications(&self) -> &[Classification] {
        &self.classifications
    }

    pub fn ranking(&self) -> &[ScoreEntry] {
        &self.ranking
    }

    pub fn missing_slots(&self) -> Vec<SlotId> {
        let mut missing = Vec::new();
        if !self.reference.is_filled() {
            missing.push(SlotId::Reference);
        }
        missing.extend(
            self.candidates
                .iter()
                .enumerate()
                .filter(|(_, slot)| !slot.is_filled())
                .map(|(index, _)| SlotId::Candidate(index)),
        );
        missing
    }

    pub fn fill(&mut self, slot: SlotId, photo: PhotoSlot) -> Result<()> {
        let target = self.slot_mut(slot)?;
        *target = photo;
        self.after_input_change();
        Ok(())
    }

    pub fn clear(&mut self, slot: SlotId) -> Result<()> {
        let target = self.slot_mut(slot)?;
        *target = PhotoSlot::empty();
        self.after_input_change();
        Ok(())
    }

    /// Moves to `Analyzing` when every slot is filled. Previous results are
    /// discarded; they are never merged into the new run.
    pub fn begin_run(&mut self) -> Result<RunStatus> {
        if self.stage.is_busy() {
            return Ok(RunStatus::AlreadyRunning);
        }

        let missing = self.missing_slots();
        if !missing.is_empty() {
            let names = missing
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let err = MatchError::IncompleteInput(names);
            self.message = Some(err.to_string());
            return Err(err);
        }

        self.discard_results();
        self.message = None;
        self.stage = WorkflowStage::Analyzing;
        Ok(RunStatus::Started)
    }

    pub fn fail(&mut self, err: &MatchError) {
        self.discard_results();
        self.message = Some(err.to_string());
        self.stage = WorkflowStage::Failed;
    }

    pub fn reveal(&mut self, classifications: Vec<Classification>, ranking: Vec<ScoreEntry>) {
        self.classifications = classifications;
        self.ranking = ranking;
        self.celebrating = false;
        self.message = None;
        self.stage = WorkflowStage::Revealing;
    }

    pub fn celebrate(&mut self) {
        self.celebrating = true;
    }

    pub fn settle(&mut self) {
        self.celebrating = false;
        self.stage = WorkflowStage::Settled;
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.candidates.len());
    }

    pub fn note(&mut self, err: &MatchError) {
        self.message = Some(err.to_string());
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        let settled = self.stage == WorkflowStage::Settled;
        WorkflowSnapshot {
            stage: self.stage,
            reference_filled: self.reference.is_filled(),
            candidates_filled: self.candidates.iter().map(PhotoSlot::is_filled).collect(),
            classifications: if settled {
                self.classifications.clone()
            } else {
                Vec::new()
            },
            ranking: if settled {
                self.ranking.clone()
            } else {
                Vec::new()
            },
            celebrating: self.celebrating,
            message: self.message.clone(),
        }
    }

    fn slot_mut(&mut self, slot: SlotId) -> Result<&mut PhotoSlot> {
        if self.stage.is_busy() {
            return Err(MatchError::Busy(format!(
                "cannot change photos while {}",
                self.stage
            )));
        }
        match slot {
            SlotId::Reference => Ok(&mut self.reference),
            SlotId::Candidate(index) => self
                .candidates
                .get_mut(index)
                .ok_or(MatchError::SlotOutOfRange(index)),
        }
    }

    fn after_input_change(&mut self) {
        self.discard_results();
        self.message = None;
        self.stage = WorkflowStage::CollectingInput;
    }

    fn discard_results(&mut self) {
        self.classifications.clear();
        self.ranking.clear();
        self.celebrating = false;
    }
}
