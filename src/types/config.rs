use crate::error::MatchError;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchConfig {
    pub classifier: Option<ClassifierConfig>,
    pub scoring: Option<ScoringConfig>,
    pub workflow: Option<WorkflowConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    pub base_asset: Option<u32>,
    pub min_portrait: Option<u32>,
    pub neutral_primary: Option<u32>,
    pub jitter: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    pub candidates: Option<usize>,
    pub tick_interval_ms: Option<u64>,
    pub progress_cap: Option<f64>,
    pub max_increment: Option<f64>,
    pub reveal_delay_ms: Option<u64>,
    pub celebration_ms: Option<u64>,
    pub analysis_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierSettings {
    pub endpoint: Option<String>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringPolicy {
    pub base_asset: u32,
    pub min_portrait: u32,
    pub neutral_primary: u32,
    /// Upper bound (exclusive) of the uniform jitter added to each base.
    pub jitter: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            base_asset: 70,
            min_portrait: 10,
            neutral_primary: 33,
            jitter: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSettings {
    pub tick_interval: Duration,
    pub cap: f64,
    pub max_increment: f64,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(200),
            cap: 85.0,
            max_increment: 15.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkflowSettings {
    pub candidates: usize,
    pub reveal_delay: Duration,
    pub celebration: Duration,
    pub analysis_timeout: Duration,
    pub progress: ProgressSettings,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            candidates: 3,
            reveal_delay: Duration::from_millis(500),
            celebration: Duration::from_millis(3000),
            analysis_timeout: Duration::from_secs(60),
            progress: ProgressSettings::default(),
        }
    }
}

impl WorkflowSettings {
    pub fn without_pauses(mut self) -> Self {
        self.reveal_delay = Duration::ZERO;
        self.celebration = Duration::ZERO;
        self
    }
}

impl MatchConfig {
    pub fn classifier_settings(&self) -> ClassifierSettings {
        let defaults = ClassifierSettings::default();
        match &self.classifier {
            Some(classifier) => ClassifierSettings {
                endpoint: classifier.endpoint.clone(),
                timeout: classifier
                    .timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.timeout),
                connect_timeout: classifier
                    .connect_timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.connect_timeout),
            },
            None => defaults,
        }
    }

    pub fn scoring_policy(&self) -> ScoringPolicy {
        let defaults = ScoringPolicy::default();
        match &self.scoring {
            Some(scoring) => ScoringPolicy {
                base_asset: scoring.base_asset.unwrap_or(defaults.base_asset),
                min_portrait: scoring.min_portrait.unwrap_or(defaults.min_portrait),
                neutral_primary: scoring.neutral_primary.unwrap_or(defaults.neutral_primary),
                jitter: scoring.jitter.unwrap_or(defaults.jitter),
            },
            None => defaults,
        }
    }

    pub fn workflow_settings(&self) -> WorkflowSettings {
        let defaults = WorkflowSettings::default();
        let Some(workflow) = &self.workflow else {
            return defaults;
        };
        WorkflowSettings {
            candidates: workflow.candidates.unwrap_or(defaults.candidates),
            reveal_delay: workflow
                .reveal_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.reveal_delay),
            celebration: workflow
                .celebration_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.celebration),
            analysis_timeout: workflow
                .analysis_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.analysis_timeout),
            progress: ProgressSettings {
                tick_interval: workflow
                    .tick_interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.progress.tick_interval),
                cap: workflow.progress_cap.unwrap_or(defaults.progress.cap),
                max_increment: workflow
                    .max_increment
                    .unwrap_or(defaults.progress.max_increment),
            },
        }
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        let classifier = self.classifier_settings();
        if let Some(endpoint) = &classifier.endpoint {
            validate_endpoint(endpoint)?;
        }
        if classifier.timeout.is_zero() || classifier.connect_timeout.is_zero() {
            return Err(MatchError::ConfigParse(
                "classifier timeouts must be greater than zero".to_string(),
            ));
        }

        let scoring = self.scoring_policy();
        for (key, value) in [
            ("scoring.base_asset", scoring.base_asset),
            ("scoring.min_portrait", scoring.min_portrait),
            ("scoring.neutral_primary", scoring.neutral_primary),
        ] {
            if value > 100 {
                return Err(MatchError::ConfigParse(format!(
                    "{key} must be between 0 and 100 (found {value})"
                )));
            }
        }
        if !scoring.jitter.is_finite() || scoring.jitter < 0.0 {
            return Err(MatchError::ConfigParse(
                "scoring.jitter must be a non-negative number".to_string(),
            ));
        }

        let workflow = self.workflow_settings();
        if workflow.candidates == 0 {
            return Err(MatchError::ConfigParse(
                "workflow.candidates must be at least 1".to_string(),
            ));
        }
        if workflow.progress.tick_interval.is_zero() {
            return Err(MatchError::ConfigParse(
                "workflow.tick_interval_ms must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&workflow.progress.cap) {
            return Err(MatchError::ConfigParse(
                "workflow.progress_cap must be between 0 and 100".to_string(),
            ));
        }
        if !workflow.progress.max_increment.is_finite() || workflow.progress.max_increment < 0.0 {
            return Err(MatchError::ConfigParse(
                "workflow.max_increment must be a non-negative number".to_string(),
            ));
        }
        if workflow.analysis_timeout.is_zero() {
            return Err(MatchError::ConfigParse(
                "workflow.analysis_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

pub fn validate_endpoint(endpoint: &str) -> Result<(), MatchError> {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Ok(())
    } else {
        Err(MatchError::ConfigParse(format!(
            "classifier.endpoint must be an http(s) URL: {}",
            endpoint
        )))
    }
}
