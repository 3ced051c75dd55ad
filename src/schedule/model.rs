use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Work,
    Rest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlockDifficulty {
    Easy,
    Medium,
    Hard,
}

impl BlockDifficulty {
    /// One step easier; `Easy` stays `Easy`
    pub fn easier(self) -> Self {
        match self {
            BlockDifficulty::Hard => BlockDifficulty::Medium,
            BlockDifficulty::Medium | BlockDifficulty::Easy => BlockDifficulty::Easy,
        }
    }
}

/// Where a schedule came from. Callers use this to spot degraded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    #[serde(rename = "external")]
    External,
    #[serde(rename = "local-fallback")]
    LocalFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleBlock {
    pub kind: BlockKind,
    pub minutes: u32,
    /// Set on work blocks only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<BlockDifficulty>,
    #[serde(default)]
    pub label: String,
}

impl ScheduleBlock {
    pub fn work<S: Into<String>>(minutes: u32, difficulty: BlockDifficulty, label: S) -> Self {
        ScheduleBlock {
            kind: BlockKind::Work,
            minutes,
            difficulty: Some(difficulty),
            label: label.into(),
        }
    }

    pub fn rest(minutes: u32) -> Self {
        ScheduleBlock {
            kind: BlockKind::Rest,
            minutes,
            difficulty: None,
            label: "rest".to_string(),
        }
    }

    pub fn is_work(&self) -> bool {
        self.kind == BlockKind::Work
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub learner_id: String,
    pub exam_type: String,
    pub blocks: Vec<ScheduleBlock>,
    pub provenance: Provenance,
    pub generated_at: DateTime<Utc>,
    /// Id of the schedule this one corrects, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrects: Option<String>,
}

impl Schedule {
    pub fn new(
        learner_id: &str,
        exam_type: &str,
        blocks: Vec<ScheduleBlock>,
        provenance: Provenance,
        at: DateTime<Utc>,
    ) -> Self {
        let fingerprint = fingerprint_blocks(&blocks);
        Schedule {
            id: format!("sched_{}_{}", at.timestamp_millis(), &fingerprint[..12]),
            learner_id: learner_id.to_string(),
            exam_type: exam_type.to_string(),
            blocks,
            provenance,
            generated_at: at,
            corrects: None,
        }
    }

    pub fn correcting(mut self, original_id: &str) -> Self {
        self.corrects = Some(original_id.to_string());
        self
    }

    pub fn fingerprint(&self) -> String {
        fingerprint_blocks(&self.blocks)
    }

    pub fn work_minutes(&self) -> u32 {
        self.blocks.iter().filter(|b| b.is_work()).map(|b| b.minutes).sum()
    }

    pub fn rest_minutes(&self) -> u32 {
        self.blocks.iter().filter(|b| !b.is_work()).map(|b| b.minutes).sum()
    }

    pub fn total_minutes(&self) -> u32 {
        self.blocks.iter().map(|b| b.minutes).sum()
    }
}

/// SHA-256 over the block sequence (kind, minutes, difficulty, label)
pub fn fingerprint_blocks(blocks: &[ScheduleBlock]) -> String {
    let mut hasher = Sha256::new();
    for block in blocks {
        hasher.update(format!("{:?}|{}|{:?}|{};", block.kind, block.minutes, block.difficulty, block.label));
    }
    format!("{:x}", hasher.finalize())
}
