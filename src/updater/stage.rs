use std::fmt;

/// Progress of an update
///
/// `Idle → VersionsReady → Downloading → Extracting → Reconciling → Persisted`.
/// A failure at any step moves to `Failed`, which keeps the step that failed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UpdateStage {
    #[default]
    Idle,
    /// Online version is loaded and the artifact URL resolved
    VersionsReady,
    Downloading,
    Extracting,
    /// Extracted libraries are merged and the installed set is being recomputed
    Reconciling,
    /// New version record written
    Persisted,
    Failed(Box<UpdateStage>),
}

impl UpdateStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateStage::Idle => "idle",
            UpdateStage::VersionsReady => "versions_ready",
            UpdateStage::Downloading => "downloading",
            UpdateStage::Extracting => "extracting",
            UpdateStage::Reconciling => "reconciling",
            UpdateStage::Persisted => "persisted",
            UpdateStage::Failed(_) => "failed",
        }
    }

    /// Failed state recording `self` as the step that failed
    pub fn fail(self) -> Self {
        match self {
            UpdateStage::Failed(_) => self,
            stage => UpdateStage::Failed(Box::new(stage)),
        }
    }
}

impl fmt::Display for UpdateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStage::Failed(during) => write!(f, "failed while {}", during.as_str()),
            stage => f.write_str(stage.as_str()),
        }
    }
}
